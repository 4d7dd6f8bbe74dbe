//! RPC Module
//!
//! Weighted endpoint pool shared by all network-facing collaborators.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod endpoints;

pub use endpoints::{EndpointConfig, EndpointKind, EndpointPool, HttpProvider, RpcError};
