//! Candidate filtering
//!
//! Decides which pending swaps deserve a decision cycle, without any
//! network call.
//!
//! Author: AI-Generated
//! Created: 2026-01-29
//! Modified: 2026-02-04 - relevance filter replaces the pool whitelist

pub mod relevance;

pub use relevance::{Candidate, Rejection, RelevanceFilter, TargetToken};
