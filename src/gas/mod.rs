//! Gas Module
//!
//! EIP-1559 fee strategy (pure) and the RPC base-fee source feeding it.
//!
//! Author: AI-Generated
//! Created: 2026-02-03
//!
//! Architecture:
//!     strategy.rs - FeeBounds, estimate_fees, cost_of, GasStrategist
//!     oracle.rs   - RpcBaseFeeSource (latest block header via EndpointPool)

pub mod oracle;
pub mod strategy;

pub use oracle::RpcBaseFeeSource;
pub use strategy::{
    cost_of, estimate_fees, fees_for_base_fee, BaseFeeSource, FeeBounds, FeeMultiplier, GasError,
    GasStrategist, GWEI,
};
