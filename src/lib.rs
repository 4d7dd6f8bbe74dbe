//! JIT Liquidity Bot Library
//!
//! Watches the mempool for large Uniswap V3 swaps, sizes a just-in-time
//! liquidity position around each one, prices it against current gas, and
//! either records the decision (dry-run) or submits a flashloan bundle.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-05 - JIT pipeline replaces the arbitrage engine

pub mod config;
pub mod contracts;
pub mod filters;
pub mod gas;
pub mod jit;
pub mod mempool;
pub mod pool;
pub mod rpc;
pub mod types;

// Re-export commonly used types
pub use config::{load_config_from_file, BotConfig, ConfigError};
pub use jit::{ExecutionOutcome, Orchestrator};
pub use mempool::{MempoolIngestor, StatusReport};
pub use types::{DecisionReason, ExecutionDecision, ExecutionMode, PoolState};
