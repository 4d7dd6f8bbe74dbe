//! Pool module for the JIT liquidity bot
//!
//! Tick/price math, liquidity math, CREATE2 pool addressing, and the
//! on-demand V3 pool state source with its registry.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-01-28 (added V3 support)
//! Modified: 2026-02-04 (tick math engine, pool addressing, PoolSource)

pub mod address;
pub mod calculator;
pub mod state;
pub mod tick_math;
pub mod v3_syncer;

pub use address::{compute_pool_address, sort_tokens, PoolKey};
pub use state::{PoolMetadata, PoolRegistry};
pub use tick_math::MathError;
pub use v3_syncer::{PoolSource, V3PoolSyncer};
