//! Pool State Registry
//!
//! Thread-safe storage for V3 pool data using DashMap. Immutable pool
//! metadata (tokens, decimals, fee, spacing) is kept forever once learned;
//! the mutable snapshot (price, tick, liquidity) is only served while
//! younger than a short TTL.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-02-04 - metadata/snapshot split, TTL reads, decimals cache

use crate::types::PoolState;
use alloy::primitives::Address;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Fields of a pool that never change after deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetadata {
    pub token0: Address,
    pub token1: Address,
    pub decimals0: u8,
    pub decimals1: u8,
    pub fee: u32,
    pub tick_spacing: i32,
}

/// Thread-safe pool registry
///
/// Clones share the same maps.
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    metadata: Arc<DashMap<Address, PoolMetadata>>,
    snapshots: Arc<DashMap<Address, PoolState>>,
    decimals: Arc<DashMap<Address, u8>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self, pool: Address) -> Option<PoolMetadata> {
        self.metadata.get(&pool).map(|entry| *entry)
    }

    pub fn insert_metadata(&self, pool: Address, metadata: PoolMetadata) {
        self.metadata.insert(pool, metadata);
    }

    pub fn decimals(&self, token: Address) -> Option<u8> {
        self.decimals.get(&token).map(|entry| *entry)
    }

    pub fn insert_decimals(&self, token: Address, decimals: u8) {
        self.decimals.insert(token, decimals);
    }

    /// Add or replace a snapshot
    pub fn update(&self, state: PoolState) {
        debug!(
            pool = %state.address,
            tick = state.tick,
            liquidity = state.liquidity,
            "Updating pool snapshot"
        );
        self.snapshots.insert(state.address, state);
    }

    /// Snapshot if it is no older than `ttl` at `now`
    pub fn fresh(&self, pool: Address, ttl: Duration, now: DateTime<Utc>) -> Option<PoolState> {
        let entry = self.snapshots.get(&pool)?;
        if entry.age(now) <= ttl {
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Drop snapshots older than `ttl`; returns how many were removed
    pub fn evict_stale(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let before = self.snapshots.len();
        self.snapshots.retain(|_, state| state.age(now) <= ttl);
        before - self.snapshots.len()
    }

    /// (known pools, cached snapshots, cached token decimals)
    pub fn stats(&self) -> (usize, usize, usize) {
        (self.metadata.len(), self.snapshots.len(), self.decimals.len())
    }
}
