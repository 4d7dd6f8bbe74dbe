//! Uniswap V3 Pool Synchronization
//!
//! Fetches V3 pool state (sqrtPriceX96, tick, liquidity, fee, spacing)
//! from the chain for one pool at a time, on demand from a decision cycle.
//!
//! Two fetch paths:
//! - First sight of a pool: discovery (token0/token1, fee, tickSpacing,
//!   token decimals), stored as metadata in the registry.
//! - Known pool: slot0 + liquidity only, fired concurrently via tokio::join!.
//!
//! Author: AI-Generated
//! Created: 2026-01-28
//! Modified: 2026-02-01 - Migrated from ethers-rs to alloy
//! Modified: 2026-02-04 - On-demand PoolSource for the JIT orchestrator

use crate::contracts::{UniswapV3Pool, IERC20};
use crate::pool::state::{PoolMetadata, PoolRegistry};
use crate::pool::tick_math::tick_spacing_for_fee;
use crate::rpc::EndpointPool;
use crate::types::PoolState;
use alloy::primitives::{Address, U256};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fresh pool state provider used by the orchestrator
#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn pool_state(&self, pool: Address) -> Result<PoolState>;
}

/// RPC-backed pool source with a short-TTL snapshot cache
pub struct V3PoolSyncer {
    endpoints: Arc<EndpointPool>,
    registry: PoolRegistry,
    /// Snapshots younger than this are served from the registry
    cache_ttl: chrono::Duration,
}

impl V3PoolSyncer {
    pub fn new(endpoints: Arc<EndpointPool>, registry: PoolRegistry, cache_ttl: chrono::Duration) -> Self {
        Self {
            endpoints,
            registry,
            cache_ttl,
        }
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    /// Immutable fields of a pool, learned once
    async fn discover(&self, pool: Address) -> Result<PoolMetadata> {
        if let Some(metadata) = self.registry.metadata(pool) {
            return Ok(metadata);
        }

        let (token0, token1, fee, spacing) = tokio::join!(
            self.endpoints.execute("token0", |p| async move {
                UniswapV3Pool::new(pool, p).token0().call().await
            }),
            self.endpoints.execute("token1", |p| async move {
                UniswapV3Pool::new(pool, p).token1().call().await
            }),
            self.endpoints.execute("fee", |p| async move {
                UniswapV3Pool::new(pool, p).fee().call().await
            }),
            self.endpoints.execute("tickSpacing", |p| async move {
                UniswapV3Pool::new(pool, p).tickSpacing().call().await
            }),
        );
        let token0 = token0.context("Failed to get token0")?;
        let token1 = token1.context("Failed to get token1")?;
        let fee = fee.context("Failed to get fee")?.to::<u32>();
        let tick_spacing = i32::try_from(spacing.context("Failed to get tickSpacing")?)
            .map_err(|_| anyhow!("tickSpacing out of i32 range"))?;
        check_spacing(pool, fee, tick_spacing)?;

        let metadata = PoolMetadata {
            token0,
            token1,
            decimals0: self.decimals(token0).await?,
            decimals1: self.decimals(token1).await?,
            fee,
            tick_spacing,
        };
        info!(
            %pool,
            %token0,
            %token1,
            fee,
            tick_spacing,
            "Discovered V3 pool"
        );
        self.registry.insert_metadata(pool, metadata);
        Ok(metadata)
    }

    /// Get token decimals (cached)
    async fn decimals(&self, token: Address) -> Result<u8> {
        if let Some(decimals) = self.registry.decimals(token) {
            return Ok(decimals);
        }
        let decimals = self
            .endpoints
            .execute("decimals", |p| async move { IERC20::new(token, p).decimals().call().await })
            .await
            .context("Failed to get token decimals")?;
        self.registry.insert_decimals(token, decimals);
        Ok(decimals)
    }
}

/// Spacing must be positive; a non-standard spacing for a known fee tier
/// usually means a fork deployment and is only flagged.
fn check_spacing(pool: Address, fee: u32, tick_spacing: i32) -> Result<()> {
    if tick_spacing <= 0 {
        bail!("pool {} reports non-positive tickSpacing {}", pool, tick_spacing);
    }
    if let Some(expected) = tick_spacing_for_fee(fee) {
        if expected != tick_spacing {
            warn!(%pool, fee, tick_spacing, expected, "Non-standard tick spacing for fee tier");
        }
    }
    Ok(())
}

#[async_trait]
impl PoolSource for V3PoolSyncer {
    async fn pool_state(&self, pool: Address) -> Result<PoolState> {
        if let Some(state) = self.registry.fresh(pool, self.cache_ttl, Utc::now()) {
            debug!(%pool, "Pool snapshot served from cache");
            return Ok(state);
        }

        let metadata = self.discover(pool).await?;

        let (slot0, liquidity) = tokio::join!(
            self.endpoints.execute("slot0", |p| async move {
                UniswapV3Pool::new(pool, p).slot0().call().await
            }),
            self.endpoints.execute("liquidity", |p| async move {
                UniswapV3Pool::new(pool, p).liquidity().call().await
            }),
        );
        let slot0 = slot0.context("Failed to get slot0")?;
        let liquidity = liquidity.context("Failed to get liquidity")?;
        let tick = i32::try_from(slot0.tick).map_err(|_| anyhow!("slot0 tick out of i32 range"))?;

        let state = PoolState {
            address: pool,
            token0: metadata.token0,
            token1: metadata.token1,
            decimals0: metadata.decimals0,
            decimals1: metadata.decimals1,
            sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
            tick,
            tick_spacing: metadata.tick_spacing,
            fee: metadata.fee,
            liquidity,
            fetched_at: Utc::now(),
        };
        self.registry.update(state.clone());
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::EndpointConfig;

    fn unreachable_syncer() -> V3PoolSyncer {
        let endpoints = EndpointPool::new(&EndpointConfig::parse_list("wss://only.example").unwrap()).unwrap();
        V3PoolSyncer::new(Arc::new(endpoints), PoolRegistry::new(), chrono::Duration::seconds(5))
    }

    #[tokio::test]
    async fn test_cached_snapshot_skips_rpc() {
        let syncer = unreachable_syncer();
        let pool = Address::repeat_byte(0x42);
        syncer.registry().update(PoolState {
            address: pool,
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            decimals0: 18,
            decimals1: 18,
            sqrt_price_x96: U256::from(1u64) << 96,
            tick: 0,
            tick_spacing: 60,
            fee: 3000,
            liquidity: 5,
            fetched_at: Utc::now(),
        });
        let state = syncer.pool_state(pool).await.unwrap();
        assert_eq!(state.liquidity, 5);
    }

    #[tokio::test]
    async fn test_no_http_endpoint_is_an_error() {
        let syncer = unreachable_syncer();
        let err = syncer.pool_state(Address::repeat_byte(0x43)).await.unwrap_err();
        assert!(format!("{:#}", err).contains("no http endpoint"));
    }

    #[test]
    fn test_spacing_checked_against_fee_tier() {
        let pool = Address::repeat_byte(0x44);
        assert!(check_spacing(pool, 3000, 60).is_ok());
        // non-standard tier or spacing is tolerated
        assert!(check_spacing(pool, 3000, 10).is_ok());
        assert!(check_spacing(pool, 2500, 50).is_ok());
        assert!(check_spacing(pool, 3000, 0).is_err());
        assert!(check_spacing(pool, 500, -10).is_err());
    }
}
