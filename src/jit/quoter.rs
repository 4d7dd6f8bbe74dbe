//! Hedge Quote
//!
//! On-chain QuoterV2 quote for the hedge swap, plus the slippage check
//! against the ideal (spot-price) output.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::contracts::IQuoterV2;
use crate::jit::profit::BPS;
use crate::rpc::EndpointPool;

#[async_trait]
pub trait Quoter: Send + Sync {
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256>;
}

pub struct RpcQuoter {
    endpoints: Arc<EndpointPool>,
    quoter: Address,
}

impl RpcQuoter {
    pub fn new(endpoints: Arc<EndpointPool>, quoter: Address) -> Self {
        Self { endpoints, quoter }
    }
}

#[async_trait]
impl Quoter for RpcQuoter {
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256> {
        let quoter = self.quoter;
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::from_limbs([u64::from(fee)]),
            sqrtPriceLimitX96: U160::ZERO,
        };
        let quote = self
            .endpoints
            .execute("quoteExactInputSingle", |p| async move {
                IQuoterV2::new(quoter, p).quoteExactInputSingle(params).call().await
            })
            .await
            .context("Failed to quote hedge swap")?;
        Ok(quote.amountOut)
    }
}

/// Shortfall of `quoted` below `ideal` in basis points, rounded up.
/// Zero when the quote meets or beats the ideal.
pub fn slippage_bps(ideal: U256, quoted: U256) -> u32 {
    if quoted >= ideal || ideal.is_zero() {
        return 0;
    }
    let shortfall = (ideal - quoted) * U256::from(BPS);
    let bps = (shortfall + ideal - U256::from(1u64)) / ideal;
    bps.saturating_to::<u32>()
}

/// Quoted output reduced by the slippage allowance.
pub fn min_out(quoted: U256, max_slippage_bps: u32) -> U256 {
    let keep = BPS.saturating_sub(max_slippage_bps);
    quoted * U256::from(keep) / U256::from(BPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slippage_bps() {
        let ideal = U256::from(1_000_000u64);
        assert_eq!(slippage_bps(ideal, U256::from(999_000u64)), 10);
        assert_eq!(slippage_bps(ideal, U256::from(999_999u64)), 1);
        assert_eq!(slippage_bps(ideal, ideal), 0);
        assert_eq!(slippage_bps(ideal, U256::from(2_000_000u64)), 0);
        assert_eq!(slippage_bps(U256::ZERO, U256::ZERO), 0);
        assert_eq!(slippage_bps(ideal, U256::ZERO), 10_000);
    }

    #[test]
    fn test_min_out() {
        assert_eq!(min_out(U256::from(10_000u64), 50), U256::from(9_950u64));
        assert_eq!(min_out(U256::from(10_000u64), 0), U256::from(10_000u64));
        assert_eq!(min_out(U256::from(10_000u64), 20_000), U256::ZERO);
    }
}
