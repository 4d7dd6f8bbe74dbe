// Core data structures shared by the pool, gas and execution layers

use alloy::primitives::{Address, I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pool::calculator::price_from_sqrt_price_x96;
use crate::pool::tick_math::{MathError, MAX_TICK, MIN_TICK};

/// Fresh snapshot of a V3 pool, fetched once per decision cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolState {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub decimals0: u8,
    pub decimals1: u8,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub tick_spacing: i32,
    /// Fee in hundredths of a bip (3000 = 0.30%)
    pub fee: u32,
    /// Active in-range liquidity
    pub liquidity: u128,
    pub fetched_at: DateTime<Utc>,
}

impl PoolState {
    /// Human price of token0 in token1
    pub fn price(&self) -> f64 {
        price_from_sqrt_price_x96(self.sqrt_price_x96, self.decimals0, self.decimals1)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.fetched_at)
    }

    pub fn contains(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }
}

/// Spacing-aligned position bounds, lower < upper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    pub fn new(lower: i32, upper: i32, spacing: i32) -> Result<Self, MathError> {
        if spacing <= 0 {
            return Err(MathError::InvalidTickSpacing(spacing));
        }
        if lower < MIN_TICK {
            return Err(MathError::TickOutOfRange(lower));
        }
        if upper > MAX_TICK {
            return Err(MathError::TickOutOfRange(upper));
        }
        if lower >= upper || lower % spacing != 0 || upper % spacing != 0 {
            return Err(MathError::InvalidAmount(format!(
                "range [{}, {}] invalid for spacing {}",
                lower, upper, spacing
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn width(&self) -> i32 {
        self.upper - self.lower
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// EIP-1559 fee parameters in wei
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GasEstimate {
    pub base_fee: u128,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

/// Worst-case and expected cost of a transaction in wei
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GasCost {
    pub max_cost_wei: U256,
    pub expected_cost_wei: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    DryRun,
    Live,
}

impl ExecutionMode {
    pub fn is_live(&self) -> bool {
        matches!(self, ExecutionMode::Live)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::DryRun => write!(f, "dry-run"),
            ExecutionMode::Live => write!(f, "live"),
        }
    }
}

/// Why a cycle ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Profitable,
    NotRelevant,
    Expired,
    Superseded,
    PoolStateUnavailable,
    StalePoolState,
    SizingFailed,
    Unpriceable,
    GasUnavailable,
    BelowMinProfit,
    QuoteFailed,
    SlippageExceeded,
    SubmissionFailed,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::Profitable => "profitable",
            DecisionReason::NotRelevant => "not_relevant",
            DecisionReason::Expired => "expired",
            DecisionReason::Superseded => "superseded",
            DecisionReason::PoolStateUnavailable => "pool_state_unavailable",
            DecisionReason::StalePoolState => "stale_pool_state",
            DecisionReason::SizingFailed => "sizing_failed",
            DecisionReason::Unpriceable => "unpriceable",
            DecisionReason::GasUnavailable => "gas_unavailable",
            DecisionReason::BelowMinProfit => "below_min_profit",
            DecisionReason::QuoteFailed => "quote_failed",
            DecisionReason::SlippageExceeded => "slippage_exceeded",
            DecisionReason::SubmissionFailed => "submission_failed",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal verdict of one decision cycle. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionDecision {
    pub proceed: bool,
    pub reason: DecisionReason,
    /// Wei of the wrapped native token; negative when costs exceed revenue
    pub expected_profit: I256,
    pub mode: ExecutionMode,
}

impl ExecutionDecision {
    pub fn proceed(expected_profit: I256, mode: ExecutionMode) -> Self {
        Self {
            proceed: true,
            reason: DecisionReason::Profitable,
            expected_profit,
            mode,
        }
    }

    pub fn reject(reason: DecisionReason, expected_profit: I256, mode: ExecutionMode) -> Self {
        Self {
            proceed: false,
            reason,
            expected_profit,
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_range_validation() {
        assert!(TickRange::new(-120, 60, 60).is_ok());
        assert!(TickRange::new(60, 60, 60).is_err());
        assert!(TickRange::new(120, 60, 60).is_err());
        assert!(TickRange::new(-100, 60, 60).is_err());
        assert!(TickRange::new(MIN_TICK - 1, 0, 1).is_err());
        assert!(TickRange::new(0, 60, 0).is_err());
        assert_eq!(TickRange::new(-60, 60, 60).unwrap().width(), 120);
    }

    #[test]
    fn test_decision_constructors() {
        let ok = ExecutionDecision::proceed(I256::ONE, ExecutionMode::DryRun);
        assert!(ok.proceed);
        assert_eq!(ok.reason, DecisionReason::Profitable);
        let no = ExecutionDecision::reject(DecisionReason::Expired, I256::ZERO, ExecutionMode::Live);
        assert!(!no.proceed);
        assert_eq!(no.reason.to_string(), "expired");
        assert_eq!(ExecutionMode::DryRun.to_string(), "dry-run");
    }
}
