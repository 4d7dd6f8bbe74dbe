//! Gas Fee Strategist
//!
//! Purpose:
//!     Derive EIP-1559 fee parameters from the latest base fee and the
//!     configured priority-fee bounds, and price a transaction's gas.
//!
//! Author: AI-Generated
//! Created: 2026-02-03
//!
//! Notes:
//!     - Resolution order: (min, max) bounds > legacy single cap > 1 gwei floor
//!     - Base-fee multiplier kept as mantissa / 10^scale, so the only
//!       rounding step is the floor of base × multiplier
//!     - Base fee arrives through the BaseFeeSource seam (RPC in production)

use alloy::primitives::U256;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::types::{GasCost, GasEstimate};

pub const GWEI: u128 = 1_000_000_000;

/// Floor applied to the default priority fee when no bounds are configured
pub const PRIORITY_FEE_FLOOR_WEI: u128 = GWEI;

#[derive(Debug, Error)]
pub enum GasError {
    #[error("latest block carries no base fee (pre-London chain or misconfigured endpoint)")]
    MissingBaseFee,
    #[error("invalid fee bounds: {0}")]
    InvalidBounds(String),
    #[error("base fee transport error: {0}")]
    Transport(String),
}

/// Latest base fee provider. `Ok(None)` means the block had no base fee.
#[async_trait]
pub trait BaseFeeSource: Send + Sync {
    async fn latest_base_fee(&self) -> Result<Option<u128>, GasError>;
}

/// Exact base-fee multiplier: mantissa / 10^scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeMultiplier {
    mantissa: u128,
    scale: u32,
}

impl FeeMultiplier {
    pub fn from_decimal(value: Decimal) -> Result<Self, GasError> {
        if value.is_sign_negative() || value.is_zero() {
            return Err(GasError::InvalidBounds(format!("multiplier {} must be positive", value)));
        }
        let normalized = value.normalize();
        let mantissa = normalized
            .mantissa()
            .to_u128()
            .ok_or_else(|| GasError::InvalidBounds(format!("multiplier {}", value)))?;
        Ok(Self {
            mantissa,
            scale: normalized.scale(),
        })
    }

    /// floor(amount × multiplier)
    pub fn apply(&self, amount: u128) -> U256 {
        let denominator = U256::from(10u64).pow(U256::from(self.scale));
        U256::from(amount) * U256::from(self.mantissa) / denominator
    }
}

impl Default for FeeMultiplier {
    fn default() -> Self {
        Self { mantissa: 2, scale: 0 }
    }
}

/// Configured priority-fee policy, all values in wei
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeBounds {
    /// New-style (min, max) priority range; wins over the legacy cap
    pub priority_range: Option<(u128, u128)>,
    pub default_priority_fee: u128,
    /// Legacy single cap on the priority fee
    pub legacy_cap: Option<u128>,
    pub base_fee_multiplier: FeeMultiplier,
}

impl Default for FeeBounds {
    fn default() -> Self {
        Self {
            priority_range: None,
            default_priority_fee: GWEI,
            legacy_cap: None,
            base_fee_multiplier: FeeMultiplier::default(),
        }
    }
}

/// Gwei decimal → wei, truncating anything below one wei.
pub fn gwei_to_wei(gwei: Decimal) -> Result<u128, GasError> {
    if gwei.is_sign_negative() {
        return Err(GasError::InvalidBounds(format!("negative fee {} gwei", gwei)));
    }
    gwei.checked_mul(Decimal::from(GWEI))
        .and_then(|wei| wei.trunc().to_u128())
        .ok_or_else(|| GasError::InvalidBounds(format!("fee {} gwei out of range", gwei)))
}

impl FeeBounds {
    pub fn from_gwei(
        min_priority: Option<Decimal>,
        max_priority: Option<Decimal>,
        default_priority: Decimal,
        legacy_cap: Option<Decimal>,
        multiplier: Decimal,
    ) -> Result<Self, GasError> {
        let priority_range = match (min_priority, max_priority) {
            (Some(min), Some(max)) => {
                let (min, max) = (gwei_to_wei(min)?, gwei_to_wei(max)?);
                if min > max {
                    return Err(GasError::InvalidBounds(format!(
                        "min priority {} wei above max {} wei",
                        min, max
                    )));
                }
                Some((min, max))
            }
            (None, None) => None,
            _ => {
                return Err(GasError::InvalidBounds(
                    "min and max priority fee must be set together".to_string(),
                ))
            }
        };
        Ok(Self {
            priority_range,
            default_priority_fee: gwei_to_wei(default_priority)?,
            legacy_cap: legacy_cap.map(gwei_to_wei).transpose()?,
            base_fee_multiplier: FeeMultiplier::from_decimal(multiplier)?,
        })
    }

    pub fn resolve_priority_fee(&self) -> u128 {
        if let Some((min, max)) = self.priority_range {
            self.default_priority_fee.clamp(min, max)
        } else if let Some(cap) = self.legacy_cap {
            self.default_priority_fee.min(cap)
        } else {
            self.default_priority_fee.max(PRIORITY_FEE_FLOOR_WEI)
        }
    }
}

/// Fee parameters for a known base fee.
pub fn fees_for_base_fee(base_fee: u128, bounds: &FeeBounds) -> GasEstimate {
    let priority = bounds.resolve_priority_fee();
    let scaled_base = bounds.base_fee_multiplier.apply(base_fee);
    let max_fee = (scaled_base + U256::from(priority)).saturating_to::<u128>();
    GasEstimate {
        base_fee,
        max_priority_fee_per_gas: priority,
        max_fee_per_gas: max_fee.max(priority),
    }
}

/// Read the latest base fee and derive fee parameters.
pub async fn estimate_fees(
    source: &dyn BaseFeeSource,
    bounds: &FeeBounds,
) -> Result<GasEstimate, GasError> {
    let base_fee = source.latest_base_fee().await?.ok_or(GasError::MissingBaseFee)?;
    let estimate = fees_for_base_fee(base_fee, bounds);
    debug!(
        base_fee = estimate.base_fee,
        priority = estimate.max_priority_fee_per_gas,
        max_fee = estimate.max_fee_per_gas,
        "Gas estimate"
    );
    Ok(estimate)
}

/// Worst-case and expected cost of `gas_limit` gas.
pub fn cost_of(estimate: &GasEstimate, gas_limit: u64) -> GasCost {
    let limit = U256::from(gas_limit);
    GasCost {
        max_cost_wei: U256::from(estimate.max_fee_per_gas) * limit,
        expected_cost_wei: (U256::from(estimate.base_fee)
            + U256::from(estimate.max_priority_fee_per_gas))
            * limit,
    }
}

/// Base-fee source bundled with the configured bounds
#[derive(Clone)]
pub struct GasStrategist {
    source: Arc<dyn BaseFeeSource>,
    bounds: FeeBounds,
}

impl GasStrategist {
    pub fn new(source: Arc<dyn BaseFeeSource>, bounds: FeeBounds) -> Self {
        Self { source, bounds }
    }

    pub async fn estimate(&self) -> Result<GasEstimate, GasError> {
        estimate_fees(self.source.as_ref(), &self.bounds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct FixedBaseFee(Option<u128>);

    #[async_trait]
    impl BaseFeeSource for FixedBaseFee {
        async fn latest_base_fee(&self) -> Result<Option<u128>, GasError> {
            Ok(self.0)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl BaseFeeSource for FailingSource {
        async fn latest_base_fee(&self) -> Result<Option<u128>, GasError> {
            Err(GasError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_no_bounds_applies_one_gwei_floor() {
        let bounds = FeeBounds {
            default_priority_fee: 0,
            ..FeeBounds::default()
        };
        let est = estimate_fees(&FixedBaseFee(Some(25 * GWEI)), &bounds).await.unwrap();
        assert_eq!(est.max_priority_fee_per_gas, GWEI);
        assert!(est.max_fee_per_gas > est.base_fee);
        assert_eq!(est.max_fee_per_gas, 51 * GWEI);
    }

    #[tokio::test]
    async fn test_range_bounds_clamp_default() {
        let bounds =
            FeeBounds::from_gwei(Some(dec!(2)), Some(dec!(5)), dec!(1), None, dec!(2)).unwrap();
        let est = estimate_fees(&FixedBaseFee(Some(25 * GWEI)), &bounds).await.unwrap();
        assert_eq!(est.max_priority_fee_per_gas, 2 * GWEI);
        assert!(est.max_priority_fee_per_gas <= est.max_fee_per_gas);
    }

    #[test]
    fn test_range_wins_over_legacy_cap() {
        let bounds = FeeBounds::from_gwei(
            Some(dec!(2)),
            Some(dec!(5)),
            dec!(10),
            Some(dec!(1)),
            dec!(2),
        )
        .unwrap();
        assert_eq!(bounds.resolve_priority_fee(), 5 * GWEI);
    }

    #[test]
    fn test_legacy_cap_only() {
        let bounds =
            FeeBounds::from_gwei(None, None, dec!(3), Some(dec!(1.5)), dec!(2)).unwrap();
        assert_eq!(bounds.resolve_priority_fee(), 1_500_000_000);
        let under = FeeBounds::from_gwei(None, None, dec!(0.5), Some(dec!(1.5)), dec!(2)).unwrap();
        assert_eq!(under.resolve_priority_fee(), 500_000_000);
    }

    #[test]
    fn test_fractional_multiplier_rounds_down_once() {
        let bounds = FeeBounds::from_gwei(None, None, dec!(1), None, dec!(1.125)).unwrap();
        let est = fees_for_base_fee(7, &bounds);
        // floor(7 × 1.125) = 7, plus 1 gwei priority
        assert_eq!(est.max_fee_per_gas, 7 + GWEI);
        let est = fees_for_base_fee(25 * GWEI, &bounds);
        assert_eq!(est.max_fee_per_gas, 28_125_000_000 + GWEI);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(FeeBounds::from_gwei(Some(dec!(5)), Some(dec!(2)), dec!(1), None, dec!(2)).is_err());
        assert!(FeeBounds::from_gwei(Some(dec!(5)), None, dec!(1), None, dec!(2)).is_err());
        assert!(FeeBounds::from_gwei(None, None, dec!(-1), None, dec!(2)).is_err());
        assert!(FeeBounds::from_gwei(None, None, dec!(1), None, dec!(0)).is_err());
    }

    #[tokio::test]
    async fn test_missing_base_fee_is_config_error() {
        let err = estimate_fees(&FixedBaseFee(None), &FeeBounds::default()).await.unwrap_err();
        assert!(matches!(err, GasError::MissingBaseFee));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let err = estimate_fees(&FailingSource, &FeeBounds::default()).await.unwrap_err();
        assert!(matches!(err, GasError::Transport(_)));
    }

    #[test]
    fn test_cost_of() {
        let est = GasEstimate {
            base_fee: 25_000_000_000,
            max_priority_fee_per_gas: 1_500_000_000,
            max_fee_per_gas: 51_500_000_000,
        };
        let cost = cost_of(&est, 250_000);
        assert_eq!(cost.max_cost_wei, U256::from(12_875_000_000_000_000u64));
        assert_eq!(cost.expected_cost_wei, U256::from(6_625_000_000_000_000u64));
        assert!(cost.max_cost_wei >= cost.expected_cost_wei);
    }

    #[tokio::test]
    async fn test_strategist_wraps_source() {
        let strategist = GasStrategist::new(Arc::new(FixedBaseFee(Some(GWEI))), FeeBounds::default());
        let est = strategist.estimate().await.unwrap();
        assert_eq!(est.max_fee_per_gas, 3 * GWEI);
    }
}
