//! Profit model
//!
//! Everything is priced in wei of the wrapped native token so revenue and
//! gas share a unit. Fractions are parts-per-million integers.

use alloy::primitives::{Address, I256, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::pool::calculator::{mul_div, quote_at_sqrt_price, FEE_DENOMINATOR};
use crate::pool::tick_math::MathError;
use crate::types::PoolState;

pub const PPM: u32 = 1_000_000;
pub const BPS: u32 = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("pool {pool} has no wrapped native leg")]
    Unpriceable { pool: Address },
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Decimal fraction in [0, 1] → parts per million (truncated)
pub fn fraction_to_ppm(fraction: Decimal) -> Result<u32, String> {
    if fraction.is_sign_negative() || fraction > Decimal::ONE {
        return Err(format!("fraction {} outside [0, 1]", fraction));
    }
    (fraction * Decimal::from(PPM))
        .trunc()
        .to_u32()
        .ok_or_else(|| format!("fraction {} not representable", fraction))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitModel {
    pub wrapped_native: Address,
    pub captured_fee_ppm: u32,
    pub inclusion_ppm: u32,
    pub flashloan_fee_bps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfitBreakdown {
    /// Full swap fee the target swap pays, in wei
    pub swap_fee_wei: U256,
    /// Share expected to land in our position, after inclusion odds
    pub expected_revenue_wei: U256,
    pub expected_gas_wei: U256,
    pub flashloan_fee_wei: U256,
    pub expected_profit: I256,
}

impl ProfitModel {
    /// Convert `amount` of a pool token to wrapped native wei at the
    /// pool's current price.
    pub fn to_native(&self, state: &PoolState, token: Address, amount: U256) -> Result<U256, PricingError> {
        if token == self.wrapped_native {
            return Ok(amount);
        }
        let native_is_token1 = state.token1 == self.wrapped_native;
        let native_is_token0 = state.token0 == self.wrapped_native;
        if !(native_is_token0 || native_is_token1) || !state.contains(token) {
            return Err(PricingError::Unpriceable { pool: state.address });
        }
        // token is the non-native leg; converting token0 → token1 when native is token1
        Ok(quote_at_sqrt_price(amount, state.sqrt_price_x96, native_is_token1)?)
    }

    pub fn evaluate(
        &self,
        state: &PoolState,
        token_in: Address,
        amount_in: U256,
        borrow_token: Address,
        borrow_amount: U256,
        expected_gas_wei: U256,
    ) -> Result<ProfitBreakdown, PricingError> {
        let fee_in_token = mul_div(amount_in, U256::from(state.fee), U256::from(FEE_DENOMINATOR))?;
        let swap_fee_wei = self.to_native(state, token_in, fee_in_token)?;

        let captured = mul_div(swap_fee_wei, U256::from(self.captured_fee_ppm), U256::from(PPM))?;
        let expected_revenue_wei = mul_div(captured, U256::from(self.inclusion_ppm), U256::from(PPM))?;

        let flash_fee_in_token =
            mul_div(borrow_amount, U256::from(self.flashloan_fee_bps), U256::from(BPS))?;
        let flashloan_fee_wei = self.to_native(state, borrow_token, flash_fee_in_token)?;

        let expected_profit =
            signed(expected_revenue_wei) - signed(expected_gas_wei) - signed(flashloan_fee_wei);
        Ok(ProfitBreakdown {
            swap_fee_wei,
            expected_revenue_wei,
            expected_gas_wei,
            flashloan_fee_wei,
            expected_profit,
        })
    }
}

fn signed(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::calculator::Q96;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    const WETH: Address = Address::repeat_byte(0x22);

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn pool(token0: Address, token1: Address) -> PoolState {
        PoolState {
            address: Address::repeat_byte(0xaa),
            token0,
            token1,
            decimals0: 18,
            decimals1: 18,
            // price 4: one token0 buys four token1
            sqrt_price_x96: Q96 * U256::from(2u64),
            tick: 13_863,
            tick_spacing: 60,
            fee: 3000,
            liquidity: 1,
            fetched_at: Utc::now(),
        }
    }

    fn model() -> ProfitModel {
        ProfitModel {
            wrapped_native: WETH,
            captured_fee_ppm: 500_000,
            inclusion_ppm: 800_000,
            flashloan_fee_bps: 0,
        }
    }

    #[test]
    fn test_fraction_to_ppm() {
        assert_eq!(fraction_to_ppm(dec!(0.5)), Ok(500_000));
        assert_eq!(fraction_to_ppm(dec!(1)), Ok(1_000_000));
        assert_eq!(fraction_to_ppm(dec!(0.0000015)), Ok(1));
        assert!(fraction_to_ppm(dec!(1.01)).is_err());
        assert!(fraction_to_ppm(dec!(-0.1)).is_err());
    }

    #[test]
    fn test_revenue_in_native_input() {
        let state = pool(Address::repeat_byte(0x11), WETH);
        let b = model()
            .evaluate(&state, WETH, e18(100), WETH, e18(50), U256::from(10_400_000_000_000_000u64))
            .unwrap();
        assert_eq!(b.swap_fee_wei, e18(3) / U256::from(10u64));
        assert_eq!(b.expected_revenue_wei, U256::from(120_000_000_000_000_000u64));
        assert_eq!(
            b.expected_profit,
            I256::try_from(109_600_000_000_000_000u64).unwrap()
        );
    }

    #[test]
    fn test_revenue_converted_from_other_token() {
        let token0 = Address::repeat_byte(0x11);
        let state = pool(token0, WETH);
        // 1 token0 of fee is worth 4 WETH at price 4
        assert_eq!(model().to_native(&state, token0, e18(1)).unwrap(), e18(4));
        // and the reverse direction when WETH is token0
        let flipped = pool(WETH, Address::repeat_byte(0x33));
        assert_eq!(
            model().to_native(&flipped, Address::repeat_byte(0x33), e18(4)).unwrap(),
            e18(1)
        );
    }

    #[test]
    fn test_negative_profit_and_flash_fee() {
        let state = pool(Address::repeat_byte(0x11), WETH);
        let m = ProfitModel {
            flashloan_fee_bps: 9,
            ..model()
        };
        let b = m.evaluate(&state, WETH, e18(1), WETH, e18(100), e18(1)).unwrap();
        assert_eq!(b.flashloan_fee_wei, e18(9) / U256::from(100u64));
        assert!(b.expected_profit.is_negative());
    }

    #[test]
    fn test_unpriceable_pool() {
        let state = pool(Address::repeat_byte(0x11), Address::repeat_byte(0x33));
        let err = model()
            .evaluate(&state, Address::repeat_byte(0x11), e18(1), Address::repeat_byte(0x11), e18(1), U256::ZERO)
            .unwrap_err();
        assert!(matches!(err, PricingError::Unpriceable { .. }));
    }
}
