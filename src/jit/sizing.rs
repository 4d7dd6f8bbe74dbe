//! Position Sizing
//!
//! Purpose:
//!     Turn a pending swap and a fresh pool snapshot into a concrete JIT
//!     position: the spacing-aligned tick range that straddles the swap's
//!     price path, the liquidity that spends exactly the borrowed capital,
//!     and the hedge swap needed to hold the other side.
//!
//! Author: AI-Generated
//! Created: 2026-02-04
//!
//! Notes:
//!     - Post-swap price is simulated within the current liquidity only
//!       (no tick crossing); good enough to pick the range for one swap.
//!     - Liquidity is solved linearly from a probe position: position value
//!       scales with L, so L = probe × borrow / value(probe).

use alloy::primitives::{Address, U256};
use serde::Serialize;

use crate::pool::calculator::{
    amounts_for_liquidity, mul_div, next_sqrt_price_from_input, price_impact, quote_at_sqrt_price,
};
use crate::pool::tick_math::{
    ceil_to_spacing, floor_to_spacing, sqrt_ratio_at_tick, tick_at_sqrt_ratio, usable_tick_bounds,
    MathError, MAX_SQRT_RATIO, MIN_SQRT_RATIO,
};
use crate::types::{PoolState, TickRange};

const PROBE_LIQUIDITY: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionPlan {
    pub pool: Address,
    pub range: TickRange,
    pub liquidity: u128,
    pub amount0: U256,
    pub amount1: U256,
    pub borrow_token: Address,
    pub borrow_amount: U256,
    /// Borrowed token swapped into `hedge_token_out` before minting
    pub hedge_amount_in: U256,
    pub hedge_token_out: Address,
    pub post_swap_sqrt_price: U256,
    pub price_impact_pct: f64,
}

/// Size a position around an exact-input swap of `amount_in`.
pub fn plan_position(
    state: &PoolState,
    amount_in: U256,
    zero_for_one: bool,
    borrow_token: Address,
    borrow_amount: U256,
) -> Result<PositionPlan, MathError> {
    let borrow_is_token0 = if borrow_token == state.token0 {
        true
    } else if borrow_token == state.token1 {
        false
    } else {
        return Err(MathError::InvalidAmount(format!(
            "borrow token {} not in pool {}",
            borrow_token, state.address
        )));
    };
    if borrow_amount.is_zero() {
        return Err(MathError::InvalidAmount("zero borrow amount".to_string()));
    }

    let post_swap_sqrt_price = next_sqrt_price_from_input(
        state.sqrt_price_x96,
        state.liquidity,
        amount_in,
        zero_for_one,
        state.fee,
    )?
    .clamp(MIN_SQRT_RATIO, MAX_SQRT_RATIO - U256::from(1u64));
    let post_tick = tick_at_sqrt_ratio(post_swap_sqrt_price)?;

    let range = straddle_range(state.tick, post_tick, state.sqrt_price_x96, state.tick_spacing)?;
    let sqrt_lower = sqrt_ratio_at_tick(range.lower)?;
    let sqrt_upper = sqrt_ratio_at_tick(range.upper)?;
    let current = state.sqrt_price_x96;

    let (probe0, probe1) = amounts_for_liquidity(current, sqrt_lower, sqrt_upper, PROBE_LIQUIDITY)?;
    let probe_value = if borrow_is_token0 {
        probe0 + quote_at_sqrt_price(probe1, current, false)?
    } else {
        probe1 + quote_at_sqrt_price(probe0, current, true)?
    };
    if probe_value.is_zero() {
        return Err(MathError::DivisionByZero("probe position value"));
    }

    let liquidity = mul_div(U256::from(PROBE_LIQUIDITY), borrow_amount, probe_value)?;
    let liquidity =
        u128::try_from(liquidity).map_err(|_| MathError::Overflow("position liquidity"))?;
    if liquidity == 0 {
        return Err(MathError::InvalidAmount("borrow amount too small for one unit of liquidity".to_string()));
    }

    let (amount0, amount1) = amounts_for_liquidity(current, sqrt_lower, sqrt_upper, liquidity)?;
    let (hedge_amount_in, hedge_token_out) = if borrow_is_token0 {
        (quote_at_sqrt_price(amount1, current, false)?, state.token1)
    } else {
        (quote_at_sqrt_price(amount0, current, true)?, state.token0)
    };

    Ok(PositionPlan {
        pool: state.address,
        range,
        liquidity,
        amount0,
        amount1,
        borrow_token,
        borrow_amount,
        hedge_amount_in,
        hedge_token_out,
        post_swap_sqrt_price,
        price_impact_pct: price_impact(current, post_swap_sqrt_price),
    })
}

/// Spacing-aligned range covering both ticks with the current sqrt price
/// strictly inside.
pub fn straddle_range(
    current_tick: i32,
    post_tick: i32,
    current_sqrt: U256,
    spacing: i32,
) -> Result<TickRange, MathError> {
    let (min_usable, max_usable) = usable_tick_bounds(spacing)?;
    let mut lower = floor_to_spacing(current_tick.min(post_tick), spacing)?;
    let mut upper = ceil_to_spacing(current_tick.max(post_tick), spacing)?;
    if upper == lower {
        upper += spacing;
    }

    lower = lower.max(min_usable);
    upper = upper.min(max_usable);
    if sqrt_ratio_at_tick(lower)? >= current_sqrt && lower - spacing >= min_usable {
        lower -= spacing;
    }
    if sqrt_ratio_at_tick(upper)? <= current_sqrt && upper + spacing <= max_usable {
        upper += spacing;
    }

    let range = TickRange::new(lower, upper, spacing)?;
    if sqrt_ratio_at_tick(range.lower)? >= current_sqrt || sqrt_ratio_at_tick(range.upper)? <= current_sqrt {
        return Err(MathError::SqrtPriceOutOfRange(current_sqrt));
    }
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::calculator::Q96;
    use crate::pool::tick_math::MAX_TICK;
    use chrono::Utc;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn pool() -> PoolState {
        PoolState {
            address: Address::repeat_byte(0xaa),
            token0: Address::repeat_byte(0x11),
            token1: Address::repeat_byte(0x22),
            decimals0: 18,
            decimals1: 18,
            sqrt_price_x96: Q96,
            tick: 0,
            tick_spacing: 60,
            fee: 3000,
            liquidity: 1_000_000_000_000_000_000_000_000,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_range_widens_when_price_on_boundary() {
        // price exactly at tick 0: lower must move below it
        let range = straddle_range(0, 1, Q96, 60).unwrap();
        assert_eq!(range, TickRange { lower: -60, upper: 60 });
        let down = straddle_range(0, -130, Q96, 60).unwrap();
        assert_eq!(down, TickRange { lower: -180, upper: 60 });
    }

    #[test]
    fn test_range_inside_interior_price() {
        let sqrt = sqrt_ratio_at_tick(30).unwrap() + U256::from(1u64);
        let range = straddle_range(30, 95, sqrt, 60).unwrap();
        assert_eq!(range, TickRange { lower: 0, upper: 120 });
    }

    #[test]
    fn test_range_at_top_of_domain_fails() {
        let (_, max_usable) = usable_tick_bounds(60).unwrap();
        let sqrt = sqrt_ratio_at_tick(MAX_TICK - 1).unwrap();
        assert!(straddle_range(MAX_TICK - 1, MAX_TICK - 1, sqrt, 60).is_err());
        assert!(max_usable < MAX_TICK);
    }

    #[test]
    fn test_plan_spends_borrowed_capital() {
        let state = pool();
        // 100 token1 in: price rises
        let plan = plan_position(&state, e18(100), false, state.token1, e18(50)).unwrap();
        assert_eq!(plan.range, TickRange { lower: -60, upper: 60 });
        assert!(plan.post_swap_sqrt_price > state.sqrt_price_x96);
        assert!(plan.price_impact_pct > 0.0);
        assert_eq!(plan.hedge_token_out, state.token0);

        // symmetric range at price 1: half the capital is hedged into token0
        let held = plan.amount1 + plan.hedge_amount_in;
        let tolerance = e18(1) / U256::from(1_000u64);
        assert!(held <= e18(50) + tolerance && held + tolerance >= e18(50));
        let diff = if plan.amount0 > plan.hedge_amount_in {
            plan.amount0 - plan.hedge_amount_in
        } else {
            plan.hedge_amount_in - plan.amount0
        };
        assert!(diff < tolerance);
    }

    #[test]
    fn test_plan_rejects_foreign_borrow_token() {
        let state = pool();
        assert!(plan_position(&state, e18(1), true, Address::repeat_byte(0x99), e18(1)).is_err());
        assert!(plan_position(&state, e18(1), true, state.token0, U256::ZERO).is_err());
    }

    #[test]
    fn test_plan_requires_liquidity() {
        let mut state = pool();
        state.liquidity = 0;
        assert!(plan_position(&state, e18(1), true, state.token0, e18(1)).is_err());
    }
}
