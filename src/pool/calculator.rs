//! Price Calculator
//!
//! Fixed-point price and amount conversions for concentrated-liquidity pools:
//! human prices from sqrtPriceX96, liquidity ↔ token amounts, within-tick
//! swap stepping, and exact decimal formatting of raw token amounts.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-02-03 - sqrtPriceX96 math, LiquidityAmounts, 512-bit mul_div
//!
//! Notes:
//!     - Every amount stays in U256; f64 appears only in display prices
//!       and in the tick_at_price entry point
//!     - mul_div widens to U512 so a*b never overflows

use alloy::primitives::{U256, U512};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::tick_math::{
    sqrt_ratio_at_tick, tick_at_sqrt_ratio, MathError, MAX_SQRT_RATIO, MIN_SQRT_RATIO,
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Q96 = 2^96, the sqrtPriceX96 fixed-point unit
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

/// Fee denominator for V3 fee tiers (fee is in hundredths of a bip)
pub const FEE_DENOMINATOR: u32 = 1_000_000;

// ── 512-bit helpers ──────────────────────────────────────────────────────────

fn widen(x: U256) -> U512 {
    let l = x.as_limbs();
    U512::from_limbs([l[0], l[1], l[2], l[3], 0, 0, 0, 0])
}

fn narrow(x: U512) -> Option<U256> {
    let l = x.as_limbs();
    if l[4..].iter().any(|&limb| limb != 0) {
        return None;
    }
    Some(U256::from_limbs([l[0], l[1], l[2], l[3]]))
}

/// floor(a * b / denominator) with a full 512-bit intermediate
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero("mul_div"));
    }
    narrow(widen(a) * widen(b) / widen(denominator)).ok_or(MathError::Overflow("mul_div"))
}

/// ceil(a * b / denominator)
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero("mul_div_rounding_up"));
    }
    let product = widen(a) * widen(b);
    let d = widen(denominator);
    let mut quotient = product / d;
    if !(product % d).is_zero() {
        quotient += U512::from(1u8);
    }
    narrow(quotient).ok_or(MathError::Overflow("mul_div_rounding_up"))
}

// ── Float conversions (display only) ─────────────────────────────────────────

/// Lossy U256 → f64. Large values are shifted into u128 range first.
pub fn u256_to_f64(value: U256) -> f64 {
    let bits = value.bit_len();
    if bits <= 128 {
        return value.to::<u128>() as f64;
    }
    let shift = bits - 128;
    let shifted: U256 = value >> shift;
    shifted.to::<u128>() as f64 * 2.0_f64.powi(shift as i32)
}

/// Lossy f64 → U256 for non-negative finite values.
fn f64_to_u256(value: f64) -> Option<U256> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value < 2.0_f64.powi(128) {
        return Some(U256::from(value as u128));
    }
    let bits = value.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i64 - 1075;
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
    if exponent > 256 - 53 {
        return None;
    }
    Some(U256::from(mantissa) << exponent as usize)
}

fn decimal_adjustment(decimals0: u8, decimals1: u8) -> f64 {
    10_f64.powi(i32::from(decimals0) - i32::from(decimals1))
}

// ── Prices ───────────────────────────────────────────────────────────────────

/// Human price of token0 in token1: (sqrtPriceX96 / 2^96)^2 × 10^(dec0 − dec1)
pub fn price_from_sqrt_price_x96(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    let ratio = u256_to_f64(sqrt_price_x96) / u256_to_f64(Q96);
    ratio * ratio * decimal_adjustment(decimals0, decimals1)
}

pub fn price_at_tick(tick: i32, decimals0: u8, decimals1: u8) -> Result<f64, MathError> {
    let sqrt_price = sqrt_ratio_at_tick(tick)?;
    Ok(price_from_sqrt_price_x96(sqrt_price, decimals0, decimals1))
}

/// Tick whose price is the closest at-or-below `price` (floor semantics).
pub fn tick_at_price(price: f64, decimals0: u8, decimals1: u8) -> Result<i32, MathError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(MathError::InvalidPrice(price));
    }
    let raw_ratio = price / decimal_adjustment(decimals0, decimals1);
    let sqrt_price = f64_to_u256(raw_ratio.sqrt() * u256_to_f64(Q96))
        .ok_or(MathError::InvalidPrice(price))?;
    if sqrt_price < MIN_SQRT_RATIO || sqrt_price >= MAX_SQRT_RATIO {
        return Err(MathError::InvalidPrice(price));
    }
    tick_at_sqrt_ratio(sqrt_price)
}

/// Signed percentage change of the pool price between two sqrt prices.
/// Decimals cancel out, so the raw ratio is enough.
pub fn price_impact(sqrt_before: U256, sqrt_after: U256) -> f64 {
    if sqrt_before.is_zero() {
        return 0.0;
    }
    let ratio = u256_to_f64(sqrt_after) / u256_to_f64(sqrt_before);
    (ratio * ratio - 1.0) * 100.0
}

/// Convert `amount` of one pool token into the other at `sqrt_price_x96`.
/// `token0_to_token1` selects the direction.
pub fn quote_at_sqrt_price(
    amount: U256,
    sqrt_price_x96: U256,
    token0_to_token1: bool,
) -> Result<U256, MathError> {
    if token0_to_token1 {
        let step = mul_div(amount, sqrt_price_x96, Q96)?;
        mul_div(step, sqrt_price_x96, Q96)
    } else {
        let step = mul_div(amount, Q96, sqrt_price_x96)?;
        mul_div(step, Q96, sqrt_price_x96)
    }
}

// ── Liquidity amounts (LiquidityAmounts.sol) ─────────────────────────────────

fn sorted(a: U256, b: U256) -> (U256, U256) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// token0 held by `liquidity` between two sqrt prices, rounded down
pub fn amount0_for_liquidity(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
) -> Result<U256, MathError> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);
    if lower.is_zero() {
        return Err(MathError::DivisionByZero("amount0_for_liquidity"));
    }
    let numerator = U256::from(liquidity) << 96;
    Ok(mul_div(numerator, upper - lower, upper)? / lower)
}

/// token1 held by `liquidity` between two sqrt prices, rounded down
pub fn amount1_for_liquidity(
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
) -> Result<U256, MathError> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);
    mul_div(U256::from(liquidity), upper - lower, Q96)
}

/// (amount0, amount1) for a position at the current sqrt price
pub fn amounts_for_liquidity(
    sqrt_current: U256,
    sqrt_a: U256,
    sqrt_b: U256,
    liquidity: u128,
) -> Result<(U256, U256), MathError> {
    let (lower, upper) = sorted(sqrt_a, sqrt_b);
    if sqrt_current <= lower {
        Ok((amount0_for_liquidity(lower, upper, liquidity)?, U256::ZERO))
    } else if sqrt_current < upper {
        Ok((
            amount0_for_liquidity(sqrt_current, upper, liquidity)?,
            amount1_for_liquidity(lower, sqrt_current, liquidity)?,
        ))
    } else {
        Ok((U256::ZERO, amount1_for_liquidity(lower, upper, liquidity)?))
    }
}

// ── Swap stepping (SqrtPriceMath.sol) ────────────────────────────────────────

/// Sqrt price after an exact-input swap that stays within the current tick
/// range. The pool fee (in pips) is deducted from the input first.
pub fn next_sqrt_price_from_input(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
    fee: u32,
) -> Result<U256, MathError> {
    if fee >= FEE_DENOMINATOR {
        return Err(MathError::InvalidAmount(format!("fee {} pips", fee)));
    }
    if liquidity == 0 {
        return Err(MathError::DivisionByZero("next_sqrt_price_from_input"));
    }
    let amount_after_fee = mul_div(
        amount_in,
        U256::from(FEE_DENOMINATOR - fee),
        U256::from(FEE_DENOMINATOR),
    )?;

    let next = if zero_for_one {
        get_next_sqrt_price_from_amount0(sqrt_price_x96, liquidity, amount_after_fee)
    } else {
        get_next_sqrt_price_from_amount1(sqrt_price_x96, liquidity, amount_after_fee)
    };
    next.ok_or(MathError::Overflow("next_sqrt_price_from_input"))
}

/// getNextSqrtPriceFromAmount0RoundingUp
///
/// Adding token0 (zeroForOne) lowers the price:
///   result = ceil(L·2^96 · sqrtP / (L·2^96 + amount · sqrtP))
fn get_next_sqrt_price_from_amount0(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
) -> Option<U256> {
    if amount.is_zero() {
        return Some(sqrt_price_x96);
    }
    if sqrt_price_x96.is_zero() {
        return None;
    }
    let numerator1: U256 = U256::from(liquidity) << 96;
    let product = widen(amount) * widen(sqrt_price_x96);
    let denominator = widen(numerator1) + product;
    let result = mul_div_rounding_up(numerator1, sqrt_price_x96, narrow(denominator)?).ok()?;
    (!result.is_zero()).then_some(result)
}

/// getNextSqrtPriceFromAmount1RoundingDown
///
/// Adding token1 (oneForZero) raises the price:
///   result = sqrtP + amount · 2^96 / L
fn get_next_sqrt_price_from_amount1(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount: U256,
) -> Option<U256> {
    if amount.is_zero() {
        return Some(sqrt_price_x96);
    }
    let quotient = mul_div(amount, Q96, U256::from(liquidity)).ok()?;
    sqrt_price_x96.checked_add(quotient)
}

// ── Amount formatting ────────────────────────────────────────────────────────

/// Exact decimal rendering of a raw token amount ("1.5", "0.000001", "42").
pub fn format_units(amount: U256, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Parse a decimal string into a raw token amount. More fractional digits
/// than `decimals` is an error rather than a silent truncation.
pub fn parse_units(text: &str, decimals: u8) -> Result<U256, MathError> {
    let text = text.trim();
    let invalid = || MathError::InvalidAmount(text.to_string());
    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > usize::from(decimals) {
        return Err(invalid());
    }
    let digits = format!(
        "{}{}{}",
        whole,
        fraction,
        "0".repeat(usize::from(decimals) - fraction.len())
    );
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| invalid())
}

/// USD value of a raw amount for display and logging.
pub fn amount_to_usd(amount: U256, decimals: u8, usd_per_token: Decimal) -> Result<Decimal, MathError> {
    let units = Decimal::from_str(&format_units(amount, decimals))
        .map_err(|e| MathError::InvalidAmount(e.to_string()))?;
    units
        .checked_mul(usd_per_token)
        .ok_or(MathError::Overflow("amount_to_usd"))
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_q96_constant() {
        assert_eq!(Q96, U256::from(1u8) << 96);
    }

    #[test]
    fn test_mul_div_handles_wide_products() {
        let a = U256::MAX / U256::from(2u8);
        assert_eq!(mul_div(a, U256::from(4u8), U256::from(8u8)).unwrap(), a / U256::from(2u8));
        assert_eq!(
            mul_div(U256::from(7u8), U256::from(3u8), U256::from(2u8)).unwrap(),
            U256::from(10u8)
        );
        assert_eq!(
            mul_div_rounding_up(U256::from(7u8), U256::from(3u8), U256::from(2u8)).unwrap(),
            U256::from(11u8)
        );
        assert!(mul_div(U256::MAX, U256::MAX, U256::from(1u8)).is_err());
        assert!(mul_div(U256::from(1u8), U256::from(1u8), U256::ZERO).is_err());
    }

    #[test]
    fn test_price_at_tick_zero_with_decimals() {
        assert!((price_at_tick(0, 18, 18).unwrap() - 1.0).abs() < 1e-12);
        // WETH(18) / USDC(6) pool at tick 0 reads as 1e12 USDC per WETH
        assert!((price_at_tick(0, 18, 6).unwrap() - 1e12).abs() / 1e12 < 1e-12);
    }

    #[test]
    fn test_price_tick_round_trip() {
        for tick in [-200_000, -6_932, 0, 1, 60, 46_054, 200_000] {
            let price = price_at_tick(tick, 18, 6).unwrap();
            let back = tick_at_price(price, 18, 6).unwrap();
            assert!((back - tick).abs() <= 1, "tick {} -> {} -> {}", tick, price, back);
        }
    }

    #[test]
    fn test_tick_at_price_rejects_bad_prices() {
        assert!(tick_at_price(0.0, 18, 18).is_err());
        assert!(tick_at_price(-1.0, 18, 18).is_err());
        assert!(tick_at_price(f64::NAN, 18, 18).is_err());
        assert!(tick_at_price(1e300, 18, 18).is_err());
    }

    #[test]
    fn test_price_impact_sign() {
        let before = Q96;
        let up = Q96 + Q96 / U256::from(100u8);
        let down = Q96 - Q96 / U256::from(100u8);
        assert!((price_impact(before, up) - 2.01).abs() < 1e-9);
        assert!(price_impact(before, down) < 0.0);
        assert_eq!(price_impact(before, before), 0.0);
    }

    #[test]
    fn test_u256_to_f64_large_values() {
        let big = U256::from(1u8) << 200;
        assert!((u256_to_f64(big) / 2.0_f64.powi(200) - 1.0).abs() < 1e-12);
        assert_eq!(u256_to_f64(U256::from(12345u64)), 12345.0);
    }

    #[test]
    fn test_quote_at_unit_price() {
        let amount = e18(5);
        assert_eq!(quote_at_sqrt_price(amount, Q96, true).unwrap(), amount);
        assert_eq!(quote_at_sqrt_price(amount, Q96, false).unwrap(), amount);
        // sqrt price 2 → price 4
        let doubled = Q96 * U256::from(2u8);
        assert_eq!(quote_at_sqrt_price(amount, doubled, true).unwrap(), e18(20));
    }

    #[test]
    fn test_amounts_for_liquidity_regions() {
        let lower = sqrt_ratio_at_tick(-60).unwrap();
        let upper = sqrt_ratio_at_tick(60).unwrap();
        let liquidity = 1_000_000_000_000_000_000u128;

        let (a0, a1) = amounts_for_liquidity(Q96, lower, upper, liquidity).unwrap();
        assert!(!a0.is_zero() && !a1.is_zero());
        // symmetric range around price 1 holds roughly equal amounts
        let diff = if a0 > a1 { a0 - a1 } else { a1 - a0 };
        assert!(diff < a0 / U256::from(100u8));

        let (below0, below1) = amounts_for_liquidity(lower, lower, upper, liquidity).unwrap();
        assert!(!below0.is_zero() && below1.is_zero());
        let (above0, above1) = amounts_for_liquidity(upper, lower, upper, liquidity).unwrap();
        assert!(above0.is_zero() && !above1.is_zero());
    }

    #[test]
    fn test_next_sqrt_price_direction() {
        let sqrt_price = Q96 * U256::from(100u64);
        let liquidity: u128 = 1_000_000_000_000_000_000;
        let amount = U256::from(1_000_000u64);

        let down = next_sqrt_price_from_input(sqrt_price, liquidity, amount, true, 3000).unwrap();
        assert!(down < sqrt_price && !down.is_zero());
        let up = next_sqrt_price_from_input(sqrt_price, liquidity, amount, false, 3000).unwrap();
        assert!(up > sqrt_price);
    }

    #[test]
    fn test_next_sqrt_price_zero_amount_and_bad_inputs() {
        let sqrt_price = Q96 * U256::from(50u64);
        let liquidity: u128 = 1_000_000_000_000_000_000;
        assert_eq!(
            next_sqrt_price_from_input(sqrt_price, liquidity, U256::ZERO, true, 500).unwrap(),
            sqrt_price
        );
        assert!(next_sqrt_price_from_input(sqrt_price, 0, U256::from(1u8), true, 500).is_err());
        assert!(next_sqrt_price_from_input(sqrt_price, liquidity, U256::from(1u8), true, 1_000_000).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(e18(1) + e18(1) / U256::from(2u8), 18), "1.5");
        assert_eq!(format_units(U256::from(1u8), 6), "0.000001");
        assert_eq!(format_units(U256::from(42_000_000u64), 6), "42");
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(U256::from(7u8), 0), "7");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 18).unwrap(), e18(1) + e18(1) / U256::from(2u8));
        assert_eq!(parse_units("0.01", 18).unwrap(), U256::from(10_000_000_000_000_000u64));
        assert_eq!(parse_units("42", 6).unwrap(), U256::from(42_000_000u64));
        assert_eq!(parse_units("0", 18).unwrap(), U256::ZERO);
        assert!(parse_units("0.0000001", 6).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("", 18).is_err());
    }

    #[test]
    fn test_amount_to_usd() {
        let usd = amount_to_usd(e18(2), 18, dec!(2500.50)).unwrap();
        assert_eq!(usd, dec!(5001.00));
    }
}
