//! Tick Math (bit-exact Uniswap V3 TickMath)
//!
//! Purpose:
//!     Convert between tick index and Q64.96 sqrt price with the same
//!     fixed-point algorithm the pool contracts use, so ranges sized
//!     off-chain land on exactly the boundaries the pool will see.
//!
//! Author: AI-Generated
//! Created: 2026-02-03
//!
//! Notes:
//!     - sqrt_ratio_at_tick: magic-constant product chain, zero tolerance
//!     - tick_at_sqrt_ratio: log2 approximation + one exact correction step
//!     - All arithmetic in U256; the signed log term is kept as sign + magnitude
//!
//! References:
//!     - Uniswap V3 TickMath.sol: getSqrtRatioAtTick, getTickAtSqrtRatio

use alloy::primitives::U256;
use thiserror::Error;

// ── Constants ────────────────────────────────────────────────────────────────

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// sqrt_ratio_at_tick(MIN_TICK)
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);

/// sqrt_ratio_at_tick(MAX_TICK) = 1461446703485210103287273052203988822378723970342
pub const MAX_SQRT_RATIO: U256 =
    U256::from_limbs([0x5D951D5263988D26, 0xEFD1FC6A50648849, 0xFFFD8963, 0]);

/// Q128 ratio multipliers for bits 0x2 .. 0x80000 of |tick|
const RATIO_STEPS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// Ratio for bit 0x1 of |tick|
const RATIO_BIT0: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

/// log_sqrt10001 scale factor (2^64 / log2(sqrt(1.0001)) in Q64 form)
const LOG_SQRT10001: u128 = 255738958999603826347141;
const TICK_LOW_OFFSET: u128 = 3402992956809132418596140100660247210;
const TICK_HI_OFFSET: u128 = 291339464771989622907027621153398088495;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MathError {
    #[error("tick {0} outside [-887272, 887272]")]
    TickOutOfRange(i32),
    #[error("sqrt price {0} outside [MIN_SQRT_RATIO, MAX_SQRT_RATIO)")]
    SqrtPriceOutOfRange(U256),
    #[error("tick spacing must be positive, got {0}")]
    InvalidTickSpacing(i32),
    #[error("price {0} cannot be mapped to a tick")]
    InvalidPrice(f64),
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

// ── Tick → sqrt price ────────────────────────────────────────────────────────

/// Q64.96 sqrt price at `tick`. Fails outside [MIN_TICK, MAX_TICK].
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfRange(tick));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(RATIO_BIT0)
    } else {
        U256::from(1u8) << 128
    };
    for (bit, multiplier) in RATIO_STEPS {
        if abs_tick & bit != 0 {
            // ratio <= 2^128 and multiplier < 2^128, product fits
            ratio = (ratio * U256::from(multiplier)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 → Q64.96, rounding up so the result never undershoots
    let round_up = if (ratio & U256::from(u32::MAX)).is_zero() {
        U256::ZERO
    } else {
        U256::from(1u8)
    };
    Ok((ratio >> 32) + round_up)
}

// ── sqrt price → tick ────────────────────────────────────────────────────────

/// Greatest tick whose sqrt ratio is <= `sqrt_price_x96`.
/// Domain is [MIN_SQRT_RATIO, MAX_SQRT_RATIO).
pub fn tick_at_sqrt_ratio(sqrt_price_x96: U256) -> Result<i32, MathError> {
    if sqrt_price_x96 < MIN_SQRT_RATIO || sqrt_price_x96 >= MAX_SQRT_RATIO {
        return Err(MathError::SqrtPriceOutOfRange(sqrt_price_x96));
    }

    let ratio: U256 = sqrt_price_x96 << 32;
    let msb = ratio.bit_len() - 1;

    let mut r = if msb >= 128 {
        ratio >> (msb - 127)
    } else {
        ratio << (127 - msb)
    };

    // Q64 fixed-point log2, integer part first
    let mut log_2: i128 = (msb as i128 - 128) << 64;
    for shift in (50..=63).rev() {
        r = (r * r) >> 127;
        let f: U256 = r >> 128;
        if !f.is_zero() {
            log_2 |= 1i128 << shift;
            r >>= 1;
        }
    }

    let negative = log_2 < 0;
    let magnitude = U256::from(log_2.unsigned_abs()) * U256::from(LOG_SQRT10001);

    let tick_low = floor_shr128(signed_add(
        negative,
        magnitude,
        true,
        U256::from(TICK_LOW_OFFSET),
    ));
    let tick_hi = floor_shr128(signed_add(
        negative,
        magnitude,
        false,
        U256::from(TICK_HI_OFFSET),
    ));

    if tick_low == tick_hi {
        return Ok(tick_low);
    }
    if sqrt_ratio_at_tick(tick_hi)? <= sqrt_price_x96 {
        Ok(tick_hi)
    } else {
        Ok(tick_low)
    }
}

/// (sign, magnitude) + (sign, magnitude)
fn signed_add(a_neg: bool, a: U256, b_neg: bool, b: U256) -> (bool, U256) {
    if a_neg == b_neg {
        return (a_neg, a + b);
    }
    if a >= b {
        (a_neg && a != b, a - b)
    } else {
        (b_neg, b - a)
    }
}

/// floor(value / 2^128) for a sign-magnitude value known to fit in i32
fn floor_shr128((negative, magnitude): (bool, U256)) -> i32 {
    let whole = (magnitude >> 128usize).as_limbs()[0] as i64;
    if !negative {
        return whole as i32;
    }
    let has_fraction = !(magnitude & U256::from(u128::MAX)).is_zero();
    (-(whole + i64::from(has_fraction))) as i32
}

// ── Tick spacing helpers ─────────────────────────────────────────────────────

/// Nearest multiple of `spacing`, exact half ties away from zero, clamped
/// to [MIN_TICK, MAX_TICK].
pub fn nearest_usable_tick(tick: i32, spacing: i32) -> Result<i32, MathError> {
    if spacing <= 0 {
        return Err(MathError::InvalidTickSpacing(spacing));
    }
    let magnitude = i64::from(tick).abs();
    let s = i64::from(spacing);
    let remainder = magnitude % s;
    let mut rounded = magnitude - remainder;
    if remainder * 2 >= s {
        rounded += s;
    }
    let signed = if tick < 0 { -rounded } else { rounded };
    Ok(signed.clamp(i64::from(MIN_TICK), i64::from(MAX_TICK)) as i32)
}

/// Smallest and largest spacing-aligned ticks inside the tick domain.
pub fn usable_tick_bounds(spacing: i32) -> Result<(i32, i32), MathError> {
    if spacing <= 0 {
        return Err(MathError::InvalidTickSpacing(spacing));
    }
    Ok(((MIN_TICK / spacing) * spacing, (MAX_TICK / spacing) * spacing))
}

/// Round down to the spacing grid (toward negative infinity).
pub fn floor_to_spacing(tick: i32, spacing: i32) -> Result<i32, MathError> {
    if spacing <= 0 {
        return Err(MathError::InvalidTickSpacing(spacing));
    }
    Ok(tick.div_euclid(spacing) * spacing)
}

/// Round up to the spacing grid (toward positive infinity).
pub fn ceil_to_spacing(tick: i32, spacing: i32) -> Result<i32, MathError> {
    let floor = floor_to_spacing(tick, spacing)?;
    Ok(if floor == tick { floor } else { floor + spacing })
}

/// Tick spacing for the standard V3 fee tiers.
pub fn tick_spacing_for_fee(fee: u32) -> Option<i32> {
    match fee {
        100 => Some(1),
        500 => Some(10),
        3000 => Some(60),
        10000 => Some(200),
        _ => None,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
