//! Mempool Ingestor - Calldata Decoder
//!
//! Purpose:
//!     Decode Uniswap V3 router calldata from pending transaction input bytes
//!     into a `SwapIntent`.
//!
//! Author: AI-Generated
//! Created: 2026-02-01
//! Modified: 2026-02-04 - alloy sol! call types, SwapRouter02, exact-output flag
//!
//! Dependencies:
//!     - alloy (SolCall selectors + abi decoding of the router interfaces)
//!
//! Supported Function Selectors:
//!     SwapRouter:
//!       0x414bf389 - exactInputSingle(ExactInputSingleParams)
//!       0xc04b8d59 - exactInput(ExactInputParams)
//!       0xdb3e2198 - exactOutputSingle(ExactOutputSingleParams)
//!       0xf28c0498 - exactOutput(ExactOutputParams)
//!       0x5ae401dc - multicall(uint256,bytes[])
//!       0xac9650d8 - multicall(bytes[])
//!     SwapRouter02:
//!       0x04e45aaf - exactInputSingle (no deadline)
//!
//! Notes:
//!     - Multi-hop paths resolve to their FIRST hop for exact input (the pool
//!       that receives the full input) and their LAST hop for exact output.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use tracing::trace;

use super::types::SwapIntent;
use crate::contracts::{ISwapRouter, IV3SwapRouter};

/// token(20) | fee(3) | token(20)
const PATH_HOP_LEN: usize = 43;
const PATH_ADDR_LEN: usize = 20;
const PATH_FEE_LEN: usize = 3;

/// Decode swap calldata from transaction input bytes.
/// Returns None if the selector is unknown or decoding fails.
pub fn decode_calldata(input: &[u8]) -> Option<SwapIntent> {
    if input.len() < 4 {
        return None;
    }

    let selector: [u8; 4] = input[..4].try_into().ok()?;
    let data = &input[4..];

    let intent = match selector {
        ISwapRouter::exactInputSingleCall::SELECTOR => decode_exact_input_single(data),
        IV3SwapRouter::exactInputSingleCall::SELECTOR => decode_router02_exact_input_single(data),
        ISwapRouter::exactInputCall::SELECTOR => decode_exact_input(data),
        ISwapRouter::exactOutputSingleCall::SELECTOR => decode_exact_output_single(data),
        ISwapRouter::exactOutputCall::SELECTOR => decode_exact_output(data),
        ISwapRouter::multicall_0Call::SELECTOR => {
            let call = ISwapRouter::multicall_0Call::abi_decode_raw(data).ok()?;
            decode_multicall(&call.data)
        }
        ISwapRouter::multicall_1Call::SELECTOR => {
            let call = ISwapRouter::multicall_1Call::abi_decode_raw(data).ok()?;
            decode_multicall(&call.data)
        }
        _ => None,
    };

    if intent.is_none() {
        trace!(selector = %selector_hex(&input[..4]), "Calldata not decoded");
    }
    intent
}

/// "0x414bf389" for the first four bytes
pub fn selector_hex(input: &[u8]) -> String {
    let n = input.len().min(4);
    format!("0x{}", alloy::hex::encode(&input[..n]))
}

// ── Single-pool calls ───────────────────────────────────────────────

fn decode_exact_input_single(data: &[u8]) -> Option<SwapIntent> {
    let p = ISwapRouter::exactInputSingleCall::abi_decode_raw(data).ok()?.params;
    Some(SwapIntent {
        function_name: "exactInputSingle".to_string(),
        token_in: p.tokenIn,
        token_out: p.tokenOut,
        fee: p.fee.to::<u32>(),
        amount_in: p.amountIn,
        amount_out_min: p.amountOutMinimum,
        exact_input: true,
    })
}

fn decode_router02_exact_input_single(data: &[u8]) -> Option<SwapIntent> {
    let p = IV3SwapRouter::exactInputSingleCall::abi_decode_raw(data).ok()?.params;
    Some(SwapIntent {
        function_name: "exactInputSingle02".to_string(),
        token_in: p.tokenIn,
        token_out: p.tokenOut,
        fee: p.fee.to::<u32>(),
        amount_in: p.amountIn,
        amount_out_min: p.amountOutMinimum,
        exact_input: true,
    })
}

/// For exact output the caller fixes `amountOut`; `amount_in` carries the
/// maximum they are willing to spend.
fn decode_exact_output_single(data: &[u8]) -> Option<SwapIntent> {
    let p = ISwapRouter::exactOutputSingleCall::abi_decode_raw(data).ok()?.params;
    Some(SwapIntent {
        function_name: "exactOutputSingle".to_string(),
        token_in: p.tokenIn,
        token_out: p.tokenOut,
        fee: p.fee.to::<u32>(),
        amount_in: p.amountInMaximum,
        amount_out_min: p.amountOut,
        exact_input: false,
    })
}

// ── Path calls ──────────────────────────────────────────────────────

fn decode_exact_input(data: &[u8]) -> Option<SwapIntent> {
    let p = ISwapRouter::exactInputCall::abi_decode_raw(data).ok()?.params;
    let (token_in, fee, token_out) = first_hop(&p.path)?;
    Some(SwapIntent {
        function_name: "exactInput".to_string(),
        token_in,
        token_out,
        fee,
        amount_in: p.amountIn,
        amount_out_min: p.amountOutMinimum,
        exact_input: true,
    })
}

/// Exact-output paths are reversed: tokenOut | fee | ... | tokenIn
fn decode_exact_output(data: &[u8]) -> Option<SwapIntent> {
    let p = ISwapRouter::exactOutputCall::abi_decode_raw(data).ok()?.params;
    let (token_out, fee, token_in) = first_hop(&p.path)?;
    Some(SwapIntent {
        function_name: "exactOutput".to_string(),
        token_in,
        token_out,
        fee,
        amount_in: p.amountInMaximum,
        amount_out_min: p.amountOut,
        exact_input: false,
    })
}

/// Decode the first hop of a packed V3 path.
fn first_hop(path: &[u8]) -> Option<(Address, u32, Address)> {
    if path.len() < PATH_HOP_LEN || (path.len() - PATH_ADDR_LEN) % (PATH_ADDR_LEN + PATH_FEE_LEN) != 0 {
        return None;
    }
    let first = Address::from_slice(&path[..PATH_ADDR_LEN]);
    let fee_bytes = &path[PATH_ADDR_LEN..PATH_ADDR_LEN + PATH_FEE_LEN];
    let fee = (u32::from(fee_bytes[0]) << 16) | (u32::from(fee_bytes[1]) << 8) | u32::from(fee_bytes[2]);
    let second = Address::from_slice(&path[PATH_ADDR_LEN + PATH_FEE_LEN..PATH_HOP_LEN]);
    Some((first, fee, second))
}

// ── Multicall ───────────────────────────────────────────────────────

/// First decodable inner swap wins. Inner multicalls are not unwrapped again.
fn decode_multicall(calls: &[alloy::primitives::Bytes]) -> Option<SwapIntent> {
    calls.iter().find_map(|call| {
        let selector: [u8; 4] = call.get(..4)?.try_into().ok()?;
        if selector == ISwapRouter::multicall_0Call::SELECTOR
            || selector == ISwapRouter::multicall_1Call::SELECTOR
        {
            return None;
        }
        let mut intent = decode_calldata(call)?;
        intent.function_name = format!("multicall>{}", intent.function_name);
        Some(intent)
    })
}
