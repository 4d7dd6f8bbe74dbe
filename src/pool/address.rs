//! Pool Address Derivation (CREATE2)
//!
//! Computes a V3 pool address from (tokenA, tokenB, fee) without an RPC
//! round trip, so the per-pool key is known the moment a pending swap is
//! decoded.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::primitives::{b256, keccak256, Address, B256};
use serde::Serialize;

/// Uniswap V3 pool init code hash (mainnet factory deployment)
pub const UNISWAP_V3_POOL_INIT_CODE_HASH: B256 =
    b256!("e34f199b19b2b4f47f68442619d555527d244f78a3297ea89325f843f87b8b54");

/// Sorted token pair plus fee tier, and the pool address it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PoolKey {
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub address: Address,
}

impl PoolKey {
    /// Sort the pair and derive the pool address.
    pub fn derive(
        factory: Address,
        init_code_hash: B256,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Self {
        let (token0, token1) = sort_tokens(token_a, token_b);
        Self {
            token0,
            token1,
            fee,
            address: compute_pool_address(factory, init_code_hash, token0, token1, fee),
        }
    }
}

pub fn sort_tokens(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// keccak256(0xff ++ factory ++ keccak256(abi.encode(token0, token1, fee)) ++ initCodeHash)
pub fn compute_pool_address(
    factory: Address,
    init_code_hash: B256,
    token0: Address,
    token1: Address,
    fee: u32,
) -> Address {
    // abi.encode of three static words
    let mut encoded = [0u8; 96];
    encoded[12..32].copy_from_slice(token0.as_slice());
    encoded[44..64].copy_from_slice(token1.as_slice());
    encoded[92..96].copy_from_slice(&fee.to_be_bytes());
    let salt = keccak256(encoded);
    factory.create2(salt, init_code_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

    #[test]
    fn test_known_mainnet_pools() {
        // USDC/WETH 0.05% and 0.30%
        let p500 = PoolKey::derive(FACTORY, UNISWAP_V3_POOL_INIT_CODE_HASH, WETH, USDC, 500);
        assert_eq!(p500.address, address!("88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640"));
        let p3000 = PoolKey::derive(FACTORY, UNISWAP_V3_POOL_INIT_CODE_HASH, USDC, WETH, 3000);
        assert_eq!(p3000.address, address!("8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8"));
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = PoolKey::derive(FACTORY, UNISWAP_V3_POOL_INIT_CODE_HASH, WETH, USDC, 3000);
        let b = PoolKey::derive(FACTORY, UNISWAP_V3_POOL_INIT_CODE_HASH, USDC, WETH, 3000);
        assert_eq!(a, b);
        assert_eq!(a.token0, USDC);
        assert_eq!(a.token1, WETH);
    }
}
