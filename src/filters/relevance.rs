//! Candidate Relevance Filter
//!
//! Cheap, network-free gate between the mempool stream and the
//! orchestrator. A pending transaction is a candidate only if it calls a
//! watched router with a decodable exact-input swap that touches one of the
//! target tokens. The pool it will hit is derived locally via CREATE2.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use alloy::primitives::{Address, B256, U256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::info;

use crate::mempool::types::{PendingTransaction, SwapIntent};
use crate::pool::address::PoolKey;

/// Capital the bot may borrow for one token, and the smallest swap worth
/// reacting to when that token is the swap input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetToken {
    pub borrow_amount: U256,
    pub min_swap_amount: U256,
}

/// A pending swap worth a decision cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub tx: PendingTransaction,
    pub intent: SwapIntent,
    pub pool: PoolKey,
    /// Swap moves token0 → token1 (price goes down)
    pub zero_for_one: bool,
    pub borrow_token: Address,
    pub borrow_amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    UnwatchedTarget,
    Undecoded,
    ExactOutput,
    NoTargetToken,
    ZeroAmount,
    BelowMinSwap,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::UnwatchedTarget => "unwatched_target",
            Rejection::Undecoded => "undecoded",
            Rejection::ExactOutput => "exact_output",
            Rejection::NoTargetToken => "no_target_token",
            Rejection::ZeroAmount => "zero_amount",
            Rejection::BelowMinSwap => "below_min_swap",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    routers: HashSet<Address>,
    targets: HashMap<Address, TargetToken>,
    factory: Address,
    init_code_hash: B256,
}

impl RelevanceFilter {
    pub fn new(
        routers: impl IntoIterator<Item = Address>,
        targets: HashMap<Address, TargetToken>,
        factory: Address,
        init_code_hash: B256,
    ) -> Self {
        let routers: HashSet<Address> = routers.into_iter().collect();
        info!(
            routers = routers.len(),
            targets = targets.len(),
            %factory,
            "Relevance filter loaded"
        );
        Self {
            routers,
            targets,
            factory,
            init_code_hash,
        }
    }

    pub fn evaluate(&self, tx: &PendingTransaction) -> Result<Candidate, Rejection> {
        match tx.target {
            Some(to) if self.routers.contains(&to) => {}
            _ => return Err(Rejection::UnwatchedTarget),
        }
        let intent = tx.intent.as_ref().ok_or(Rejection::Undecoded)?;
        if !intent.exact_input {
            return Err(Rejection::ExactOutput);
        }
        if intent.amount_in.is_zero() {
            return Err(Rejection::ZeroAmount);
        }

        // input-side target first: its minimum swap size is in the swap's own units
        let (borrow_token, target) = match self.targets.get(&intent.token_in) {
            Some(target) => {
                if intent.amount_in < target.min_swap_amount {
                    return Err(Rejection::BelowMinSwap);
                }
                (intent.token_in, *target)
            }
            None => match self.targets.get(&intent.token_out) {
                Some(target) => (intent.token_out, *target),
                None => return Err(Rejection::NoTargetToken),
            },
        };

        let pool = PoolKey::derive(
            self.factory,
            self.init_code_hash,
            intent.token_in,
            intent.token_out,
            intent.fee,
        );
        Ok(Candidate {
            tx: tx.clone(),
            intent: intent.clone(),
            zero_for_one: intent.token_in == pool.token0,
            pool,
            borrow_token,
            borrow_amount: target.borrow_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::address::UNISWAP_V3_POOL_INIT_CODE_HASH;
    use alloy::primitives::{address, TxHash};
    use chrono::Utc;

    const ROUTER: Address = address!("E592427A0AEce92De3Edee1F18E0157C05861564");
    const FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");

    fn filter() -> RelevanceFilter {
        let mut targets = HashMap::new();
        targets.insert(
            WETH,
            TargetToken {
                borrow_amount: U256::from(50u64) * U256::from(10u64).pow(U256::from(18u64)),
                min_swap_amount: U256::from(1_000u64),
            },
        );
        RelevanceFilter::new([ROUTER], targets, FACTORY, UNISWAP_V3_POOL_INIT_CODE_HASH)
    }

    fn swap(token_in: Address, token_out: Address, amount_in: u64, exact_input: bool) -> PendingTransaction {
        PendingTransaction {
            hash: TxHash::repeat_byte(1),
            sender: Address::repeat_byte(2),
            target: Some(ROUTER),
            value: U256::ZERO,
            gas_limit: 300_000,
            gas_price: None,
            max_fee_per_gas: 40_000_000_000,
            max_priority_fee_per_gas: Some(2_000_000_000),
            intent: Some(SwapIntent {
                function_name: "exactInputSingle".into(),
                token_in,
                token_out,
                fee: 500,
                amount_in: U256::from(amount_in),
                amount_out_min: U256::ZERO,
                exact_input,
            }),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_weth_usdc_swap_is_candidate() {
        let candidate = filter().evaluate(&swap(WETH, USDC, 5_000, true)).unwrap();
        assert_eq!(
            candidate.pool.address,
            address!("88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640")
        );
        // USDC < WETH, so WETH is token1 and the swap is one-for-zero
        assert!(!candidate.zero_for_one);
        assert_eq!(candidate.borrow_token, WETH);
    }

    #[test]
    fn test_output_side_target() {
        let candidate = filter().evaluate(&swap(USDC, WETH, 1, true)).unwrap();
        assert!(candidate.zero_for_one);
        assert_eq!(candidate.borrow_token, WETH);
    }

    #[test]
    fn test_rejections() {
        let f = filter();
        let mut tx = swap(WETH, USDC, 5_000, true);
        tx.target = Some(Address::repeat_byte(9));
        assert_eq!(f.evaluate(&tx), Err(Rejection::UnwatchedTarget));

        let mut tx = swap(WETH, USDC, 5_000, true);
        tx.intent = None;
        assert_eq!(f.evaluate(&tx), Err(Rejection::Undecoded));

        assert_eq!(f.evaluate(&swap(WETH, USDC, 5_000, false)), Err(Rejection::ExactOutput));
        assert_eq!(f.evaluate(&swap(DAI, USDC, 5_000, true)), Err(Rejection::NoTargetToken));
        assert_eq!(f.evaluate(&swap(WETH, USDC, 0, true)), Err(Rejection::ZeroAmount));
        assert_eq!(f.evaluate(&swap(WETH, USDC, 999, true)), Err(Rejection::BelowMinSwap));
        assert_eq!(Rejection::BelowMinSwap.to_string(), "below_min_swap");
    }
}
