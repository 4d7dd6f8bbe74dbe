//! Flashloan Submission
//!
//! Purpose:
//!     Encode the JIT bundle as one vault flashloan call (borrow, hedge,
//!     mint, let the target swap through, burn, repay happen inside the
//!     receiver contract), simulate it, sign it and hand it to the private
//!     relay or the public node.
//!
//! Author: AI-Generated
//! Created: 2026-02-05
//!
//! Notes:
//!     - Never retried: a failed submission is a terminal decision
//!     - Simulation failure aborts before anything is signed

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::{TransactionBuilder, TxSignerSync};
use alloy::primitives::aliases::I24;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::relay::RelayClient;
use super::sizing::PositionPlan;
use crate::contracts::{IFlashLoanVault, JitParams};
use crate::rpc::EndpointPool;
use crate::types::GasEstimate;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("simulation reverted: {0}")]
    Simulation(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("relay rejected: {0}")]
    Relay(String),
    #[error("encoding: {0}")]
    Encoding(String),
}

/// Everything needed to build the flashloan transaction
#[derive(Debug, Clone, PartialEq)]
pub struct FlashloanRequest {
    /// Pending swap this position is built around
    pub target_tx: TxHash,
    pub plan: PositionPlan,
    pub hedge_min_out: U256,
    /// Unix seconds after which the receiver refuses to mint
    pub deadline: u64,
    pub gas: GasEstimate,
    pub gas_limit: u64,
}

#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, request: &FlashloanRequest) -> Result<TxHash, SubmitError>;
}

/// Calldata for `vault.flashLoan(receiver, [token], [amount], abi.encode(JitParams))`
pub fn encode_flash_loan(receiver: Address, request: &FlashloanRequest) -> Result<Bytes, SubmitError> {
    let plan = &request.plan;
    let tick_lower = I24::try_from(plan.range.lower)
        .map_err(|_| SubmitError::Encoding(format!("tick {} out of int24", plan.range.lower)))?;
    let tick_upper = I24::try_from(plan.range.upper)
        .map_err(|_| SubmitError::Encoding(format!("tick {} out of int24", plan.range.upper)))?;
    let params = JitParams {
        pool: plan.pool,
        tickLower: tick_lower,
        tickUpper: tick_upper,
        liquidity: plan.liquidity,
        amount0: plan.amount0,
        amount1: plan.amount1,
        hedgeMinOut: request.hedge_min_out,
        deadline: U256::from(request.deadline),
    };
    let call = IFlashLoanVault::flashLoanCall {
        recipient: receiver,
        tokens: vec![plan.borrow_token],
        amounts: vec![plan.borrow_amount],
        userData: Bytes::from(params.abi_encode()),
    };
    Ok(Bytes::from(call.abi_encode()))
}

pub struct FlashloanSubmitter {
    endpoints: Arc<EndpointPool>,
    signer: PrivateKeySigner,
    chain_id: u64,
    vault: Address,
    receiver: Address,
    relay: Option<RelayClient>,
}

impl FlashloanSubmitter {
    pub fn new(
        endpoints: Arc<EndpointPool>,
        signer: PrivateKeySigner,
        chain_id: u64,
        vault: Address,
        receiver: Address,
        relay: Option<RelayClient>,
    ) -> Self {
        Self {
            endpoints,
            signer,
            chain_id,
            vault,
            receiver,
            relay,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    async fn simulate(&self, calldata: &Bytes) -> Result<(), SubmitError> {
        let request = TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(self.vault)
            .with_input(calldata.clone());
        self.endpoints
            .execute("simulate_flashloan", |p| async move { p.call(request).await })
            .await
            .map_err(|e| SubmitError::Simulation(e.to_string()))?;
        Ok(())
    }

    async fn next_nonce(&self) -> Result<u64, SubmitError> {
        let address = self.signer.address();
        self.endpoints
            .execute("nonce", |p| async move { p.get_transaction_count(address).pending().await })
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))
    }

    fn sign(&self, request: &FlashloanRequest, nonce: u64, input: Bytes) -> Result<(Bytes, TxHash), SubmitError> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: request.gas.max_priority_fee_per_gas,
            max_fee_per_gas: request.gas.max_fee_per_gas,
            gas_limit: request.gas_limit,
            to: TxKind::Call(self.vault),
            value: U256::ZERO,
            access_list: AccessList::default(),
            input,
        };
        let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
            .map_err(|e| SubmitError::Signing(e.to_string()))?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        let hash = *signed.tx_hash();
        Ok((Bytes::from(signed.encoded_2718()), hash))
    }
}

/// The receiving side must report the hash we signed.
fn confirm_hash(local: TxHash, reported: TxHash) -> Result<(), SubmitError> {
    if local != reported {
        warn!(%local, %reported, "Submitted tx hash mismatch");
        return Err(SubmitError::Transport(format!(
            "node reported hash {} for locally signed {}",
            reported, local
        )));
    }
    Ok(())
}

#[async_trait]
impl Submitter for FlashloanSubmitter {
    async fn submit(&self, request: &FlashloanRequest) -> Result<TxHash, SubmitError> {
        let calldata = encode_flash_loan(self.receiver, request)?;
        self.simulate(&calldata).await?;
        debug!(target_tx = %request.target_tx, "Flashloan simulation passed");

        let nonce = self.next_nonce().await?;
        let (raw, hash) = self.sign(request, nonce, calldata)?;

        match &self.relay {
            Some(relay) => {
                let relay_hash = relay.send_private_transaction(&raw).await?;
                confirm_hash(hash, relay_hash)?;
                info!(tx = %hash, relay = %relay.url(), nonce, "Submitted via private relay");
            }
            None => {
                let raw_for_send = raw.clone();
                let node_hash = self
                    .endpoints
                    .execute("send_raw_transaction", |p| async move {
                        p.send_raw_transaction(raw_for_send.as_ref())
                            .await
                            .map(|pending| *pending.tx_hash())
                    })
                    .await
                    .map_err(|e| SubmitError::Transport(e.to_string()))?;
                confirm_hash(hash, node_hash)?;
                info!(tx = %hash, nonce, "Submitted to public node");
            }
        }
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TickRange;

    fn request() -> FlashloanRequest {
        FlashloanRequest {
            target_tx: TxHash::repeat_byte(7),
            plan: PositionPlan {
                pool: Address::repeat_byte(0xaa),
                range: TickRange { lower: -180, upper: 60 },
                liquidity: 8_300_000_000_000_000_000_000,
                amount0: U256::from(25u64),
                amount1: U256::from(24u64),
                borrow_token: Address::repeat_byte(0x22),
                borrow_amount: U256::from(50u64),
                hedge_amount_in: U256::from(25u64),
                hedge_token_out: Address::repeat_byte(0x11),
                post_swap_sqrt_price: U256::from(1u64),
                price_impact_pct: 0.01,
            },
            hedge_min_out: U256::from(24u64),
            deadline: 1_800_000_000,
            gas: GasEstimate {
                base_fee: 25_000_000_000,
                max_priority_fee_per_gas: 1_000_000_000,
                max_fee_per_gas: 51_000_000_000,
            },
            gas_limit: 400_000,
        }
    }

    #[test]
    fn test_flash_loan_calldata_round_trips() {
        let receiver = Address::repeat_byte(0xee);
        let req = request();
        let calldata = encode_flash_loan(receiver, &req).unwrap();
        assert_eq!(&calldata[..4], IFlashLoanVault::flashLoanCall::SELECTOR.as_slice());

        let call = IFlashLoanVault::flashLoanCall::abi_decode(&calldata).unwrap();
        assert_eq!(call.recipient, receiver);
        assert_eq!(call.tokens, vec![req.plan.borrow_token]);
        assert_eq!(call.amounts, vec![req.plan.borrow_amount]);

        let params = <JitParams as SolValue>::abi_decode(&call.userData).unwrap();
        assert_eq!(params.pool, req.plan.pool);
        assert_eq!(params.tickLower, I24::try_from(-180).unwrap());
        assert_eq!(params.tickUpper, I24::try_from(60).unwrap());
        assert_eq!(params.liquidity, req.plan.liquidity);
        assert_eq!(params.hedgeMinOut, req.hedge_min_out);
        assert_eq!(params.deadline, U256::from(1_800_000_000u64));
    }

    #[test]
    fn test_signed_transaction_uses_estimate() {
        let endpoints =
            Arc::new(EndpointPool::new(&crate::rpc::EndpointConfig::parse_list("https://node.example").unwrap()).unwrap());
        let submitter = FlashloanSubmitter::new(
            endpoints,
            PrivateKeySigner::random(),
            1,
            Address::repeat_byte(0xba),
            Address::repeat_byte(0xee),
            None,
        );
        let req = request();
        let calldata = encode_flash_loan(Address::repeat_byte(0xee), &req).unwrap();
        let (raw, hash) = submitter.sign(&req, 3, calldata).unwrap();
        // EIP-1559 envelope type byte
        assert_eq!(raw[0], 0x02);
        assert_eq!(hash, alloy::primitives::keccak256(&raw));
    }

    #[test]
    fn test_reported_hash_must_match_signed() {
        let local = TxHash::repeat_byte(0x10);
        assert!(confirm_hash(local, local).is_ok());
        let err = confirm_hash(local, TxHash::repeat_byte(0x11)).unwrap_err();
        assert!(matches!(err, SubmitError::Transport(m) if m.contains("reported hash")));
    }
}
