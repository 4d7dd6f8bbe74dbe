//! Mempool Ingestor - Type Definitions
//!
//! Purpose:
//!     Pending transaction candidates, decoded swap intents, and the
//!     ingestor's health surface (mode + lock-free handle + status report).
//!
//! Author: AI-Generated
//! Created: 2026-02-01
//! Modified: 2026-02-04 - PendingTransaction from alloy rpc types, health handle
//!
//! Dependencies:
//!     - alloy (Address, TxHash, U256, rpc Transaction)
//!     - chrono (observed timestamps)

use alloy::consensus::Transaction as ConsensusTx;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, TxHash, U256};
use alloy::rpc::types::Transaction;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::decoder::decode_calldata;

/// Decoded router call. For exact-output calls `amount_in` holds the
/// maximum input and `amount_out_min` the exact output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapIntent {
    /// e.g. "exactInputSingle", "multicall>exactInput"
    pub function_name: String,
    pub token_in: Address,
    pub token_out: Address,
    /// V3 fee tier in pips (3000 = 0.30%)
    pub fee: u32,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub exact_input: bool,
}

/// One pending transaction observed in the mempool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub sender: Address,
    /// None for contract creation
    pub target: Option<Address>,
    pub value: U256,
    pub gas_limit: u64,
    /// Legacy gas price, or effective price where the node reports one
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: Option<u128>,
    pub intent: Option<SwapIntent>,
    pub observed_at: DateTime<Utc>,
}

impl PendingTransaction {
    /// Build a candidate from an rpc transaction, decoding router calldata.
    pub fn from_rpc(tx: &Transaction, observed_at: DateTime<Utc>) -> Self {
        Self {
            hash: TransactionResponse::tx_hash(tx),
            sender: TransactionResponse::from(tx),
            target: ConsensusTx::to(tx),
            value: ConsensusTx::value(tx),
            gas_limit: ConsensusTx::gas_limit(tx),
            gas_price: ConsensusTx::gas_price(tx),
            max_fee_per_gas: ConsensusTx::max_fee_per_gas(tx),
            max_priority_fee_per_gas: ConsensusTx::max_priority_fee_per_gas(tx),
            intent: decode_calldata(ConsensusTx::input(tx)),
            observed_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.observed_at)
    }
}

/// Active ingestion transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MempoolMode {
    /// No viable transport; the ingestor idles and retries slowly
    Disabled,
    /// Push subscription (WebSocket)
    Subscription,
    /// Pending-transaction filter polling (HTTP)
    Polling,
}

impl MempoolMode {
    /// Health code: 0 = disabled, 1 = push, 2 = poll
    pub fn code(&self) -> u8 {
        match self {
            MempoolMode::Disabled => 0,
            MempoolMode::Subscription => 1,
            MempoolMode::Polling => 2,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => MempoolMode::Subscription,
            2 => MempoolMode::Polling,
            _ => MempoolMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MempoolHealth {
    pub enabled: bool,
    pub mode: MempoolMode,
}

impl From<MempoolMode> for MempoolHealth {
    fn from(mode: MempoolMode) -> Self {
        Self {
            enabled: mode != MempoolMode::Disabled,
            mode,
        }
    }
}

/// Lock-free health view shared between the ingestor task and readers
#[derive(Debug, Clone)]
pub struct HealthHandle {
    mode: Arc<AtomicU8>,
}

impl HealthHandle {
    pub fn new() -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(MempoolMode::Disabled.code())),
        }
    }

    pub fn set(&self, mode: MempoolMode) {
        self.mode.store(mode.code(), Ordering::Release);
    }

    pub fn health(&self) -> MempoolHealth {
        MempoolMode::from_code(self.mode.load(Ordering::Acquire)).into()
    }

    pub fn report(&self) -> StatusReport {
        let health = self.health();
        StatusReport {
            mempool: MempoolStatus {
                enabled: health.enabled,
                mode: health.mode.code(),
            },
        }
    }
}

impl Default for HealthHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Health surface: `{"mempool": {"enabled": bool, "mode": int}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub mempool: MempoolStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MempoolStatus {
    pub enabled: bool,
    pub mode: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_codes() {
        assert_eq!(MempoolMode::Disabled.code(), 0);
        assert_eq!(MempoolMode::Subscription.code(), 1);
        assert_eq!(MempoolMode::Polling.code(), 2);
    }

    #[test]
    fn test_handle_starts_disabled() {
        let handle = HealthHandle::new();
        assert_eq!(
            handle.health(),
            MempoolHealth {
                enabled: false,
                mode: MempoolMode::Disabled
            }
        );
    }

    #[test]
    fn test_status_report_json() {
        let handle = HealthHandle::new();
        let reader = handle.clone();
        handle.set(MempoolMode::Polling);
        let json = serde_json::to_value(reader.report()).unwrap();
        assert_eq!(json, serde_json::json!({"mempool": {"enabled": true, "mode": 2}}));
    }
}
