//! Base Fee Oracle
//!
//! Reads the latest block header through the shared endpoint pool.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use alloy::eips::BlockNumberOrTag;
use alloy::providers::Provider;
use async_trait::async_trait;
use std::sync::Arc;

use super::strategy::{BaseFeeSource, GasError};
use crate::rpc::EndpointPool;

pub struct RpcBaseFeeSource {
    endpoints: Arc<EndpointPool>,
}

impl RpcBaseFeeSource {
    pub fn new(endpoints: Arc<EndpointPool>) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl BaseFeeSource for RpcBaseFeeSource {
    async fn latest_base_fee(&self) -> Result<Option<u128>, GasError> {
        let block = self
            .endpoints
            .execute("latest_block", |provider| async move {
                provider.get_block_by_number(BlockNumberOrTag::Latest).await
            })
            .await
            .map_err(|e| GasError::Transport(e.to_string()))?
            .ok_or_else(|| GasError::Transport("latest block not returned".to_string()))?;
        Ok(block.header.base_fee_per_gas.map(u128::from))
    }
}
