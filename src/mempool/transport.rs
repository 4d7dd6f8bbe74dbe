//! Mempool Ingestor - Transports
//!
//! Purpose:
//!     Trait seams for the two ways pending transactions reach the bot, plus
//!     their alloy implementations:
//!       - push: `eth_subscribe("newPendingTransactions", true)` over WebSocket
//!       - poll: `eth_newPendingTransactionFilter` + `eth_getFilterChanges` over HTTP
//!
//! Author: AI-Generated
//! Created: 2026-02-04
//!
//! Notes:
//!     - Items are decoded one by one so a malformed entry is dropped on its
//!       own instead of failing the whole batch.
//!     - The WS provider is moved into the stream so the connection lives as
//!       long as the subscription does.

use alloy::primitives::U256;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::Transaction;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info};

use super::types::PendingTransaction;
use crate::rpc::HttpProvider;

/// One item from a transport; `Err` carries the reason a malformed entry
/// could not be decoded.
pub type FeedItem = Result<PendingTransaction, String>;
pub type FeedStream = BoxStream<'static, FeedItem>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("no {0} endpoint configured")]
    Unavailable(&'static str),
    #[error("connect to {endpoint} failed: {message}")]
    Connect { endpoint: String, message: String },
    #[error("subscription rejected: {0}")]
    Subscribe(String),
    #[error("pending filter unsupported: {0}")]
    Filter(String),
    #[error("filter poll failed: {0}")]
    Poll(String),
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    fn describe(&self) -> String;

    /// Open a pending-transaction subscription. The stream ends when the
    /// connection drops.
    async fn subscribe(&self) -> Result<FeedStream, TransportError>;
}

#[async_trait]
pub trait PollTransport: Send + Sync {
    fn describe(&self) -> String;

    async fn install_filter(&self) -> Result<U256, TransportError>;

    /// Transactions seen by the node since the previous poll of `filter`.
    async fn poll(&self, filter: U256) -> Result<Vec<FeedItem>, TransportError>;
}

// ── WebSocket push ──────────────────────────────────────────────────

/// Tries each url in order, heaviest first
pub struct WsPushTransport {
    urls: Vec<String>,
}

impl WsPushTransport {
    pub fn new(urls: Vec<String>) -> Option<Self> {
        if urls.is_empty() {
            None
        } else {
            Some(Self { urls })
        }
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    fn describe(&self) -> String {
        format!("ws({})", self.urls.join(","))
    }

    async fn subscribe(&self) -> Result<FeedStream, TransportError> {
        let mut last = TransportError::Unavailable("websocket");
        for url in &self.urls {
            let provider: RootProvider = match RootProvider::connect(url).await {
                Ok(p) => p,
                Err(e) => {
                    debug!(endpoint = %url, error = %e, "WS connect failed");
                    last = TransportError::Connect {
                        endpoint: url.clone(),
                        message: e.to_string(),
                    };
                    continue;
                }
            };
            match provider.subscribe_full_pending_transactions().await {
                Ok(sub) => {
                    info!(endpoint = %url, "Subscribed to full pendingTransactions");
                    let stream = sub.into_result_stream().map(move |item| {
                        // keeps the connection alive for the lifetime of the stream
                        let _ = &provider;
                        item.map(|tx| PendingTransaction::from_rpc(&tx, Utc::now()))
                            .map_err(|e| e.to_string())
                    });
                    return Ok(stream.boxed());
                }
                Err(e) => {
                    debug!(endpoint = %url, error = %e, "Pending subscription rejected");
                    last = TransportError::Subscribe(e.to_string());
                }
            }
        }
        Err(last)
    }
}

// ── HTTP filter polling ─────────────────────────────────────────────

/// Filters live on a single node, so polling sticks to one endpoint
pub struct HttpPollTransport {
    url: String,
    provider: HttpProvider,
}

impl HttpPollTransport {
    pub fn new(url: String, provider: HttpProvider) -> Self {
        Self { url, provider }
    }
}

#[async_trait]
impl PollTransport for HttpPollTransport {
    fn describe(&self) -> String {
        format!("http({})", self.url)
    }

    async fn install_filter(&self) -> Result<U256, TransportError> {
        self.provider
            .new_pending_transactions_filter(true)
            .await
            .map_err(|e| TransportError::Filter(e.to_string()))
    }

    async fn poll(&self, filter: U256) -> Result<Vec<FeedItem>, TransportError> {
        let raw = self
            .provider
            .get_filter_changes::<serde_json::Value>(filter)
            .await
            .map_err(|e| TransportError::Poll(e.to_string()))?;
        let observed_at = Utc::now();
        Ok(raw
            .into_iter()
            .map(|value| {
                serde_json::from_value::<Transaction>(value)
                    .map(|tx| PendingTransaction::from_rpc(&tx, observed_at))
                    .map_err(|e| e.to_string())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_transport_requires_urls() {
        assert!(WsPushTransport::new(vec![]).is_none());
        let t = WsPushTransport::new(vec!["wss://a.example".into()]).unwrap();
        assert_eq!(t.describe(), "ws(wss://a.example)");
    }

    #[test]
    fn test_error_messages() {
        let e = TransportError::Connect {
            endpoint: "wss://a".into(),
            message: "refused".into(),
        };
        assert_eq!(e.to_string(), "connect to wss://a failed: refused");
        assert_eq!(
            TransportError::Unavailable("websocket").to_string(),
            "no websocket endpoint configured"
        );
    }
}
