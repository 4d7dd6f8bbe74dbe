//! Weighted RPC Endpoint Pool
//!
//! Shared by every network collaborator (pool state, base fee, quoter,
//! submission). Read-mostly: selection is lock-free, failures demote an
//! endpoint's effective weight and successes restore it, so traffic rotates
//! away from a failing node without any retry in the caller.
//!
//! Author: AI-Generated
//! Created: 2026-02-04
//!
//! Notes:
//!     - effective weight = weight / (1 + consecutive failures)
//!     - ties rotate through a shared cursor
//!     - only http(s) endpoints serve request/response calls; ws endpoints
//!       are handed to the mempool push transport

use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

pub type HttpProvider = RootProvider<Ethereum>;

/// Failures beyond this stop lowering the effective weight further
const MAX_TRACKED_FAILURES: u32 = 16;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no http endpoint configured")]
    NoEndpoints,
    #[error("invalid endpoint url {0}: {1}")]
    InvalidUrl(String, String),
    #[error("{label} failed on {endpoint}: {message}")]
    Call {
        endpoint: String,
        label: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// ws:// or wss:// (push subscriptions)
    WebSocket,
    /// http:// or https:// (calls and filter polling)
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub url: String,
    pub weight: u32,
}

impl EndpointConfig {
    pub fn kind(&self) -> EndpointKind {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            EndpointKind::WebSocket
        } else {
            EndpointKind::Http
        }
    }

    /// Parse "url|weight,url|weight,url". Missing weight defaults to 1.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, String> {
        let mut endpoints = Vec::new();
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (url, weight) = match entry.split_once('|') {
                Some((url, weight)) => {
                    let weight: u32 = weight
                        .trim()
                        .parse()
                        .map_err(|_| format!("invalid weight in '{}'", entry))?;
                    (url.trim(), weight)
                }
                None => (entry, 1),
            };
            if weight == 0 {
                return Err(format!("zero weight in '{}'", entry));
            }
            let known_scheme = ["http://", "https://", "ws://", "wss://"]
                .iter()
                .any(|scheme| url.starts_with(scheme));
            if !known_scheme {
                return Err(format!("unsupported scheme in '{}'", url));
            }
            endpoints.push(Self {
                url: url.to_string(),
                weight,
            });
        }
        Ok(endpoints)
    }
}

struct Slot {
    config: EndpointConfig,
    provider: HttpProvider,
    failures: AtomicU32,
}

impl Slot {
    fn score(&self) -> u64 {
        let failures = self.failures.load(Ordering::Relaxed).min(MAX_TRACKED_FAILURES);
        u64::from(self.config.weight) * 1_000 / (1 + u64::from(failures))
    }
}

/// Weighted pool of http providers
pub struct EndpointPool {
    slots: Vec<Slot>,
    push_urls: Vec<String>,
    cursor: AtomicUsize,
}

impl EndpointPool {
    pub fn new(endpoints: &[EndpointConfig]) -> Result<Self, RpcError> {
        let mut slots = Vec::new();
        let mut push = Vec::new();
        for endpoint in endpoints {
            match endpoint.kind() {
                EndpointKind::WebSocket => push.push(endpoint.clone()),
                EndpointKind::Http => {
                    let url: reqwest::Url = endpoint
                        .url
                        .parse()
                        .map_err(|e| RpcError::InvalidUrl(endpoint.url.clone(), format!("{}", e)))?;
                    slots.push(Slot {
                        config: endpoint.clone(),
                        provider: RootProvider::new_http(url),
                        failures: AtomicU32::new(0),
                    });
                }
            }
        }
        push.sort_by(|a, b| b.weight.cmp(&a.weight));
        Ok(Self {
            slots,
            push_urls: push.into_iter().map(|e| e.url).collect(),
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn http_count(&self) -> usize {
        self.slots.len()
    }

    /// WebSocket urls, heaviest first
    pub fn push_urls(&self) -> &[String] {
        &self.push_urls
    }

    /// Heaviest http url (filter polling needs a single sticky node)
    pub fn primary_http(&self) -> Option<(String, HttpProvider)> {
        self.slots
            .iter()
            .max_by_key(|slot| slot.config.weight)
            .map(|slot| (slot.config.url.clone(), slot.provider.clone()))
    }

    fn select(&self) -> Option<usize> {
        let best = self.slots.iter().map(Slot::score).max()?;
        let candidates: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.score() == best)
            .map(|(i, _)| i)
            .collect();
        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        candidates.get(turn % candidates.len().max(1)).copied()
    }

    pub fn record_success(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.failures.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            let failures = slot.failures.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(endpoint = %slot.config.url, failures, "Endpoint demoted");
        }
    }

    /// Run one call against the best endpoint and record the outcome.
    /// No retry: a failure is returned and the next call rotates.
    pub async fn execute<T, E, F, Fut>(&self, label: &'static str, op: F) -> Result<T, RpcError>
    where
        F: FnOnce(HttpProvider) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let index = self.select().ok_or(RpcError::NoEndpoints)?;
        let slot = &self.slots[index];
        match op(slot.provider.clone()).await {
            Ok(value) => {
                self.record_success(index);
                Ok(value)
            }
            Err(e) => {
                self.record_failure(index);
                warn!(endpoint = %slot.config.url, call = label, error = %e, "RPC call failed");
                Err(RpcError::Call {
                    endpoint: slot.config.url.clone(),
                    label,
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(spec: &str) -> EndpointPool {
        EndpointPool::new(&EndpointConfig::parse_list(spec).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_list() {
        let list =
            EndpointConfig::parse_list("wss://a.example|5, https://b.example|2,http://c.example")
                .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].kind(), EndpointKind::WebSocket);
        assert_eq!(list[1].weight, 2);
        assert_eq!(list[2].weight, 1);
        assert!(EndpointConfig::parse_list("https://a|x").is_err());
        assert!(EndpointConfig::parse_list("https://a|0").is_err());
        assert!(EndpointConfig::parse_list("ftp://a|1").is_err());
        assert!(EndpointConfig::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_split_by_kind() {
        let p = pool("wss://a.example|1,wss://b.example|9,https://c.example|1");
        assert_eq!(p.http_count(), 1);
        assert_eq!(p.push_urls(), ["wss://b.example".to_string(), "wss://a.example".to_string()]);
        assert_eq!(p.primary_http().unwrap().0, "https://c.example");
    }

    #[test]
    fn test_failures_rotate_to_lighter_endpoint() {
        let p = pool("https://heavy.example|3,https://light.example|1");
        assert_eq!(p.select(), Some(0));
        for _ in 0..3 {
            p.record_failure(0);
        }
        assert_eq!(p.select(), Some(1));
        p.record_success(0);
        assert_eq!(p.select(), Some(0));
    }

    #[test]
    fn test_ties_rotate() {
        let p = pool("https://a.example|1,https://b.example|1");
        let first = p.select().unwrap();
        let second = p.select().unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_execute_records_outcome() {
        let p = pool("https://a.example|2,https://b.example|1");
        let ok: Result<u32, RpcError> = p.execute("probe", |_| async { Ok::<_, String>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = p
            .execute("probe", |_| async { Err::<u32, _>("boom".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Call { label: "probe", .. }));
        // a single failure halves the heavy endpoint to parity, so rotation kicks in
        assert_eq!(p.slots[0].failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_execute_without_http_endpoints() {
        let p = pool("wss://only.example");
        let err = p.execute("probe", |_| async { Ok::<_, String>(()) }).await.unwrap_err();
        assert!(matches!(err, RpcError::NoEndpoints));
    }
}
