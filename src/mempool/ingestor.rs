//! Mempool Ingestor - Driver
//!
//! Purpose:
//!     Async task that performs the state machine's actions against the
//!     configured transports, dedups what they return and forwards fresh
//!     pending transactions to the orchestration handoff loop.
//!
//! Author: AI-Generated
//! Created: 2026-02-04
//!
//! Notes:
//!     - Never returns an error: transport failures become state machine
//!       events; the task ends only on cancellation or when the consumer
//!       drops the stream.
//!     - Health is published through a `HealthHandle` after every transition.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dedup::DedupCache;
use super::state_machine::{IngestAction, IngestEvent, IngestStateMachine, ReconnectPolicy};
use super::transport::{FeedItem, FeedStream, PollTransport, PushTransport};
use super::types::{HealthHandle, PendingTransaction};

#[derive(Debug, Clone, Copy)]
pub struct IngestorConfig {
    pub policy: ReconnectPolicy,
    pub dedup_capacity: usize,
    pub channel_capacity: usize,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            dedup_capacity: 50_000,
            channel_capacity: 1_024,
        }
    }
}

pub struct MempoolIngestor {
    push: Option<Arc<dyn PushTransport>>,
    poll: Option<Arc<dyn PollTransport>>,
    config: IngestorConfig,
}

enum Emit {
    Fresh,
    Skipped,
    Closed,
}

impl MempoolIngestor {
    pub fn new(
        push: Option<Arc<dyn PushTransport>>,
        poll: Option<Arc<dyn PollTransport>>,
        config: IngestorConfig,
    ) -> Self {
        Self { push, poll, config }
    }

    /// Spawn the ingestion task. The returned stream yields each pending
    /// transaction at most once (within the dedup window); the handle can be
    /// read at any time without touching the stream.
    pub fn start(
        self,
        cancel: CancellationToken,
    ) -> (ReceiverStream<PendingTransaction>, HealthHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let health = HealthHandle::new();
        let task = tokio::spawn(self.run(tx, health.clone(), cancel));
        (ReceiverStream::new(rx), health, task)
    }

    async fn run(self, tx: mpsc::Sender<PendingTransaction>, health: HealthHandle, cancel: CancellationToken) {
        let mut machine =
            IngestStateMachine::new(self.config.policy, self.push.is_some(), self.poll.is_some());
        let mut dedup = DedupCache::new(self.config.dedup_capacity);
        let mut stream: Option<FeedStream> = None;
        let mut filter: Option<U256> = None;

        info!(
            push = %self.push.as_ref().map(|p| p.describe()).unwrap_or_else(|| "none".into()),
            poll = %self.poll.as_ref().map(|p| p.describe()).unwrap_or_else(|| "none".into()),
            "Mempool ingestor starting"
        );

        let mut action = machine.start();
        health.set(machine.mode());

        loop {
            if tx.is_closed() {
                info!("Pending tx consumer dropped; stopping ingestor");
                break;
            }
            let event = match action {
                IngestAction::Subscribe { after } => {
                    if !sleep_or_cancel(after, &cancel).await {
                        break;
                    }
                    match &self.push {
                        Some(push) => match push.subscribe().await {
                            Ok(s) => {
                                stream = Some(s);
                                IngestEvent::SubscribeSucceeded
                            }
                            Err(e) => {
                                warn!(
                                    error = %e,
                                    attempt = machine.consecutive_failures() + 1,
                                    "Pending subscription failed"
                                );
                                IngestEvent::SubscribeFailed
                            }
                        },
                        None => IngestEvent::SubscribeFailed,
                    }
                }
                IngestAction::Consume => {
                    let Some(mut s) = stream.take() else {
                        action = machine.on_event(IngestEvent::StreamEnded);
                        continue;
                    };
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("Shutdown requested; leaving pending tx stream");
                                return;
                            }
                            _ = tx.closed() => {
                                info!("Pending tx consumer dropped; stopping ingestor");
                                return;
                            }
                            item = s.next() => match item {
                                Some(item) => {
                                    if let Emit::Closed = emit(item, &mut dedup, &tx, &cancel).await {
                                        return;
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                    warn!("Pending tx subscription ended");
                    IngestEvent::StreamEnded
                }
                IngestAction::InstallFilter => match &self.poll {
                    Some(poll) => match poll.install_filter().await {
                        Ok(id) => {
                            debug!(filter = %id, "Pending tx filter installed");
                            filter = Some(id);
                            IngestEvent::FilterInstalled
                        }
                        Err(e) => {
                            warn!(error = %e, "Pending tx filter install failed");
                            filter = None;
                            IngestEvent::FilterFailed
                        }
                    },
                    None => IngestEvent::FilterFailed,
                },
                IngestAction::Poll { after } => {
                    if !sleep_or_cancel(after, &cancel).await {
                        break;
                    }
                    match (&self.poll, filter) {
                        (Some(poll), Some(id)) => match poll.poll(id).await {
                            Ok(batch) => {
                                for item in batch {
                                    if let Emit::Closed = emit(item, &mut dedup, &tx, &cancel).await {
                                        return;
                                    }
                                }
                                IngestEvent::PollSucceeded
                            }
                            Err(e) => {
                                warn!(error = %e, "Pending tx filter poll failed");
                                IngestEvent::PollFailed
                            }
                        },
                        _ => IngestEvent::PollFailed,
                    }
                }
                IngestAction::Idle { after } => {
                    if !sleep_or_cancel(after, &cancel).await {
                        break;
                    }
                    IngestEvent::IdleElapsed
                }
            };

            let before = machine.mode();
            action = machine.on_event(event);
            let after = machine.mode();
            if before != after {
                info!(from = ?before, to = ?after, "Mempool mode changed");
            }
            health.set(after);
        }

        info!(seen_hashes = dedup.len(), "Mempool ingestor stopped");
    }
}

/// Forward one transport item. Malformed items are logged and dropped.
async fn emit(
    item: FeedItem,
    dedup: &mut DedupCache,
    tx: &mpsc::Sender<PendingTransaction>,
    cancel: &CancellationToken,
) -> Emit {
    let pending = match item {
        Ok(p) => p,
        Err(reason) => {
            debug!(%reason, "Dropping malformed pending tx");
            return Emit::Skipped;
        }
    };
    if !dedup.insert(pending.hash) {
        return Emit::Skipped;
    }
    tokio::select! {
        _ = cancel.cancelled() => Emit::Closed,
        sent = tx.send(pending) => match sent {
            Ok(()) => Emit::Fresh,
            Err(_) => {
                info!("Pending tx consumer dropped; stopping ingestor");
                Emit::Closed
            }
        }
    }
}

/// false when cancelled during the wait
async fn sleep_or_cancel(after: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if after.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(after) => true,
    }
}
