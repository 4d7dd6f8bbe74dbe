//! Mempool Ingestor Module
//!
//! Purpose:
//!     Continuous stream of pending-transaction candidates. Prefers a push
//!     subscription, degrades to filter polling, idles when neither works,
//!     and reports its own mode through a health handle.
//!
//! Author: AI-Generated
//! Created: 2026-02-01
//! Modified: 2026-02-04 - state machine driver, poll fallback, dedup cache
//!
//! Architecture:
//!     types.rs          - PendingTransaction, SwapIntent, MempoolMode, HealthHandle, StatusReport
//!     decoder.rs        - router calldata → SwapIntent
//!     dedup.rs          - bounded oldest-evicted hash cache
//!     transport.rs      - PushTransport / PollTransport seams + alloy WS/HTTP impls
//!     state_machine.rs  - pure transport selection + reconnect policy
//!     ingestor.rs       - async driver, emits a ReceiverStream

pub mod decoder;
pub mod dedup;
pub mod ingestor;
pub mod state_machine;
pub mod transport;
pub mod types;

pub use ingestor::{IngestorConfig, MempoolIngestor};
pub use state_machine::{IngestAction, IngestEvent, IngestStateMachine, ReconnectPolicy};
pub use transport::{HttpPollTransport, PollTransport, PushTransport, TransportError, WsPushTransport};
pub use types::{HealthHandle, MempoolHealth, MempoolMode, PendingTransaction, StatusReport, SwapIntent};
