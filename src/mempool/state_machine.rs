//! Mempool Ingestor - Transport State Machine
//!
//! Purpose:
//!     Pure transition logic for choosing between push subscription, filter
//!     polling and idling. The async driver feeds it events and performs the
//!     returned action; nothing here touches the network or the clock.
//!
//! Author: AI-Generated
//! Created: 2026-02-04
//!
//! Transitions:
//!     start ──(subscribe succeeded)──> subscription
//!     subscription ──(max consecutive failures)──> polling (if a poll transport exists)
//!     subscription ──(max consecutive failures)──> disabled (otherwise)
//!     polling ──(filter reinstall failed)──> disabled
//!     disabled ──(subscribe succeeded)──> subscription
//!     disabled ──(filter installed)──> polling

use std::time::Duration;

use super::types::MempoolMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive subscription failures before falling back
    pub max_failures: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub poll_interval: Duration,
    /// Retry period while disabled
    pub idle_retry: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_failures: 5,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
            poll_interval: Duration::from_millis(1_000),
            idle_retry: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// base × 2^(attempt−1), capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        self.backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.backoff_max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEvent {
    SubscribeSucceeded,
    SubscribeFailed,
    StreamEnded,
    FilterInstalled,
    FilterFailed,
    PollSucceeded,
    PollFailed,
    IdleElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestAction {
    /// Open a push subscription after waiting `after`
    Subscribe { after: Duration },
    /// Drain the open subscription until it ends
    Consume,
    InstallFilter,
    /// Poll the installed filter after waiting `after`
    Poll { after: Duration },
    Idle { after: Duration },
}

#[derive(Debug, Clone)]
pub struct IngestStateMachine {
    mode: MempoolMode,
    policy: ReconnectPolicy,
    push_available: bool,
    poll_available: bool,
    failures: u32,
    poll_failures: u32,
    /// single subscribe attempt made from disabled
    probing: bool,
}

impl IngestStateMachine {
    pub fn new(policy: ReconnectPolicy, push_available: bool, poll_available: bool) -> Self {
        Self {
            mode: MempoolMode::Disabled,
            policy,
            push_available,
            poll_available,
            failures: 0,
            poll_failures: 0,
            probing: false,
        }
    }

    pub fn mode(&self) -> MempoolMode {
        self.mode
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// First action after construction
    pub fn start(&mut self) -> IngestAction {
        if self.push_available {
            IngestAction::Subscribe { after: Duration::ZERO }
        } else {
            self.fallback()
        }
    }

    pub fn on_event(&mut self, event: IngestEvent) -> IngestAction {
        match event {
            IngestEvent::SubscribeSucceeded => {
                self.mode = MempoolMode::Subscription;
                self.failures = 0;
                self.probing = false;
                IngestAction::Consume
            }
            IngestEvent::SubscribeFailed | IngestEvent::StreamEnded => {
                if self.probing {
                    self.probing = false;
                    return self.fallback();
                }
                self.failures += 1;
                if self.failures >= self.policy.max_failures {
                    self.fallback()
                } else {
                    IngestAction::Subscribe {
                        after: self.policy.backoff(self.failures),
                    }
                }
            }
            IngestEvent::FilterInstalled => {
                self.mode = MempoolMode::Polling;
                self.poll_failures = 0;
                IngestAction::Poll { after: Duration::ZERO }
            }
            IngestEvent::FilterFailed => self.disable(),
            IngestEvent::PollSucceeded => {
                self.poll_failures = 0;
                IngestAction::Poll {
                    after: self.policy.poll_interval,
                }
            }
            IngestEvent::PollFailed => {
                self.poll_failures += 1;
                if self.poll_failures >= self.policy.max_failures {
                    self.poll_failures = 0;
                    IngestAction::InstallFilter
                } else {
                    IngestAction::Poll {
                        after: self.policy.poll_interval,
                    }
                }
            }
            IngestEvent::IdleElapsed => {
                if self.push_available {
                    self.probing = true;
                    IngestAction::Subscribe { after: Duration::ZERO }
                } else if self.poll_available {
                    IngestAction::InstallFilter
                } else {
                    self.disable()
                }
            }
        }
    }

    fn fallback(&mut self) -> IngestAction {
        self.failures = 0;
        if self.poll_available {
            IngestAction::InstallFilter
        } else {
            self.disable()
        }
    }

    fn disable(&mut self) -> IngestAction {
        self.mode = MempoolMode::Disabled;
        IngestAction::Idle {
            after: self.policy.idle_retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_failures: 3,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(300),
            poll_interval: Duration::from_millis(50),
            idle_retry: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(300));
        assert_eq!(p.backoff(40), Duration::from_millis(300));
    }

    #[test]
    fn test_subscribe_failures_fall_back_to_polling() {
        let mut m = IngestStateMachine::new(policy(), true, true);
        assert_eq!(m.start(), IngestAction::Subscribe { after: Duration::ZERO });
        // not push until a subscribe actually succeeds
        assert_eq!(m.mode(), MempoolMode::Disabled);

        assert_eq!(
            m.on_event(IngestEvent::SubscribeFailed),
            IngestAction::Subscribe { after: Duration::from_millis(100) }
        );
        assert_eq!(
            m.on_event(IngestEvent::SubscribeFailed),
            IngestAction::Subscribe { after: Duration::from_millis(200) }
        );
        assert_eq!(m.on_event(IngestEvent::SubscribeFailed), IngestAction::InstallFilter);
        assert_eq!(m.on_event(IngestEvent::FilterInstalled), IngestAction::Poll { after: Duration::ZERO });
        assert_eq!(m.mode(), MempoolMode::Polling);
    }

    #[test]
    fn test_success_resets_failures() {
        let mut m = IngestStateMachine::new(policy(), true, false);
        m.start();
        m.on_event(IngestEvent::SubscribeFailed);
        m.on_event(IngestEvent::SubscribeFailed);
        assert_eq!(m.on_event(IngestEvent::SubscribeSucceeded), IngestAction::Consume);
        assert_eq!(m.consecutive_failures(), 0);
        assert_eq!(
            m.on_event(IngestEvent::StreamEnded),
            IngestAction::Subscribe { after: Duration::from_millis(100) }
        );
        // still push while reconnecting
        assert_eq!(m.mode(), MempoolMode::Subscription);
    }

    #[test]
    fn test_push_only_goes_disabled_then_recovers() {
        let mut m = IngestStateMachine::new(policy(), true, false);
        m.start();
        for _ in 0..2 {
            m.on_event(IngestEvent::SubscribeFailed);
        }
        assert_eq!(
            m.on_event(IngestEvent::SubscribeFailed),
            IngestAction::Idle { after: Duration::from_secs(10) }
        );
        assert_eq!(m.mode(), MempoolMode::Disabled);

        // a failed probe stays disabled
        assert_eq!(m.on_event(IngestEvent::IdleElapsed), IngestAction::Subscribe { after: Duration::ZERO });
        assert_eq!(m.mode(), MempoolMode::Disabled);
        assert!(matches!(m.on_event(IngestEvent::SubscribeFailed), IngestAction::Idle { .. }));
        assert_eq!(m.mode(), MempoolMode::Disabled);

        // only an explicit success re-enables push
        m.on_event(IngestEvent::IdleElapsed);
        m.on_event(IngestEvent::SubscribeSucceeded);
        assert_eq!(m.mode(), MempoolMode::Subscription);
    }

    #[test]
    fn test_no_transports_idles() {
        let mut m = IngestStateMachine::new(policy(), false, false);
        assert!(matches!(m.start(), IngestAction::Idle { .. }));
        assert!(matches!(m.on_event(IngestEvent::IdleElapsed), IngestAction::Idle { .. }));
        assert_eq!(m.mode(), MempoolMode::Disabled);
    }

    #[test]
    fn test_poll_failures_reinstall_then_disable() {
        let mut m = IngestStateMachine::new(policy(), false, true);
        assert_eq!(m.start(), IngestAction::InstallFilter);
        m.on_event(IngestEvent::FilterInstalled);
        assert_eq!(
            m.on_event(IngestEvent::PollFailed),
            IngestAction::Poll { after: Duration::from_millis(50) }
        );
        m.on_event(IngestEvent::PollSucceeded);
        m.on_event(IngestEvent::PollFailed);
        m.on_event(IngestEvent::PollFailed);
        assert_eq!(m.on_event(IngestEvent::PollFailed), IngestAction::InstallFilter);
        assert_eq!(m.mode(), MempoolMode::Polling);
        assert!(matches!(m.on_event(IngestEvent::FilterFailed), IngestAction::Idle { .. }));
        assert_eq!(m.mode(), MempoolMode::Disabled);
        assert_eq!(m.on_event(IngestEvent::IdleElapsed), IngestAction::InstallFilter);
        m.on_event(IngestEvent::FilterInstalled);
        assert_eq!(m.mode(), MempoolMode::Polling);
    }
}
