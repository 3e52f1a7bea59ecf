/// Per-document subscription health: a small state machine driving
/// reconnect backoff, separated from the async shell so transitions are
/// testable without a runtime
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SyncConfig;

/// Connection health exposed to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Reconnecting { attempt: u32 },
    Degraded,
}

/// Lifecycle notifications from the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Subscribed,
    Error,
    Timeout,
    Closed,
}

/// What the async shell must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Healthy again: drop any pending reconnect timer
    CancelTimer,

    /// Schedule a resubscribe after this delay
    Backoff(Duration),

    /// Attempts exhausted; terminal until an external reload
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct SubscriptionState {
    status: ConnectionStatus,
    attempts: u32,
    max_attempts: u32,
    backoff_base_ms: u64,
    backoff_jitter_ms: u64,
}

impl SubscriptionState {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            status: ConnectionStatus::Connected,
            attempts: 0,
            max_attempts: config.max_reconnect_attempts,
            backoff_base_ms: config.backoff_base_ms,
            backoff_jitter_ms: config.backoff_jitter_ms,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Apply one channel lifecycle event and say what the shell must do.
    pub fn apply(&mut self, event: ChannelEvent) -> Transition {
        match event {
            ChannelEvent::Subscribed => {
                self.status = ConnectionStatus::Connected;
                self.attempts = 0;
                Transition::CancelTimer
            }
            ChannelEvent::Error | ChannelEvent::Timeout | ChannelEvent::Closed => {
                if self.status == ConnectionStatus::Degraded {
                    // terminal: no further attempts are scheduled
                    return Transition::GiveUp;
                }
                self.attempts += 1;
                if self.attempts > self.max_attempts {
                    self.status = ConnectionStatus::Degraded;
                    Transition::GiveUp
                } else {
                    self.status = ConnectionStatus::Reconnecting {
                        attempt: self.attempts,
                    };
                    Transition::Backoff(self.backoff_delay())
                }
            }
        }
    }

    /// `2^attempt * base` plus up to `jitter` of random slack.
    fn backoff_delay(&self) -> Duration {
        let exp = 1u64 << self.attempts.min(16);
        let jitter = if self.backoff_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.backoff_jitter_ms)
        };
        Duration::from_millis(exp.saturating_mul(self.backoff_base_ms) + jitter)
    }
}
