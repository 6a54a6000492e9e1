use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Pending,
    Success,
    TerminalFailure,
}

/// One HTTP POST attempt of a signal payload to one channel.
/// `attempt_number` is monotonically increasing per (signal, channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub signal_id: uuid::Uuid,
    pub channel_id: String,
    pub attempt_number: u32,
    pub scheduled_at: DateTime<Utc>,
    pub last_status: Option<u16>,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub outcome: DeliveryOutcome,
}

impl DeliveryAttempt {
    pub fn first(signal_id: uuid::Uuid, channel_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            signal_id,
            channel_id: channel_id.into(),
            attempt_number: 1,
            scheduled_at: now,
            last_status: None,
            last_error: None,
            next_retry_at: None,
            outcome: DeliveryOutcome::Pending,
        }
    }

    pub fn next(&self, now: DateTime<Utc>) -> Self {
        Self {
            signal_id: self.signal_id,
            channel_id: self.channel_id.clone(),
            attempt_number: self.attempt_number + 1,
            scheduled_at: now,
            last_status: None,
            last_error: None,
            next_retry_at: None,
            outcome: DeliveryOutcome::Pending,
        }
    }
}
