//! Repository trait abstractions for the persistence contract.
//!
//! `domain` depends only on these traits; `infrastructure::persistence`
//! supplies the sqlx-backed implementations.

use crate::domain::delivery::DeliveryAttempt;
use crate::domain::market::{Candle, Timeframe};
use crate::domain::risk::{RiskState, StressEvent};
use crate::domain::trading::{Signal, SignalStatus};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable, append-only audit log of ingested candles (for warm restart).
#[async_trait]
pub trait CandleRepository: Send + Sync {
    async fn append(&self, candle: &Candle) -> Result<()>;
    async fn recent(&self, instrument: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>>;
}

/// Outcome of `SignalStore::append`, replacing exception-driven
/// duplicate handling with an explicit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    AlreadyExists,
}

/// Durable, append-only store of emitted signals. A signal
/// is visible to consumers iff it has been durably appended here.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn append(&self, signal: &Signal) -> Result<AppendOutcome>;
    async fn list(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Signal>>;
    async fn list_new(&self) -> Result<Vec<Signal>>;
    async fn update_status(&self, signal_id: uuid::Uuid, status: SignalStatus) -> Result<()>;
    async fn latest_bar_open_time(&self, strategy_id: &str) -> Result<Option<DateTime<Utc>>>;
}

/// Persists the RiskManager's process-wide state across restarts.
#[async_trait]
pub trait RiskStateRepository: Send + Sync {
    async fn load(&self) -> Result<Option<RiskState>>;
    async fn save(&self, state: &RiskState) -> Result<()>;
}

/// Records every delivery attempt for observability and crash recovery.
#[async_trait]
pub trait DeliveryAttemptRepository: Send + Sync {
    async fn record(&self, attempt: &DeliveryAttempt) -> Result<()>;
    async fn for_signal(&self, signal_id: uuid::Uuid) -> Result<Vec<DeliveryAttempt>>;
}

/// Persists detected stress events for the RiskManager's stress gate.
#[async_trait]
pub trait StressEventRepository: Send + Sync {
    async fn record(&self, event: &StressEvent) -> Result<()>;
    async fn active_for(&self, instrument: &str, now: DateTime<Utc>) -> Result<Vec<StressEvent>>;
}
