use crate::domain::health::HealthSnapshot;
use crate::domain::market::Timeframe;
use chrono::{DateTime, Utc};

/// Read-only state for one evaluation lane, surfaced on the status
/// endpoint in place of the (explicitly out-of-scope) web layer.
#[derive(Debug, Clone)]
pub struct LaneStatus {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub candles_ingested: u64,
}

/// Snapshot of whole-process health, returned by `Orchestrator::status`.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub lanes: Vec<LaneStatus>,
    pub emergency_level: u8,
    pub market_data_health: HealthSnapshot,
    pub risk_health: HealthSnapshot,
    pub delivery_health: HealthSnapshot,
}
