use super::emergency_level::EmergencyLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Persisted snapshot of the RiskManager's process-wide state, used to
/// resume `PortfolioState`/`EmergencyLevel` across a restart without
/// replaying the full equity history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub id: String,
    pub current_value: Decimal,
    pub peak_value: Decimal,
    pub emergency_level: u8,
    /// When the level last dropped below its lower threshold; used to
    /// enforce the downgrade dwell period across restarts.
    pub level_below_threshold_since: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RiskState {
    pub fn initial(initial_value: Decimal) -> Self {
        Self {
            id: "global".to_string(),
            current_value: initial_value,
            peak_value: initial_value,
            emergency_level: EmergencyLevel::ZERO.value(),
            level_below_threshold_since: None,
            updated_at: Utc::now(),
        }
    }
}
