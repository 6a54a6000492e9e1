use crate::domain::market::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressKind {
    VolSpike,
    Gap,
    CorrelationBreak,
    Liquidity,
}

/// A detected volatility or structural anomaly. `severity` is the ratio
/// of current to baseline volatility; detected at >= 2.0, CRITICAL at
/// >= 3.0. Expires after a fixed window (default 60 minutes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressEvent {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub detected_at: DateTime<Utc>,
    pub severity: f64,
    pub kind: StressKind,
}

impl StressEvent {
    pub const DETECTION_THRESHOLD: f64 = 2.0;
    pub const CRITICAL_THRESHOLD: f64 = 3.0;

    pub fn is_critical(&self) -> bool {
        self.severity >= Self::CRITICAL_THRESHOLD
    }

    pub fn has_expired(&self, now: DateTime<Utc>, expiry_window: chrono::Duration) -> bool {
        now - self.detected_at >= expiry_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(severity: f64) -> StressEvent {
        StressEvent {
            instrument: "EUR_USD".into(),
            timeframe: Timeframe::H1,
            detected_at: Utc::now(),
            severity,
            kind: StressKind::VolSpike,
        }
    }

    #[test]
    fn critical_threshold_at_three_x() {
        assert!(!event(2.4).is_critical());
        assert!(event(3.0).is_critical());
    }

    #[test]
    fn expires_after_window() {
        let mut e = event(2.5);
        e.detected_at = Utc::now() - chrono::Duration::minutes(61);
        assert!(e.has_expired(Utc::now(), chrono::Duration::minutes(60)));
    }
}
