use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RiskConfigError {
    #[error("Invalid RiskConfig: {0}")]
    ValidationError(String),
}

/// Static RiskManager configuration. Threshold/multiplier values are
/// fixed by policy; the dwell and stress window lengths are operator-tunable.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub level3_min_rr: Decimal,
    pub level3_min_atr_mult: Decimal,
    pub stressed_level_1_2_min_rr: Decimal,
    pub emergency_dwell: chrono::Duration,
    pub stress_event_expiry: chrono::Duration,
    pub stress_short_window: usize,
    pub stress_baseline_window: usize,
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        if self.level3_min_rr <= Decimal::ZERO {
            return Err(RiskConfigError::ValidationError(
                "level3_min_rr must be > 0".into(),
            ));
        }
        if self.stress_baseline_window < self.stress_short_window {
            return Err(RiskConfigError::ValidationError(
                "stress_baseline_window must be >= stress_short_window".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            level3_min_rr: dec!(3.0),
            level3_min_atr_mult: dec!(1.5),
            stressed_level_1_2_min_rr: dec!(2.0),
            emergency_dwell: chrono::Duration::minutes(15),
            stress_event_expiry: chrono::Duration::minutes(60),
            stress_short_window: 20,
            stress_baseline_window: 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_baseline_shorter_than_short_window() {
        let mut cfg = RiskConfig::default();
        cfg.stress_baseline_window = 5;
        cfg.stress_short_window = 20;
        assert!(cfg.validate().is_err());
    }
}
