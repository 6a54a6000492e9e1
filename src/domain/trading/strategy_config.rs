use crate::domain::market::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyConfigError {
    #[error("fast_period ({fast}) must be < slow_period ({slow})")]
    FastNotLessThanSlow { fast: usize, slow: usize },
    #[error("periods must be >= 2, got fast={fast} slow={slow} atr={atr}")]
    PeriodTooSmall { fast: usize, slow: usize, atr: usize },
    #[error("multipliers must be > 0")]
    NonPositiveMultiplier,
    #[error("tp_atr_mult/sl_atr_mult ({ratio}) must be >= min_rr ({min_rr})")]
    RewardRiskBelowMinimum { ratio: Decimal, min_rr: Decimal },
}

/// A configured crossover strategy bound to one (instrument, timeframe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    pub instrument: String,
    pub timeframe: Timeframe,
    pub fast_period: usize,
    pub slow_period: usize,
    pub atr_period: usize,
    pub sl_atr_mult: Decimal,
    pub tp_atr_mult: Decimal,
    pub min_atr: Decimal,
    pub min_rr: Decimal,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        if self.fast_period >= self.slow_period {
            return Err(StrategyConfigError::FastNotLessThanSlow {
                fast: self.fast_period,
                slow: self.slow_period,
            });
        }
        if self.fast_period < 2 || self.slow_period < 2 || self.atr_period < 2 {
            return Err(StrategyConfigError::PeriodTooSmall {
                fast: self.fast_period,
                slow: self.slow_period,
                atr: self.atr_period,
            });
        }
        if self.sl_atr_mult <= Decimal::ZERO || self.tp_atr_mult <= Decimal::ZERO {
            return Err(StrategyConfigError::NonPositiveMultiplier);
        }
        let ratio = self.tp_atr_mult / self.sl_atr_mult;
        if ratio < self.min_rr {
            return Err(StrategyConfigError::RewardRiskBelowMinimum {
                ratio,
                min_rr: self.min_rr,
            });
        }
        Ok(())
    }

    /// The candle count required before this strategy's indicators are warm.
    pub fn warmup_candles(&self) -> usize {
        self.slow_period.max(self.atr_period) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid() -> StrategyConfig {
        StrategyConfig {
            id: "dual_sma_10_20".into(),
            instrument: "EUR_USD".into(),
            timeframe: Timeframe::H4,
            fast_period: 10,
            slow_period: 20,
            atr_period: 14,
            sl_atr_mult: dec!(1.5),
            tp_atr_mult: dec!(3.0),
            min_atr: dec!(0.0003),
            min_rr: dec!(1.5),
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_fast_not_less_than_slow() {
        let mut cfg = valid();
        cfg.fast_period = 20;
        cfg.slow_period = 20;
        assert!(matches!(
            cfg.validate(),
            Err(StrategyConfigError::FastNotLessThanSlow { .. })
        ));
    }

    #[test]
    fn rejects_insufficient_reward_risk() {
        let mut cfg = valid();
        cfg.min_rr = dec!(3.0); // tp/sl = 2.0 < 3.0
        assert!(matches!(
            cfg.validate(),
            Err(StrategyConfigError::RewardRiskBelowMinimum { .. })
        ));
    }

    #[test]
    fn warmup_is_max_of_slow_and_atr_plus_one() {
        assert_eq!(valid().warmup_candles(), 21);
    }
}
