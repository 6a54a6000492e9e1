use crate::domain::market::Timeframe;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    New,
    Delivered,
    Suppressed,
    Expired,
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStatus::New => write!(f, "NEW"),
            SignalStatus::Delivered => write!(f, "DELIVERED"),
            SignalStatus::Suppressed => write!(f, "SUPPRESSED"),
            SignalStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A candidate or persisted trading signal produced by the crossover
/// evaluator and (for persisted signals) sized/gated by the RiskManager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: uuid::Uuid,
    pub strategy_id: String,
    pub instrument: String,
    pub timeframe: Timeframe,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub atr_at_signal: Decimal,
    pub emergency_level_at_signal: u8,
    pub position_size_multiplier: Decimal,
    pub created_at: DateTime<Utc>,
    pub bar_open_time: DateTime<Utc>,
    pub fingerprint: u64,
    pub status: SignalStatus,
}

impl Signal {
    /// Realized reward/risk ratio, undefined (zero) for a degenerate stop.
    pub fn reward_risk(&self) -> Decimal {
        let risk = (self.entry_price - self.stop_loss).abs();
        if risk.is_zero() {
            return Decimal::ZERO;
        }
        let reward = (self.take_profit - self.entry_price).abs();
        reward / risk
    }

    /// SL/TP placement is consistent with direction.
    pub fn has_valid_placement(&self) -> bool {
        match self.direction {
            Direction::Long => self.stop_loss < self.entry_price && self.entry_price < self.take_profit,
            Direction::Short => self.stop_loss > self.entry_price && self.entry_price > self.take_profit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_signal(direction: Direction) -> Signal {
        Signal {
            id: uuid::Uuid::nil(),
            strategy_id: "s".into(),
            instrument: "EUR_USD".into(),
            timeframe: Timeframe::H4,
            direction,
            entry_price: dec!(1.0825),
            stop_loss: dec!(1.0807),
            take_profit: dec!(1.0861),
            atr_at_signal: dec!(0.0012),
            emergency_level_at_signal: 0,
            position_size_multiplier: dec!(1.0),
            created_at: Utc::now(),
            bar_open_time: Utc::now(),
            fingerprint: 0,
            status: SignalStatus::New,
        }
    }

    #[test]
    fn long_placement_must_be_stop_below_entry_below_take() {
        assert!(base_signal(Direction::Long).has_valid_placement());
    }

    #[test]
    fn short_placement_is_mirrored() {
        let mut s = base_signal(Direction::Short);
        s.stop_loss = dec!(1.0843);
        s.take_profit = dec!(1.0789);
        assert!(s.has_valid_placement());
    }

    #[test]
    fn reward_risk_ratio_computed_from_entry_stop_and_target() {
        let s = base_signal(Direction::Long);
        let rr = s.reward_risk();
        // (1.0861 - 1.0825) / (1.0825 - 1.0807) = 0.0036 / 0.0018 = 2.0
        assert!((rr - dec!(2.0)).abs() < dec!(0.0001));
    }
}
