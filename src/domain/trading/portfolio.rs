use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Process-wide portfolio valuation, mutated only by the RiskManager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub initial_value: Decimal,
    pub current_value: Decimal,
    pub peak_value: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioState {
    pub fn new(initial_value: Decimal) -> Self {
        Self {
            initial_value,
            current_value: initial_value,
            peak_value: initial_value,
            updated_at: Utc::now(),
        }
    }

    /// Apply a new mark-to-market value, advancing the high-water mark.
    pub fn mark(&mut self, current_value: Decimal, now: DateTime<Utc>) {
        self.current_value = current_value;
        self.peak_value = self.peak_value.max(current_value);
        self.updated_at = now;
    }

    /// `1 - current/peak`, zero when there is no peak yet.
    pub fn drawdown(&self) -> Decimal {
        if self.peak_value.is_zero() {
            return Decimal::ZERO;
        }
        Decimal::ONE - (self.current_value / self.peak_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn drawdown_zero_at_peak() {
        let state = PortfolioState::new(dec!(10000));
        assert_eq!(state.drawdown(), Decimal::ZERO);
    }

    #[test]
    fn drawdown_tracks_decline_from_peak() {
        let mut state = PortfolioState::new(dec!(10000));
        state.mark(dec!(12000), Utc::now());
        state.mark(dec!(9600), Utc::now());
        // peak stays 12000, drawdown = 1 - 9600/12000 = 0.20
        assert_eq!(state.drawdown(), dec!(0.20));
    }

    #[test]
    fn peak_never_decreases() {
        let mut state = PortfolioState::new(dec!(10000));
        state.mark(dec!(8000), Utc::now());
        assert_eq!(state.peak_value, dec!(10000));
    }
}
