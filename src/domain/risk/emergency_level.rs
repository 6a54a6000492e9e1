use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Discrete risk regime derived from drawdown. A pure function of the
/// drawdown value; the *transition* into/out of a level is stateful and
/// hysteretic (see `EmergencyLevelTracker`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmergencyLevel(u8);

const THRESHOLDS: [Decimal; 4] = [dec!(0.10), dec!(0.15), dec!(0.20), dec!(0.25)];
const MULTIPLIERS: [Decimal; 5] = [dec!(1.0), dec!(0.8), dec!(0.6), dec!(0.3), dec!(0.0)];

impl EmergencyLevel {
    pub const ZERO: EmergencyLevel = EmergencyLevel(0);

    /// Reconstructs a level from a persisted raw value (0..=4), clamped
    /// defensively against corrupt storage.
    pub fn from_value(value: u8) -> Self {
        EmergencyLevel(value.min(4))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Level implied by a drawdown in isolation (ignores hysteresis).
    /// The upper threshold boundary is inclusive: drawdown == threshold
    /// advances the level.
    pub fn from_drawdown(drawdown: Decimal) -> Self {
        let mut level = 0u8;
        for threshold in THRESHOLDS {
            if drawdown >= threshold {
                level += 1;
            }
        }
        EmergencyLevel(level)
    }

    pub fn size_multiplier(&self) -> Decimal {
        MULTIPLIERS[self.0 as usize]
    }

    pub fn is_sticky_maximum(&self) -> bool {
        self.0 == 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_zero_below_first_threshold() {
        assert_eq!(EmergencyLevel::from_drawdown(dec!(0.05)).value(), 0);
    }

    #[test]
    fn exact_threshold_advances_level() {
        assert_eq!(EmergencyLevel::from_drawdown(dec!(0.10)).value(), 1);
        assert_eq!(EmergencyLevel::from_drawdown(dec!(0.15)).value(), 2);
        assert_eq!(EmergencyLevel::from_drawdown(dec!(0.20)).value(), 3);
        assert_eq!(EmergencyLevel::from_drawdown(dec!(0.25)).value(), 4);
    }

    #[test]
    fn just_below_threshold_does_not_advance() {
        assert_eq!(EmergencyLevel::from_drawdown(dec!(0.0999)).value(), 0);
    }

    #[test]
    fn multipliers_match_spec_table() {
        assert_eq!(EmergencyLevel(0).size_multiplier(), dec!(1.0));
        assert_eq!(EmergencyLevel(1).size_multiplier(), dec!(0.8));
        assert_eq!(EmergencyLevel(2).size_multiplier(), dec!(0.6));
        assert_eq!(EmergencyLevel(3).size_multiplier(), dec!(0.3));
        assert_eq!(EmergencyLevel(4).size_multiplier(), dec!(0.0));
    }

    #[test]
    fn level_four_is_sticky_maximum() {
        assert!(EmergencyLevel::from_drawdown(dec!(0.40)).is_sticky_maximum());
    }
}
