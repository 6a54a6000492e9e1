use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candlestick bar width. Ordered ascending by duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    H1,
    H4,
    D,
    W,
}

impl Timeframe {
    pub fn to_seconds(&self) -> i64 {
        match self {
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::D => 24 * 60 * 60,
            Timeframe::W => 7 * 24 * 60 * 60,
        }
    }

    /// Poll interval recommendation: timeframe/4, bounded to [5s, 60s].
    pub fn poll_interval_seconds(&self) -> u64 {
        let quarter = self.to_seconds() / 4;
        quarter.clamp(5, 60) as u64
    }

    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D,
            Timeframe::W,
        ]
    }

    /// Start-of-period timestamp (unix seconds) containing `timestamp_secs`.
    /// Weekly periods align to Monday 00:00 UTC; all others to the epoch grid.
    pub fn period_start(&self, timestamp_secs: i64) -> i64 {
        let period = self.to_seconds();
        if *self == Timeframe::W {
            // Unix epoch (1970-01-01) was a Thursday; shift by 4 days so weeks
            // align to Monday 00:00 UTC.
            const THURSDAY_TO_MONDAY_SHIFT: i64 = 4 * 24 * 60 * 60;
            let shifted = timestamp_secs + THURSDAY_TO_MONDAY_SHIFT;
            shifted - shifted.rem_euclid(period) - THURSDAY_TO_MONDAY_SHIFT
        } else {
            timestamp_secs - timestamp_secs.rem_euclid(period)
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D" => Ok(Timeframe::D),
            "W" => Ok(Timeframe::W),
            _ => Err(anyhow!(
                "Invalid timeframe: '{s}'. Valid options: M5, M15, H1, H4, D, W"
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D => "D",
            Timeframe::W => "W",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_seconds_matches_spec_durations() {
        assert_eq!(Timeframe::M5.to_seconds(), 300);
        assert_eq!(Timeframe::H1.to_seconds(), 3600);
        assert_eq!(Timeframe::H4.to_seconds(), 14400);
        assert_eq!(Timeframe::D.to_seconds(), 86400);
        assert_eq!(Timeframe::W.to_seconds(), 604800);
    }

    #[test]
    fn poll_interval_is_bounded() {
        assert_eq!(Timeframe::M5.poll_interval_seconds(), 60.min(75));
        assert_eq!(Timeframe::W.poll_interval_seconds(), 60);
        assert!(Timeframe::M15.poll_interval_seconds() >= 5);
    }

    #[test]
    fn from_str_roundtrips_display() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::from_str(&tf.to_string()).unwrap(), tf);
        }
        assert!(Timeframe::from_str("bogus").is_err());
    }

    #[test]
    fn period_start_aligns_to_grid() {
        let tf = Timeframe::H4;
        let base = 0i64; // epoch aligns for non-weekly timeframes
        assert_eq!(tf.period_start(base + 3600), base);
        assert_eq!(tf.period_start(base + 4 * 3600), base + 4 * 3600);
    }

    #[test]
    fn weekly_period_start_aligns_to_monday() {
        // 1970-01-05 00:00:00 UTC was a Monday.
        let monday = 4 * 24 * 60 * 60i64;
        assert_eq!(Timeframe::W.period_start(monday), monday);
        assert_eq!(Timeframe::W.period_start(monday + 100), monday);
        assert_eq!(Timeframe::W.period_start(monday - 1), monday - 7 * 86400);
    }
}
