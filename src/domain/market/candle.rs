use super::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandleError {
    #[error("OHLC invariant violated: low={low} high={high} open={open} close={close}")]
    InvalidOhlc {
        low: Decimal,
        high: Decimal,
        open: Decimal,
        close: Decimal,
    },
}

/// A single OHLC observation over one timeframe interval.
///
/// Uniquely keyed by (instrument, timeframe, open_time). `complete` is
/// false for a still-forming bar; non-complete candles must never reach
/// the indicator cache or signal evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub complete: bool,
}

impl Candle {
    pub fn new(
        instrument: impl Into<String>,
        timeframe: Timeframe,
        open_time: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        complete: bool,
    ) -> Result<Self, CandleError> {
        let candle = Self {
            instrument: instrument.into(),
            timeframe,
            open_time,
            open,
            high,
            low,
            close,
            volume,
            complete,
        };
        candle.validate()?;
        Ok(candle)
    }

    pub fn validate(&self) -> Result<(), CandleError> {
        let body_min = self.open.min(self.close);
        let body_max = self.open.max(self.close);
        if self.low <= body_min && body_min <= body_max && body_max <= self.high {
            Ok(())
        } else {
            Err(CandleError::InvalidOhlc {
                low: self.low,
                high: self.high,
                open: self.open,
                close: self.close,
            })
        }
    }

    /// True Range relative to a previous candle's close.
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}
