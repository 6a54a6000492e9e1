use super::candle::Candle;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Per-(instrument, timeframe) rolling window plus cached indicator
/// scalars. Advancing by one complete candle must update the scalars
/// incrementally and agree with a full recompute (exact for the MAs,
/// within 1e-9 for ATR — see `IndicatorCache`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorState {
    pub instrument: String,
    pub timeframe: super::timeframe::Timeframe,
    pub candles: VecDeque<Candle>,
    pub fast_ma: f64,
    pub slow_ma: f64,
    pub prev_fast_ma: f64,
    pub prev_slow_ma: f64,
    pub atr: f64,
    pub warm: bool,
}

impl IndicatorState {
    pub fn empty(instrument: impl Into<String>, timeframe: super::timeframe::Timeframe) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
            candles: VecDeque::new(),
            fast_ma: 0.0,
            slow_ma: 0.0,
            prev_fast_ma: 0.0,
            prev_slow_ma: 0.0,
            atr: 0.0,
            warm: false,
        }
    }
}
