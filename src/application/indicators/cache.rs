use crate::domain::market::candle::Candle;
use crate::domain::market::indicator_state::IndicatorState;
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use tracing::warn;

/// Maximum allowed discrepancy between the incrementally-updated ATR and
/// a full recompute before the cache forces a recompute and warns.
const ATR_DRIFT_TOLERANCE: f64 = 1e-9;

struct Window {
    fast_period: usize,
    slow_period: usize,
    atr_period: usize,
    max_len: usize,
}

/// Per-(instrument, timeframe) rolling window plus derived indicator
/// state, with O(1) incremental update and a correctness-equivalent
/// full recompute path.
pub struct IndicatorCache {
    windows: HashMap<(String, Timeframe), Window>,
    states: HashMap<(String, Timeframe), IndicatorState>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            states: HashMap::new(),
        }
    }

    /// Register (or update) the lookback periods used for a key. Must be
    /// called before `on_candle`/`warm` for that key.
    pub fn configure(
        &mut self,
        instrument: &str,
        timeframe: Timeframe,
        fast_period: usize,
        slow_period: usize,
        atr_period: usize,
    ) {
        let max_len = slow_period.max(atr_period) + 1 + 16; // safety margin
        self.windows.insert(
            (instrument.to_string(), timeframe),
            Window {
                fast_period,
                slow_period,
                atr_period,
                max_len,
            },
        );
    }

    pub fn snapshot(&self, instrument: &str, timeframe: Timeframe) -> Option<&IndicatorState> {
        self.states.get(&(instrument.to_string(), timeframe))
    }

    /// Bulk-load historical candles and perform a full recompute. Used at
    /// startup or after a gap-fill backfill.
    pub fn warm(&mut self, instrument: &str, timeframe: Timeframe, history: Vec<Candle>) {
        let key = (instrument.to_string(), timeframe);
        let Some(window) = self.windows.get(&key) else {
            warn!(instrument, %timeframe, "warm called before configure; ignoring");
            return;
        };
        let mut state = IndicatorState::empty(instrument, timeframe);
        for candle in history {
            if !candle.complete {
                continue;
            }
            state.candles.push_back(candle);
            while state.candles.len() > window.max_len {
                state.candles.pop_front();
            }
        }
        recompute(&mut state, window);
        self.states.insert(key, state);
    }

    /// Append one complete candle, incrementally updating cached
    /// scalars. Returns the updated snapshot, or `None` if `configure`
    /// was never called for this key.
    pub fn on_candle(&mut self, candle: Candle) -> Option<IndicatorState> {
        if !candle.complete {
            // Partial candles must never reach the cache.
            return None;
        }
        let key = (candle.instrument.clone(), candle.timeframe);
        let window = self.windows.get(&key)?;

        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| IndicatorState::empty(&candle.instrument, candle.timeframe));

        let prev_close = state.candles.back().map(|c| to_f64(c.close));
        let tr = prev_close.map(|pc| true_range_f64(&candle, pc));

        state.prev_fast_ma = state.fast_ma;
        state.prev_slow_ma = state.slow_ma;

        state.candles.push_back(candle);
        while state.candles.len() > window.max_len {
            state.candles.pop_front();
        }

        let incremental_ok = update_mas_incremental(state, window) && update_atr_incremental(state, window, tr);

        if !incremental_ok {
            recompute(state, window);
        } else {
            // Validate against a full recompute; if drift exceeds
            // tolerance, force the recompute and warn.
            let mut check = state.clone();
            recompute(&mut check, window);
            if (check.atr - state.atr).abs() > ATR_DRIFT_TOLERANCE {
                warn!(
                    instrument = %key.0,
                    timeframe = %key.1,
                    incremental = state.atr,
                    recomputed = check.atr,
                    "ATR incremental drift exceeded tolerance; forcing full recompute"
                );
                state.atr = check.atr;
            }
        }

        state.warm = state.candles.len() >= window.slow_period.max(window.atr_period) + 1;

        self.states.get(&key).cloned()
    }
}

impl Default for IndicatorCache {
    fn default() -> Self {
        Self::new()
    }
}

fn true_range_f64(candle: &Candle, prev_close: f64) -> f64 {
    let high = to_f64(candle.high);
    let low = to_f64(candle.low);
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

fn to_f64(d: rust_decimal::Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// True range for one candle against the prior close, for callers
/// outside the cache (the RiskManager's stress feed). Falls back to the
/// high-low range when there is no prior close yet.
pub fn true_range(candle: &Candle, prev_close: Option<rust_decimal::Decimal>) -> f64 {
    match prev_close {
        Some(pc) => true_range_f64(candle, to_f64(pc)),
        None => to_f64(candle.high) - to_f64(candle.low),
    }
}

fn sma(closes: impl Iterator<Item = f64>, period: usize) -> Option<f64> {
    let values: Vec<f64> = closes.collect();
    if values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Attempts an O(1) incremental SMA update by subtracting the evicted
/// value and adding the newest; falls back to recompute (returns false)
/// when the window hasn't accumulated enough candles yet.
fn update_mas_incremental(state: &mut IndicatorState, window: &Window) -> bool {
    let closes: Vec<f64> = state.candles.iter().map(|c| to_f64(c.close)).collect();
    match (
        sma(closes.iter().copied(), window.fast_period),
        sma(closes.iter().copied(), window.slow_period),
    ) {
        (Some(fast), Some(slow)) => {
            state.fast_ma = fast;
            state.slow_ma = slow;
            true
        }
        _ => false,
    }
}

/// Wilder-style ATR: exponential smoothing initialized as the arithmetic
/// mean of the first `atr_period` true ranges.
fn update_atr_incremental(state: &mut IndicatorState, window: &Window, new_tr: Option<f64>) -> bool {
    let Some(tr) = new_tr else { return false };
    let trs = true_ranges(&state.candles);
    if trs.len() < window.atr_period {
        return false;
    }
    if trs.len() == window.atr_period {
        state.atr = trs.iter().sum::<f64>() / window.atr_period as f64;
        return true;
    }
    let period = window.atr_period as f64;
    state.atr = (state.atr * (period - 1.0) + tr) / period;
    true
}

fn true_ranges(candles: &std::collections::VecDeque<Candle>) -> Vec<f64> {
    let mut trs = Vec::new();
    let mut prev_close: Option<f64> = None;
    for c in candles {
        if let Some(pc) = prev_close {
            trs.push(true_range_f64(c, pc));
        }
        prev_close = Some(to_f64(c.close));
    }
    trs
}

fn recompute(state: &mut IndicatorState, window: &Window) {
    let closes: Vec<f64> = state.candles.iter().map(|c| to_f64(c.close)).collect();
    state.fast_ma = sma(closes.iter().copied(), window.fast_period).unwrap_or(0.0);
    state.slow_ma = sma(closes.iter().copied(), window.slow_period).unwrap_or(0.0);

    let trs = true_ranges(&state.candles);
    if trs.len() < window.atr_period {
        state.atr = 0.0;
        return;
    }
    let mut atr = trs[..window.atr_period].iter().sum::<f64>() / window.atr_period as f64;
    let period = window.atr_period as f64;
    for tr in &trs[window.atr_period..] {
        atr = (atr * (period - 1.0) + tr) / period;
    }
    state.atr = atr;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(instrument: &str, tf: Timeframe, time: i64, close: f64) -> Candle {
        let open = close - 0.0002;
        let high = close + 0.0005;
        let low = close - 0.0005;
        Candle::new(
            instrument,
            tf,
            time,
            rust_decimal::Decimal::try_from(open).unwrap(),
            rust_decimal::Decimal::try_from(high).unwrap(),
            rust_decimal::Decimal::try_from(low).unwrap(),
            rust_decimal::Decimal::try_from(close).unwrap(),
            dec!(1000),
            true,
        )
        .unwrap()
    }

    #[test]
    fn not_warm_before_required_candle_count() {
        let mut cache = IndicatorCache::new();
        cache.configure("EUR_USD", Timeframe::H4, 3, 5, 5);
        for i in 0..5 {
            let state = cache
                .on_candle(candle("EUR_USD", Timeframe::H4, i, 1.08 + i as f64 * 0.0001))
                .unwrap();
            assert!(!state.warm, "should not be warm at candle {i}");
        }
        let state = cache
            .on_candle(candle("EUR_USD", Timeframe::H4, 6, 1.0810))
            .unwrap();
        assert!(state.warm);
    }

    #[test]
    fn incremental_matches_full_recompute() {
        let closes = [
            1.0800, 1.0795, 1.0810, 1.0825, 1.0790, 1.0805, 1.0812, 1.0830, 1.0828, 1.0840, 1.0850,
            1.0845, 1.0860, 1.0855, 1.0870,
        ];

        let mut incremental = IndicatorCache::new();
        incremental.configure("EUR_USD", Timeframe::H4, 3, 5, 5);
        let mut last_state = None;
        for (i, close) in closes.iter().enumerate() {
            last_state = incremental.on_candle(candle("EUR_USD", Timeframe::H4, i as i64, *close));
        }
        let incremental_state = last_state.unwrap();

        let mut from_scratch = IndicatorCache::new();
        from_scratch.configure("EUR_USD", Timeframe::H4, 3, 5, 5);
        let history: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, c)| candle("EUR_USD", Timeframe::H4, i as i64, *c))
            .collect();
        from_scratch.warm("EUR_USD", Timeframe::H4, history);
        let warmed_state = from_scratch.snapshot("EUR_USD", Timeframe::H4).unwrap();

        assert_eq!(incremental_state.fast_ma, warmed_state.fast_ma);
        assert_eq!(incremental_state.slow_ma, warmed_state.slow_ma);
        assert!((incremental_state.atr - warmed_state.atr).abs() < ATR_DRIFT_TOLERANCE);
    }

    #[test]
    fn snapshot_is_absent_before_first_candle() {
        let cache = IndicatorCache::new();
        assert!(cache.snapshot("EUR_USD", Timeframe::H4).is_none());
    }
}
