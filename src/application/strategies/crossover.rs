use crate::domain::market::IndicatorState;
use crate::domain::trading::{Direction, Signal, SignalStatus, StrategyConfig};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Applies one strategy's crossover rule to its current indicator state,
/// producing at most one candidate Signal. Only warm states
/// participate; ties on both bars fall out naturally from the strict
/// inequality on the current bar.
pub fn evaluate(config: &StrategyConfig, state: &IndicatorState, now: DateTime<Utc>) -> Option<Signal> {
    if !state.warm {
        return None;
    }
    let bar = state.candles.back()?;
    if !bar.complete {
        return None;
    }

    let direction = if state.prev_fast_ma <= state.prev_slow_ma && state.fast_ma > state.slow_ma {
        Direction::Long
    } else if state.prev_fast_ma >= state.prev_slow_ma && state.fast_ma < state.slow_ma {
        Direction::Short
    } else {
        return None;
    };

    let min_atr_f64 = config.min_atr.to_f64().unwrap_or(0.0);
    if state.atr < min_atr_f64 {
        return None;
    }

    let atr_decimal = Decimal::from_f64(state.atr).unwrap_or(Decimal::ZERO);
    let entry = bar.close;
    let (stop_loss, take_profit) = match direction {
        Direction::Long => (
            entry - config.sl_atr_mult * atr_decimal,
            entry + config.tp_atr_mult * atr_decimal,
        ),
        Direction::Short => (
            entry + config.sl_atr_mult * atr_decimal,
            entry - config.tp_atr_mult * atr_decimal,
        ),
    };

    let mut signal = Signal {
        id: uuid::Uuid::new_v4(),
        strategy_id: config.id.clone(),
        instrument: config.instrument.clone(),
        timeframe: config.timeframe,
        direction,
        entry_price: entry,
        stop_loss,
        take_profit,
        atr_at_signal: atr_decimal,
        emergency_level_at_signal: 0,
        position_size_multiplier: Decimal::ONE,
        created_at: now,
        bar_open_time: DateTime::from_timestamp(bar.open_time, 0).unwrap_or(now),
        fingerprint: 0,
        status: SignalStatus::New,
    };

    if signal.reward_risk() < config.min_rr {
        return None;
    }

    signal.fingerprint = fingerprint(&config.id, &config.instrument, config.timeframe, direction, signal.bar_open_time);
    Some(signal)
}

/// Fingerprint = hash(strategy_id, instrument, timeframe, direction, bar_open_time).
pub fn fingerprint(
    strategy_id: &str,
    instrument: &str,
    timeframe: crate::domain::market::Timeframe,
    direction: Direction,
    bar_open_time: DateTime<Utc>,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    strategy_id.hash(&mut hasher);
    instrument.hash(&mut hasher);
    timeframe.to_string().hash(&mut hasher);
    (direction as u8).hash(&mut hasher);
    bar_open_time.timestamp().hash(&mut hasher);
    hasher.finish()
}
