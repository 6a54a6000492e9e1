use crate::domain::trading::Signal;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// JSON wire shape handed to webhook channels. Field names match the
/// consumer-facing contract exactly; `id` repeats across retries so
/// consumers can treat redelivery as idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPayload {
    pub id: uuid::Uuid,
    pub strategy_id: String,
    pub instrument: String,
    pub timeframe: String,
    pub direction: String,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub atr: Decimal,
    pub emergency_level: u8,
    pub size_multiplier: Decimal,
    pub bar_open_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&Signal> for SignalPayload {
    fn from(signal: &Signal) -> Self {
        Self {
            id: signal.id,
            strategy_id: signal.strategy_id.clone(),
            instrument: signal.instrument.clone(),
            timeframe: signal.timeframe.to_string(),
            direction: signal.direction.to_string(),
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            atr: signal.atr_at_signal,
            emergency_level: signal.emergency_level_at_signal,
            size_multiplier: signal.position_size_multiplier,
            bar_open_time: signal.bar_open_time,
            created_at: signal.created_at,
        }
    }
}
