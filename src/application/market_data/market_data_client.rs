use super::client::BrokerClient;
use super::gap_detection::detect_gap;
use crate::domain::errors::BrokerError;
use crate::domain::market::{Candle, Timeframe};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Per-(instrument, timeframe) cursor plus the shared broker port. Owns
/// gap detection and bounded backfill; forwards only `complete` candles
/// in monotonic open_time order.
pub struct MarketDataClient {
    broker: Arc<dyn BrokerClient>,
    cursors: Mutex<HashMap<(String, Timeframe), i64>>,
}

impl MarketDataClient {
    pub fn new(broker: Arc<dyn BrokerClient>) -> Self {
        Self {
            broker,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn health(&self) -> crate::domain::health::HealthSnapshot {
        self.broker.health()
    }

    /// Fetches newest candles, backfills any detected gap, and returns
    /// only the `complete` candles newer than the last-forwarded one, in
    /// ascending open_time order. Incomplete (in-progress) candles are
    /// dropped: they must never trigger evaluation, and this crate has
    /// no preview consumer.
    pub async fn poll(&self, instrument: &str, timeframe: Timeframe) -> Result<Vec<Candle>, BrokerError> {
        let key = (instrument.to_string(), timeframe);
        let last_known = {
            let cursors = self.cursors.lock().await;
            cursors.get(&key).copied()
        };

        let batch = self.broker.latest_candles(instrument, timeframe, 50).await?;
        let mut complete: Vec<Candle> = batch.into_iter().filter(|c| c.complete).collect();
        complete.sort_by_key(|c| c.open_time);

        if let Some(first) = complete.first() {
            if let Some(gap) = detect_gap(last_known, timeframe, Some(first.open_time)) {
                warn!(instrument, %timeframe, from = gap.from, to = gap.to, "gap detected, backfilling");
                let mut filled = self.broker.backfill(instrument, timeframe, gap.from, gap.to).await?;
                filled.retain(|c| c.complete);
                filled.extend(complete);
                filled.sort_by_key(|c| c.open_time);
                filled.dedup_by_key(|c| c.open_time);
                complete = filled;
            }
        }

        let new_candles: Vec<Candle> = complete
            .into_iter()
            .filter(|c| last_known.is_none_or(|lk| c.open_time > lk))
            .collect();

        if let Some(newest) = new_candles.last() {
            self.cursors.lock().await.insert(key, newest.open_time);
            info!(instrument, %timeframe, count = new_candles.len(), "ingested new complete candles");
        }

        Ok(new_candles)
    }
}
