use crate::domain::errors::BrokerError;
use crate::domain::health::HealthSnapshot;
use crate::domain::market::{Candle, Timeframe};
use async_trait::async_trait;

/// Port onto an external broker's market data API (OANDA-shaped
/// candle contract). One implementation (`infrastructure::broker`) talks
/// HTTP; tests substitute an in-memory fake.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Newest candles for `instrument`/`timeframe`, most recent `count`
    /// bars including the currently-forming one if `count` allows.
    async fn latest_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, BrokerError>;

    /// Candles strictly within `[from, to]` (unix seconds), in order.
    async fn backfill(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        from: i64,
        to: i64,
    ) -> Result<Vec<Candle>, BrokerError>;

    fn health(&self) -> HealthSnapshot;
}
