use crate::domain::market::{Candle, Timeframe};
use crate::domain::repositories::CandleRepository;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct SqliteCandleRepository {
    database: Database,
}

impl SqliteCandleRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type CandleRow = (String, String, i64, String, String, String, String, String, bool);

fn row_to_candle(row: CandleRow) -> Result<Candle> {
    let (instrument, timeframe, open_time, open, high, low, close, volume, complete) = row;
    Candle::new(
        instrument,
        Timeframe::from_str(&timeframe)?,
        open_time,
        Decimal::from_str(&open)?,
        Decimal::from_str(&high)?,
        Decimal::from_str(&low)?,
        Decimal::from_str(&close)?,
        Decimal::from_str(&volume)?,
        complete,
    )
    .context("persisted candle violates OHLC invariant")
}

#[async_trait]
impl CandleRepository for SqliteCandleRepository {
    async fn append(&self, candle: &Candle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO candles (instrument, timeframe, open_time, open, high, low, close, volume, complete)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT(instrument, timeframe, open_time) DO UPDATE SET
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume,
                complete = excluded.complete
            "#,
        )
        .bind(&candle.instrument)
        .bind(candle.timeframe.to_string())
        .bind(candle.open_time)
        .bind(candle.open.to_string())
        .bind(candle.high.to_string())
        .bind(candle.low.to_string())
        .bind(candle.close.to_string())
        .bind(candle.volume.to_string())
        .bind(candle.complete)
        .execute(&self.database.pool)
        .await
        .context("failed to append candle")?;

        Ok(())
    }

    async fn recent(&self, instrument: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let rows: Vec<CandleRow> = sqlx::query_as(
            r#"
            SELECT instrument, timeframe, open_time, open, high, low, close, volume, complete
            FROM candles
            WHERE instrument = $1 AND timeframe = $2
            ORDER BY open_time DESC
            LIMIT $3
            "#,
        )
        .bind(instrument)
        .bind(timeframe.to_string())
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("failed to load recent candles")?;

        let mut candles = rows.into_iter().map(row_to_candle).collect::<Result<Vec<_>>>()?;
        candles.reverse();
        Ok(candles)
    }
}
