use crate::domain::errors::StoreError;
use crate::domain::market::Timeframe;
use crate::domain::repositories::{AppendOutcome, SignalStore};
use crate::domain::trading::{Direction, Signal, SignalStatus};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

pub struct SqliteSignalStore {
    database: Database,
}

impl SqliteSignalStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[allow(clippy::type_complexity)]
type SignalRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    String,
    i64,
    String,
);

fn row_to_signal(row: SignalRow) -> Result<Signal> {
    let (
        id,
        strategy_id,
        instrument,
        timeframe,
        direction,
        entry_price,
        stop_loss,
        take_profit,
        atr_at_signal,
        emergency_level_at_signal,
        position_size_multiplier,
        created_at,
        bar_open_time,
        fingerprint,
        status,
    ) = row;

    Ok(Signal {
        id: uuid::Uuid::from_str(&id)?,
        strategy_id,
        instrument,
        timeframe: Timeframe::from_str(&timeframe)?,
        direction: match direction.as_str() {
            "LONG" => Direction::Long,
            "SHORT" => Direction::Short,
            other => anyhow::bail!("unknown direction in signals row: {other}"),
        },
        entry_price: Decimal::from_str(&entry_price)?,
        stop_loss: Decimal::from_str(&stop_loss)?,
        take_profit: Decimal::from_str(&take_profit)?,
        atr_at_signal: Decimal::from_str(&atr_at_signal)?,
        emergency_level_at_signal: emergency_level_at_signal as u8,
        position_size_multiplier: Decimal::from_str(&position_size_multiplier)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        bar_open_time: DateTime::parse_from_rfc3339(&bar_open_time)?.with_timezone(&Utc),
        fingerprint: fingerprint as u64,
        status: match status.as_str() {
            "NEW" => SignalStatus::New,
            "DELIVERED" => SignalStatus::Delivered,
            "SUPPRESSED" => SignalStatus::Suppressed,
            "EXPIRED" => SignalStatus::Expired,
            other => anyhow::bail!("unknown status in signals row: {other}"),
        },
    })
}

#[async_trait]
impl SignalStore for SqliteSignalStore {
    async fn append(&self, signal: &Signal) -> Result<AppendOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO signals (
                id, strategy_id, instrument, timeframe, direction, entry_price, stop_loss,
                take_profit, atr_at_signal, emergency_level_at_signal, position_size_multiplier,
                created_at, bar_open_time, fingerprint, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(signal.id.to_string())
        .bind(&signal.strategy_id)
        .bind(&signal.instrument)
        .bind(signal.timeframe.to_string())
        .bind(signal.direction.to_string())
        .bind(signal.entry_price.to_string())
        .bind(signal.stop_loss.to_string())
        .bind(signal.take_profit.to_string())
        .bind(signal.atr_at_signal.to_string())
        .bind(signal.emergency_level_at_signal as i64)
        .bind(signal.position_size_multiplier.to_string())
        .bind(signal.created_at.to_rfc3339())
        .bind(signal.bar_open_time.to_rfc3339())
        .bind(signal.fingerprint as i64)
        .bind(signal.status.to_string())
        .execute(&self.database.pool)
        .await;

        match result {
            Ok(_) => Ok(AppendOutcome::Inserted),
            // Unique-key duplicate on append is treated as success, per the
            // idempotent-append error handling policy.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!(signal_id = %signal.id, error = %StoreError::Duplicate(signal.id), "append is a no-op replay");
                Ok(AppendOutcome::AlreadyExists)
            }
            Err(e) => Err(StoreError::Fatal { reason: e.to_string() }).context("failed to append signal"),
        }
    }

    async fn list(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Signal>> {
        let rows: Vec<SignalRow> = sqlx::query_as(
            r#"
            SELECT id, strategy_id, instrument, timeframe, direction, entry_price, stop_loss,
                   take_profit, atr_at_signal, emergency_level_at_signal, position_size_multiplier,
                   created_at, bar_open_time, fingerprint, status
            FROM signals
            WHERE created_at >= $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(since.to_rfc3339())
        .bind(limit as i64)
        .fetch_all(&self.database.pool)
        .await
        .context("failed to list signals")?;

        rows.into_iter().map(row_to_signal).collect()
    }

    async fn list_new(&self) -> Result<Vec<Signal>> {
        let rows: Vec<SignalRow> = sqlx::query_as(
            r#"
            SELECT id, strategy_id, instrument, timeframe, direction, entry_price, stop_loss,
                   take_profit, atr_at_signal, emergency_level_at_signal, position_size_multiplier,
                   created_at, bar_open_time, fingerprint, status
            FROM signals
            WHERE status = 'NEW'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.database.pool)
        .await
        .context("failed to list pending signals")?;

        rows.into_iter().map(row_to_signal).collect()
    }

    async fn update_status(&self, signal_id: uuid::Uuid, status: SignalStatus) -> Result<()> {
        sqlx::query("UPDATE signals SET status = $1 WHERE id = $2")
            .bind(status.to_string())
            .bind(signal_id.to_string())
            .execute(&self.database.pool)
            .await
            .context("failed to update signal status")?;

        Ok(())
    }

    async fn latest_bar_open_time(&self, strategy_id: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT bar_open_time FROM signals
            WHERE strategy_id = $1
            ORDER BY bar_open_time DESC
            LIMIT 1
            "#,
        )
        .bind(strategy_id)
        .fetch_optional(&self.database.pool)
        .await
        .context("failed to load latest bar open time")?;

        row.map(|(raw,)| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .context("stored bar_open_time is not valid RFC3339")
    }
}
