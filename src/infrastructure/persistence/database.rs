use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Singleton database wrapper shared across all repository implementations.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema: one table per entity in the persisted
    /// state layout (candles, signals, delivery_attempts, risk_state,
    /// emergency_transitions, stress_events).
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                open_time INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT NOT NULL,
                complete BOOLEAN NOT NULL,
                PRIMARY KEY (instrument, timeframe, open_time)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create candles table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_candles_instrument_timeframe
            ON candles (instrument, timeframe, open_time);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create candle index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id TEXT PRIMARY KEY,
                strategy_id TEXT NOT NULL,
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                stop_loss TEXT NOT NULL,
                take_profit TEXT NOT NULL,
                atr_at_signal TEXT NOT NULL,
                emergency_level_at_signal INTEGER NOT NULL,
                position_size_multiplier TEXT NOT NULL,
                created_at TEXT NOT NULL,
                bar_open_time TEXT NOT NULL,
                fingerprint INTEGER NOT NULL,
                status TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create signals table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signals_created_at ON signals (created_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create signals created_at index")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signals_status ON signals (status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create signals status index")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signals_strategy_bar ON signals (strategy_id, bar_open_time);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create signals strategy/bar index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS delivery_attempts (
                signal_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                attempt_number INTEGER NOT NULL,
                scheduled_at TEXT NOT NULL,
                last_status INTEGER,
                last_error TEXT,
                next_retry_at TEXT,
                outcome TEXT NOT NULL,
                PRIMARY KEY (signal_id, channel_id, attempt_number)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create delivery_attempts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS risk_state (
                id TEXT PRIMARY KEY,
                current_value TEXT NOT NULL,
                peak_value TEXT NOT NULL,
                emergency_level INTEGER NOT NULL,
                level_below_threshold_since TEXT,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create risk_state table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emergency_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_level INTEGER NOT NULL,
                to_level INTEGER NOT NULL,
                drawdown TEXT NOT NULL,
                transitioned_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create emergency_transitions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stress_events (
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                detected_at TEXT NOT NULL,
                severity REAL NOT NULL,
                kind TEXT NOT NULL,
                PRIMARY KEY (instrument, timeframe, detected_at)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create stress_events table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_stress_events_instrument ON stress_events (instrument, detected_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create stress_events index")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
