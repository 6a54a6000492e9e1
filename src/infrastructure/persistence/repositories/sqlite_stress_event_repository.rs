use crate::domain::market::Timeframe;
use crate::domain::repositories::StressEventRepository;
use crate::domain::risk::{StressEvent, StressKind};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;

pub struct SqliteStressEventRepository {
    database: Database,
}

impl SqliteStressEventRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type StressEventRow = (String, String, String, f64, String);

fn row_to_event(row: StressEventRow) -> Result<StressEvent> {
    let (instrument, timeframe, detected_at, severity, kind) = row;

    Ok(StressEvent {
        instrument,
        timeframe: Timeframe::from_str(&timeframe)?,
        detected_at: DateTime::parse_from_rfc3339(&detected_at)?.with_timezone(&Utc),
        severity,
        kind: match kind.as_str() {
            "VOL_SPIKE" => StressKind::VolSpike,
            "GAP" => StressKind::Gap,
            "CORRELATION_BREAK" => StressKind::CorrelationBreak,
            "LIQUIDITY" => StressKind::Liquidity,
            other => anyhow::bail!("unknown stress kind in row: {other}"),
        },
    })
}

fn kind_label(kind: StressKind) -> &'static str {
    match kind {
        StressKind::VolSpike => "VOL_SPIKE",
        StressKind::Gap => "GAP",
        StressKind::CorrelationBreak => "CORRELATION_BREAK",
        StressKind::Liquidity => "LIQUIDITY",
    }
}

#[async_trait]
impl StressEventRepository for SqliteStressEventRepository {
    async fn record(&self, event: &StressEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stress_events (instrument, timeframe, detected_at, severity, kind)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(instrument, timeframe, detected_at) DO UPDATE SET
                severity = excluded.severity,
                kind = excluded.kind
            "#,
        )
        .bind(&event.instrument)
        .bind(event.timeframe.to_string())
        .bind(event.detected_at.to_rfc3339())
        .bind(event.severity)
        .bind(kind_label(event.kind))
        .execute(&self.database.pool)
        .await
        .context("failed to record stress event")?;

        Ok(())
    }

    async fn active_for(&self, instrument: &str, now: DateTime<Utc>) -> Result<Vec<StressEvent>> {
        // Callers apply the expiry window themselves (it is a RiskConfig
        // value, not known to this repository); we return everything
        // recorded for the instrument up to `now` and let the caller filter.
        let rows: Vec<StressEventRow> = sqlx::query_as(
            r#"
            SELECT instrument, timeframe, detected_at, severity, kind
            FROM stress_events
            WHERE instrument = $1 AND detected_at <= $2
            ORDER BY detected_at DESC
            "#,
        )
        .bind(instrument)
        .bind(now.to_rfc3339())
        .fetch_all(&self.database.pool)
        .await
        .context("failed to load stress events")?;

        rows.into_iter().map(row_to_event).collect()
    }
}
