use crate::domain::delivery::{DeliveryAttempt, DeliveryOutcome};
use crate::domain::repositories::DeliveryAttemptRepository;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct SqliteDeliveryAttemptRepository {
    database: Database,
}

impl SqliteDeliveryAttemptRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[allow(clippy::type_complexity)]
type AttemptRow = (String, String, i64, String, Option<i64>, Option<String>, Option<String>, String);

fn row_to_attempt(row: AttemptRow) -> Result<DeliveryAttempt> {
    let (signal_id, channel_id, attempt_number, scheduled_at, last_status, last_error, next_retry_at, outcome) = row;

    Ok(DeliveryAttempt {
        signal_id: uuid::Uuid::parse_str(&signal_id)?,
        channel_id,
        attempt_number: attempt_number as u32,
        scheduled_at: DateTime::parse_from_rfc3339(&scheduled_at)?.with_timezone(&Utc),
        last_status: last_status.map(|s| s as u16),
        last_error,
        next_retry_at: next_retry_at
            .map(|raw| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)))
            .transpose()?,
        outcome: match outcome.as_str() {
            "PENDING" => DeliveryOutcome::Pending,
            "SUCCESS" => DeliveryOutcome::Success,
            "TERMINAL_FAILURE" => DeliveryOutcome::TerminalFailure,
            other => anyhow::bail!("unknown delivery outcome in row: {other}"),
        },
    })
}

fn outcome_label(outcome: DeliveryOutcome) -> &'static str {
    match outcome {
        DeliveryOutcome::Pending => "PENDING",
        DeliveryOutcome::Success => "SUCCESS",
        DeliveryOutcome::TerminalFailure => "TERMINAL_FAILURE",
    }
}

#[async_trait]
impl DeliveryAttemptRepository for SqliteDeliveryAttemptRepository {
    async fn record(&self, attempt: &DeliveryAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO delivery_attempts (
                signal_id, channel_id, attempt_number, scheduled_at, last_status, last_error, next_retry_at, outcome
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(signal_id, channel_id, attempt_number) DO UPDATE SET
                last_status = excluded.last_status,
                last_error = excluded.last_error,
                next_retry_at = excluded.next_retry_at,
                outcome = excluded.outcome
            "#,
        )
        .bind(attempt.signal_id.to_string())
        .bind(&attempt.channel_id)
        .bind(attempt.attempt_number as i64)
        .bind(attempt.scheduled_at.to_rfc3339())
        .bind(attempt.last_status.map(|s| s as i64))
        .bind(&attempt.last_error)
        .bind(attempt.next_retry_at.map(|dt| dt.to_rfc3339()))
        .bind(outcome_label(attempt.outcome))
        .execute(&self.database.pool)
        .await
        .context("failed to record delivery attempt")?;

        Ok(())
    }

    async fn for_signal(&self, signal_id: uuid::Uuid) -> Result<Vec<DeliveryAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT signal_id, channel_id, attempt_number, scheduled_at, last_status, last_error, next_retry_at, outcome
            FROM delivery_attempts
            WHERE signal_id = $1
            ORDER BY channel_id ASC, attempt_number ASC
            "#,
        )
        .bind(signal_id.to_string())
        .fetch_all(&self.database.pool)
        .await
        .context("failed to load delivery attempts")?;

        rows.into_iter().map(row_to_attempt).collect()
    }
}
