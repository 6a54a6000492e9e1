use crate::domain::repositories::RiskStateRepository;
use crate::domain::risk::RiskState;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

pub struct SqliteRiskStateRepository {
    database: Database,
}

impl SqliteRiskStateRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

type RiskStateRow = (String, String, String, i64, Option<String>, String);

#[async_trait]
impl RiskStateRepository for SqliteRiskStateRepository {
    async fn load(&self) -> Result<Option<RiskState>> {
        let row: Option<RiskStateRow> = sqlx::query_as(
            r#"
            SELECT id, current_value, peak_value, emergency_level, level_below_threshold_since, updated_at
            FROM risk_state
            WHERE id = 'global'
            "#,
        )
        .fetch_optional(&self.database.pool)
        .await
        .context("failed to load risk state")?;

        let Some((id, current_value, peak_value, emergency_level, level_below_threshold_since, updated_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(RiskState {
            id,
            current_value: Decimal::from_str(&current_value)?,
            peak_value: Decimal::from_str(&peak_value)?,
            emergency_level: emergency_level as u8,
            level_below_threshold_since: level_below_threshold_since
                .map(|raw| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)))
                .transpose()?,
            updated_at: DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc),
        }))
    }

    async fn save(&self, state: &RiskState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO risk_state (id, current_value, peak_value, emergency_level, level_below_threshold_since, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(id) DO UPDATE SET
                current_value = excluded.current_value,
                peak_value = excluded.peak_value,
                emergency_level = excluded.emergency_level,
                level_below_threshold_since = excluded.level_below_threshold_since,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&state.id)
        .bind(state.current_value.to_string())
        .bind(state.peak_value.to_string())
        .bind(state.emergency_level as i64)
        .bind(state.level_below_threshold_since.map(|dt| dt.to_rfc3339()))
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.database.pool)
        .await
        .context("failed to save risk state")?;

        Ok(())
    }
}
