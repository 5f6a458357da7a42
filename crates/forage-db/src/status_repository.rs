use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};

use forage_core::error::AppError;
use forage_core::models::{SourceStatus, SourceType};
use forage_core::traits::StatusStore;

/// PostgreSQL-backed source status store.
///
/// `upsert` is a single `INSERT ... ON CONFLICT DO UPDATE` statement, so
/// each write is atomic per `source_id` as the health tracker requires.
#[derive(Clone)]
pub struct SourceStatusRepository {
    pool: Pool<Postgres>,
}

impl SourceStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SourceStatusRow {
    source_id: String,
    source_type: String,
    consecutive_failures: i32,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_collected_at: Option<DateTime<Utc>>,
}

impl TryFrom<SourceStatusRow> for SourceStatus {
    type Error = AppError;

    fn try_from(row: SourceStatusRow) -> Result<Self, AppError> {
        let source_type: SourceType = row
            .source_type
            .parse()
            .map_err(|e: String| AppError::Database(e))?;
        Ok(SourceStatus {
            source_id: row.source_id,
            source_type,
            consecutive_failures: row.consecutive_failures.max(0) as u32,
            last_error: row.last_error,
            last_error_at: row.last_error_at,
            last_success: row.last_success,
            last_collected_at: row.last_collected_at,
        })
    }
}

impl StatusStore for SourceStatusRepository {
    async fn get(&self, source_id: &str) -> Result<Option<SourceStatus>, AppError> {
        let row = sqlx::query_as::<_, SourceStatusRow>(
            r#"
            SELECT source_id, source_type, consecutive_failures,
                   last_error, last_error_at, last_success, last_collected_at
            FROM source_status
            WHERE source_id = $1
            "#,
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_all(&self) -> Result<Vec<SourceStatus>, AppError> {
        let rows = sqlx::query_as::<_, SourceStatusRow>(
            r#"
            SELECT source_id, source_type, consecutive_failures,
                   last_error, last_error_at, last_success, last_collected_at
            FROM source_status
            ORDER BY source_type, source_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert(&self, status: &SourceStatus) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO source_status
                (source_id, source_type, consecutive_failures,
                 last_error, last_error_at, last_success, last_collected_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id) DO UPDATE SET
                source_type = EXCLUDED.source_type,
                consecutive_failures = EXCLUDED.consecutive_failures,
                last_error = EXCLUDED.last_error,
                last_error_at = EXCLUDED.last_error_at,
                last_success = EXCLUDED.last_success,
                last_collected_at = EXCLUDED.last_collected_at,
                updated_at = NOW()
            "#,
        )
        .bind(&status.source_id)
        .bind(status.source_type.as_str())
        .bind(status.consecutive_failures as i32)
        .bind(&status.last_error)
        .bind(status.last_error_at)
        .bind(status.last_success)
        .bind(status.last_collected_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(source_id = %status.source_id, "Upserted source status");
        Ok(())
    }
}
