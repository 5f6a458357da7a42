use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use forage_core::error::AppError;
use forage_core::models::{ContentItem, NewContentItem, SourceType};
use forage_core::traits::ContentStore;

/// PostgreSQL repository for collected content items.
#[derive(Clone)]
pub struct ContentRepository {
    pool: Pool<Postgres>,
}

impl ContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recently collected items, newest first.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<ContentItem>, AppError> {
        let rows = sqlx::query_as::<_, ContentItemRow>(
            r#"
            SELECT id, source_id, source_type, title, body, url,
                   published_at, content_hash, collected_at
            FROM content_items
            ORDER BY collected_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ContentItemRow {
    id: Uuid,
    source_id: String,
    source_type: String,
    title: String,
    body: String,
    url: String,
    published_at: Option<DateTime<Utc>>,
    content_hash: String,
    collected_at: DateTime<Utc>,
}

impl TryFrom<ContentItemRow> for ContentItem {
    type Error = AppError;

    fn try_from(row: ContentItemRow) -> Result<Self, AppError> {
        let source_type: SourceType = row
            .source_type
            .parse()
            .map_err(|e: String| AppError::Database(e))?;
        Ok(ContentItem {
            id: row.id,
            source_id: row.source_id,
            source_type,
            title: row.title,
            body: row.body,
            url: row.url,
            published_at: row.published_at,
            content_hash: row.content_hash,
            collected_at: row.collected_at,
        })
    }
}

impl ContentStore for ContentRepository {
    async fn save(&self, item: &NewContentItem) -> Result<Uuid, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO content_items
                (source_id, source_type, title, body, url, published_at, content_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&item.source_id)
        .bind(item.source_type.as_str())
        .bind(&item.title)
        .bind(&item.body)
        .bind(&item.url)
        .bind(item.published_at)
        .bind(&item.content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.0)
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<ContentItem>, AppError> {
        let row = sqlx::query_as::<_, ContentItemRow>(
            r#"
            SELECT id, source_id, source_type, title, body, url,
                   published_at, content_hash, collected_at
            FROM content_items
            WHERE content_hash = $1
            ORDER BY collected_at DESC
            LIMIT 1
            "#,
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(TryInto::try_into).transpose()
    }
}
