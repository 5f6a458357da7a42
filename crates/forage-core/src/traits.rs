use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ContentItem, NewContentItem, SourceStatus};

/// Fetches raw text content (HTML, JSON) from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Key-value store of per-source health records, keyed by `source_id`.
///
/// Implementations must make `upsert` atomic per key. The health tracker
/// performs read-modify-write cycles against single keys; attempts against
/// the same source are serialized by the orchestrator's sequential
/// iteration, so no cross-key coordination is required.
pub trait StatusStore: Send + Sync + Clone {
    fn get(
        &self,
        source_id: &str,
    ) -> impl Future<Output = Result<Option<SourceStatus>, AppError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<SourceStatus>, AppError>> + Send;

    /// Insert-or-update keyed by `source_id`.
    fn upsert(&self, status: &SourceStatus) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Persists collected content items.
pub trait ContentStore: Send + Sync + Clone {
    /// Save a new item. Returns the generated UUID.
    fn save(&self, item: &NewContentItem) -> impl Future<Output = Result<Uuid, AppError>> + Send;

    /// Look up an item by its body hash, for idempotent re-collection.
    fn find_by_hash(
        &self,
        content_hash: &str,
    ) -> impl Future<Output = Result<Option<ContentItem>, AppError>> + Send;
}

/// One unit of collection against a single source.
///
/// One implementation exists per [`SourceType`](crate::models::SourceType);
/// the orchestrator routes each source partition to its collector.
/// Implementations run their own retry policy internally and surface every
/// failure — including unexpected internal ones — as an `Err` value, never
/// a panic, so the orchestrator can fold any outcome into its run report.
pub trait UnitCollector: Send + Sync {
    fn attempt(&self, source_id: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Injected time source, so recovery-window math is deterministic in tests.
pub trait Clock: Send + Sync + Clone {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock [`Clock`] for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A no-op ContentStore for use when persistence is not needed.
#[derive(Debug, Clone)]
pub struct NullContentStore;

impl ContentStore for NullContentStore {
    async fn save(&self, _item: &NewContentItem) -> Result<Uuid, AppError> {
        Ok(Uuid::nil())
    }

    async fn find_by_hash(&self, _content_hash: &str) -> Result<Option<ContentItem>, AppError> {
        Ok(None)
    }
}
