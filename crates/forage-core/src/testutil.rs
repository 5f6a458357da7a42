//! Test utilities: mock implementations of the collaborator traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks
//! use `Arc<Mutex<_>>` for interior mutability, allowing test assertions
//! on recorded calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ContentItem, NewContentItem, SourceStatus, SourceType};
use crate::traits::{Clock, ContentStore, Fetcher, StatusStore, UnitCollector};

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Clock that only moves when told to. Starts at a fixed instant so
/// recovery-window assertions are reproducible.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Arc::new(Mutex::new(
                Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            )),
        }
    }
}

impl ManualClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// MemoryStatusStore
// ---------------------------------------------------------------------------

/// In-memory [`StatusStore`] backed by a BTreeMap (deterministic
/// iteration order for assertions).
#[derive(Clone, Default)]
pub struct MemoryStatusStore {
    records: Arc<Mutex<BTreeMap<String, SourceStatus>>>,
    get_all_error: Arc<Mutex<Option<String>>>,
}

impl MemoryStatusStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store whose `get_all` always fails, for orchestrator degradation
    /// tests.
    pub fn failing_get_all(message: &str) -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
            get_all_error: Arc::new(Mutex::new(Some(message.to_string()))),
        }
    }
}

impl StatusStore for MemoryStatusStore {
    async fn get(&self, source_id: &str) -> Result<Option<SourceStatus>, AppError> {
        Ok(self.records.lock().unwrap().get(source_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<SourceStatus>, AppError> {
        if let Some(msg) = self.get_all_error.lock().unwrap().as_ref() {
            return Err(AppError::Database(msg.clone()));
        }
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn upsert(&self, status: &SourceStatus) -> Result<(), AppError> {
        self.records
            .lock()
            .unwrap()
            .insert(status.source_id.clone(), status.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryContentStore
// ---------------------------------------------------------------------------

/// In-memory [`ContentStore`] that records saved items.
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    pub items: Arc<Mutex<Vec<ContentItem>>>,
}

impl MemoryContentStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn saved_count(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

impl ContentStore for MemoryContentStore {
    async fn save(&self, item: &NewContentItem) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        self.items.lock().unwrap().push(ContentItem {
            id,
            source_id: item.source_id.clone(),
            source_type: item.source_type,
            title: item.title.clone(),
            body: item.body.clone(),
            url: item.url.clone(),
            published_at: item.published_at,
            content_hash: item.content_hash.clone(),
            collected_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<ContentItem>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.content_hash == content_hash)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that pops from a queue of scripted responses and counts
/// invocations. An exhausted queue returns a default page.
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<Mutex<u32>>,
}

impl MockFetcher {
    pub fn new(body: &str) -> Self {
        Self::with_responses(vec![Ok(body.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockCollector
// ---------------------------------------------------------------------------

/// Mock unit collector: succeeds unless scripted to fail for a given
/// source id, and records every attempt.
#[derive(Clone, Default)]
pub struct MockCollector {
    failures: Arc<Mutex<HashMap<String, String>>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(self, source_id: &str, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(source_id.to_string(), message.to_string());
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

impl UnitCollector for MockCollector {
    async fn attempt(&self, source_id: &str) -> Result<(), AppError> {
        self.attempts.lock().unwrap().push(source_id.to_string());
        match self.failures.lock().unwrap().get(source_id) {
            Some(message) => Err(AppError::Generic(message.clone())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Build a status record with the given failure count. Keeps the
/// `failures == 0 ⇒ no error` invariant.
pub fn make_status(
    source_id: &str,
    consecutive_failures: u32,
    last_error_at: Option<DateTime<Utc>>,
) -> SourceStatus {
    SourceStatus {
        source_id: source_id.to_string(),
        source_type: SourceType::Newsletter,
        consecutive_failures,
        last_error: (consecutive_failures > 0).then(|| "boom".to_string()),
        last_error_at,
        last_success: None,
        last_collected_at: last_error_at,
    }
}
