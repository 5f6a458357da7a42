pub mod error;
pub mod health;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod testutil;
pub mod traits;

pub use error::AppError;
pub use health::{HealthConfig, MarkOutcome, SourceHealth};
pub use models::{ContentItem, NewContentItem, SourceStatus, SourceType, compute_hash};
pub use orchestrator::{CollectionOrchestrator, CollectionStatus, OrchestratorError, RunReport};
pub use retry::RetryPolicy;
pub use traits::{Clock, ContentStore, Fetcher, StatusStore, SystemClock, UnitCollector};
