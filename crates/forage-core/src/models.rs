use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Kind of external content origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Newsletter,
    VideoChannel,
}

impl SourceType {
    pub const ALL: [SourceType; 2] = [SourceType::Newsletter, SourceType::VideoChannel];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Newsletter => "newsletter",
            SourceType::VideoChannel => "video-channel",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newsletter" => Ok(SourceType::Newsletter),
            "video-channel" => Ok(SourceType::VideoChannel),
            _ => Err(format!("Unknown source type: {s}")),
        }
    }
}

/// Per-source health record. One row per external source, keyed by
/// `source_id` (a URL or channel handle).
///
/// Created once when the source is registered and mutated exclusively
/// through the health tracker's `mark_success`/`mark_failure`. The record
/// is never deleted here; retention is the persistence layer's concern.
///
/// Invariant: `consecutive_failures == 0` implies `last_error.is_none()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub source_type: SourceType,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_collected_at: Option<DateTime<Utc>>,
}

impl SourceStatus {
    /// Fresh record for a newly registered source: zero failures, no
    /// history.
    pub fn new(source_id: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            source_id: source_id.into(),
            source_type,
            consecutive_failures: 0,
            last_error: None,
            last_error_at: None,
            last_success: None,
            last_collected_at: None,
        }
    }
}

/// A collected content item, as stored.
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub source_id: String,
    pub source_type: SourceType,
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    /// SHA-256 of the body, used to skip re-storing unchanged content.
    pub content_hash: String,
    pub collected_at: DateTime<Utc>,
}

/// DTO for inserting a newly collected item.
#[derive(Debug, Clone, Serialize)]
pub struct NewContentItem {
    pub source_id: String,
    pub source_type: SourceType,
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub content_hash: String,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
