//! Per-source health tracking with circuit-breaker semantics.
//!
//! Each source carries a consecutive-failure counter. Crossing the
//! failure threshold makes the source unhealthy and opens a recovery
//! window; while the window is open the source is skipped entirely.
//!
//! # Source states
//!
//! ```text
//! HEALTHY --[threshold failures]--> UNHEALTHY/IN_RECOVERY --[window elapses]--> UNHEALTHY/RECOVERED
//!    ^                                                                                |
//!    +----------------------------------[success]--------------------------------(attempt allowed)
//! ```
//!
//! A recovered source is collectable again but keeps its failure count:
//! one renewed failure re-opens a full recovery window. Only an actual
//! success resets the counter.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{SourceStatus, SourceType};
use crate::traits::{Clock, StatusStore};

/// Tracker-wide health thresholds.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Consecutive failures before a source is considered unhealthy.
    pub failure_threshold: u32,

    /// Hours an unhealthy source is skipped before a fresh attempt is
    /// allowed.
    pub recovery_hours: i64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_hours: 24,
        }
    }
}

/// Detailed health evaluation of one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealthDetail {
    pub source_id: String,
    pub source_type: SourceType,
    pub is_healthy: bool,
    pub is_in_recovery: bool,
    pub can_collect: bool,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub recovery_until: Option<DateTime<Utc>>,
}

/// Result of a full-population health sweep.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSweep {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub in_recovery: usize,
    pub collectable: usize,
    pub sources: Vec<SourceHealthDetail>,
}

/// The actionable subset of sources for one collection run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectableSources {
    pub total: usize,
    pub collectable: usize,
    pub skipped: usize,
    pub sources: Vec<SourceStatus>,
}

/// Summary of an administrative bulk counter reset.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResetSummary {
    pub total: usize,
    pub reset: usize,
}

/// Outcome of a `mark_success`/`mark_failure` call.
///
/// A missing record is reported explicitly rather than created on the
/// fly: registration is the only path that creates records.
#[derive(Debug, Clone)]
pub enum MarkOutcome {
    Updated(SourceHealthDetail),
    NotFound,
}

impl MarkOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MarkOutcome::NotFound)
    }
}

/// Tracks per-source health and decides which sources are collectable.
///
/// Sole writer of [`SourceStatus`] records. Generic over the status store
/// and an injected clock so recovery-window math is testable without real
/// sleeping. Thresholds are tracker-wide: updating them affects future
/// health evaluations of every source.
#[derive(Clone)]
pub struct SourceHealth<S, C>
where
    S: StatusStore,
    C: Clock,
{
    store: S,
    clock: C,
    config: Arc<Mutex<HealthConfig>>,
}

impl<S, C> SourceHealth<S, C>
where
    S: StatusStore,
    C: Clock,
{
    pub fn new(store: S, clock: C, config: HealthConfig) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(Mutex::new(config)),
        }
    }

    /// Acquires the config lock, recovering from poison if necessary.
    fn lock_config(&self) -> std::sync::MutexGuard<'_, HealthConfig> {
        self.config.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned health config mutex");
            poisoned.into_inner()
        })
    }

    pub fn config(&self) -> HealthConfig {
        self.lock_config().clone()
    }

    /// A source is healthy while its failure count is below the
    /// threshold. Healthy sources are always collectable.
    pub fn is_healthy(&self, status: &SourceStatus) -> bool {
        status.consecutive_failures < self.lock_config().failure_threshold
    }

    /// An unhealthy source is in recovery while the window opened by its
    /// most recent failure has not yet elapsed.
    pub fn is_in_recovery(&self, status: &SourceStatus) -> bool {
        let config = self.lock_config();
        if status.consecutive_failures < config.failure_threshold {
            return false;
        }
        let (Some(_), Some(last_error_at)) = (&status.last_error, status.last_error_at) else {
            return false;
        };
        let recovery_until = last_error_at + TimeDelta::hours(config.recovery_hours);
        self.clock.now() < recovery_until
    }

    /// Whether an attempt against this source is allowed right now:
    /// healthy, or unhealthy with an expired recovery window. Exiting the
    /// window does not reset the counter; only a success does.
    pub fn can_collect(&self, status: &SourceStatus) -> bool {
        if self.is_healthy(status) {
            return true;
        }
        if !self.is_in_recovery(status) {
            tracing::debug!(
                source_id = %status.source_id,
                "recovery window expired, source collectable again"
            );
            return true;
        }
        false
    }

    /// Full health evaluation of one record, no I/O.
    pub fn health_detail(&self, status: &SourceStatus) -> SourceHealthDetail {
        let is_healthy = self.is_healthy(status);
        let is_in_recovery = self.is_in_recovery(status);
        let config = self.lock_config();

        let recovery_until = if is_in_recovery {
            status
                .last_error_at
                .map(|at| at + TimeDelta::hours(config.recovery_hours))
        } else {
            None
        };

        SourceHealthDetail {
            source_id: status.source_id.clone(),
            source_type: status.source_type,
            is_healthy,
            is_in_recovery,
            can_collect: is_healthy || !is_in_recovery,
            consecutive_failures: status.consecutive_failures,
            failure_threshold: config.failure_threshold,
            last_error: status.last_error.clone(),
            last_error_at: status.last_error_at,
            recovery_until,
        }
    }

    /// Create the initial zeroed record for a source if absent.
    ///
    /// Returns `true` if a record was created. This is the only path
    /// that creates records; `mark_success`/`mark_failure` refuse to.
    pub async fn register_source(
        &self,
        source_id: &str,
        source_type: SourceType,
    ) -> Result<bool, AppError> {
        if self.store.get(source_id).await?.is_some() {
            return Ok(false);
        }
        self.store
            .upsert(&SourceStatus::new(source_id, source_type))
            .await?;
        tracing::info!(%source_id, %source_type, "Registered source");
        Ok(true)
    }

    /// Record a successful collection: reset the failure counter, clear
    /// the error, stamp success and collection times.
    pub async fn mark_success(&self, source_id: &str) -> Result<MarkOutcome, AppError> {
        let Some(mut status) = self.store.get(source_id).await? else {
            tracing::warn!(%source_id, "mark_success for unregistered source");
            return Ok(MarkOutcome::NotFound);
        };

        let now = self.clock.now();
        status.consecutive_failures = 0;
        status.last_error = None;
        status.last_error_at = None;
        status.last_success = Some(now);
        status.last_collected_at = Some(now);
        self.store.upsert(&status).await?;

        tracing::info!(%source_id, "Source marked successful, failures reset");
        Ok(MarkOutcome::Updated(self.health_detail(&status)))
    }

    /// Record a failed collection: increment the failure counter and
    /// stamp the error. Advancing `last_error_at` extends an open
    /// recovery window.
    pub async fn mark_failure(
        &self,
        source_id: &str,
        error_message: &str,
    ) -> Result<MarkOutcome, AppError> {
        let Some(mut status) = self.store.get(source_id).await? else {
            tracing::warn!(%source_id, "mark_failure for unregistered source");
            return Ok(MarkOutcome::NotFound);
        };

        let now = self.clock.now();
        status.consecutive_failures += 1;
        status.last_error = Some(error_message.to_string());
        status.last_error_at = Some(now);
        status.last_collected_at = Some(now);
        self.store.upsert(&status).await?;

        tracing::warn!(
            %source_id,
            failures = status.consecutive_failures,
            threshold = self.lock_config().failure_threshold,
            error = %error_message,
            "Source marked failed"
        );
        Ok(MarkOutcome::Updated(self.health_detail(&status)))
    }

    /// Health sweep across the whole population, with per-source detail.
    pub async fn check_all_sources(&self) -> Result<HealthSweep, AppError> {
        let all = self.store.get_all().await?;

        let mut sweep = HealthSweep {
            total: all.len(),
            healthy: 0,
            unhealthy: 0,
            in_recovery: 0,
            collectable: 0,
            sources: Vec::with_capacity(all.len()),
        };

        for status in &all {
            let detail = self.health_detail(status);
            if detail.is_healthy {
                sweep.healthy += 1;
            } else {
                sweep.unhealthy += 1;
            }
            if detail.is_in_recovery {
                sweep.in_recovery += 1;
            }
            if detail.can_collect {
                sweep.collectable += 1;
            }
            sweep.sources.push(detail);
        }

        tracing::info!(
            total = sweep.total,
            healthy = sweep.healthy,
            unhealthy = sweep.unhealthy,
            in_recovery = sweep.in_recovery,
            collectable = sweep.collectable,
            "Source health check complete"
        );
        Ok(sweep)
    }

    /// The actionable subset the orchestrator iterates.
    pub async fn get_collectable_sources(&self) -> Result<CollectableSources, AppError> {
        let all = self.store.get_all().await?;
        let total = all.len();

        let (collectable, skipped): (Vec<_>, Vec<_>) =
            all.into_iter().partition(|s| self.can_collect(s));

        tracing::info!(
            collectable = collectable.len(),
            skipped = skipped.len(),
            "Source collection filter applied"
        );

        Ok(CollectableSources {
            total,
            collectable: collectable.len(),
            skipped: skipped.len(),
            sources: collectable,
        })
    }

    /// Administrative bulk reset: zero every non-zero failure counter.
    pub async fn reset_all_failures(&self) -> Result<ResetSummary, AppError> {
        let all = self.store.get_all().await?;
        let total = all.len();
        let mut reset = 0usize;

        for mut status in all {
            if status.consecutive_failures == 0 {
                continue;
            }
            status.consecutive_failures = 0;
            status.last_error = None;
            status.last_error_at = None;
            self.store.upsert(&status).await?;
            reset += 1;
        }

        tracing::info!(total, reset, "Reset failure counters");
        Ok(ResetSummary { total, reset })
    }

    /// Update the tracker-wide failure threshold. Rejecting an invalid
    /// value leaves the previous threshold in place.
    pub fn update_failure_threshold(&self, threshold: u32) -> Result<(), AppError> {
        if threshold < 1 {
            return Err(AppError::Validation(
                "Failure threshold must be at least 1".into(),
            ));
        }
        let mut config = self.lock_config();
        tracing::info!(
            old = config.failure_threshold,
            new = threshold,
            "Updated failure threshold"
        );
        config.failure_threshold = threshold;
        Ok(())
    }

    /// Update the tracker-wide recovery window. Rejecting an invalid
    /// value leaves the previous window in place.
    pub fn update_recovery_hours(&self, hours: i64) -> Result<(), AppError> {
        if hours < 1 {
            return Err(AppError::Validation(
                "Recovery hours must be at least 1".into(),
            ));
        }
        let mut config = self.lock_config();
        tracing::info!(
            old = config.recovery_hours,
            new = hours,
            "Updated recovery period"
        );
        config.recovery_hours = hours;
        Ok(())
    }
}
