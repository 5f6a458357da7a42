//! Batch collection orchestration.
//!
//! One `run()` walks the whole source population: ask the health tracker
//! which sources are collectable, hand each partition to its collector,
//! feed every outcome back into the tracker, and fold everything into a
//! single [`RunReport`]. The run never fails: per-source failures of any
//! classification degrade counters inside the report, and only a failure
//! of the orchestrator's own bookkeeping (the status store being
//! unreachable, say) flips `success` to `false` — still returning
//! whatever partial counts were accumulated.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::error::AppError;
use crate::health::{CollectableSources, HealthSweep, ResetSummary, SourceHealth};
use crate::models::{SourceStatus, SourceType};
use crate::traits::{Clock, StatusStore, UnitCollector};

/// Errors surfaced by the orchestrator's administrative operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The health tracker rejected a configuration value.
    #[error("Invalid collection setting: {0}")]
    InvalidSetting(String),

    #[error(transparent)]
    App(#[from] AppError),
}

/// Aggregated result of one collection run. Always returned, never
/// thrown away: `success == false` is reserved for failures in the
/// orchestrator's own control flow, not ordinary per-source failures.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub total_collected: u32,
    pub total_failed: u32,
    /// Collected items per source type.
    pub by_source_type: BTreeMap<SourceType, u32>,
    pub duration_seconds: f64,
    pub sources_checked: usize,
    pub sources_collectable: usize,
    pub sources_skipped: usize,
    pub errors: Vec<String>,
}

impl RunReport {
    fn empty() -> Self {
        Self {
            success: false,
            total_collected: 0,
            total_failed: 0,
            by_source_type: SourceType::ALL.iter().map(|t| (*t, 0)).collect(),
            duration_seconds: 0.0,
            sources_checked: 0,
            sources_collectable: 0,
            sources_skipped: 0,
            errors: Vec::new(),
        }
    }
}

/// Current health snapshot across all sources.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub total_sources: usize,
    pub healthy_sources: usize,
    pub unhealthy_sources: usize,
    pub in_recovery_sources: usize,
    pub collectable_sources: usize,
    /// Registered sources per type.
    pub by_source_type: BTreeMap<SourceType, usize>,
}

/// Coordinates one collection cycle across all registered sources.
///
/// Holds the health tracker plus one [`UnitCollector`] per source type;
/// partitions are routed by the typed [`SourceType`] enum. Collectors
/// encapsulate their own retry behavior, so the orchestrator observes a
/// single outcome per source.
pub struct CollectionOrchestrator<S, K, N, V>
where
    S: StatusStore,
    K: Clock,
    N: UnitCollector,
    V: UnitCollector,
{
    health: SourceHealth<S, K>,
    newsletters: N,
    videos: V,
}

impl<S, K, N, V> CollectionOrchestrator<S, K, N, V>
where
    S: StatusStore,
    K: Clock,
    N: UnitCollector,
    V: UnitCollector,
{
    pub fn new(health: SourceHealth<S, K>, newsletters: N, videos: V) -> Self {
        Self {
            health,
            newsletters,
            videos,
        }
    }

    /// Execute one complete collection cycle.
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        tracing::info!("Starting collection run");

        let mut report = RunReport::empty();
        match self.run_inner(&mut report).await {
            Ok(()) => report.success = true,
            Err(e) => {
                tracing::error!(error = %e, "Collection run degraded by internal failure");
                report.errors.push(e.to_string());
            }
        }
        report.duration_seconds = started.elapsed().as_secs_f64();

        tracing::info!(
            success = report.success,
            collected = report.total_collected,
            failed = report.total_failed,
            duration_secs = report.duration_seconds,
            "Collection run complete"
        );
        report
    }

    async fn run_inner(&self, report: &mut RunReport) -> Result<(), AppError> {
        // Step 1: full health sweep for the report's population counts.
        let sweep = self.health.check_all_sources().await?;
        report.sources_checked = sweep.total;
        report.sources_collectable = sweep.collectable;
        report.sources_skipped = sweep.total - sweep.collectable;

        // Step 2: the actionable subset. An empty run is not an error.
        let collectable = self.health.get_collectable_sources().await?;
        if collectable.sources.is_empty() {
            tracing::warn!("No collectable sources available");
            return Ok(());
        }

        // Step 3: partition by source type.
        let (newsletter_sources, video_sources): (Vec<_>, Vec<_>) = collectable
            .sources
            .into_iter()
            .partition(|s| s.source_type == SourceType::Newsletter);

        // Step 4/5: collect each partition sequentially, feeding outcomes
        // back into the tracker.
        self.collect_partition(
            &self.newsletters,
            SourceType::Newsletter,
            &newsletter_sources,
            report,
        )
        .await?;
        self.collect_partition(&self.videos, SourceType::VideoChannel, &video_sources, report)
            .await?;

        Ok(())
    }

    /// Run one collector over its partition, one source at a time.
    ///
    /// Collector failures are per-source outcomes: counted, recorded in
    /// the tracker, appended to the error list, and never propagated.
    /// Only tracker/store errors bubble up from here.
    async fn collect_partition<U: UnitCollector>(
        &self,
        collector: &U,
        kind: SourceType,
        sources: &[SourceStatus],
        report: &mut RunReport,
    ) -> Result<(), AppError> {
        tracing::debug!(%kind, count = sources.len(), "Collecting partition");

        for source in sources {
            match collector.attempt(&source.source_id).await {
                Ok(()) => {
                    if self
                        .health
                        .mark_success(&source.source_id)
                        .await?
                        .is_not_found()
                    {
                        tracing::warn!(source_id = %source.source_id, "Collected source has no status record");
                    }
                    report.total_collected += 1;
                    *report.by_source_type.entry(kind).or_insert(0) += 1;
                    tracing::info!(%kind, source_id = %source.source_id, "Collected from source");
                }
                Err(err) => {
                    let message = err.to_string();
                    if self
                        .health
                        .mark_failure(&source.source_id, &message)
                        .await?
                        .is_not_found()
                    {
                        tracing::warn!(source_id = %source.source_id, "Failed source has no status record");
                    }
                    report.total_failed += 1;
                    report
                        .errors
                        .push(format!("{kind} {}: {message}", source.source_id));
                    tracing::warn!(
                        %kind,
                        source_id = %source.source_id,
                        error = %message,
                        "Failed to collect from source"
                    );
                }
            }
        }
        Ok(())
    }

    /// Current health snapshot across all sources.
    pub async fn get_collection_status(&self) -> Result<CollectionStatus, OrchestratorError> {
        let sweep: HealthSweep = self.health.check_all_sources().await?;

        let mut by_source_type = BTreeMap::new();
        for detail in &sweep.sources {
            *by_source_type.entry(detail.source_type).or_insert(0) += 1;
        }

        Ok(CollectionStatus {
            total_sources: sweep.total,
            healthy_sources: sweep.healthy,
            unhealthy_sources: sweep.unhealthy,
            in_recovery_sources: sweep.in_recovery,
            collectable_sources: sweep.collectable,
            by_source_type,
        })
    }

    /// Full health sweep with per-source detail.
    pub async fn check_source_health(&self) -> Result<HealthSweep, OrchestratorError> {
        Ok(self.health.check_all_sources().await?)
    }

    /// The sources a run would attempt right now.
    pub async fn collectable_sources(&self) -> Result<CollectableSources, OrchestratorError> {
        Ok(self.health.get_collectable_sources().await?)
    }

    /// Administrative bulk reset of all failure counters.
    pub async fn reset_all_source_health(&self) -> Result<ResetSummary, OrchestratorError> {
        Ok(self.health.reset_all_failures().await?)
    }

    pub fn update_source_failure_threshold(&self, threshold: u32) -> Result<(), OrchestratorError> {
        self.health
            .update_failure_threshold(threshold)
            .map_err(|e| OrchestratorError::InvalidSetting(e.to_string()))
    }

    pub fn update_source_recovery_period(&self, hours: i64) -> Result<(), OrchestratorError> {
        self.health
            .update_recovery_hours(hours)
            .map_err(|e| OrchestratorError::InvalidSetting(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::health::HealthConfig;
    use crate::testutil::{ManualClock, MemoryStatusStore, MockCollector, make_status};

    fn orchestrator(
        store: MemoryStatusStore,
        clock: ManualClock,
        newsletters: MockCollector,
        videos: MockCollector,
    ) -> CollectionOrchestrator<MemoryStatusStore, ManualClock, MockCollector, MockCollector> {
        let health = SourceHealth::new(store, clock, HealthConfig::default());
        CollectionOrchestrator::new(health, newsletters, videos)
    }

    async fn register(store: &MemoryStatusStore, id: &str, kind: SourceType) {
        use crate::traits::StatusStore;
        store.upsert(&SourceStatus::new(id, kind)).await.unwrap();
    }

    #[tokio::test]
    async fn empty_population_is_a_successful_run() {
        let orch = orchestrator(
            MemoryStatusStore::empty(),
            ManualClock::default(),
            MockCollector::new(),
            MockCollector::new(),
        );

        let report = orch.run().await;
        assert!(report.success);
        assert_eq!(report.total_collected, 0);
        assert_eq!(report.total_failed, 0);
        assert_eq!(report.sources_checked, 0);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let store = MemoryStatusStore::empty();
        register(&store, "https://good.example/news", SourceType::Newsletter).await;
        register(&store, "https://bad.example/news", SourceType::Newsletter).await;

        let newsletters =
            MockCollector::new().fail_for("https://bad.example/news", "boom at parse time");
        let orch = orchestrator(
            store.clone(),
            ManualClock::default(),
            newsletters,
            MockCollector::new(),
        );

        let report = orch.run().await;
        assert!(report.success, "batch-level success despite one failure");
        assert_eq!(report.total_collected, 1);
        assert_eq!(report.total_failed, 1);
        assert_eq!(report.by_source_type[&SourceType::Newsletter], 1);
        assert_eq!(report.errors.len(), 1);
        assert!(
            report.errors[0].starts_with("newsletter https://bad.example/news:"),
            "unexpected error line: {}",
            report.errors[0]
        );

        // Outcomes were fed back into the tracker.
        use crate::traits::StatusStore;
        let good = store.get("https://good.example/news").await.unwrap().unwrap();
        assert_eq!(good.consecutive_failures, 0);
        assert!(good.last_success.is_some());
        let bad = store.get("https://bad.example/news").await.unwrap().unwrap();
        assert_eq!(bad.consecutive_failures, 1);
        assert!(bad.last_error.is_some());
    }

    #[tokio::test]
    async fn partitions_route_to_matching_collector() {
        let store = MemoryStatusStore::empty();
        register(&store, "https://letters.example", SourceType::Newsletter).await;
        register(&store, "https://videos.example/@chan", SourceType::VideoChannel).await;

        let newsletters = MockCollector::new();
        let videos = MockCollector::new();
        let orch = orchestrator(
            store,
            ManualClock::default(),
            newsletters.clone(),
            videos.clone(),
        );

        let report = orch.run().await;
        assert_eq!(report.total_collected, 2);
        assert_eq!(newsletters.attempts(), vec!["https://letters.example"]);
        assert_eq!(videos.attempts(), vec!["https://videos.example/@chan"]);
        assert_eq!(report.by_source_type[&SourceType::Newsletter], 1);
        assert_eq!(report.by_source_type[&SourceType::VideoChannel], 1);
    }

    #[tokio::test]
    async fn sources_in_recovery_are_not_attempted() {
        let store = MemoryStatusStore::empty();
        let clock = ManualClock::default();
        let now = clock.now();
        register(&store, "https://ok.example", SourceType::Newsletter).await;
        {
            use crate::traits::StatusStore;
            let mut locked = make_status("https://locked.example", 6, Some(now));
            locked.source_type = SourceType::Newsletter;
            store.upsert(&locked).await.unwrap();
        }

        let newsletters = MockCollector::new();
        let orch = orchestrator(store, clock, newsletters.clone(), MockCollector::new());

        let report = orch.run().await;
        assert_eq!(report.sources_checked, 2);
        assert_eq!(report.sources_collectable, 1);
        assert_eq!(report.sources_skipped, 1);
        assert_eq!(newsletters.attempts(), vec!["https://ok.example"]);
    }

    #[tokio::test]
    async fn unreachable_store_degrades_report_instead_of_panicking() {
        let store = MemoryStatusStore::failing_get_all("database connection lost");
        let orch = orchestrator(
            store,
            ManualClock::default(),
            MockCollector::new(),
            MockCollector::new(),
        );

        let report = orch.run().await;
        assert!(!report.success);
        assert_eq!(report.total_collected, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("database connection lost"));
    }

    #[tokio::test]
    async fn collection_status_counts_by_type() {
        let store = MemoryStatusStore::empty();
        register(&store, "a", SourceType::Newsletter).await;
        register(&store, "b", SourceType::Newsletter).await;
        register(&store, "c", SourceType::VideoChannel).await;

        let orch = orchestrator(
            store,
            ManualClock::default(),
            MockCollector::new(),
            MockCollector::new(),
        );

        let status = orch.get_collection_status().await.unwrap();
        assert_eq!(status.total_sources, 3);
        assert_eq!(status.healthy_sources, 3);
        assert_eq!(status.by_source_type[&SourceType::Newsletter], 2);
        assert_eq!(status.by_source_type[&SourceType::VideoChannel], 1);
    }

    #[tokio::test]
    async fn invalid_setting_updates_surface_dedicated_error() {
        let orch = orchestrator(
            MemoryStatusStore::empty(),
            ManualClock::default(),
            MockCollector::new(),
            MockCollector::new(),
        );

        assert!(matches!(
            orch.update_source_failure_threshold(0),
            Err(OrchestratorError::InvalidSetting(_))
        ));
        assert!(matches!(
            orch.update_source_recovery_period(0),
            Err(OrchestratorError::InvalidSetting(_))
        ));

        // Valid updates go through.
        orch.update_source_failure_threshold(2).unwrap();
        orch.update_source_recovery_period(48).unwrap();
    }

    #[tokio::test]
    async fn reset_passthrough_zeroes_counters() {
        let store = MemoryStatusStore::empty();
        let clock = ManualClock::default();
        let now = clock.now();
        {
            use crate::traits::StatusStore;
            store
                .upsert(&make_status("a", 4, Some(now - TimeDelta::hours(1))))
                .await
                .unwrap();
        }

        let orch = orchestrator(store, clock, MockCollector::new(), MockCollector::new());
        let summary = orch.reset_all_source_health().await.unwrap();
        assert_eq!(summary.reset, 1);

        let status = orch.get_collection_status().await.unwrap();
        assert_eq!(status.healthy_sources, 1);
    }
}
