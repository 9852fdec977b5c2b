use crate::config::{CheckerSettings, DatabaseSettings, Settings};
use crate::model::{days, ProbeOutcome, Target};
use crate::probe::{HttpProber, Probe, ProbeRequest};
use crate::storage::Store;
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupPolicy {
    pub enabled: bool,
    pub retention: Duration,
}

impl CleanupPolicy {
    pub fn from_settings(db: &DatabaseSettings) -> Self {
        Self {
            enabled: db.auto_cleanup,
            retention: days(db.retention_days),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            retention: days(30),
        }
    }
}

/// Runs check cycles: probe every active target, persist each outcome,
/// then prune old history.
///
/// Holds no state between cycles. Running two cycles back to back just adds
/// two rows per target.
#[derive(Clone)]
pub struct Checker {
    pub store: Store,
    pub prober: Arc<dyn Probe>,
    pub settings: CheckerSettings,
    pub cleanup: CleanupPolicy,
}

impl Checker {
    pub fn new(
        store: Store,
        prober: Arc<dyn Probe>,
        settings: CheckerSettings,
        cleanup: CleanupPolicy,
    ) -> Self {
        Self {
            store,
            prober,
            settings,
            cleanup,
        }
    }

    pub fn from_settings(store: Store, settings: &Settings) -> anyhow::Result<Self> {
        let prober = HttpProber::new(&settings.checker)?;
        Ok(Self::new(
            store,
            Arc::new(prober),
            settings.checker.clone(),
            CleanupPolicy::from_settings(&settings.database),
        ))
    }

    pub fn probe_request(&self, target: &Target) -> ProbeRequest {
        ProbeRequest {
            url: target.url.clone(),
            timeout: Duration::from_secs(u64::from(target.timeout_seconds.max(1))),
        }
    }

    /// Checks all active targets with at most `concurrent_limit` probes in
    /// flight. Returns how many targets had their result stored.
    ///
    /// Only failing to list targets is an error. Probe failures become down
    /// results; a failed save is logged and skipped.
    pub async fn run_cycle(&self) -> anyhow::Result<usize> {
        let started = Instant::now();
        tracing::info!(event = "cycle_start", "starting URL check cycle");

        let targets = self
            .store
            .list_targets(true)
            .context("failed to list active targets")?;
        if targets.is_empty() {
            tracing::info!(event = "cycle_empty", "no active URLs to check");
            return Ok(0);
        }

        let limit = self.settings.concurrent_limit.clamp(1, Semaphore::MAX_PERMITS);
        let sem = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for target in targets {
            let sem = sem.clone();
            let prober = self.prober.clone();
            let req = self.probe_request(&target);
            tasks.spawn(async move {
                let outcome = match sem.acquire_owned().await {
                    Ok(_permit) => {
                        // Inner task so a panicking probe still yields a result.
                        match tokio::spawn(async move { prober.check(&req).await }).await {
                            Ok(outcome) => outcome,
                            Err(e) => ProbeOutcome::unexpected(e),
                        }
                    }
                    Err(e) => ProbeOutcome::unexpected(e),
                };
                (target, outcome)
            });
        }

        let mut checked = 0usize;
        let mut up = 0usize;
        let mut down = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (target, outcome) = match joined {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!(event = "probe_task_failed", error = %e);
                    continue;
                }
            };
            match self.store.save_result(target.id, &outcome) {
                Ok(_) => {
                    checked += 1;
                    if outcome.is_up {
                        up += 1;
                    } else {
                        down += 1;
                    }
                }
                Err(e) => tracing::error!(
                    event = "save_failed",
                    target_id = target.id,
                    url = %target.url,
                    error = %e,
                    "error processing check result"
                ),
            }
        }

        tracing::info!(
            event = "cycle_finished",
            checked,
            up,
            down,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "URL check cycle finished"
        );

        if self.cleanup.enabled {
            tracing::info!(
                event = "cleanup_start",
                retention_secs = self.cleanup.retention.as_secs(),
                "running automatic cleanup of old records"
            );
            match self.store.cleanup_old(self.cleanup.retention) {
                Ok(removed) => tracing::info!(event = "cleanup_complete", removed),
                Err(e) => tracing::error!(event = "cleanup_failed", error = %e),
            }
        }

        Ok(checked)
    }
}
