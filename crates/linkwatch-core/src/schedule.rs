use crate::engine::checker::Checker;
use crate::errors::ConfigError;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::future::Future;

/// Parses `HH:MM` (24h). Returns `None` for anything else.
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let (h, m) = raw.trim().split_once(':')?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if h.is_empty() || h.len() > 2 || m.len() != 2 || !digits(h) || !digits(m) {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Daily fire times, UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    times: Vec<NaiveTime>,
}

impl Schedule {
    pub fn parse(entries: &[String]) -> Result<Self, ConfigError> {
        let mut times = Vec::with_capacity(entries.len());
        for entry in entries {
            let t = parse_hhmm(entry)
                .ok_or_else(|| ConfigError(format!("Invalid schedule format: {}", entry)))?;
            times.push(t);
        }
        if times.is_empty() {
            return Err(ConfigError("scheduler.schedules must be a non-empty list".into()));
        }
        times.sort();
        times.dedup();
        Ok(Self { times })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// The earliest fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        for t in &self.times {
            let candidate = Utc.from_utc_datetime(&today.and_time(*t));
            if candidate > now {
                return candidate;
            }
        }
        let tomorrow = (now + chrono::Duration::days(1)).date_naive();
        Utc.from_utc_datetime(&tomorrow.and_time(self.times[0]))
    }
}

/// Fires `checker.run_cycle()` at every scheduled time until `shutdown` resolves.
///
/// Each cycle runs on its own spawned task, so whatever else the runtime is
/// serving keeps going while probes are in flight. Cycles never overlap.
pub async fn run_scheduler<F>(checker: Checker, schedule: Schedule, run_on_startup: bool, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let times: Vec<String> = schedule
        .times()
        .iter()
        .map(|t| t.format("%H:%M").to_string())
        .collect();
    tracing::info!(event = "scheduler_start", schedules = ?times, "scheduler started");

    if run_on_startup && !run_cycle_task(&checker, &mut shutdown).await {
        return;
    }

    loop {
        let now = Utc::now();
        let next = schedule.next_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(event = "next_run", at = %next.to_rfc3339());

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(event = "scheduler_stopped", "scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        if !run_cycle_task(&checker, &mut shutdown).await {
            return;
        }
    }
}

/// Returns `false` once shutdown has been requested.
async fn run_cycle_task<F>(checker: &Checker, shutdown: &mut std::pin::Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    let c = checker.clone();
    let mut handle = tokio::spawn(async move { c.run_cycle().await });

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = shutdown.as_mut() => {
            tracing::info!(event = "scheduler_stopping", "waiting for running cycle to finish");
            let joined = handle.await;
            log_cycle(joined);
            tracing::info!(event = "scheduler_stopped", "scheduler stopped");
            return false;
        }
    };
    log_cycle(joined);
    true
}

fn log_cycle(joined: Result<anyhow::Result<usize>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(n)) => tracing::info!(event = "scheduled_cycle_done", checked = n),
        Ok(Err(e)) => tracing::error!(event = "scheduled_cycle_failed", error = %format!("{e:#}")),
        Err(e) => tracing::error!(event = "scheduled_cycle_panicked", error = %e),
    }
}
