use linkwatch_core::model::{days, NewTarget, ProbeOutcome, TargetKey, TargetUpdate};
use linkwatch_core::{Store, StoreError};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tempfile::tempdir;

fn open_store(dir: &tempfile::TempDir) -> anyhow::Result<(Store, std::path::PathBuf)> {
    let db_path = dir.path().join("linkwatch.db");
    let store = Store::open(&db_path)?;
    store.init_schema()?;
    Ok((store, db_path))
}

/// Shifts every stored check of `target_id` back by `age_days`.
fn backdate(db_path: &std::path::Path, target_id: i64, age_days: u32) -> anyhow::Result<()> {
    let conn = rusqlite::Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute(
        "UPDATE check_results
         SET checked_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)
         WHERE target_id = ?2",
        rusqlite::params![format!("-{} days", age_days), target_id],
    )?;
    Ok(())
}

#[test]
fn test_storage_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, db_path) = open_store(&dir)?;

    let id = store.add_target(&NewTarget::new("https://example.com").name("Example"))?;
    store.save_result(id, &ProbeOutcome::from_status(200, 41.5))?;
    store.save_result(id, &ProbeOutcome::from_status(503, 12.0))?;

    let status = store.get_latest_status(id)?.expect("status");
    assert_eq!(status.status_code, Some(503));
    assert_eq!(status.is_up, Some(false));

    // Verify via raw SQL that both rows landed
    let conn = rusqlite::Connection::open(&db_path)?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM check_results WHERE target_id = ?1",
        [id],
        |r| r.get(0),
    )?;
    assert_eq!(count, 2);

    let version: String = conn.query_row(
        "SELECT value FROM system_info WHERE key = 'schema_version'",
        [],
        |r| r.get(0),
    )?;
    assert_eq!(version, "1.0.0");
    Ok(())
}

#[test]
fn reopen_keeps_data() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = {
        let (store, path) = open_store(&dir)?;
        store.add_target(&NewTarget::new("https://a.example"))?;
        path
    };

    let store = Store::open(&db_path)?;
    store.init_schema()?;
    let targets = store.list_targets(false)?;
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].url, "https://a.example");
    Ok(())
}

#[test]
fn delete_cascades_to_history() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, db_path) = open_store(&dir)?;

    let id = store.add_target(&NewTarget::new("https://gone.example"))?;
    let keep = store.add_target(&NewTarget::new("https://stays.example"))?;
    for _ in 0..3 {
        store.save_result(id, &ProbeOutcome::from_status(200, 5.0))?;
    }
    store.save_result(keep, &ProbeOutcome::from_status(200, 5.0))?;

    assert!(store.delete_target(&TargetKey::Id(id))?);
    assert!(!store.delete_target(&TargetKey::Id(id))?);

    let conn = rusqlite::Connection::open(&db_path)?;
    let orphans: i64 = conn.query_row(
        "SELECT COUNT(*) FROM check_results WHERE target_id = ?1",
        [id],
        |r| r.get(0),
    )?;
    assert_eq!(orphans, 0);
    assert_eq!(store.get_history(keep, days(1), 10)?.len(), 1);
    Ok(())
}

#[test]
fn cleanup_removes_only_old_results() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, db_path) = open_store(&dir)?;

    let old = store.add_target(&NewTarget::new("https://old.example"))?;
    let fresh = store.add_target(&NewTarget::new("https://fresh.example"))?;
    store.save_result(old, &ProbeOutcome::from_status(200, 10.0))?;
    store.save_result(old, &ProbeOutcome::from_status(500, 10.0))?;
    store.save_result(fresh, &ProbeOutcome::from_status(200, 10.0))?;
    backdate(&db_path, old, 40)?;

    let removed = store.cleanup_old(days(30))?;
    assert_eq!(removed, 2);

    // Targets survive; only their history is pruned.
    assert!(store.get_target(old)?.is_some());
    assert!(store.get_history(old, days(365), 100)?.is_empty());
    assert_eq!(store.get_history(fresh, days(1), 100)?.len(), 1);

    // Nothing left to prune.
    assert_eq!(store.cleanup_old(days(30))?, 0);
    Ok(())
}

#[test]
fn history_and_stats_respect_window() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, db_path) = open_store(&dir)?;

    let id = store.add_target(&NewTarget::new("https://window.example"))?;
    store.save_result(id, &ProbeOutcome::from_status(500, 10.0))?;
    backdate(&db_path, id, 3)?;
    store.save_result(id, &ProbeOutcome::from_status(200, 10.0))?;

    assert_eq!(store.get_history(id, days(1), 10)?.len(), 1);
    assert_eq!(store.get_history(id, days(7), 10)?.len(), 2);

    let day = store.get_uptime_stats(id, days(1))?;
    assert_eq!(day.total, 1);
    assert_eq!(day.uptime_percent, 100.0);

    let week = store.get_uptime_stats(id, days(7))?;
    assert_eq!(week.total, 2);
    assert_eq!(week.up_count, 1);
    assert_eq!(week.down_count, 1);
    assert_eq!(week.uptime_percent, 50.0);
    Ok(())
}

#[test]
fn uptime_stats_without_history_are_zero() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, _) = open_store(&dir)?;
    let id = store.add_target(&NewTarget::new("https://quiet.example"))?;

    let stats = store.get_uptime_stats(id, days(1))?;
    assert_eq!(stats.total, 0);
    assert_eq!(stats.uptime_percent, 0.0);
    assert_eq!(stats.avg_response_ms, 0.0);
    assert_eq!(stats.min_response_ms, None);
    Ok(())
}

#[test]
fn uptime_percent_is_rounded_to_two_places() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, _) = open_store(&dir)?;
    let id = store.add_target(&NewTarget::new("https://flaky.example"))?;

    store.save_result(id, &ProbeOutcome::from_status(200, 100.0))?;
    store.save_result(id, &ProbeOutcome::from_status(200, 200.0))?;
    store.save_result(id, &ProbeOutcome::connection_error("ConnectionError"))?;

    let stats = store.get_uptime_stats(id, days(1))?;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.up_count, 2);
    assert_eq!(stats.uptime_percent, 66.67);
    // Down results carry no timing and do not pull the average.
    assert_eq!(stats.avg_response_ms, 150.0);
    assert_eq!(stats.min_response_ms, Some(100.0));
    assert_eq!(stats.max_response_ms, Some(200.0));
    Ok(())
}

#[test]
fn concurrent_adds_of_same_url_yield_one_row() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, _) = open_store(&dir)?;
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                store.add_target(&NewTarget::new("https://race.example"))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let dup = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::Duplicate { .. })))
        .count();
    assert_eq!((ok, dup), (1, 1), "{:?}", results);
    assert_eq!(store.list_targets(false)?.len(), 1);
    Ok(())
}

#[test]
fn reads_proceed_while_writes_happen() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, _) = open_store(&dir)?;
    let id = store.add_target(&NewTarget::new("https://busy.example"))?;

    let writer = {
        let store = store.clone();
        std::thread::spawn(move || -> Result<(), StoreError> {
            for i in 0..50 {
                store.save_result(id, &ProbeOutcome::from_status(200, f64::from(i)))?;
            }
            Ok(())
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || -> Result<(), StoreError> {
                for _ in 0..25 {
                    let all = store.get_all_status()?;
                    assert_eq!(all.len(), 1);
                }
                Ok(())
            })
        })
        .collect();

    writer.join().expect("writer thread")?;
    for r in readers {
        r.join().expect("reader thread")?;
    }
    assert_eq!(store.get_history(id, days(1), 100)?.len(), 50);
    Ok(())
}

#[test]
fn stats_report_counts_and_size() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, _) = open_store(&dir)?;
    let a = store.add_target(&NewTarget::new("https://a.example"))?;
    store.add_target(&NewTarget::new("https://b.example").active(false))?;
    store.save_result(a, &ProbeOutcome::from_status(200, 1.0))?;

    let stats = store.stats()?;
    assert_eq!(stats.total_targets, 2);
    assert_eq!(stats.active_targets, 1);
    assert_eq!(stats.total_checks, 1);
    assert_eq!(stats.checks_last_24h, 1);
    assert_eq!(stats.schema_version.as_deref(), Some("1.0.0"));
    assert!(stats.db_size_bytes.unwrap_or(0) > 0);
    Ok(())
}

#[test]
fn huge_windows_cover_whole_history() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, db_path) = open_store(&dir)?;
    let id = store.add_target(&NewTarget::new("https://ancient.example"))?;
    store.save_result(id, &ProbeOutcome::from_status(200, 10.0))?;
    backdate(&db_path, id, 400)?;
    store.save_result(id, &ProbeOutcome::from_status(500, 10.0))?;

    let forever = Duration::from_secs(u64::from(u32::MAX) * 3600);
    assert_eq!(store.get_history(id, forever, 10)?.len(), 2);
    assert_eq!(store.get_uptime_stats(id, forever)?.total, 2);

    let nine_millennia = days(9_000 * 365);
    assert_eq!(store.get_history(id, nine_millennia, 10)?.len(), 2);

    // A retention longer than recorded time deletes nothing.
    assert_eq!(store.cleanup_old(forever)?, 0);
    Ok(())
}

#[test]
fn latest_status_breaks_timestamp_ties_by_insert_order() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, db_path) = open_store(&dir)?;
    let id = store.add_target(&NewTarget::new("https://tie.example"))?;
    store.save_result(id, &ProbeOutcome::from_status(200, 10.0))?;
    store.save_result(id, &ProbeOutcome::from_status(500, 20.0))?;

    let conn = rusqlite::Connection::open(&db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute(
        "UPDATE check_results SET checked_at = '2026-01-01T00:00:00.000Z' WHERE target_id = ?1",
        [id],
    )?;

    let all = store.get_all_status()?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status_code, Some(500));
    assert_eq!(all[0].response_time_ms, Some(20.0));

    let one = store.get_latest_status(id)?.expect("status");
    assert_eq!(one.status_code, Some(500));
    Ok(())
}

#[test]
fn update_sets_and_clears_last_checked_at() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let (store, _) = open_store(&dir)?;
    let id = store.add_target(&NewTarget::new("https://stamp.example"))?;

    let ts = chrono::DateTime::parse_from_rfc3339("2026-03-04T05:06:07.891Z")?
        .with_timezone(&chrono::Utc);
    assert!(store.update_target(
        id,
        &TargetUpdate {
            last_checked_at: Some(Some(ts)),
            ..Default::default()
        },
    )?);
    assert_eq!(store.get_target(id)?.expect("target").last_checked_at, Some(ts));

    assert!(store.update_target(
        id,
        &TargetUpdate {
            last_checked_at: Some(None),
            ..Default::default()
        },
    )?);
    assert_eq!(store.get_target(id)?.expect("target").last_checked_at, None);
    Ok(())
}
