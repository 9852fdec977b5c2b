use crate::errors::StoreError;
use crate::model::{
    round2, CheckResult, NewTarget, ProbeOutcome, StoreStats, Target, TargetKey, TargetStatus,
    TargetUpdate, UptimeStats, DEFAULT_TIMEOUT_SECS,
};
use crate::storage::schema::{DDL, NOW_SQL, SCHEMA_VERSION};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Result<T> = std::result::Result<T, StoreError>;

const TARGET_COLUMNS: &str =
    "t.id, t.url, t.name, t.timeout_seconds, t.active, t.created_at, t.updated_at, t.last_checked_at";

const RESULT_COLUMNS: &str =
    "id, target_id, status_code, response_time_ms, is_up, error_message, checked_at";

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub busy_timeout: Duration,
    /// Read-only connections opened next to the writer. Ignored for in-memory stores.
    pub read_connections: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(30),
            read_connections: 4,
        }
    }
}

/// SQLite-backed store for targets and their check history.
///
/// All writes go through one connection guarded by a mutex and run inside an
/// immediate transaction, so a writer never observes another writer's partial
/// state. File-backed stores run in WAL mode and serve reads from a small pool
/// of read-only connections, which keeps status queries flowing while a check
/// cycle is writing.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    readers: Arc<Vec<Mutex<Connection>>>,
    next_reader: Arc<AtomicUsize>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &StoreOptions::default())
    }

    pub fn open_with(path: &Path, opts: &StoreOptions) -> Result<Self> {
        if path.as_os_str() == ":memory:" {
            return Self::memory();
        }

        let conn = Connection::open(path)?;
        configure(&conn, opts.busy_timeout)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL")?;

        let mut readers = Vec::with_capacity(opts.read_connections);
        for _ in 0..opts.read_connections {
            let reader = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            configure(&reader, opts.busy_timeout)?;
            readers.push(Mutex::new(reader));
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            readers: Arc::new(readers),
            next_reader: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn memory() -> Result<Self> {
        // SQLite in-memory DB; every query shares the single connection
        let conn = Connection::open_in_memory()?;
        configure(&conn, Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            readers: Arc::new(Vec::new()),
            next_reader: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.write(|tx| {
            tx.execute_batch(DDL)?;
            tx.execute(
                &format!(
                    "INSERT INTO system_info (key, value, updated_at) VALUES ('schema_version', ?1, {now})
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    now = NOW_SQL
                ),
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        })?;
        tracing::debug!(event = "schema_ready", version = SCHEMA_VERSION);
        Ok(())
    }

    /// Runs `f` inside an immediate transaction on the writer connection.
    ///
    /// Commits when `f` returns `Ok`. Any `Err` (or a panic) drops the
    /// transaction, which rolls it back. A panic leaves the writer usable for
    /// later calls.
    pub fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock_writer();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Runs `f` on a read connection. Prefers an idle pooled reader and
    /// falls back to waiting on one; in-memory stores use the writer.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let n = self.readers.len();
        if n == 0 {
            let conn = self.lock_writer();
            return f(&conn);
        }
        let start = self.next_reader.fetch_add(1, Ordering::Relaxed);
        for i in 0..n {
            if let Ok(conn) = self.readers[(start + i) % n].try_lock() {
                return f(&conn);
            }
        }
        let conn = self.readers[start % n]
            .lock()
            .map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    /// A poisoned writer is still consistent: the panicking holder's
    /// transaction was rolled back when its guard dropped.
    fn lock_writer(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // targets

    pub fn add_target(&self, new: &NewTarget) -> Result<i64> {
        let url = new.url.trim();
        if url.is_empty() {
            return Err(StoreError::Invalid("url must not be empty".into()));
        }
        let timeout = new.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout == 0 {
            return Err(StoreError::Invalid("timeout_seconds must be positive".into()));
        }

        // The UNIQUE constraint decides; no read-before-insert.
        let id = self.write(|tx| {
            let inserted = tx.execute(
                &format!(
                    "INSERT INTO targets (url, name, timeout_seconds, active, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, {now}, {now})",
                    now = NOW_SQL
                ),
                params![url, new.name, timeout, new.active],
            );
            match inserted {
                Ok(_) => Ok(tx.last_insert_rowid()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Err(StoreError::Duplicate {
                        url: url.to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        });

        match &id {
            Ok(id) => tracing::info!(event = "target_added", id, url),
            Err(StoreError::Duplicate { .. }) => {
                tracing::warn!(event = "target_duplicate", url, "URL already exists")
            }
            Err(_) => {}
        }
        id
    }

    pub fn get_target(&self, id: i64) -> Result<Option<Target>> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM targets t WHERE t.id = ?1", TARGET_COLUMNS),
                params![id],
                target_from_row,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_target_by_url(&self, url: &str) -> Result<Option<Target>> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM targets t WHERE t.url = ?1", TARGET_COLUMNS),
                params![url.trim()],
                target_from_row,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn list_targets(&self, active_only: bool) -> Result<Vec<Target>> {
        let filter = if active_only { "WHERE t.active = 1" } else { "" };
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM targets t {} ORDER BY t.id",
                TARGET_COLUMNS, filter
            ))?;
            let rows = stmt
                .query_map([], target_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Applies the fields set in `update` and bumps `updated_at`.
    /// Returns `false` when no target has this id.
    pub fn update_target(&self, id: i64, update: &TargetUpdate) -> Result<bool> {
        if update.timeout_seconds == Some(0) {
            return Err(StoreError::Invalid("timeout_seconds must be positive".into()));
        }

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(name) = &update.name {
            sets.push("name = ?".into());
            values.push(Box::new(name.clone()));
        }
        if let Some(timeout) = update.timeout_seconds {
            sets.push("timeout_seconds = ?".into());
            values.push(Box::new(timeout));
        }
        if let Some(active) = update.active {
            sets.push("active = ?".into());
            values.push(Box::new(active));
        }
        if let Some(checked) = &update.last_checked_at {
            sets.push("last_checked_at = ?".into());
            values.push(Box::new(checked.map(format_ts)));
        }
        sets.push(format!("updated_at = {}", NOW_SQL));
        values.push(Box::new(id));

        let sql = format!("UPDATE targets SET {} WHERE id = ?", sets.join(", "));
        let changed = self.write(|tx| {
            let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            Ok(tx.execute(&sql, refs.as_slice())?)
        })?;

        if changed > 0 {
            tracing::info!(event = "target_updated", id);
        } else {
            tracing::warn!(event = "target_missing", id, "target not found for update");
        }
        Ok(changed > 0)
    }

    /// Deletes the target and, through the foreign key, its history.
    pub fn delete_target(&self, key: &TargetKey) -> Result<bool> {
        let deleted = self.write(|tx| {
            let n = match key {
                TargetKey::Id(id) => tx.execute("DELETE FROM targets WHERE id = ?1", params![id])?,
                TargetKey::Url(url) => {
                    tx.execute("DELETE FROM targets WHERE url = ?1", params![url.trim()])?
                }
            };
            Ok(n)
        })?;

        if deleted > 0 {
            tracing::info!(event = "target_deleted", target = %key);
        } else {
            tracing::warn!(event = "target_missing", target = %key, "target not found for deletion");
        }
        Ok(deleted > 0)
    }

    // history

    /// Appends a check result and stamps the target's `last_checked_at` with
    /// the same storage-side timestamp, in one transaction.
    pub fn save_result(&self, target_id: i64, outcome: &ProbeOutcome) -> Result<i64> {
        self.write(|tx| {
            let inserted = tx.execute(
                &format!(
                    "INSERT INTO check_results
                       (target_id, status_code, response_time_ms, is_up, error_message, checked_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, {now})",
                    now = NOW_SQL
                ),
                params![
                    target_id,
                    outcome.status_code,
                    outcome.response_time_ms,
                    outcome.is_up,
                    outcome.error_message
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
                {
                    return Err(StoreError::NotFound(target_id));
                }
                Err(e) => return Err(e.into()),
            }
            let check_id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE targets
                 SET last_checked_at = (SELECT checked_at FROM check_results WHERE id = ?1)
                 WHERE id = ?2",
                params![check_id, target_id],
            )?;
            Ok(check_id)
        })
    }

    pub fn get_latest_status(&self, target_id: i64) -> Result<Option<TargetStatus>> {
        self.read(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {cols}, c.status_code, c.response_time_ms, c.is_up, c.error_message, c.checked_at
                     FROM targets t
                     LEFT JOIN check_results c ON c.id = (
                         SELECT id FROM check_results
                         WHERE target_id = t.id
                         ORDER BY checked_at DESC, id DESC
                         LIMIT 1
                     )
                     WHERE t.id = ?1",
                    cols = TARGET_COLUMNS
                ),
                params![target_id],
                status_from_row,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_all_status(&self) -> Result<Vec<TargetStatus>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {cols}, latest.status_code, latest.response_time_ms, latest.is_up,
                        latest.error_message, latest.checked_at
                 FROM targets t
                 LEFT JOIN (
                     SELECT target_id, status_code, response_time_ms, is_up, error_message, checked_at,
                            ROW_NUMBER() OVER (
                                PARTITION BY target_id ORDER BY checked_at DESC, id DESC
                            ) AS rn
                     FROM check_results
                 ) latest ON latest.target_id = t.id AND latest.rn = 1
                 ORDER BY t.id",
                cols = TARGET_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], status_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Newest first, limited to results younger than `since` and to `limit` rows.
    pub fn get_history(
        &self,
        target_id: i64,
        since: Duration,
        limit: u32,
    ) -> Result<Vec<CheckResult>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {cols} FROM check_results
                 WHERE target_id = ?1 AND checked_at >= ?2
                 ORDER BY checked_at DESC, id DESC
                 LIMIT ?3",
                cols = RESULT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![target_id, cutoff(since), limit],
                    result_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn get_uptime_stats(&self, target_id: i64, window: Duration) -> Result<UptimeStats> {
        self.read(|conn| {
            let (total, up, avg, min, max): (i64, i64, Option<f64>, Option<f64>, Option<f64>) = conn
                .query_row(
                    &format!(
                        "SELECT
                            COUNT(*),
                            COALESCE(SUM(CASE WHEN is_up THEN 1 ELSE 0 END), 0),
                            AVG(CASE WHEN is_up AND response_time_ms IS NOT NULL THEN response_time_ms END),
                            MIN(CASE WHEN is_up AND response_time_ms IS NOT NULL THEN response_time_ms END),
                            MAX(CASE WHEN is_up AND response_time_ms IS NOT NULL THEN response_time_ms END)
                         FROM check_results
                         WHERE target_id = ?1 AND checked_at >= ?2"
                    ),
                    params![target_id, cutoff(window)],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
                )?;

            if total == 0 {
                return Ok(UptimeStats::empty(window));
            }
            let total = total as u64;
            let up = up as u64;
            Ok(UptimeStats {
                total,
                up_count: up,
                down_count: total - up,
                uptime_percent: round2(100.0 * up as f64 / total as f64),
                avg_response_ms: round2(avg.unwrap_or(0.0)),
                min_response_ms: min,
                max_response_ms: max,
                window_secs: window.as_secs(),
            })
        })
    }

    /// Deletes check results older than `retention`. Targets are untouched.
    /// Space is reclaimed afterwards on a best-effort basis.
    pub fn cleanup_old(&self, retention: Duration) -> Result<usize> {
        let deleted = self.write(|tx| {
            Ok(tx.execute(
                "DELETE FROM check_results WHERE checked_at < ?1",
                params![cutoff(retention)],
            )?)
        })?;
        tracing::info!(event = "cleanup", deleted, "cleaned up old check records");

        // VACUUM cannot run inside a transaction.
        if let Err(e) = self.lock_writer().execute_batch("VACUUM") {
            tracing::warn!(event = "vacuum_failed", error = %e);
        }
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.read(|conn| {
            let count = |sql: &str| -> rusqlite::Result<u64> {
                conn.query_row(sql, [], |r| r.get::<_, i64>(0).map(|x| x as u64))
            };
            let schema_version: Option<String> = conn
                .query_row(
                    "SELECT value FROM system_info WHERE key = 'schema_version'",
                    [],
                    |r| r.get(0),
                )
                .optional()?;
            let page_bytes: Option<u64> = conn
                .query_row(
                    "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                    [],
                    |r| r.get::<_, i64>(0).map(|x| x as u64),
                )
                .ok();

            Ok(StoreStats {
                total_targets: count("SELECT COUNT(*) FROM targets")?,
                active_targets: count("SELECT COUNT(*) FROM targets WHERE active = 1")?,
                total_checks: count("SELECT COUNT(*) FROM check_results")?,
                checks_last_24h: conn.query_row(
                    "SELECT COUNT(*) FROM check_results WHERE checked_at >= ?1",
                    params![cutoff(Duration::from_secs(24 * 3600))],
                    |r| r.get::<_, i64>(0).map(|x| x as u64),
                )?,
                db_size_bytes: page_bytes,
                schema_version,
            })
        })
    }
}

fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// Sorts before every stored timestamp.
const EARLIEST_TS: &str = "0000-01-01T00:00:00.000Z";

/// `now - age` in the stored timestamp format. Windows reaching past year 1
/// saturate to [`EARLIEST_TS`], so they cover the whole history.
fn cutoff(age: Duration) -> String {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .filter(|ts| ts.year() >= 1)
        .map(format_ts)
        .unwrap_or_else(|| EARLIEST_TS.to_string())
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<Target> {
    Ok(Target {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        timeout_seconds: row.get(3)?,
        active: row.get(4)?,
        created_at: ts_at(row, 5)?,
        updated_at: ts_at(row, 6)?,
        last_checked_at: opt_ts_at(row, 7)?,
    })
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<TargetStatus> {
    Ok(TargetStatus {
        target: target_from_row(row)?,
        status_code: row.get(8)?,
        response_time_ms: row.get(9)?,
        is_up: row.get(10)?,
        error_message: row.get(11)?,
        checked_at: opt_ts_at(row, 12)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<CheckResult> {
    Ok(CheckResult {
        id: row.get(0)?,
        target_id: row.get(1)?,
        status_code: row.get(2)?,
        response_time_ms: row.get(3)?,
        is_up: row.get(4)?,
        error_message: row.get(5)?,
        checked_at: ts_at(row, 6)?,
    })
}
