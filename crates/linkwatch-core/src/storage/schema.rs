pub const SCHEMA_VERSION: &str = "1.0.0";

/// Storage-side clock, millisecond precision. Fixed width, so text order is time order.
pub const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS targets (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  url TEXT NOT NULL UNIQUE CHECK (length(url) > 0),
  name TEXT,
  timeout_seconds INTEGER NOT NULL DEFAULT 10 CHECK (timeout_seconds > 0),
  active INTEGER NOT NULL DEFAULT 1,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  last_checked_at TEXT
);

CREATE TABLE IF NOT EXISTS check_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  target_id INTEGER NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
  status_code INTEGER,
  response_time_ms REAL,
  is_up INTEGER NOT NULL,
  error_message TEXT,
  checked_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS system_info (
  key TEXT PRIMARY KEY,
  value TEXT,
  updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_check_results_target_id ON check_results(target_id);
CREATE INDEX IF NOT EXISTS idx_check_results_checked_at ON check_results(checked_at);
CREATE INDEX IF NOT EXISTS idx_targets_active ON targets(active);
"#;
