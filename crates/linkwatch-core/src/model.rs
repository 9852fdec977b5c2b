use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u32 = 10;

/// A monitored URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub url: String,
    pub name: Option<String>,
    pub timeout_seconds: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Target {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

/// Input for [`crate::storage::Store::add_target`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTarget {
    pub url: String,
    pub name: Option<String>,
    pub timeout_seconds: Option<u32>,
    pub active: bool,
}

impl NewTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            timeout_seconds: None,
            active: true,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn timeout_seconds(mut self, secs: u32) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// The mutable subset of a [`Target`]. `None` leaves a column untouched.
///
/// `name` and `last_checked_at` are nullable columns, so `Some(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetUpdate {
    pub name: Option<Option<String>>,
    pub timeout_seconds: Option<u32>,
    pub active: Option<bool>,
    pub last_checked_at: Option<Option<DateTime<Utc>>>,
}

impl TargetUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.timeout_seconds.is_none()
            && self.active.is_none()
            && self.last_checked_at.is_none()
    }
}

/// Addresses a target either by row id or by its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKey {
    Id(i64),
    Url(String),
}

impl TargetKey {
    /// Numeric input is an id, anything else a URL.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(id) => TargetKey::Id(id),
            Err(_) => TargetKey::Url(raw.to_string()),
        }
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKey::Id(id) => write!(f, "ID {}", id),
            TargetKey::Url(url) => f.write_str(url),
        }
    }
}

/// One persisted probe outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: i64,
    pub target_id: i64,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub is_up: bool,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// What a single probe observed, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub is_up: bool,
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// Classifies a received HTTP status. [200, 400) is up.
    pub fn from_status(code: u16, response_time_ms: f64) -> Self {
        let is_up = (200..400).contains(&code);
        Self {
            status_code: Some(code),
            response_time_ms: Some(round2(response_time_ms)),
            is_up,
            error_message: (!is_up).then(|| format!("HTTP Status {}", code)),
        }
    }

    pub fn timed_out(response_time_ms: f64) -> Self {
        Self {
            status_code: None,
            response_time_ms: Some(round2(response_time_ms)),
            is_up: false,
            error_message: Some("Request timed out".into()),
        }
    }

    pub fn connection_error(kind: &str) -> Self {
        Self::down(format!("Connection error: {}", kind))
    }

    pub fn unexpected(detail: impl std::fmt::Display) -> Self {
        Self::down(format!("An unexpected error occurred: {}", detail))
    }

    fn down(message: String) -> Self {
        Self {
            status_code: None,
            response_time_ms: None,
            is_up: false,
            error_message: Some(message),
        }
    }
}

/// A target merged with its most recent check, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetStatus {
    #[serde(flatten)]
    pub target: Target,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub is_up: Option<bool>,
    pub error_message: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl TargetStatus {
    pub fn state(&self) -> StatusState {
        match (self.is_up, self.checked_at) {
            (Some(true), _) => StatusState::Up,
            (Some(false), Some(_)) => StatusState::Down,
            _ => StatusState::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Up,
    Down,
    Pending,
}

/// Uptime aggregation over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UptimeStats {
    pub total: u64,
    pub up_count: u64,
    pub down_count: u64,
    pub uptime_percent: f64,
    pub avg_response_ms: f64,
    pub min_response_ms: Option<f64>,
    pub max_response_ms: Option<f64>,
    pub window_secs: u64,
}

impl UptimeStats {
    pub fn empty(window: Duration) -> Self {
        Self {
            total: 0,
            up_count: 0,
            down_count: 0,
            uptime_percent: 0.0,
            avg_response_ms: 0.0,
            min_response_ms: None,
            max_response_ms: None,
            window_secs: window.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_targets: u64,
    pub active_targets: u64,
    pub total_checks: u64,
    pub checks_last_24h: u64,
    pub db_size_bytes: Option<u64>,
    pub schema_version: Option<String>,
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn days(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 86_400)
}
