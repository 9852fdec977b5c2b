use crate::errors::ConfigError;
use crate::model::NewTarget;
use crate::schedule::parse_hhmm;
use crate::storage::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub checker: CheckerSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    /// Wall-clock times in UTC, `HH:MM`.
    pub schedules: Vec<String>,
    pub run_on_startup: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            schedules: vec!["06:00".into(), "14:00".into(), "20:00".into()],
            run_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerSettings {
    /// Seconds; given to targets added without their own timeout.
    pub request_timeout: u32,
    pub concurrent_limit: usize,
    pub user_agent: String,
    pub verify_ssl: bool,
    pub follow_redirects: bool,
    pub max_redirects: u32,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10,
            concurrent_limit: 10,
            user_agent: format!("linkwatch/{}", env!("CARGO_PKG_VERSION")),
            verify_ssl: true,
            follow_redirects: true,
            max_redirects: 3,
        }
    }
}

impl CheckerSettings {
    /// A new target carrying the configured default timeout.
    pub fn new_target(&self, url: impl Into<String>) -> NewTarget {
        NewTarget::new(url).timeout_seconds(self.request_timeout.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub retention_days: u32,
    pub auto_cleanup: bool,
    /// Seconds a connection waits on a locked database.
    pub connection_timeout: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/linkwatch.db"),
            retention_days: 30,
            auto_cleanup: true,
            connection_timeout: 30,
        }
    }
}

impl DatabaseSettings {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_secs(self.connection_timeout),
            ..StoreOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Loads settings from a YAML file. A missing file yields the defaults.
///
/// Unknown keys are warned about, or rejected when `strict` is set.
pub fn load_settings(path: &Path, strict: bool) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(event = "config_default", path = %path.display(), "config file not found, using defaults");
        return Ok(Settings::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    Settings::from_yaml_str(&raw, strict)
        .map_err(|e| ConfigError(format!("{} (file: {})", e.0, path.display())))
}

impl Settings {
    pub fn from_yaml_str(raw: &str, strict: bool) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut ignored_keys = std::collections::BTreeSet::new();
        let deserializer = serde_yaml::Deserializer::from_str(raw);
        let settings: Settings = serde_ignored::deserialize(deserializer, |path| {
            ignored_keys.insert(path.to_string());
        })
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

        if !ignored_keys.is_empty() {
            if strict {
                return Err(ConfigError(format!(
                    "Unknown fields detected in strict mode: {:?}",
                    ignored_keys
                )));
            }
            tracing::warn!(event = "config_unknown_keys", keys = ?ignored_keys, "ignored unknown config fields");
        }
        Ok(settings)
    }

    /// Applies `LINKWATCH_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = get("LINKWATCH_DB") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(n) = get("LINKWATCH_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.checker.request_timeout = n;
        }
        if let Some(n) = get("LINKWATCH_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.checker.concurrent_limit = n;
        }
        if let Some(v) = get("LINKWATCH_LOG") {
            self.logging.level = v;
        }
        self
    }

    /// Returns every problem found; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.checker.request_timeout == 0 {
            errors.push("checker.request_timeout must be positive".to_string());
        }
        if self.checker.concurrent_limit == 0 {
            errors.push("checker.concurrent_limit must be positive".to_string());
        }
        if self.checker.user_agent.trim().is_empty() {
            errors.push("checker.user_agent must not be empty".to_string());
        }
        if self.database.retention_days == 0 {
            errors.push("database.retention_days must be positive".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            errors.push("database.path must not be empty".to_string());
        }
        if self.scheduler.enabled && self.scheduler.schedules.is_empty() {
            errors.push("scheduler.schedules must be a non-empty list".to_string());
        }
        for s in &self.scheduler.schedules {
            if parse_hhmm(s).is_none() {
                errors.push(format!("Invalid schedule format: {}", s));
            }
        }
        errors
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError(format!("invalid configuration: {}", errors.join("; "))))
        }
    }
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    let body = serde_yaml::to_string(&Settings::default())
        .map_err(|e| ConfigError(format!("failed to render sample config: {}", e)))?;
    let content = format!(
        "# linkwatch configuration. Schedules are UTC, HH:MM.\n{}",
        body
    );
    std::fs::write(path, content)
        .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
