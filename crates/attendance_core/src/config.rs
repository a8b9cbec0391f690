//! Engine configuration.
//!
//! # Responsibility
//! - Provide defaults for the record store endpoint, timeouts, retry and
//!   log output.
//! - Read overrides from `ATTENDANCE_*` environment variables.
//!
//! # Invariants
//! - An override that is present but unparsable is an error, never silently
//!   replaced by the default.

use crate::logging::default_log_level;
use crate::retry::RetryPolicy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_BASE_URL: &str = "ATTENDANCE_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "ATTENDANCE_REQUEST_TIMEOUT_SECS";
pub const ENV_CHALLENGE_TTL_SECS: &str = "ATTENDANCE_CHALLENGE_TTL_SECS";
pub const ENV_STATE_DB: &str = "ATTENDANCE_STATE_DB";
pub const ENV_LOG_LEVEL: &str = "ATTENDANCE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ATTENDANCE_LOG_DIR";

const DEV_BASE_URL: &str = "http://127.0.0.1:8000";
const RELEASE_BASE_URL: &str = "https://ypg-attendance-backend-1.onrender.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHALLENGE_TTL_SECS: u64 = 120;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub challenge_ttl: Duration,
    pub refetch_retry: RetryPolicy,
    /// SQLite file for durable client state; `None` keeps it in memory.
    pub state_db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url().to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            challenge_ttl: Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECS),
            refetch_retry: RetryPolicy::default(),
            state_db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: std::env::temp_dir().join("attendance_core").join("logs"),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BASE_URL) {
            config.base_url = parse_base_url(&raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CHALLENGE_TTL_SECS) {
            config.challenge_ttl = parse_secs(ENV_CHALLENGE_TTL_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STATE_DB) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                config.state_db_path = Some(PathBuf::from(trimmed));
            }
        }

        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            config.log_level = parse_log_level(&raw)?;
        }
        if let Some(raw) = lookup(ENV_LOG_DIR) {
            config.log_dir = parse_log_dir(&raw)?;
        }

        Ok(config)
    }
}

fn default_base_url() -> &'static str {
    if cfg!(debug_assertions) {
        DEV_BASE_URL
    } else {
        RELEASE_BASE_URL
    }
}

fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: ENV_BASE_URL,
            value: raw.to_string(),
            reason: "expected an http(s) URL",
        });
    }
    Ok(trimmed.to_string())
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a positive number of seconds",
        }),
    }
}

fn parse_log_level(raw: &str) -> Result<String, ConfigError> {
    let level = raw.trim().to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(ConfigError::InvalidValue {
            key: ENV_LOG_LEVEL,
            value: raw.to_string(),
            reason: "expected one of trace/debug/info/warn/error",
        })
    }
}

fn parse_log_dir(raw: &str) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(raw.trim());
    if path.is_absolute() {
        Ok(path)
    } else {
        Err(ConfigError::InvalidValue {
            key: ENV_LOG_DIR,
            value: raw.to_string(),
            reason: "expected an absolute directory",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, EngineConfig, ENV_BASE_URL, ENV_CHALLENGE_TTL_SECS, ENV_LOG_DIR,
        ENV_LOG_LEVEL, ENV_STATE_DB,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.challenge_ttl, Duration::from_secs(120));
        assert!(config.state_db_path.is_none());
    }

    #[test]
    fn overrides_are_parsed_and_normalized() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, " https://ypg.example.org/ "),
            (ENV_CHALLENGE_TTL_SECS, "45"),
            (ENV_STATE_DB, "/var/lib/attendance/state.sqlite3"),
        ]))
        .expect("config");
        assert_eq!(config.base_url, "https://ypg.example.org");
        assert_eq!(config.challenge_ttl, Duration::from_secs(45));
        assert_eq!(
            config.state_db_path,
            Some(PathBuf::from("/var/lib/attendance/state.sqlite3"))
        );
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_CHALLENGE_TTL_SECS, "soon")]))
            .expect_err("ttl must be numeric");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_CHALLENGE_TTL_SECS,
                ..
            }
        ));
        assert!(EngineConfig::from_lookup(lookup(&[(ENV_BASE_URL, "ftp://x")])).is_err());
    }

    #[test]
    fn log_overrides_are_validated() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, " WARN "),
            (ENV_LOG_DIR, "/var/log/attendance"),
        ]))
        .expect("config");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, PathBuf::from("/var/log/attendance"));

        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "loud")])),
            Err(ConfigError::InvalidValue { key: ENV_LOG_LEVEL, .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[(ENV_LOG_DIR, "logs")])),
            Err(ConfigError::InvalidValue { key: ENV_LOG_DIR, .. })
        ));
    }
}
