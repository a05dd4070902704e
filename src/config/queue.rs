//! Queue configuration.
//!
//! Priority and fairness functions are code, not data, and are attached with
//! [`crate::builders::QueueBuilder`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable prefix read by [`QueueConfig::from_env`].
pub const ENV_PREFIX: &str = "QUEUE";

/// Serializable queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name of the queued work, used in timeout errors and logs.
    pub name: String,
    /// Maximum number of simultaneously running tasks.
    pub concurrency: usize,
    /// Run admission passes triggered by submit/resume one tick later.
    pub deferred_start: bool,
    /// Start paused.
    pub paused: bool,
    /// Maximum time a task may wait for admission, in milliseconds.
    pub waiting_timeout_ms: Option<u64>,
    /// Maximum time an admitted task may run, in milliseconds.
    pub process_timeout_ms: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "anonymous".into(),
            concurrency: 1,
            deferred_start: false,
            paused: false,
            waiting_timeout_ms: None,
            process_timeout_ms: None,
        }
    }
}

impl QueueConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".into());
        }
        if self.waiting_timeout_ms == Some(0) {
            return Err("waiting_timeout_ms must be greater than 0".into());
        }
        if self.process_timeout_ms == Some(0) {
            return Err("process_timeout_ms must be greater than 0".into());
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        Ok(())
    }

    /// Waiting timeout as a duration.
    #[must_use]
    pub fn waiting_timeout(&self) -> Option<Duration> {
        self.waiting_timeout_ms.map(Duration::from_millis)
    }

    /// Processing timeout as a duration.
    #[must_use]
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_ms.map(Duration::from_millis)
    }

    /// Parse queue configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `QUEUE_*` environment variables, reading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load configuration from `{prefix}_NAME`, `{prefix}_CONCURRENCY`,
    /// `{prefix}_DEFERRED_START`, `{prefix}_PAUSED`,
    /// `{prefix}_WAITING_TIMEOUT_MS` and `{prefix}_PROCESS_TIMEOUT_MS`.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Some(name) = read_var(prefix, "NAME") {
            cfg.name = name;
        }
        if let Some(value) = parse_var(prefix, "CONCURRENCY")? {
            cfg.concurrency = value;
        }
        if let Some(value) = parse_var(prefix, "DEFERRED_START")? {
            cfg.deferred_start = value;
        }
        if let Some(value) = parse_var(prefix, "PAUSED")? {
            cfg.paused = value;
        }
        cfg.waiting_timeout_ms = parse_var(prefix, "WAITING_TIMEOUT_MS")?.or(cfg.waiting_timeout_ms);
        cfg.process_timeout_ms = parse_var(prefix, "PROCESS_TIMEOUT_MS")?.or(cfg.process_timeout_ms);
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_var(prefix: &str, suffix: &str) -> Option<String> {
    std::env::var(format!("{prefix}_{suffix}")).ok()
}

fn parse_var<V>(prefix: &str, suffix: &str) -> Result<Option<V>, String>
where
    V: std::str::FromStr,
    V::Err: std::fmt::Display,
{
    read_var(prefix, suffix)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| format!("{prefix}_{suffix}: invalid value `{raw}`: {e}"))
        })
        .transpose()
}
