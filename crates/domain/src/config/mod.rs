mod backend;
mod heartbeat;
mod observability;
mod store;

pub use backend::*;
pub use heartbeat::*;
pub use observability::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.store.session_key.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.session_key".into(),
                message: "session_key must not be empty".into(),
            });
        }

        // The key becomes a file name.
        if self
            .store
            .session_key
            .contains(|c: char| c == '/' || c == '\\' || c == '.')
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.session_key".into(),
                message: "session_key must not contain path separators or dots".into(),
            });
        }

        if self.store.flush_interval_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "store.flush_interval_secs".into(),
                message: "periodic flush disabled; the session is only saved on exit".into(),
            });
        }

        if self.heartbeat.enabled && self.heartbeat.interval_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "heartbeat.interval_secs".into(),
                message: "interval must be greater than 0".into(),
            });
        }

        if self.backend.base_url.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.base_url".into(),
                message: "base_url must start with http:// or https://".into(),
            });
        }

        if self.backend.timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "backend.timeout_ms".into(),
                message: "a zero timeout fails every request".into(),
            });
        }

        if self.backend.max_retries > MAX_BACKEND_RETRIES {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "backend.max_retries".into(),
                message: format!("max_retries must be at most {MAX_BACKEND_RETRIES}"),
            });
        }

        errors
    }

    /// `true` when [`Config::validate`] reports no `Error`-severity issues.
    pub fn is_valid(&self) -> bool {
        self.validate()
            .iter()
            .all(|e| e.severity != ConfigSeverity::Error)
    }
}
