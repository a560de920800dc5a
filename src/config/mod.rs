//! Engine configuration
//!
//! Loaded from a JSON file or built from defaults. Every field is optional in
//! the file; missing fields take the defaults below.

mod errors;

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::Severity;

pub use errors::{ConfigError, ConfigResult};

/// Rows per remote window; the source's native page ceiling
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Largest accepted window; window offsets must stay representable
pub const MAX_WINDOW_SIZE: usize = 1_000_000;

/// Configuration shared by every session of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rows per remote window (default 1000)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Bound on opening and running a cursor, in milliseconds (default 4000)
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    /// Remaining usage under which `usage_is_low` reports true (default 20)
    #[serde(default = "default_low_usage_threshold")]
    pub low_usage_threshold: u64,

    /// Log floor: trace, info, warn or error (default info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}
fn default_open_timeout_ms() -> u64 {
    4000
}
fn default_low_usage_threshold() -> u64 {
    20
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            open_timeout_ms: default_open_timeout_ms(),
            low_usage_threshold: default_low_usage_threshold(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.window_size == 0 {
            return Err(ConfigError::invalid("window_size", "must be > 0"));
        }
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::invalid(
                "window_size",
                format!("must be <= {}", MAX_WINDOW_SIZE),
            ));
        }
        if self.open_timeout_ms == 0 {
            return Err(ConfigError::invalid("open_timeout_ms", "must be > 0"));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::invalid(
                "log_level",
                format!("'{}' is not one of trace, info, warn, error", self.log_level),
            ));
        }
        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Parsed log floor, falling back to info
    pub fn severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_open_timeout_ms(mut self, open_timeout_ms: u64) -> Self {
        self.open_timeout_ms = open_timeout_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window_size, 1000);
        assert_eq!(config.open_timeout(), Duration::from_secs(4));
        assert_eq!(config.low_usage_threshold, 20);
        assert_eq!(config.severity(), Severity::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let file = write_config(r#"{"window_size": 250, "log_level": "warn"}"#);
        let config = EngineConfig::load(file.path()).unwrap();

        assert_eq!(config.window_size, 250);
        assert_eq!(config.open_timeout_ms, 4000);
        assert_eq!(config.severity(), Severity::Warn);
    }

    #[test]
    fn test_zero_window_rejected() {
        let file = write_config(r#"{"window_size": 0}"#);
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "window_size", .. }));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let config = EngineConfig::default().with_window_size(usize::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "window_size", .. })
        ));
        assert!(EngineConfig::default()
            .with_window_size(MAX_WINDOW_SIZE)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let file = write_config(r#"{"log_level": "verbose"}"#);
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_bad_json_and_missing_file() {
        let file = write_config("{not json");
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::load(Path::new("/nonexistent/pagedsearch.json")),
            Err(ConfigError::Read(_))
        ));
    }
}
