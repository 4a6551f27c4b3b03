//! Daemon configuration.
//!
//! Configuration is a small JSON document. Every field is optional and falls
//! back to its default:
//!
//! ```json
//! {
//!   "interval_secs": 10,
//!   "flush_period_secs": 10,
//!   "data_dir": "./data",
//!   "writers": ["yesno", "quartiles"]
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::writer::{Writer, writer_by_name};

/// Default window width in seconds.
pub const DEFAULT_INTERVAL_SECS: i64 = 10;

/// Settings for a timeline, its flusher, and its writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window width in seconds.
    pub interval_secs: i64,
    /// Seconds between flush passes. Defaults to the window width.
    pub flush_period_secs: Option<i64>,
    /// Directory writers store their files under.
    pub data_dir: PathBuf,
    /// Names of the writers every closed sample set is handed to.
    pub writers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            flush_period_secs: None,
            data_dir: PathBuf::from("./data"),
            writers: vec!["yesno".to_string()],
        }
    }
}

impl Config {
    /// Loads and validates configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a duration is not positive, no writers are
    /// listed, or a writer name is unknown or repeated.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs <= 0 {
            return Err(ConfigError::NonPositive {
                field: "interval_secs",
                value: self.interval_secs,
            }
            .into());
        }

        if let Some(period) = self.flush_period_secs
            && period <= 0
        {
            return Err(ConfigError::NonPositive {
                field: "flush_period_secs",
                value: period,
            }
            .into());
        }

        if self.writers.is_empty() {
            return Err(ConfigError::NoWriters.into());
        }

        // Building the writers touches no files, so this only checks names.
        self.build_writers()?;
        Ok(())
    }

    /// Returns the time between flush passes.
    #[allow(clippy::cast_sign_loss)] // Validated positive
    pub fn flush_period(&self) -> Duration {
        let secs = self.flush_period_secs.unwrap_or(self.interval_secs).max(1);
        Duration::from_secs(secs as u64)
    }

    /// Builds the configured writers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownWriter`] for an unrecognized name, or
    /// [`ConfigError::DuplicateWriter`] if a name is listed twice, since every
    /// closed sample set must reach each writer once.
    pub fn build_writers(&self) -> Result<Vec<Box<dyn Writer>>> {
        let mut seen = BTreeSet::new();
        self.writers
            .iter()
            .map(|name| {
                if !seen.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateWriter { name: name.clone() }.into());
                }
                writer_by_name(name, &self.data_dir, self.interval_secs)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsdError;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.flush_period(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("metricsd.json");
        fs::write(&path, r#"{"interval_secs": 60, "writers": ["count", "quartiles"]}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.flush_period(), Duration::from_secs(60));
        assert_eq!(config.data_dir, PathBuf::from("./data"));

        let writers = config.build_writers().unwrap();
        let names: Vec<_> = writers.iter().map(|w| w.name()).collect();
        assert_eq!(names, ["count", "quartiles"]);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = Config {
            interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            MetricsdError::Config(ConfigError::NonPositive { field: "interval_secs", .. })
        ));

        let config = Config {
            flush_period_secs: Some(-5),
            ..Config::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            MetricsdError::Config(ConfigError::NonPositive { field: "flush_period_secs", .. })
        ));

        let config = Config {
            writers: vec![],
            ..Config::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            MetricsdError::Config(ConfigError::NoWriters)
        ));

        let config = Config {
            writers: vec!["nope".to_string()],
            ..Config::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            MetricsdError::Config(ConfigError::UnknownWriter { .. })
        ));

        let config = Config {
            writers: vec!["yesno".to_string(), "count".to_string(), "yesno".to_string()],
            ..Config::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            MetricsdError::Config(ConfigError::DuplicateWriter { ref name }) if name == "yesno"
        ));
        assert!(config.build_writers().is_err());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{ interval_secs: }").unwrap();

        assert!(matches!(
            Config::load(&path).unwrap_err(),
            MetricsdError::Config(ConfigError::Parse { .. })
        ));
    }
}
