//! Error types for the metricsd buffer and its writers.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all metricsd operations.
///
/// The steady-state ingestion and extraction path never produces one of
/// these. Errors come from construction, event parsing, configuration, and
/// the writers that persist rolled-up windows.
#[derive(Error, Debug)]
pub enum MetricsdError {
    /// Error constructing a timeline.
    #[error("timeline error: {0}")]
    Timeline(#[from] TimelineError),

    /// Error parsing an event.
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// Error rolling up or persisting a sample set.
    #[error("writer error: {0}")]
    Writer(#[from] WriterError),

    /// Error loading or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error running the background flusher.
    #[error("flush error: {0}")]
    Flush(#[from] FlushError),
}

/// Errors that can occur when constructing a timeline.
#[derive(Error, Debug)]
pub enum TimelineError {
    /// The slice interval is zero or negative.
    #[error("invalid slice interval: {interval}s (must be > 0)")]
    InvalidInterval {
        /// The rejected interval, in seconds.
        interval: i64,
    },
}

/// Errors that can occur when parsing an event from its text form.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EventError {
    /// The line has no `name:value` separator.
    #[error("malformed event '{line}': expected name:value[@timestamp]")]
    Malformed {
        /// The offending input.
        line: String,
    },

    /// The metric name is empty.
    #[error("event has an empty metric name")]
    EmptyName,

    /// The value is not a number.
    #[error("invalid value '{value}' for metric '{name}'")]
    InvalidValue {
        /// The metric name.
        name: String,
        /// The unparseable value text.
        value: String,
    },

    /// The timestamp is not an integer number of seconds.
    #[error("invalid timestamp '{timestamp}' for metric '{name}'")]
    InvalidTimestamp {
        /// The metric name.
        name: String,
        /// The unparseable timestamp text.
        timestamp: String,
    },
}

/// Errors that can occur while a writer persists a rolled-up sample set.
#[derive(Error, Debug)]
pub enum WriterError {
    /// The RRD file or its directory could not be created.
    #[error("failed to create '{}': {source}", path.display())]
    Create {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The RRD file could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A data line could not be appended.
    #[error("failed to append to '{}': {source}", path.display())]
    Append {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An existing file declares different fields than the writer produces.
    #[error("'{}' has template '{existing}', writer produces '{expected}'", path.display())]
    TemplateMismatch {
        /// The file path.
        path: PathBuf,
        /// The template found in the file.
        existing: String,
        /// The template the writer produces.
        expected: String,
    },

    /// An existing file was created with a different step than the writer uses.
    #[error("'{}' has step {existing}s, writer uses {expected}s", path.display())]
    StepMismatch {
        /// The file path.
        path: PathBuf,
        /// The step found in the file.
        existing: i64,
        /// The step the writer uses.
        expected: i64,
    },

    /// The file does not look like an RRD file written by metricsd.
    #[error("'{}' is corrupted: {reason}", path.display())]
    Corrupted {
        /// The file path.
        path: PathBuf,
        /// Description of what was invalid.
        reason: String,
    },
}

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::config::Config`].
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A numeric setting is out of range.
    #[error("invalid {field}: {value} (must be > 0)")]
    NonPositive {
        /// The setting name.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// No writer is registered under this name.
    #[error("unknown writer '{name}' (available: {available})")]
    UnknownWriter {
        /// The requested writer name.
        name: String,
        /// Comma-separated list of known writer names.
        available: String,
    },

    /// A writer is listed more than once.
    #[error("writer '{name}' is configured more than once")]
    DuplicateWriter {
        /// The repeated writer name.
        name: String,
    },

    /// No writers are configured.
    #[error("at least one writer must be configured")]
    NoWriters,
}

/// Errors that can occur when starting or stopping the flusher thread.
#[derive(Error, Debug)]
pub enum FlushError {
    /// The flusher thread could not be spawned.
    #[error("failed to spawn flusher thread: {source}")]
    Spawn {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The flusher thread panicked.
    #[error("flusher thread panicked")]
    Panicked,
}

/// Type alias for `Result<T, MetricsdError>`.
pub type Result<T> = std::result::Result<T, MetricsdError>;
