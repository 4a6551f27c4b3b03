//! Rollup writers that persist closed sample sets.
//!
//! A [`Writer`] receives every closed [`SampleSet`] exactly once, after all of
//! its window's samples have been recorded. The built-in writers are all
//! [`RrdWriter`]s: a [`Rollup`] strategy reduces the set to a fixed-shape
//! [`RollupRecord`], which is appended to a per-metric [`RrdFile`].
//!
//! # File Layout
//!
//! ```text
//! data_dir/
//! ├── login.status/
//! │   ├── yesno.rrd
//! │   └── count.rrd
//! ├── request_ms/
//! │   └── quartiles.rrd
//! └── api%2Fusers/            <- "api/users"
//!     └── count.rrd
//! ```
//!
//! Bytes outside `[A-Za-z0-9._-]` in a metric name are written as `%XX`, so
//! distinct metrics never share a directory.

mod count;
mod quartiles;
mod yesno;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::rrd::{RrdFile, RrdHeader};
use crate::sample::SampleSet;

pub use count::{Count, CountRecord};
pub use quartiles::{Quartiles, QuartilesRecord};
pub use yesno::{YesOrNo, YesOrNoRecord};

/// Names accepted by [`writer_by_name`].
pub const WRITER_NAMES: &[&str] = &["yesno", "count", "quartiles"];

/// Retention tiers as (consolidated span in seconds, retention in seconds).
const ARCHIVE_TIERS: &[(i64, i64)] = &[
    (0, 72 * 3600),              // every step for 72 hours
    (600, 30 * 86_400),          // 10 minute averages for a month
    (8 * 3600, 5475 * 8 * 3600), // 8 hour averages for 5 years
];

/// Missed steps tolerated before a data source reads as unknown.
const HEARTBEAT_STEPS: i64 = 60;

/// Returns the heartbeat, in seconds, for data sources with a `step`-second step.
pub fn heartbeat(step: i64) -> i64 {
    step.max(1).saturating_mul(HEARTBEAT_STEPS)
}

/// Returns the `RRA:` declarations shared by the built-in rollups.
///
/// Each tier keeps the same wall-clock retention whatever the step, so a
/// 10 second step yields `RRA:AVERAGE:0.5:1:25920`, `RRA:AVERAGE:0.5:60:4320`
/// and `RRA:AVERAGE:0.5:2880:5475`.
pub fn archives(step: i64) -> Vec<String> {
    let step = step.max(1);
    ARCHIVE_TIERS
        .iter()
        .map(|&(span, retention)| {
            let steps = (span / step).max(1);
            let rows = (retention / steps.saturating_mul(step)).max(1);
            format!("RRA:AVERAGE:0.5:{steps}:{rows}")
        })
        .collect()
}

/// Consumes closed sample sets and persists a derived record for each.
pub trait Writer: Send + Sync + Debug {
    /// Returns the writer's stable name.
    fn name(&self) -> &str;

    /// Derives a record from `set` and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    fn rollup(&self, set: &SampleSet) -> Result<()>;
}

/// A fixed-shape summary of one sample set.
pub trait RollupRecord {
    /// Returns the `DS:` and `RRA:` declarations for files holding this
    /// record at a `step`-second step.
    fn rrd_info(&self, step: i64) -> Vec<String>;

    /// Returns the colon-separated field names, in data line order.
    fn rrd_template(&self) -> String;

    /// Renders the data line `timestamp:field1:field2:...`.
    fn rrd_line(&self, timestamp: i64) -> String;
}

/// Reduces a sample set to a record.
pub trait Rollup: Send + Sync + Debug {
    /// The record this rollup produces.
    type Record: RollupRecord;

    /// Returns the rollup's stable name, also used as its file name.
    fn name(&self) -> &'static str;

    /// Computes the record for `set`.
    fn rollup_data(&self, set: &SampleSet) -> Self::Record;
}

/// A writer that appends each record to `<data_dir>/<metric>/<name>.rrd`.
#[derive(Debug)]
pub struct RrdWriter<R> {
    rollup: R,
    data_dir: PathBuf,
    step: i64,
}

impl<R: Rollup> RrdWriter<R> {
    /// Creates a writer storing files under `data_dir` with a `step`-second
    /// step, which should equal the timeline interval.
    pub fn new<P: AsRef<Path>>(rollup: R, data_dir: P, step: i64) -> Self {
        Self {
            rollup,
            data_dir: data_dir.as_ref().to_path_buf(),
            step,
        }
    }

    /// Returns the file a metric's records are appended to.
    pub fn path_for(&self, metric: &str) -> PathBuf {
        self.data_dir
            .join(sanitize(metric))
            .join(format!("{}.rrd", self.rollup.name()))
    }
}

impl<R: Rollup> Writer for RrdWriter<R> {
    fn name(&self) -> &str {
        self.rollup.name()
    }

    fn rollup(&self, set: &SampleSet) -> Result<()> {
        let record = self.rollup.rollup_data(set);
        let header = RrdHeader {
            step: self.step,
            declarations: record.rrd_info(self.step),
            template: record.rrd_template(),
        };

        let file = RrdFile::create_or_open(self.path_for(set.name()), &header)?;
        file.append(&record.rrd_line(set.start()))
    }
}

/// Builds the built-in writer registered under `name`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownWriter`] if no writer has that name.
pub fn writer_by_name<P: AsRef<Path>>(name: &str, data_dir: P, step: i64) -> Result<Box<dyn Writer>> {
    let writer: Box<dyn Writer> = match name {
        "yesno" => Box::new(RrdWriter::new(YesOrNo, data_dir, step)),
        "count" => Box::new(RrdWriter::new(Count, data_dir, step)),
        "quartiles" => Box::new(RrdWriter::new(Quartiles, data_dir, step)),
        _ => {
            return Err(ConfigError::UnknownWriter {
                name: name.to_string(),
                available: WRITER_NAMES.join(", "),
            }
            .into());
        }
    };
    Ok(writer)
}

/// Maps a metric name onto a single safe path component.
///
/// Every byte outside `[A-Za-z0-9._-]` becomes `%XX`, including `%` itself,
/// so the mapping is reversible. Names made only of dots have each dot
/// escaped, and the empty name maps to a lone `%`, which no escape produces.
fn sanitize(metric: &str) -> String {
    if metric.is_empty() {
        return "%".to_string();
    }
    let all_dots = metric.bytes().all(|b| b == b'.');

    let mut out = String::with_capacity(metric.len());
    for b in metric.bytes() {
        let keep = (b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
            && !(all_dots && b == b'.');
        if keep {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Formats an optional gauge value, using `U` for unknown.
fn gauge(value: Option<f64>) -> String {
    value.map_or_else(|| "U".to_string(), |v| v.to_string())
}
