//! # metricsd
//!
//! Time-windowed metric buffer with exactly-once handoff of closed windows.
//!
//! metricsd accepts a continuous stream of numeric measurement events from any
//! number of threads, groups them into fixed-width time windows, and hands
//! each window off once its time has elapsed so it can be rolled up into
//! summary statistics and persisted in a round-robin, rrdtool-style file.
//!
//! ## Key Properties
//!
//! - Window identity is `floor(time / interval)`, recomputed from the clock on every call
//! - No sample is lost, duplicated, or attributed to a window already handed off
//! - Extraction is a single atomic snapshot-and-swap; producers never stop
//! - Closed windows come out oldest first, metrics sorted by name
//! - Time is injectable, so window boundaries are testable
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use metricsd::{Event, Flusher, Timeline};
//! use metricsd::writer::writer_by_name;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 10 second windows
//! let timeline = Arc::new(Timeline::new(10)?);
//!
//! // Hand every closed window to the yes/no rollup
//! let writers = vec![writer_by_name("yesno", "./data", 10)?];
//! let flusher = Flusher::spawn(timeline.clone(), writers, Duration::from_secs(10))?;
//!
//! // Producers, from any thread
//! timeline.add(&Event::new("login.status", 1.0));
//! timeline.add(&Event::new("login.status", -1.0));
//!
//! // Final forced flush
//! flusher.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Timeline`]: Window map, ingestion, and closed-window extraction
//! - [`Slice`]: One window; routes events to per-metric sets
//! - [`SampleSet`]: The samples of one metric in one window
//! - [`Writer`]: Consumes closed sets; built-ins persist to [`rrd`] files
//! - [`Flusher`]: Background consumer driving extraction and writers
//!
//! ## Modules
//!
//! - [`timeline`]: Window mapping, locking, extraction
//! - [`slice`]: Per-window routing
//! - [`sample`]: Per-metric accumulation
//! - [`event`]: Events and their text form
//! - [`clock`]: System and manual time sources
//! - [`writer`]: Rollup writers
//! - [`rrd`]: Round-robin record file format
//! - [`flusher`]: Periodic handoff to writers
//! - [`config`]: Daemon configuration
//! - [`error`]: Error types

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod flusher;
pub mod rrd;
pub mod sample;
pub mod slice;
pub mod timeline;
pub mod writer;

// Re-export primary API types at crate root for convenience.
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{MetricsdError, Result};
pub use event::Event;
pub use flusher::{FlushStats, Flusher};
pub use sample::SampleSet;
pub use slice::Slice;
pub use timeline::Timeline;
pub use writer::Writer;
