//! Periodic handoff of closed windows to writers.
//!
//! The [`Flusher`] is the consumer side of a [`Timeline`]. Each pass extracts
//! every closed sample set and hands it to every writer. Run in the
//! background, it ticks once per period; on shutdown it makes one final
//! forced pass so nothing buffered is left behind.
//!
//! ```text
//! producers ──add──► Timeline ──extract_closed_sample_sets──► Flusher
//!                                                               │
//!                                         ┌─────────────────────┼──────────┐
//!                                         ▼                     ▼          ▼
//!                                      yesno                 count     quartiles
//! ```

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{FlushError, Result};
use crate::timeline::Timeline;
use crate::writer::Writer;

/// Totals for one or more flush passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Sample sets handed to writers.
    pub sample_sets: usize,
    /// Samples contained in those sets.
    pub samples: usize,
    /// Writer calls that returned an error.
    pub failures: usize,
}

impl FlushStats {
    fn merge(&mut self, other: Self) {
        self.sample_sets += other.sample_sets;
        self.samples += other.samples;
        self.failures += other.failures;
    }
}

/// The timeline and writers shared with the background thread.
#[derive(Debug)]
struct Pipeline {
    timeline: Arc<Timeline>,
    writers: Vec<Box<dyn Writer>>,
}

impl Pipeline {
    fn flush(&self, force: bool) -> FlushStats {
        let sets = self.timeline.extract_closed_sample_sets(force);
        let mut stats = FlushStats::default();

        for set in &sets {
            stats.sample_sets += 1;
            stats.samples += set.len();

            for writer in &self.writers {
                if let Err(e) = writer.rollup(set) {
                    stats.failures += 1;
                    warn!(
                        writer = writer.name(),
                        metric = set.name(),
                        slice = set.slice(),
                        "rollup failed: {e}"
                    );
                }
            }
        }

        if stats.sample_sets > 0 {
            debug!(
                force,
                sample_sets = stats.sample_sets,
                samples = stats.samples,
                failures = stats.failures,
                "flushed closed windows"
            );
        }

        stats
    }
}

/// Drains closed windows from a timeline into a set of writers.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use metricsd::{Event, Flusher, Timeline};
/// use metricsd::writer::writer_by_name;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let timeline = Arc::new(Timeline::new(10)?);
/// let writers = vec![writer_by_name("yesno", "./data", 10)?];
/// let flusher = Flusher::spawn(timeline.clone(), writers, Duration::from_secs(10))?;
///
/// timeline.add(&Event::new("login.status", 1.0));
///
/// let stats = flusher.shutdown()?;
/// assert_eq!(stats.samples, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Flusher {
    pipeline: Arc<Pipeline>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<FlushStats>>,
}

impl Flusher {
    /// Creates a flusher with no background thread; passes run only when
    /// [`Flusher::flush`] is called.
    pub fn new(timeline: Arc<Timeline>, writers: Vec<Box<dyn Writer>>) -> Self {
        Self {
            pipeline: Arc::new(Pipeline { timeline, writers }),
            stop: None,
            handle: None,
        }
    }

    /// Creates a flusher and starts a background thread that runs a
    /// non-forced pass every `period`.
    ///
    /// # Errors
    ///
    /// Returns [`FlushError::Spawn`] if the thread cannot be started.
    pub fn spawn(
        timeline: Arc<Timeline>,
        writers: Vec<Box<dyn Writer>>,
        period: Duration,
    ) -> Result<Self> {
        let mut flusher = Self::new(timeline, writers);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let pipeline = Arc::clone(&flusher.pipeline);

        let handle = thread::Builder::new()
            .name("metricsd-flusher".to_string())
            .spawn(move || {
                let mut totals = FlushStats::default();
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => totals.merge(pipeline.flush(false)),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                totals
            })
            .map_err(|e| FlushError::Spawn { source: e })?;

        info!(period = ?period, writers = flusher.pipeline.writers.len(), "flusher started");

        flusher.stop = Some(stop_tx);
        flusher.handle = Some(handle);
        Ok(flusher)
    }

    /// Runs one pass now, returning what it handed off.
    pub fn flush(&self, force: bool) -> FlushStats {
        self.pipeline.flush(force)
    }

    /// Returns the timeline being drained.
    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.pipeline.timeline
    }

    /// Stops the background thread and runs a final forced pass.
    ///
    /// Returns the totals of every pass this flusher ran in the background
    /// plus the final one.
    ///
    /// # Errors
    ///
    /// Returns [`FlushError::Panicked`] if the background thread panicked.
    /// The final pass still runs in that case.
    pub fn shutdown(mut self) -> Result<FlushStats> {
        self.stop_thread()
    }

    fn stop_thread(&mut self) -> Result<FlushStats> {
        // Dropping the sender wakes the thread even if it never ticked.
        self.stop.take();

        let joined = self.handle.take().map(JoinHandle::join);
        let mut totals = self.pipeline.flush(true);

        match joined {
            Some(Ok(background)) => totals.merge(background),
            Some(Err(_)) => return Err(FlushError::Panicked.into()),
            None => {}
        }

        info!(
            sample_sets = totals.sample_sets,
            samples = totals.samples,
            failures = totals.failures,
            "flusher stopped"
        );
        Ok(totals)
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(e) = self.stop_thread()
        {
            warn!("flusher shutdown failed: {e}");
        }
    }
}
