//! One fixed-width time window and its per-metric sample sets.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::event::Event;
use crate::sample::SampleSet;

/// A single time window holding every sample recorded during it.
///
/// Sample sets are created lazily on the first event for a metric. The
/// name-to-set map has its own read/write lock: producers hitting an existing
/// metric only take the shared side, and the exclusive side is held just long
/// enough to insert a new set.
#[derive(Debug)]
pub struct Slice {
    number: i64,
    start: i64,
    sets: RwLock<BTreeMap<String, SampleSet>>,
}

impl Slice {
    /// Creates an empty window with identifier `number` starting at `start`
    /// seconds since the epoch.
    pub fn new(number: i64, start: i64) -> Self {
        Self {
            number,
            start,
            sets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the window identifier (`start / interval`).
    pub fn number(&self) -> i64 {
        self.number
    }

    /// Returns the start of the window in seconds since the epoch.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Records the event's value into the set named by the event.
    pub fn add(&self, event: &Event) {
        self.record(&event.name, event.value);
    }

    /// Records `value` into the set for `name`, creating the set if needed.
    pub fn record(&self, name: &str, value: f64) {
        if let Some(set) = self.sets.read().get(name) {
            set.record(value);
            return;
        }

        // Another producer may have inserted the set between the two locks.
        self.sets
            .write()
            .entry(name.to_string())
            .or_insert_with(|| SampleSet::new(name, self.number, self.start))
            .record(value);
    }

    /// Returns the number of samples recorded for `name`, if the metric has
    /// been seen in this window.
    pub fn count(&self, name: &str) -> Option<usize> {
        self.sets.read().get(name).map(SampleSet::len)
    }

    /// Returns the metric names seen in this window, sorted.
    pub fn names(&self) -> Vec<String> {
        self.sets.read().keys().cloned().collect()
    }

    /// Returns the number of distinct metrics in this window.
    pub fn len(&self) -> usize {
        self.sets.read().len()
    }

    /// Returns `true` if no metric has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total number of samples across every metric.
    pub fn sample_count(&self) -> usize {
        self.sets.read().values().map(SampleSet::len).sum()
    }

    /// Consumes the window, returning its sample sets ordered by metric name.
    pub fn into_sample_sets(self) -> Vec<SampleSet> {
        self.sets.into_inner().into_values().collect()
    }
}
