//! The time-windowed buffer.
//!
//! A [`Timeline`] maps wall-clock time onto fixed-width windows ("slices") and
//! hands windows off once they have closed. It is shared by any number of
//! producer threads calling [`Timeline::add`] and consumer threads draining
//! closed windows.
//!
//! # Windowing
//!
//! The window identifier for a time `t` is `floor(t / interval)`. The current
//! identifier is computed from the [`Clock`] on every call, so windows roll
//! forward purely as a function of time.
//!
//! ```text
//! interval = 10s
//!
//!   t:  100 ....... 109 | 110 ....... 119 | 120 ...
//!   window:    10       |       11        |   12
//! ```
//!
//! # Locking
//!
//! The window map sits behind a read/write lock:
//!
//! - `add` holds the shared side for the whole lookup-and-record, and only
//!   upgrades to the exclusive side to insert a window seen for the first
//!   time.
//! - Extraction holds the exclusive side while it swaps the map out,
//!   partitions it at the current identifier, and puts the open part back.
//!
//! Because extraction waits for every in-flight `add`, a sample is either in
//! a window returned by an extraction or still in the map afterwards. A
//! returned window is no longer reachable from the timeline.
//!
//! # Late Events
//!
//! Events are never recorded into a window that has already been handed off.
//! An event whose window is older than the current one is recorded into the
//! current one, and an event aimed at or below the highest window ever
//! extracted goes to the next window after it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TimelineError};
use crate::event::Event;
use crate::sample::SampleSet;
use crate::slice::Slice;

/// Windows currently held by a timeline.
#[derive(Debug, Default)]
struct State {
    /// Open and not-yet-extracted windows, keyed by identifier.
    slices: BTreeMap<i64, Slice>,
    /// Highest window identifier ever extracted.
    watermark: Option<i64>,
}

impl State {
    /// Picks the window an event lands in, with its start time.
    ///
    /// Returns `None` when the window after the watermark has no
    /// representable start.
    fn route(&self, requested: i64, current: i64, interval: i64) -> Option<(i64, i64)> {
        let number = requested.max(current);
        let number = match self.watermark {
            Some(w) if number <= w => w.checked_add(1)?,
            _ => number,
        };
        Some((number, number.checked_mul(interval)?))
    }
}

/// A buffer of samples grouped into fixed-width time windows.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use metricsd::{Event, Timeline};
/// use metricsd::clock::ManualClock;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let clock = Arc::new(ManualClock::new(101));
/// let timeline = Timeline::with_clock(10, clock.clone())?;
///
/// timeline.add(&Event::new("a", 1.0));
/// clock.set(115);
///
/// let closed = timeline.extract_closed_slices(false);
/// assert_eq!(closed.len(), 1);
/// assert_eq!(closed[0].number(), 10);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Timeline {
    interval: i64,
    clock: Arc<dyn Clock>,
    state: RwLock<State>,
}

impl Timeline {
    /// Creates a timeline with windows `interval` seconds wide, driven by the
    /// system clock.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidInterval`] if `interval <= 0`.
    pub fn new(interval: i64) -> Result<Self> {
        Self::with_clock(interval, Arc::new(SystemClock))
    }

    /// Creates a timeline driven by `clock`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::InvalidInterval`] if `interval <= 0`.
    pub fn with_clock(interval: i64, clock: Arc<dyn Clock>) -> Result<Self> {
        if interval <= 0 {
            return Err(TimelineError::InvalidInterval { interval }.into());
        }

        Ok(Self {
            interval,
            clock,
            state: RwLock::new(State::default()),
        })
    }

    /// Returns the window width in seconds.
    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Returns the identifier of the window containing "now".
    pub fn current_slice_number(&self) -> i64 {
        self.slice_number(self.clock.now_secs())
    }

    /// Returns the identifier of the window containing `timestamp`.
    pub fn slice_number(&self, timestamp: i64) -> i64 {
        timestamp.div_euclid(self.interval)
    }

    /// Records `event` into its window, creating the window if needed.
    ///
    /// An event is dropped with a warning only when every window it could
    /// land in starts past `i64::MAX` seconds.
    pub fn add(&self, event: &Event) {
        let current = self.current_slice_number();
        let requested = event.timestamp.map_or(current, |ts| self.slice_number(ts));

        {
            let state = self.state.read();
            let Some((number, _)) = state.route(requested, current, self.interval) else {
                warn!(name = %event.name, requested, "no window left for event, dropping");
                return;
            };
            if let Some(slice) = state.slices.get(&number) {
                slice.add(event);
                return;
            }
        }

        // The watermark may have moved while no lock was held, so route again.
        let mut state = self.state.write();
        let Some((number, start)) = state.route(requested, current, self.interval) else {
            warn!(name = %event.name, requested, "no window left for event, dropping");
            return;
        };
        state
            .slices
            .entry(number)
            .or_insert_with(|| {
                trace!(slice = number, "opening window");
                Slice::new(number, start)
            })
            .add(event);
    }

    /// Removes and returns every closed window, oldest first.
    ///
    /// A window is closed when its identifier is below the current one,
    /// computed once on entry. With `force`, every window is returned,
    /// including the open one, and the timeline is left empty.
    ///
    /// Extracted identifiers are never reused. After a forced extraction of
    /// the open window, later adds in the same wall-clock window go to the
    /// next one, and their sets carry that window's (future) start: at
    /// interval 10, an add at t=102 after forcing out window 10 is recorded
    /// in window 11 with start 110.
    pub fn extract_closed_slices(&self, force: bool) -> Vec<Slice> {
        self.take_closed(force).into_values().collect()
    }

    /// Removes every closed window and returns its sample sets, ordered by
    /// window identifier and then by metric name.
    pub fn extract_closed_sample_sets(&self, force: bool) -> Vec<SampleSet> {
        self.take_closed(force)
            .into_values()
            .flat_map(Slice::into_sample_sets)
            .collect()
    }

    /// Returns the number of windows currently held.
    pub fn len(&self) -> usize {
        self.state.read().slices.len()
    }

    /// Returns `true` if no windows are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the identifiers of the windows currently held, ascending.
    pub fn slice_numbers(&self) -> Vec<i64> {
        self.state.read().slices.keys().copied().collect()
    }

    /// Swaps out the closed part of the map in one critical section.
    fn take_closed(&self, force: bool) -> BTreeMap<i64, Slice> {
        let current = self.current_slice_number();

        let mut state = self.state.write();
        let closed = if force {
            std::mem::take(&mut state.slices)
        } else {
            let open = state.slices.split_off(&current);
            std::mem::replace(&mut state.slices, open)
        };

        if let Some((&newest, _)) = closed.last_key_value() {
            state.watermark = Some(state.watermark.map_or(newest, |w| w.max(newest)));
        }
        let remaining = state.slices.len();
        drop(state);

        if !closed.is_empty() {
            debug!(
                current,
                force,
                extracted = closed.len(),
                remaining,
                "extracted closed windows"
            );
        }

        closed
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timeline[interval={}, size={}]",
            self.interval,
            self.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::MetricsdError;

    fn timeline_at(now: i64) -> (Timeline, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let timeline = Timeline::with_clock(10, clock.clone()).unwrap();
        (timeline, clock)
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        for interval in [0, -1, -60] {
            let err = Timeline::new(interval).unwrap_err();
            assert!(matches!(
                err,
                MetricsdError::Timeline(TimelineError::InvalidInterval { interval: i }) if i == interval
            ));
        }
    }

    #[test]
    fn test_slice_number_floors() {
        let (timeline, _) = timeline_at(0);
        assert_eq!(timeline.slice_number(100), 10);
        assert_eq!(timeline.slice_number(109), 10);
        assert_eq!(timeline.slice_number(110), 11);
        assert_eq!(timeline.slice_number(-1), -1);
    }

    #[test]
    fn test_events_land_in_current_window() {
        let (timeline, clock) = timeline_at(101);
        timeline.add(&Event::new("a", 1.0));
        clock.set(105);
        timeline.add(&Event::new("a", 2.0));
        clock.set(109);
        timeline.add(&Event::new("a", 3.0));
        clock.set(112);
        timeline.add(&Event::new("a", 4.0));

        assert_eq!(timeline.slice_numbers(), vec![10, 11]);
    }

    #[test]
    fn test_extract_leaves_open_window() {
        let (timeline, clock) = timeline_at(101);
        for t in [101, 105, 109, 112] {
            clock.set(t);
            timeline.add(&Event::new("a", 1.0));
        }

        clock.set(115);
        let closed = timeline.extract_closed_slices(false);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].number(), 10);
        assert_eq!(closed[0].start(), 100);
        assert_eq!(closed[0].count("a"), Some(3));
        assert_eq!(timeline.slice_numbers(), vec![11]);

        assert!(timeline.extract_closed_slices(false).is_empty());

        let rest = timeline.extract_closed_slices(true);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].number(), 11);
        assert_eq!(rest[0].count("a"), Some(1));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_explicit_timestamp_selects_window() {
        let (timeline, _) = timeline_at(100);
        timeline.add(&Event::at("a", 1.0, 135));
        assert_eq!(timeline.slice_numbers(), vec![13]);
    }

    #[test]
    fn test_late_event_rounds_to_current_window() {
        let (timeline, _) = timeline_at(125);
        timeline.add(&Event::at("a", 1.0, 101));
        assert_eq!(timeline.slice_numbers(), vec![12]);
    }

    #[test]
    fn test_extracted_window_is_never_reopened() {
        let (timeline, clock) = timeline_at(101);
        timeline.add(&Event::new("a", 1.0));

        let first = timeline.extract_closed_slices(true);
        assert_eq!(first[0].number(), 10);

        // Same wall-clock window, but window 10 has been handed off.
        clock.set(102);
        timeline.add(&Event::new("a", 2.0));
        assert_eq!(timeline.slice_numbers(), vec![11]);

        let reopened = timeline.extract_closed_slices(true);
        assert_eq!(reopened[0].start(), 110);
    }

    #[test]
    fn test_add_after_last_window_does_not_wrap() {
        let clock = Arc::new(ManualClock::new(0));
        let timeline = Timeline::with_clock(1, clock).unwrap();

        timeline.add(&Event::at("a", 1.0, i64::MAX));
        let last = timeline.extract_closed_slices(true);
        assert_eq!(last[0].number(), i64::MAX);

        // No window follows i64::MAX, so nothing can be recorded.
        timeline.add(&Event::new("a", 1.0));
        timeline.add(&Event::at("a", 1.0, i64::MAX));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_add_after_last_window_start_does_not_overflow() {
        let (timeline, _) = timeline_at(0);

        timeline.add(&Event::at("a", 1.0, i64::MAX));
        let last = timeline.extract_closed_slices(true);
        assert_eq!(last[0].number(), i64::MAX / 10);
        assert_eq!(last[0].start(), i64::MAX / 10 * 10);

        // The next window would start past i64::MAX.
        timeline.add(&Event::new("a", 1.0));
        assert!(timeline.is_empty());
        assert!(timeline.extract_closed_slices(true).is_empty());
    }

    #[test]
    fn test_extract_sample_sets_order() {
        let (timeline, clock) = timeline_at(101);
        for _ in 0..3 {
            timeline.add(&Event::new("a", 1.0));
        }
        clock.set(112);
        timeline.add(&Event::new("b", 1.0));
        timeline.add(&Event::new("a", 1.0));
        timeline.add(&Event::new("b", 1.0));

        let sets = timeline.extract_closed_sample_sets(true);
        let keys: Vec<_> = sets.iter().map(|s| (s.slice(), s.name())).collect();
        assert_eq!(keys, vec![(10, "a"), (11, "a"), (11, "b")]);
        assert_eq!(sets[0].len(), 3);
        assert_eq!(sets[1].len(), 1);
        assert_eq!(sets[2].len(), 2);
    }

    #[test]
    fn test_empty_extraction() {
        let (timeline, _) = timeline_at(0);
        assert!(timeline.extract_closed_slices(false).is_empty());
        assert!(timeline.extract_closed_sample_sets(true).is_empty());
    }

    #[test]
    fn test_display() {
        let (timeline, _) = timeline_at(101);
        assert_eq!(timeline.to_string(), "Timeline[interval=10, size=0]");
        timeline.add(&Event::new("a", 1.0));
        assert_eq!(timeline.to_string(), "Timeline[interval=10, size=1]");
    }
}
