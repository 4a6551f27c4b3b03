//! Per-metric sample accumulation within one window.

use parking_lot::Mutex;

/// The numeric samples recorded for one metric within one window.
///
/// Values are append-only. Concurrent producers may record into the same set,
/// so accumulation goes through a lock owned by the set itself.
#[derive(Debug)]
pub struct SampleSet {
    name: String,
    slice: i64,
    start: i64,
    values: Mutex<Vec<f64>>,
}

impl SampleSet {
    /// Creates an empty set for metric `name` in window `slice`, which starts
    /// at `start` seconds since the epoch.
    pub fn new(name: impl Into<String>, slice: i64, start: i64) -> Self {
        Self {
            name: name.into(),
            slice,
            start,
            values: Mutex::new(Vec::new()),
        }
    }

    /// Returns the metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the window identifier this set belongs to.
    pub fn slice(&self) -> i64 {
        self.slice
    }

    /// Returns the start of the window in seconds since the epoch.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Appends a sample.
    pub fn record(&self, value: f64) {
        self.values.lock().push(value);
    }

    /// Calls `f` once for every recorded sample, in no particular order.
    ///
    /// The set's lock is held while visiting, so `f` must not record into
    /// the same set.
    pub fn visit<F: FnMut(f64)>(&self, mut f: F) {
        for &value in self.values.lock().iter() {
            f(value);
        }
    }

    /// Returns a copy of the recorded samples.
    pub fn values(&self) -> Vec<f64> {
        self.values.lock().clone()
    }

    /// Returns the number of recorded samples.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Returns `true` if no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_set_is_empty() {
        let set = SampleSet::new("cpu", 10, 100);
        assert_eq!(set.name(), "cpu");
        assert_eq!(set.slice(), 10);
        assert_eq!(set.start(), 100);
        assert!(set.is_empty());
    }

    #[test]
    fn test_record_and_visit() {
        let set = SampleSet::new("cpu", 0, 0);
        set.record(1.0);
        set.record(-2.0);
        set.record(3.5);

        let mut sum = 0.0;
        let mut seen = 0;
        set.visit(|v| {
            sum += v;
            seen += 1;
        });

        assert_eq!(seen, 3);
        assert_eq!(sum, 2.5);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_concurrent_record() {
        let set = SampleSet::new("hits", 0, 0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for i in 0..1000u32 {
                        set.record(f64::from(i));
                    }
                });
            }
        });

        assert_eq!(set.len(), 8000);
    }
}
