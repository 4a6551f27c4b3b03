//! Sample count and sum per window.

use super::{Rollup, RollupRecord, archives, heartbeat};
use crate::sample::SampleSet;

/// Counts samples and sums their values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

/// Record produced by [`Count`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountRecord {
    /// Number of samples in the window.
    pub count: u64,
    /// Sum of the finite samples.
    pub sum: f64,
}

impl Rollup for Count {
    type Record = CountRecord;

    fn name(&self) -> &'static str {
        "count"
    }

    fn rollup_data(&self, set: &SampleSet) -> CountRecord {
        let mut count = 0;
        let mut sum = 0.0;
        set.visit(|v| {
            count += 1;
            if v.is_finite() {
                sum += v;
            }
        });
        CountRecord { count, sum }
    }
}

impl RollupRecord for CountRecord {
    fn rrd_info(&self, step: i64) -> Vec<String> {
        let hb = heartbeat(step);
        let mut info = vec![
            format!("DS:count:GAUGE:{hb}:0:U"),
            format!("DS:sum:GAUGE:{hb}:U:U"),
        ];
        info.extend(archives(step));
        info
    }

    fn rrd_template(&self) -> String {
        "count:sum".to_string()
    }

    fn rrd_line(&self, timestamp: i64) -> String {
        format!("{timestamp}:{}:{}", self.count, self.sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_sum() {
        let set = SampleSet::new("bytes", 0, 0);
        for v in [10.0, 20.0, -5.0, f64::INFINITY] {
            set.record(v);
        }

        let record = Count.rollup_data(&set);
        assert_eq!(record.count, 4);
        assert_eq!(record.sum, 25.0);
        assert_eq!(record.rrd_line(100), "100:4:25");
    }
}
