//! Five-number summary of a window's samples.

use super::{Rollup, RollupRecord, archives, gauge, heartbeat};
use crate::sample::SampleSet;

/// Computes minimum, quartiles, and maximum of the finite samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quartiles;

/// Record produced by [`Quartiles`]. Every field is `None` when the window
/// holds no finite sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QuartilesRecord {
    /// Smallest sample.
    pub min: Option<f64>,
    /// 25th percentile.
    pub q1: Option<f64>,
    /// 50th percentile.
    pub median: Option<f64>,
    /// 75th percentile.
    pub q3: Option<f64>,
    /// Largest sample.
    pub max: Option<f64>,
}

impl Rollup for Quartiles {
    type Record = QuartilesRecord;

    fn name(&self) -> &'static str {
        "quartiles"
    }

    fn rollup_data(&self, set: &SampleSet) -> QuartilesRecord {
        let mut values = Vec::with_capacity(set.len());
        set.visit(|v| {
            if v.is_finite() {
                values.push(v);
            }
        });
        if values.is_empty() {
            return QuartilesRecord::default();
        }
        values.sort_by(f64::total_cmp);

        QuartilesRecord {
            min: values.first().copied(),
            q1: Some(quantile(&values, 0.25)),
            median: Some(quantile(&values, 0.5)),
            q3: Some(quantile(&values, 0.75)),
            max: values.last().copied(),
        }
    }
}

/// Linear-interpolated quantile of sorted, non-empty `values`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)] // Positions are small, non-negative indices
fn quantile(values: &[f64], q: f64) -> f64 {
    let pos = q * (values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - pos.floor();
    values[lower] + (values[upper] - values[lower]) * frac
}

impl RollupRecord for QuartilesRecord {
    fn rrd_info(&self, step: i64) -> Vec<String> {
        let hb = heartbeat(step);
        let mut info: Vec<String> = ["min", "q1", "median", "q3", "max"]
            .iter()
            .map(|field| format!("DS:{field}:GAUGE:{hb}:U:U"))
            .collect();
        info.extend(archives(step));
        info
    }

    fn rrd_template(&self) -> String {
        "min:q1:median:q3:max".to_string()
    }

    fn rrd_line(&self, timestamp: i64) -> String {
        format!(
            "{timestamp}:{}:{}:{}:{}:{}",
            gauge(self.min),
            gauge(self.q1),
            gauge(self.median),
            gauge(self.q3),
            gauge(self.max)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_number_summary() {
        let set = SampleSet::new("latency", 0, 0);
        for v in [5.0, 1.0, 4.0, 2.0, 3.0] {
            set.record(v);
        }

        let record = Quartiles.rollup_data(&set);
        assert_eq!(
            record,
            QuartilesRecord {
                min: Some(1.0),
                q1: Some(2.0),
                median: Some(3.0),
                q3: Some(4.0),
                max: Some(5.0),
            }
        );
        assert_eq!(record.rrd_line(10), "10:1:2:3:4:5");
    }

    #[test]
    fn test_interpolates_between_samples() {
        let set = SampleSet::new("latency", 0, 0);
        for v in [1.0, 2.0, 3.0, 4.0] {
            set.record(v);
        }

        let record = Quartiles.rollup_data(&set);
        assert_eq!(record.median, Some(2.5));
        assert_eq!(record.q1, Some(1.75));
        assert_eq!(record.q3, Some(3.25));
    }

    #[test]
    fn test_no_finite_samples() {
        let set = SampleSet::new("latency", 0, 0);
        set.record(f64::NAN);

        let record = Quartiles.rollup_data(&set);
        assert_eq!(record, QuartilesRecord::default());
        assert_eq!(record.rrd_line(10), "10:U:U:U:U:U");
    }
}
