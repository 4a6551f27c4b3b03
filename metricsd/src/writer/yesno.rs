//! Success/failure counts: non-negative samples are "ok", negative ones "fail".

use super::{Rollup, RollupRecord, archives, heartbeat};
use crate::sample::SampleSet;

/// Counts non-negative versus negative samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct YesOrNo;

/// Record produced by [`YesOrNo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YesOrNoRecord {
    /// Samples `>= 0`.
    pub ok: u64,
    /// Samples `< 0`, and NaN.
    pub fail: u64,
}

impl Rollup for YesOrNo {
    type Record = YesOrNoRecord;

    fn name(&self) -> &'static str {
        "yesno"
    }

    fn rollup_data(&self, set: &SampleSet) -> YesOrNoRecord {
        let (mut ok, mut fail) = (0, 0);
        set.visit(|v| {
            if v >= 0.0 {
                ok += 1;
            } else {
                fail += 1;
            }
        });
        YesOrNoRecord { ok, fail }
    }
}

impl RollupRecord for YesOrNoRecord {
    fn rrd_info(&self, step: i64) -> Vec<String> {
        let hb = heartbeat(step);
        let mut info = vec![
            format!("DS:ok:GAUGE:{hb}:0:U"),
            format!("DS:fail:GAUGE:{hb}:0:U"),
        ];
        info.extend(archives(step));
        info
    }

    fn rrd_template(&self) -> String {
        "ok:fail".to_string()
    }

    fn rrd_line(&self, timestamp: i64) -> String {
        format!("{timestamp}:{}:{}", self.ok, self.fail)
    }
}
