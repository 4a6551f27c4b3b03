//! End-to-end tests: events through the timeline, flusher, and RRD writers.

use std::sync::Arc;

use metricsd::config::Config;
use metricsd::rrd::RrdFile;
use metricsd::writer::{Quartiles, RrdWriter, Writer, YesOrNo};
use metricsd::{Event, Flusher, ManualClock, Timeline};
use tempfile::tempdir;

#[test]
fn test_closed_windows_reach_rrd_files() {
    let temp_dir = tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let timeline = Arc::new(Timeline::with_clock(10, clock.clone()).unwrap());

    let writers: Vec<Box<dyn Writer>> = vec![
        Box::new(RrdWriter::new(YesOrNo, temp_dir.path(), 10)),
        Box::new(RrdWriter::new(Quartiles, temp_dir.path(), 10)),
    ];
    let flusher = Flusher::new(timeline.clone(), writers);

    // Window 170000000: two successes, one failure
    for v in [1.0, 5.0, -1.0] {
        timeline.add(&Event::new("login", v));
    }

    // Window 170000001: one failure
    clock.advance(10);
    timeline.add(&Event::new("login", -3.0));

    clock.advance(10);
    let stats = flusher.flush(false);
    assert_eq!(stats.sample_sets, 2);
    assert_eq!(stats.samples, 4);
    assert_eq!(stats.failures, 0);

    let yesno = RrdFile::read(temp_dir.path().join("login").join("yesno.rrd")).unwrap();
    assert_eq!(yesno.header.template, "ok:fail");
    assert_eq!(
        yesno.rows,
        vec!["1700000000:2:1".to_string(), "1700000010:0:1".to_string()]
    );

    let quartiles = RrdFile::read(temp_dir.path().join("login").join("quartiles.rrd")).unwrap();
    assert_eq!(quartiles.header.template, "min:q1:median:q3:max");
    assert_eq!(quartiles.rows[0], "1700000000:-1:0:1:3:5");
    assert_eq!(quartiles.rows[1], "1700000010:-3:-3:-3:-3:-3");

    // Nothing left to hand off.
    assert_eq!(flusher.flush(true).sample_sets, 0);
}

#[test]
fn test_config_driven_pipeline_with_shutdown() {
    let temp_dir = tempdir().unwrap();
    let config = Config {
        interval_secs: 60,
        flush_period_secs: Some(3600),
        data_dir: temp_dir.path().to_path_buf(),
        writers: vec!["yesno".to_string(), "count".to_string()],
    };
    config.validate().unwrap();

    let clock = Arc::new(ManualClock::new(6_000));
    let timeline = Arc::new(Timeline::with_clock(config.interval_secs, clock).unwrap());
    let flusher = Flusher::spawn(
        timeline.clone(),
        config.build_writers().unwrap(),
        config.flush_period(),
    )
    .unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..250 {
                    let v = if i % 5 == 0 { -1.0 } else { 1.0 };
                    timeline.add(&Event::new("job.result", v));
                }
            });
        }
    });

    // The open window is only written by the forced final flush.
    let stats = flusher.shutdown().unwrap();
    assert_eq!(stats.sample_sets, 1);
    assert_eq!(stats.samples, 1000);

    let count = RrdFile::read(temp_dir.path().join("job.result").join("count.rrd")).unwrap();
    assert_eq!(count.header.step, 60);
    assert_eq!(count.rows, vec!["6000:1000:600".to_string()]);

    let yesno = RrdFile::read(temp_dir.path().join("job.result").join("yesno.rrd")).unwrap();
    assert_eq!(yesno.rows, vec!["6000:800:200".to_string()]);
}
