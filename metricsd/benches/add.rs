//! Microbenchmarks for the `add()` hot path and extraction.
//!
//! Run with: `cargo bench -p metricsd -- add`

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use metricsd::{Event, ManualClock, Timeline};

fn setup_timeline() -> (Timeline, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let timeline = Timeline::with_clock(10, clock.clone()).unwrap();
    (timeline, clock)
}

fn bench_add_existing_metric(c: &mut Criterion) {
    let (timeline, _clock) = setup_timeline();
    let event = Event::new("requests", 1.0);
    timeline.add(&event);

    c.bench_function("add/existing_metric", |b| {
        b.iter(|| timeline.add(black_box(&event)));
    });
}

fn bench_add_many_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("add/metric_count");

    for count in [1usize, 10, 100, 1000] {
        let (timeline, _clock) = setup_timeline();
        let events: Vec<_> = (0..count)
            .map(|i| Event::new(format!("metric_{i}"), 1.0))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                for event in &events {
                    timeline.add(black_box(event));
                }
            });
        });
    }

    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    c.bench_function("extract/100_windows_10_metrics", |b| {
        b.iter_batched(
            || {
                let (timeline, clock) = setup_timeline();
                for _ in 0..100 {
                    for m in 0..10 {
                        timeline.add(&Event::new(format!("m{m}"), 1.0));
                    }
                    clock.advance(10);
                }
                timeline
            },
            |timeline| black_box(timeline.extract_closed_sample_sets(false)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_add_existing_metric,
    bench_add_many_metrics,
    bench_extract
);
criterion_main!(benches);
