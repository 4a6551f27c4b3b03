//! CLI for the metricsd time-windowed metric buffer.
//!
//! Provides commands for running the buffer over events read from stdin,
//! inspecting the RRD files writers produce, and benchmarking ingestion.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use metricsd::rrd::RrdFile;
use metricsd::{Config, Event, Flusher, Timeline};
use tracing_subscriber::EnvFilter;

/// metricsd: time-windowed metric buffer with round-robin rollups.
#[derive(Parser)]
#[command(name = "metricsd", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Buffer events read from stdin (`name:value[@timestamp]`, one per line)
    /// and roll closed windows up into RRD files.
    Run {
        /// JSON configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Window width in seconds.
        #[arg(long)]
        interval: Option<i64>,

        /// Seconds between flush passes.
        #[arg(long)]
        flush_period: Option<i64>,

        /// Directory to store RRD files under.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Writer to roll windows up with (repeatable).
        #[arg(long = "writer")]
        writers: Vec<String>,
    },

    /// Display an RRD file's header and most recent rows.
    Inspect {
        /// Path to the RRD file.
        file: PathBuf,

        /// Number of trailing rows to show.
        #[arg(long, default_value = "10")]
        tail: usize,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run a multi-threaded ingestion benchmark.
    Bench {
        /// Number of events each thread adds.
        #[arg(long, default_value = "1000000")]
        events: usize,

        /// Number of producer threads.
        #[arg(long, default_value = "4")]
        threads: usize,

        /// Number of distinct metric names.
        #[arg(long, default_value = "30")]
        metrics: usize,
    },
}

/// Output format for inspected files.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Header and rows as they appear in the file.
    Text,
    /// JSON object with header fields and parsed rows.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            interval,
            flush_period,
            data_dir,
            writers,
        } => build_config(config.as_deref(), interval, flush_period, data_dir, writers)
            .and_then(|config| cmd_run(&config)),
        Commands::Inspect { file, tail, format } => cmd_inspect(&file, tail, &format),
        Commands::Bench {
            events,
            threads,
            metrics,
        } => cmd_bench(events, threads, metrics),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Loads the config file, if any, and applies command-line overrides.
fn build_config(
    path: Option<&Path>,
    interval: Option<i64>,
    flush_period: Option<i64>,
    data_dir: Option<PathBuf>,
    writers: Vec<String>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(interval) = interval {
        config.interval_secs = interval;
    }
    if flush_period.is_some() {
        config.flush_period_secs = flush_period;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    if !writers.is_empty() {
        config.writers = writers;
    }

    config.validate()?;
    Ok(config)
}

/// Implements `metricsd run`.
fn cmd_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let timeline = Arc::new(Timeline::new(config.interval_secs)?);
    let flusher = Flusher::spawn(
        Arc::clone(&timeline),
        config.build_writers()?,
        config.flush_period(),
    )?;

    tracing::info!(
        interval = config.interval_secs,
        data_dir = %config.data_dir.display(),
        writers = ?config.writers,
        "reading events from stdin"
    );

    let ingested = ingest(io::stdin().lock(), &timeline);

    let stats = flusher.shutdown()?;
    let ingested = ingested?;
    tracing::info!(
        accepted = ingested.accepted,
        rejected = ingested.rejected,
        sample_sets = stats.sample_sets,
        failures = stats.failures,
        "input closed"
    );
    Ok(())
}

/// Line counts from one [`ingest`] pass.
#[derive(Debug, Default, PartialEq, Eq)]
struct Ingested {
    accepted: u64,
    rejected: u64,
}

/// Adds every event line from `reader` to `timeline` until end of input.
///
/// Lines that are not UTF-8 or do not parse are logged and skipped. Only a
/// read error on the underlying stream ends the pass early.
fn ingest<R: BufRead>(mut reader: R, timeline: &Timeline) -> io::Result<Ingested> {
    let mut counts = Ingested::default();
    let mut buf = Vec::new();
    let mut line_no = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(counts);
        }
        line_no += 1;

        let Ok(line) = std::str::from_utf8(&buf) else {
            counts.rejected += 1;
            tracing::warn!(line = line_no, "skipping line: not valid UTF-8");
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Event>() {
            Ok(event) => {
                timeline.add(&event);
                counts.accepted += 1;
            }
            Err(e) => {
                counts.rejected += 1;
                tracing::warn!(line = line_no, "skipping line: {e}");
            }
        }
    }
}

/// Implements `metricsd inspect <file>`.
fn cmd_inspect(
    file: &Path,
    tail: usize,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = RrdFile::read(file)?;
    let skip = contents.rows.len().saturating_sub(tail);
    let rows = &contents.rows[skip..];

    match format {
        OutputFormat::Text => {
            println!("File: {}", file.display());
            println!("Step: {}s", contents.header.step);
            println!("Template: {}", contents.header.template);
            println!();
            for declaration in &contents.header.declarations {
                println!("  {declaration}");
            }
            println!();
            println!("Rows: {} (showing {})", contents.rows.len(), rows.len());
            for row in rows {
                println!("  {row}");
            }
        }
        OutputFormat::Json => {
            let fields: Vec<&str> = contents.header.template.split(':').collect();
            let json_rows: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let mut parts = row.split(':');
                    let timestamp = parts.next().unwrap_or_default();
                    let values: serde_json::Map<String, serde_json::Value> = fields
                        .iter()
                        .zip(parts)
                        .map(|(field, value)| ((*field).to_string(), parse_gauge(value)))
                        .collect();
                    serde_json::json!({
                        "timestamp": timestamp.parse::<i64>().ok(),
                        "values": values,
                    })
                })
                .collect();

            let output = serde_json::json!({
                "file": file.display().to_string(),
                "step": contents.header.step,
                "template": &contents.header.template,
                "declarations": &contents.header.declarations,
                "count": contents.rows.len(),
                "rows": json_rows,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Parses an RRD field, mapping `U` (unknown) to null.
fn parse_gauge(value: &str) -> serde_json::Value {
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Implements `metricsd bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(
    events: usize,
    threads: usize,
    metrics: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("metricsd ingestion benchmark");
    println!("  Threads: {threads}");
    println!("  Events per thread: {events}");
    println!("  Metrics: {metrics}");
    println!();

    let metrics = metrics.max(1);
    let timeline = Timeline::new(10)?;
    let names: Vec<String> = (0..metrics).map(|i| format!("metric_{i}")).collect();
    let prepared: Vec<Event> = names.iter().map(|n| Event::new(n.as_str(), 1.0)).collect();

    let start = Instant::now();

    std::thread::scope(|s| {
        for t in 0..threads {
            let timeline = &timeline;
            let prepared = &prepared;
            s.spawn(move || {
                for i in 0..events {
                    timeline.add(&prepared[(t + i) % prepared.len()]);
                }
            });
        }
    });

    let elapsed = start.elapsed();

    let recorded: usize = timeline
        .extract_closed_sample_sets(true)
        .iter()
        .map(metricsd::SampleSet::len)
        .sum();
    let total = events * threads;
    if recorded != total {
        return Err(format!("recorded {recorded} samples, expected {total}").into());
    }

    let ns_per_add = elapsed.as_nanos() as f64 / total.max(1) as f64;
    let adds_per_sec = total as f64 / elapsed.as_secs_f64();

    println!("Results:");
    println!("  Total adds: {total}");
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg latency: {ns_per_add:.1} ns/add (wall clock / adds)");
    println!("  Throughput: {adds_per_sec:.0} adds/sec");

    Ok(())
}
