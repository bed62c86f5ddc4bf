//! Replays a recorded session through the capture pipeline.
//!
//! This example shows how to:
//! 1. Build a pipeline with a small drain threshold
//! 2. Feed it a JSON Lines file of raw events
//! 3. Print every committed batch to stdout
//! 4. Report the capture statistics
//!
//! Run with: cargo run --example replay_demo [-- path/to/session.jsonl]
//!
//! Without an argument the bundled `demos/replay.jsonl` is used.

use std::path::PathBuf;
use std::time::Duration;

use evcapture::{
    pipeline::{Pipeline, PipelineConfig},
    sink::JsonSink,
    source::ReplayFile,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/replay.jsonl"));

    eprintln!("evcapture - Replay Demo");
    eprintln!("=======================");
    eprintln!();
    eprintln!("Replaying {}", path.display());
    eprintln!();

    let config = PipelineConfig {
        worker_threads: Some(2),
        threshold: 4,
        interval: Duration::from_secs(5),
    };
    let pipeline = Pipeline::new(config, JsonSink::stdout()).with_source(ReplayFile::new(&path));

    match pipeline.run() {
        Ok(report) => {
            eprintln!();
            eprintln!("Sources:");
            for source in &report.sources {
                eprintln!(
                    "  {:<40} {} events -> {} records",
                    source.name, source.events, source.records
                );
            }
            eprintln!();
            eprintln!("Batches committed: {}", report.stats.batches_committed);
            eprintln!("Records committed: {}", report.stats.records_committed);
            eprintln!("Events dropped:    {}", report.stats.events_dropped);
            eprintln!("Final flush:       {} records", report.flushed);
        }
        Err(e) => {
            eprintln!("Replay failed: {e}");
            std::process::exit(1);
        }
    }
}
