//! evcapture CLI
//!
//! Captures input events into batched JSON records.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use evcapture::{
    config::Config,
    pipeline::{Pipeline, StopReason},
    record::RecordKind,
    sink::SinkSet,
    source::ReplayFile,
    PipelineError, VERSION,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evcapture")]
#[command(version = VERSION)]
#[command(about = "Capture input events into batched records", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start capturing until Ctrl+C or until every source closes
    Start(StartArgs),

    /// List input event devices
    Devices,

    /// Print the record schemas
    Schema,

    /// Show the effective configuration
    Config {
        /// Write the configuration back to disk
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args)]
struct StartArgs {
    /// Buffered records that trigger a drain
    #[arg(short = 'n', long = "store-n-events")]
    store_n_events: Option<usize>,

    /// Seconds between unconditional drains
    #[arg(short = 's', long = "store-after")]
    store_after: Option<u64>,

    /// Output: `-` for stdout, a .json file, or a .jsonl file (repeatable)
    #[arg(short = 'o', long = "output")]
    outputs: Vec<String>,

    /// Event device node to capture (repeatable, default: all)
    #[arg(long = "device")]
    devices: Vec<PathBuf>,

    /// JSON Lines file of raw events to replay (repeatable)
    #[arg(long = "replay")]
    replay: Vec<PathBuf>,

    /// Worker threads (default: sources + 2)
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Start(args) => cmd_start(config, args),
        Commands::Devices => cmd_devices(),
        Commands::Schema => cmd_schema(),
        Commands::Config { save } => cmd_config(&config, cli.config.as_ref(), save),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("failed to load configuration")
}

/// Logs go to stderr so stdout stays free for batches.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(mut config: Config, args: StartArgs) -> Result<()> {
    if let Some(n) = args.store_n_events {
        config.store_n_events = n;
    }
    if let Some(secs) = args.store_after {
        config.store_after = std::time::Duration::from_secs(secs);
    }
    if !args.outputs.is_empty() {
        config.outputs = args.outputs;
    }
    if !args.devices.is_empty() {
        config.devices = args.devices;
    }
    if !args.replay.is_empty() {
        config.replay = args.replay;
    }
    if args.workers.is_some() {
        config.worker_threads = args.workers;
    }
    config.validate()?;

    let sinks = SinkSet::open(&config.outputs).context("failed to open outputs")?;
    let mut pipeline = Pipeline::new(config.pipeline_config(), sinks);
    for path in &config.replay {
        pipeline.add_source(Box::new(ReplayFile::new(path)));
    }
    add_device_sources(&mut pipeline, &config)?;
    if pipeline.source_count() == 0 {
        bail!("no input sources: pass --device or --replay");
    }

    eprintln!("evcapture v{VERSION}");
    eprintln!("  Sources: {}", pipeline.source_count());
    eprintln!("  Outputs: {}", config.outputs.join(", "));
    eprintln!(
        "  Drain: every {} records or {}s",
        config.pipeline_config().threshold,
        config.store_after.as_secs()
    );
    eprintln!("Press Ctrl+C to stop");

    let running = pipeline.start()?;
    let stats = running.stats();
    let handle = running.handle();
    ctrlc::set_handler(move || handle.stop()).context("failed to install Ctrl+C handler")?;

    match running.wait() {
        Ok(report) => {
            match report.stop_reason {
                StopReason::SourcesClosed => info!("all sources closed"),
                StopReason::Requested | StopReason::Failed => info!("capture stopped"),
            }
            eprintln!();
            eprintln!("{}", stats.summary());
            Ok(())
        }
        Err(PipelineError::Fatal { reason, .. }) => {
            eprintln!();
            eprintln!("{}", stats.summary());
            bail!("capture aborted: {reason}")
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(target_os = "linux")]
fn add_device_sources(pipeline: &mut Pipeline, config: &Config) -> Result<()> {
    use evcapture::source::device::{list_event_devices, EventDevice};

    if !config.devices.is_empty() {
        for path in &config.devices {
            pipeline.add_source(Box::new(EventDevice::new(path)));
        }
        return Ok(());
    }
    if !config.replay.is_empty() {
        return Ok(());
    }
    let devices = list_event_devices();
    if devices.is_empty() {
        warn!("no readable event devices under /dev/input");
    }
    for device in devices {
        pipeline.add_source(Box::new(EventDevice::new(device.path)));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn add_device_sources(_pipeline: &mut Pipeline, config: &Config) -> Result<()> {
    if !config.devices.is_empty() {
        bail!("event devices are only supported on Linux");
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn cmd_devices() -> Result<()> {
    let devices = evcapture::source::device::list_event_devices();
    if devices.is_empty() {
        println!("No event devices found.");
        return Ok(());
    }

    println!("{:<24} {:<12} NAME", "PATH", "TYPE");
    for device in devices {
        println!(
            "{:<24} {:<12} {}",
            device.path.display(),
            device.device_type.name(),
            device.name.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn cmd_devices() -> Result<()> {
    println!("Event devices are only available on Linux.");
    Ok(())
}

fn cmd_schema() -> Result<()> {
    for kind in RecordKind::ALL {
        println!("{kind} ({} fields)", kind.field_count());
        for (index, field) in kind.fields().iter().enumerate() {
            match field.coding {
                Some(coding) => println!("  {index:>2}  {} [{coding:?}]", field.name),
                None => println!("  {index:>2}  {}", field.name),
            }
        }
        println!();
    }
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&PathBuf>, save: bool) -> Result<()> {
    let path = path.cloned().unwrap_or_else(Config::config_path);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save_to(&path)?;
        println!();
        println!("Saved to {}", path.display());
    }
    Ok(())
}
