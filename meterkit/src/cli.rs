use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim())
        .map_err(|err| format!("invalid duration '{input}' ({err}; expected e.g. 20ms, 1s)"))
}

fn parse_percentile(input: &str) -> Result<f64, String> {
    let p: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid percentile '{input}' (expected e.g. 0.5, 0.99)"))?;
    if p > 0.0 && p <= 1.0 {
        Ok(p)
    } else {
        Err(format!("percentile {p} is outside (0, 1]"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON snapshot (`{"points":[...]}`).
    Json,
    /// Indented JSON snapshot.
    JsonPretty,
    /// One OpenTelemetry JSON document per line.
    Otel,
    /// Prometheus text exposition lines.
    Prometheus,
}

#[derive(Debug, Parser)]
#[command(
    name = "meterkit",
    author,
    version,
    about = "In-process metrics registry: drive a demo workload or convert saved snapshots",
    after_help = "Examples:\n  meterkit demo --threads 4 --iterations 500 --percentile 0.5 --percentile 0.99 --sla 5ms\n  meterkit demo --format json --out snapshot.json\n  meterkit convert snapshot.json --format prometheus"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a synthetic measured workload and print the resulting snapshot
    Demo(DemoArgs),

    /// Re-export a saved JSON snapshot in another format
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Measured operations per worker thread
    #[arg(long, default_value_t = 100)]
    pub iterations: u64,

    /// Number of worker threads
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// Latency percentile to publish (repeatable, in (0, 1])
    #[arg(long = "percentile", value_name = "P", value_parser = parse_percentile)]
    pub percentiles: Vec<f64>,

    /// Latency SLA boundary to count hits for (repeatable, e.g. 1ms)
    #[arg(long = "sla", value_name = "DURATION", value_parser = parse_duration)]
    pub sla: Vec<Duration>,

    /// Keep only the most recent N latency samples for percentiles
    #[arg(long, value_name = "N")]
    pub max_samples: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::JsonPretty)]
    pub format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// JSON snapshot produced by `meterkit demo --format json`
    pub input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Prometheus)]
    pub format: OutputFormat,

    /// Write output to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}
