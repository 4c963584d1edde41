use anyhow::Context as _;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use meterkit_metrics::{
    DistributionSummary, Gauge, InMemoryRegistry, MeterRegistry, MetricsSnapshot, TagSet, Timer,
    TimerConfig, measure,
};

use crate::cli::DemoArgs;
use crate::cmd_error::CmdError;
use crate::output;

const FAILURE_EVERY: u64 = 7;

/// Simulated rejection returned by every seventh operation.
#[derive(Debug)]
struct Rejected;

pub fn demo(args: DemoArgs) -> Result<(), CmdError> {
    let mut config = TimerConfig::new()
        .percentiles(args.percentiles.iter().copied())
        .sla(args.sla.iter().copied());
    if let Some(n) = args.max_samples {
        config = config.max_samples(n);
    }
    config
        .validate()
        .context("invalid latency timer config")
        .map_err(CmdError::invalid_input)?;

    let registry = InMemoryRegistry::new();
    let snapshot = run_workload(&registry, &config, args.threads, args.iterations)
        .map_err(CmdError::runtime)?;

    let rendered = output::render(&snapshot, args.format).map_err(CmdError::runtime)?;
    output::emit(&rendered, args.out.as_deref()).map_err(CmdError::runtime)
}

fn run_workload(
    registry: &InMemoryRegistry,
    config: &TimerConfig,
    threads: u16,
    iterations: u64,
) -> anyhow::Result<MetricsSnapshot> {
    let tags = TagSet::from_pairs([("route", "demo")]);
    let latency = registry
        .timer("demo.latency", &tags, config)
        .context("register latency timer")?;
    let payload = registry
        .summary("demo.payload.size", &tags)
        .context("register payload summary")?;
    let in_flight = registry
        .gauge("demo.in_flight", &TagSet::new())
        .context("register in-flight gauge")?;
    let active = AtomicI64::new(0);

    tracing::info!(threads, iterations, "starting demo workload");

    std::thread::scope(|s| {
        for worker in 0..u64::from(threads) {
            let (tags, latency, payload, in_flight, active) =
                (&tags, &latency, &payload, &in_flight, &active);
            s.spawn(move || {
                for i in 0..iterations {
                    let seq = worker * iterations + i;
                    in_flight.set((active.fetch_add(1, Ordering::Relaxed) + 1) as f64);

                    let res = measure(registry, "demo.op", tags, || {
                        latency.record_with(|| std::thread::sleep(simulated_latency(seq)));
                        payload.record(payload_size(seq));
                        if seq % FAILURE_EVERY == FAILURE_EVERY - 1 {
                            Err(Rejected)
                        } else {
                            Ok(seq)
                        }
                    });
                    if let Err(err) = res {
                        tracing::trace!(seq, ?err, "operation failed");
                    }

                    in_flight.set((active.fetch_sub(1, Ordering::Relaxed) - 1) as f64);
                }
            });
        }
    });
    // Workers race on their final `set`; publish the settled value.
    in_flight.set(active.load(Ordering::Relaxed) as f64);

    let snapshot = registry.snapshot();
    tracing::info!(points = snapshot.len(), "demo workload finished");
    Ok(snapshot)
}

fn simulated_latency(seq: u64) -> Duration {
    Duration::from_micros(50 + (seq % 5) * 100)
}

fn payload_size(seq: u64) -> f64 {
    (64 + (seq * 37) % 1024) as f64
}
