//! Pulse Demo - runs a paced Source → Stage → Sink pipeline
//!
//! Usage: cargo run --bin pulse-demo -- --count 20 --interval-ms 50
//!
//! The source emits `1..=count`, the stage squares each value and the sink
//! sums them. Tick pulls the source; Accounting re-paces the tick from the
//! latency the stage and sink report.

use anyhow::{Context, Result};
use clap::Parser;
use pulse_actors::ActorSystem;
use pulse_config::{load_config, logging};
use pulse_streams::{wiring, Accounting, Sink, Source, Stage, Tick};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[clap(name = "pulse-demo")]
struct Args {
    /// Configuration file (defaults are used when omitted)
    #[clap(long)]
    config: Option<PathBuf>,

    /// Environment overlay under `environments/` next to the config file
    #[clap(long)]
    env: Option<String>,

    /// Number of values the source emits
    #[clap(long, default_value = "20")]
    count: u64,

    /// Initial tick interval in milliseconds (configured value when omitted)
    #[clap(long)]
    interval_ms: Option<u64>,

    /// Give up after this many seconds
    #[clap(long, default_value = "30")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.clone(), args.env.as_deref())
        .context("Failed to load configuration")?;
    logging::init(&config.logging).context("Failed to initialise logging")?;

    let system = ActorSystem::from_config(&config).context("Failed to create actor system")?;
    info!(system = %system.system_id(), count = args.count, "Pulse demo starting");

    let total = Arc::new(AtomicU64::new(0));
    let sum = Arc::clone(&total);

    let accounting = Accounting::builder()
        .with_settings(&config.streams)
        .name("accounting")
        .spawn(&system)?;
    let source = Source::builder()
        .values(1..=args.count)
        .name("numbers")
        .spawn(&system)?;
    let stage = Stage::builder()
        .transform(|value: u64| value * value)
        .accounting(accounting.actor_ref().clone())
        .name("square")
        .spawn(&system)?;
    let (sink, mut completion) = Sink::builder()
        .consume(move |value: u64| {
            sum.fetch_add(value, Ordering::Relaxed);
        })
        .accounting(accounting.actor_ref().clone())
        .name("sum")
        .spawn(&system)?;

    // Subscriptions only: every pull comes from the tick
    wiring::subscribe(source.actor_ref(), stage.actor_ref()).await?;
    wiring::subscribe(stage.actor_ref(), sink.actor_ref()).await?;

    let mut tick = Tick::builder()
        .source(source.actor_ref().clone())
        .settings(&config.streams)
        .name("tick");
    if let Some(ms) = args.interval_ms {
        tick = tick.interval(Duration::from_millis(ms));
    }
    let tick = tick.spawn(&system)?;
    wiring::subscribe(accounting.actor_ref(), tick.actor_ref()).await?;

    let finished = tokio::select! {
        done = completion.wait() => done,
        _ = tokio::time::sleep(Duration::from_secs(args.timeout_secs)) => {
            warn!(timeout_secs = args.timeout_secs, "Pipeline did not complete in time");
            false
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            false
        }
    };

    match pulse_streams::tick_stats(tick.actor_ref()).await {
        Ok(stats) => info!(
            fired = stats.fired,
            interval_ms = stats.interval.as_millis() as u64,
            "Tick summary"
        ),
        Err(e) => warn!(error = %e, "Tick stats unavailable"),
    }

    tick.stop().await?;
    accounting.stop().await?;
    let stats = system.stats();
    info!(
        finished,
        sum = total.load(Ordering::Relaxed),
        messages = stats.messages_processed,
        failures = stats.handler_failures,
        "Pulse demo finished"
    );

    system.shutdown().await?;
    Ok(())
}
