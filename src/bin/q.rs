//! q CLI — send, receive and inspect queue messages.

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use q_rs::config::Config;
use q_rs::telemetry::{TelemetryConfig, init_telemetry};
use q_rs::{Engine, HandlerError, RedisStore, Stats};
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "q", about = "Redis-backed job queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a message to a queue
    Send {
        /// Name of the queue to send to
        #[arg(long)]
        queue: String,
        /// Payload to send
        #[arg(long)]
        payload: String,
    },
    /// Run a queue receiver until interrupted
    Receive {
        /// Name of the queue to receive from
        #[arg(long)]
        queue: String,
        /// Handler to run for each message
        #[arg(long, value_enum, default_value_t = HandlerKind::Debug)]
        handler: HandlerKind,
    },
    /// Print queue, worker and failure stats
    Stats {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Send a failed message back to its queue
    Retry {
        /// Position in the failure list (0 = most recent)
        index: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HandlerKind {
    /// Log the payload
    Debug,
    /// Fail with the payload as error message
    Error,
    /// Sleep for the duration given as payload ("250ms", "1.5s", "1h30m"; bare integer = ms)
    Sleep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "q".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let store =
        RedisStore::connect(config.redis_url.expose_secret(), config.redis_pool_size).await?;
    let engine = Engine::with_config(store, config.engine());

    match cli.command {
        Command::Send { queue, payload } => engine.send(&queue, &payload).await?,
        Command::Receive { queue, handler } => cmd_receive(&engine, &queue, handler).await?,
        Command::Stats { json } => cmd_stats(&engine, json).await?,
        Command::Retry { index } => {
            let message = engine.retry(index).await?;
            println!(
                "Retried: {} → {}",
                message.payload,
                message.queue.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

async fn cmd_receive(
    engine: &Engine<RedisStore>,
    queue: &str,
    handler: HandlerKind,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("interrupt received, draining");
        on_signal.cancel();
    });

    let run = |cancel: CancellationToken, payload: String| async move {
        match handler {
            HandlerKind::Debug => {
                info!(%payload, "received");
                Ok::<(), HandlerError>(())
            }
            HandlerKind::Error => Err(HandlerError::new(payload)),
            HandlerKind::Sleep => {
                let duration = parse_duration(&payload).map_err(HandlerError::new)?;
                tokio::select! {
                    _ = cancel.cancelled() => Err(HandlerError::new("cancelled while sleeping")),
                    _ = tokio::time::sleep(duration) => Ok(()),
                }
            }
        }
    };

    engine.receive(&cancel, queue, run).await?;
    Ok(())
}

async fn cmd_stats(engine: &Engine<RedisStore>, json: bool) -> anyhow::Result<()> {
    let stats = engine.stats().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &Stats) {
    println!(
        "Processed: {}   Failed: {}",
        stats.stats.processed, stats.stats.failed
    );

    println!("\n{:<30}  PENDING", "QUEUE");
    println!("{}", "-".repeat(40));
    for (name, depth) in &stats.queues {
        println!("{name:<30}  {depth}");
    }

    println!("\n{:<50}  {:>9}  {:>6}", "WORKER", "PROCESSED", "FAILED");
    println!("{}", "-".repeat(69));
    for (id, counters) in &stats.workers {
        println!(
            "{id:<50}  {:>9}  {:>6}",
            counters.processed, counters.failed
        );
    }

    println!("\n{:<5}  {:<16}  {:<20}  ERROR", "#", "QUEUE", "FAILED AT");
    println!("{}", "-".repeat(80));
    for (i, record) in stats.failed.iter().enumerate() {
        let failed_at = record
            .failed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let error = record.error.as_deref().unwrap_or("-");
        let first_line = error.lines().next().unwrap_or_default();
        println!(
            "{i:<5}  {:<16}  {failed_at:<20}  {first_line}",
            record.queue.as_deref().unwrap_or("-")
        );
    }
}

const UNITS: [(&str, u64); 7] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60_000_000_000),
    ("h", 3_600_000_000_000),
];

/// Parse durations like "250ms", "1.5s" or "1h30m". A bare integer is
/// milliseconds. Totals that do not fit in `u64` nanoseconds are rejected.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    let invalid = || format!("invalid duration: {s:?}");
    if s.is_empty() {
        return Err(invalid());
    }

    let mut rest = s;
    let mut total: u64 = 0;
    while !rest.is_empty() {
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(end);
        let end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(end);

        let scale = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, nanos)| *nanos)
            .ok_or_else(|| format!("unknown duration unit {unit:?} in {s:?}"))?;

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        // Digits past nanosecond precision are dropped.
        let frac_nanos = if frac.is_empty() {
            0
        } else {
            let digits = &frac[..frac.len().min(18)];
            let value: u128 = digits.parse().map_err(|_| invalid())?;
            (value * u128::from(scale) / 10u128.pow(digits.len() as u32)) as u64
        };

        total = whole
            .checked_mul(scale)
            .and_then(|n| n.checked_add(frac_nanos))
            .and_then(|n| total.checked_add(n))
            .ok_or_else(|| format!("duration out of range: {s:?}"))?;
        rest = tail;
    }
    Ok(Duration::from_nanos(total))
}
