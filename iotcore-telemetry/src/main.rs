use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use iotcore_telemetry::{
    connect, prompt, DeviceConfig, FailurePolicy, Publisher, PublisherOptions, Schema,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::BufReader;
use tracing::{info, Level};

/// Messages sent by the v1.1 schema when no count is given.
const DEFAULT_MESSAGES: u32 = 10;

/// Publishes synthetic telemetry of a single device to a cloud IoT broker.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Credentials file with the device configuration, JSON or TOML.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Payload schema. Defaults to v1.2 with a config file and v1.1 without.
    #[arg(short, long, value_enum)]
    schema: Option<Schema>,
    /// Number of messages to send.
    #[arg(short = 'n', long, conflicts_with = "forever")]
    messages: Option<u32>,
    /// Publish until the reconnect backoff gives up.
    #[arg(long)]
    forever: bool,
    /// Seconds between two publishes, defaults to the schema's interval.
    #[arg(short, long)]
    interval: Option<u64>,
    /// Re-open the session after a failed publish instead of staying
    /// disconnected.
    #[arg(long)]
    reconnect_after_failure: bool,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    let (config, default_schema) = match &args.config {
        Some(path) => (
            DeviceConfig::load(path)
                .await
                .with_context(|| format!("couldn't load \"{}\"", path.display()))?,
            Schema::V1_2,
        ),
        None => (DeviceConfig::default(), Schema::V1_1),
    };
    let schema = args.schema.unwrap_or(default_schema);

    let messages = match (args.forever, args.messages, schema) {
        (true, _, _) => None,
        (false, Some(count), _) => Some(count),
        (false, None, Schema::V1_2) => Some(
            prompt::message_count(BufReader::new(tokio::io::stdin()), &mut tokio::io::stdout())
                .await?,
        ),
        (false, None, Schema::V1_1) => Some(DEFAULT_MESSAGES),
    };

    let mut session = connect(&config)
        .await
        .context("couldn't prepare the device session")?;

    let mut options = PublisherOptions::new(config.identity().events_topic(), schema);
    options.messages = messages;
    if let Some(secs) = args.interval {
        options.interval = Duration::from_secs(secs);
    }
    if args.reconnect_after_failure {
        options.on_failure = FailurePolicy::Reconnect;
    }

    let mut publisher = Publisher::new(options, StdRng::from_entropy());
    let report = publisher.run(&mut session).await;
    publisher.shutdown(&mut session).await;

    info!(
        outcome = ?report.outcome,
        iterations = report.iterations,
        published = report.published,
        acknowledged = report.acknowledged,
        received = report.received,
        failures = report.failures,
        "done"
    );
    Ok(())
}
