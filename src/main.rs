//! Collects one snapshot of consumer group offsets and writes it to stdout as JSON lines.
//!
//! ```text
//! consumer-lag <config.toml>
//! ```

use std::process::ExitCode;
use std::time::Duration;

use consumer_lag::client::rdkafka::RdKafkaConnector;
use consumer_lag::emit::JsonLinesSink;
use consumer_lag::{Collector, Config, Error};
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Settings {
    bootstrap_servers: Vec<String>,

    #[serde(default)]
    timeout_ms: Option<u64>,

    #[serde(flatten)]
    collect: Config,
}

fn load(path: &str) -> Result<Settings, Error> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| Error::Configuration(format!("cannot read {path}: {err}")))?;

    toml::from_str(&raw).map_err(|err| Error::Configuration(format!("invalid config {path}: {err}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: consumer-lag <config.toml>");
        return ExitCode::FAILURE;
    };

    let settings = match load(&path) {
        Ok(settings) => settings,
        Err(err) => {
            error!(%err, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut connector = RdKafkaConnector::new(&settings.bootstrap_servers);
    if let Some(timeout_ms) = settings.timeout_ms {
        connector = connector.timeout(Duration::from_millis(timeout_ms));
    }

    let sink = JsonLinesSink::new(std::io::stdout());
    let collector = match Collector::from_config(connector, sink, &settings.collect) {
        Ok(collector) => collector,
        Err(err) => {
            error!(%err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match collector.collect().await {
        Ok(report) => {
            info!(
                groups = report.groups.len(),
                records = report.emitted_records(),
                failures = report.failures.len(),
                "Collected consumer offsets",
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "Failed to collect consumer offsets");
            ExitCode::FAILURE
        }
    }
}
