//! Groundlink station CLI
//!
//! Streams decoded telemetry as JSON lines on stdout and accepts control
//! messages as JSON lines on stdin. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Read the radio on the default port
//! groundlink --port /dev/ttyACM0
//!
//! # No hardware: simulated telemetry, records under ./launch_data
//! groundlink --simulate
//!
//! # Start and stop a recording from another process
//! echo '{"type":"start_recording"}' | groundlink --config station.yaml
//! ```

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use groundlink::control::{self, TelemetryMessage};
use groundlink::providers::SimulatedProvider;
use groundlink::{
    CoordinateGeocoder, JsonFileStore, Station, StationConfig, StationConnection, UpdateRate,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::{info, warn};

/// Rocket telemetry ground station
#[derive(Parser, Debug)]
#[command(name = "groundlink")]
#[command(version)]
#[command(about = "Decode, fan out and record rocket telemetry", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial device, overrides the config file
    #[arg(short, long, value_name = "PATH")]
    port: Option<String>,

    /// Baud rate, overrides the config file
    #[arg(short, long)]
    baud: Option<u32>,

    /// Run on simulated telemetry without opening the port
    #[arg(long)]
    simulate: bool,

    /// Directory for launch records, overrides the config file
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Maximum telemetry output rate in Hz
    #[arg(long, value_name = "HZ")]
    rate: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut StationConfig) {
        if let Some(port) = &self.port {
            config.serial_port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "groundlink=debug" } else { "groundlink=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => StationConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => StationConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let station = if args.simulate {
        Station::with_provider(
            SimulatedProvider::new(config.fallback_interval()),
            &config,
            Arc::new(JsonFileStore::new(&config.data_dir)),
            Arc::new(CoordinateGeocoder),
        )?
    } else {
        Station::connect(config.clone())?
    };
    info!(
        link = ?station.link_status(),
        data_dir = %config.data_dir.display(),
        "Ground station running"
    );

    let rate = args.rate.map_or(UpdateRate::Native, UpdateRate::Max);
    run(&station, rate).await?;

    station.shutdown();
    wait_for_shutdown(&station).await;
    Ok(())
}

/// Pump telemetry to stdout and control messages from stdin until Ctrl-C.
async fn run(station: &StationConnection, rate: UpdateRate) -> anyhow::Result<()> {
    let mut samples = station.subscribe(rate);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut stdin_open = true;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("Interrupted, shutting down");
                break;
            }
            sample = samples.next() => match sample {
                Some(sample) => {
                    write_line(&mut stdout, &TelemetryMessage::new(&sample).to_json()?).await?;
                }
                None => {
                    warn!("Station stopped");
                    break;
                }
            },
            line = lines.next_line(), if stdin_open => match line.context("reading stdin")? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Some(response) = control::handle(station, &line).await {
                        write_line(&mut stdout, &response.to_json()?).await?;
                    }
                }
                None => {
                    info!("stdin closed, control channel disabled");
                    stdin_open = false;
                }
            },
        }
    }
    Ok(())
}

async fn write_line(stdout: &mut Stdout, line: &str) -> anyhow::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Give the event loop a moment to save an in-progress recording.
///
/// The status stream ends once the loop has finished and dropped its sender.
async fn wait_for_shutdown(station: &StationConnection) {
    let mut updates = station.link_status_updates();
    let stopped = async { while updates.next().await.is_some() {} };
    if tokio::time::timeout(Duration::from_secs(2), stopped).await.is_err() {
        warn!("Station did not stop in time");
    }
}
