//! Ground station telemetry pipeline for sounding rockets.
//!
//! Groundlink reads the flight computer's binary telemetry frames from a
//! serial radio, validates and decodes them, fans the samples out to any
//! number of subscribers and records launches into replayable
//! [`LaunchRecord`]s.
//!
//! # Features
//!
//! - **Resynchronizing framing**: recovers from line noise and partial reads
//! - **Checksum validation**: corrupt frames are dropped, never published
//! - **Non-blocking fan-out**: slow subscribers lose samples, never stall
//!   ingestion
//! - **Failover**: a lost link switches to simulated telemetry
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use groundlink::{Station, StationConfig, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> groundlink::Result<()> {
//!     let station = Station::connect(StationConfig::default())?;
//!     let mut samples = station.subscribe(UpdateRate::Max(5));
//!
//!     station.start_recording(Some("34.431, 127.535".into())).await?;
//!     while let Some(sample) = samples.next().await {
//!         println!("altitude {} m, phase {}", sample.altitude, sample.flight_phase.name());
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tracing::{info, warn};

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Ingestion pipeline
pub mod fanout;
pub mod protocol;
pub mod session;

// Stream-based station architecture
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Collaborators and surfaces
pub mod config;
pub mod control;
pub mod geocode;
pub mod store;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::StationConfig;
pub use connection::StationConnection;
pub use driver::StationEvent;
pub use geocode::{CoordinateGeocoder, Geocoder};
pub use provider::Provider;
pub use session::StartOutcome;
pub use store::{JsonFileStore, LaunchStore, MemoryStore};

use providers::{FailoverProvider, SerialProvider, SimulatedProvider};

/// Unified entry point for ground station connections.
///
/// Every constructor spawns the event loop onto the current Tokio runtime and
/// returns a [`StationConnection`]; dropping it stops the station.
pub struct Station;

impl Station {
    /// Open the configured serial port and start the station.
    ///
    /// If the port cannot be opened the station runs on simulated telemetry
    /// at `fallback_interval_ms` and reports [`LinkStatus::Simulated`]. If
    /// the link drops later it switches to simulated telemetry at
    /// `failover_interval_ms` and reports [`LinkStatus::Disconnected`].
    ///
    /// Records are saved as JSON files under `data_dir`. Must be called
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error only if the configuration is invalid.
    pub fn connect(config: StationConfig) -> Result<StationConnection> {
        config.validate()?;
        let store: Arc<dyn LaunchStore> = Arc::new(JsonFileStore::new(&config.data_dir));
        let geocoder: Arc<dyn Geocoder> = Arc::new(CoordinateGeocoder);

        match SerialProvider::open(
            &config.serial_port,
            config.baud_rate,
            *config.layout(),
            config.synthesis,
        ) {
            Ok(serial) => {
                info!(port = %config.serial_port, "Station connected to serial link");
                let provider = FailoverProvider::new(serial, config.failover_interval());
                Self::with_provider(provider, &config, store, geocoder)
            }
            Err(e) => {
                warn!(
                    port = %config.serial_port,
                    error = %e,
                    "Serial link unavailable, starting on simulated telemetry"
                );
                let provider = SimulatedProvider::new(config.fallback_interval());
                Self::with_provider(provider, &config, store, geocoder)
            }
        }
    }

    /// Start a station on simulated telemetry only.
    ///
    /// Records are kept in memory. Must be called within a Tokio runtime.
    pub fn simulated(config: StationConfig) -> Result<StationConnection> {
        config.validate()?;
        let provider = SimulatedProvider::new(config.fallback_interval());
        Self::with_provider(
            provider,
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(CoordinateGeocoder),
        )
    }

    /// Start a station over any provider with explicit collaborators.
    ///
    /// Must be called within a Tokio runtime.
    pub fn with_provider<P: Provider>(
        provider: P,
        config: &StationConfig,
        store: Arc<dyn LaunchStore>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Result<StationConnection> {
        config.validate()?;
        let options = driver::DriverOptions {
            store: Arc::clone(&store),
            geocoder,
            geocode_timeout: config.geocode_timeout(),
            default_launch_site: config.default_launch_site.clone(),
            event_capacity: config.event_capacity,
        };
        let channels = driver::Driver::spawn(provider, options);
        Ok(StationConnection::new(channels, store, config.subscriber_capacity))
    }
}
