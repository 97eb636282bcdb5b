//! Simulated telemetry provider

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::Result;
use crate::provider::Provider;
use crate::types::{
    FlightPhase, LinkStatus, ParachuteStatus, SyntheticFields, TelemetrySample,
};

/// Default pad the generator flies around.
pub const SIMULATED_ORIGIN: (f32, f32) = (37.5665, 126.978);

/// Provider that fabricates plausible samples on a fixed period
///
/// Used when no serial link is available and as the failover source when
/// the link drops. Every sample is flagged as fully synthetic.
pub struct SimulatedProvider {
    interval: Interval,
    period: Duration,
    rng: StdRng,
    status: LinkStatus,
    generated: u64,
}

impl SimulatedProvider {
    /// Create a generator emitting one sample per `period`.
    pub fn new(period: Duration) -> Self {
        Self::with_rng(period, StdRng::from_entropy())
    }

    /// Create a generator with a fixed seed, for reproducible runs.
    pub fn seeded(period: Duration, seed: u64) -> Self {
        Self::with_rng(period, StdRng::seed_from_u64(seed))
    }

    fn with_rng(period: Duration, rng: StdRng) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = interval(period);
        // Don't burst after a stall
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_ms = period.as_millis() as u64, "Simulated telemetry enabled");
        Self { interval, period, rng, status: LinkStatus::Simulated, generated: 0 }
    }

    /// Report a different link status, e.g. `Disconnected` after a failover.
    pub fn with_status(mut self, status: LinkStatus) -> Self {
        self.status = status;
        self
    }

    /// Period between samples.
    pub fn period(&self) -> Duration {
        self.period
    }

    fn generate(&mut self) -> TelemetrySample {
        let rng = &mut self.rng;
        let (lat, lon) = SIMULATED_ORIGIN;

        let parachute_status =
            if rng.gen_bool(0.5) { ParachuteStatus::Deployed } else { ParachuteStatus::Stowed };
        let flight_phase = FlightPhase::ALL[rng.gen_range(0..FlightPhase::ALL.len())];

        TelemetrySample {
            timestamp: Utc::now().timestamp_millis(),
            roll: rng.gen_range(-180.0..180.0),
            pitch: rng.gen_range(-180.0..180.0),
            yaw: rng.gen_range(0.0..360.0),
            latitude: lat + rng.gen_range(-0.005..0.005),
            longitude: lon + rng.gen_range(-0.005..0.005),
            altitude: rng.gen_range(0.0..1000.0),
            temperature: rng.gen_range(20.0..30.0),
            connect: 0.0,
            humidity: rng.gen_range(50.0..80.0),
            speed: rng.gen_range(0.0..150.0),
            pressure: rng.gen_range(1003.0..1023.0),
            parachute_status,
            flight_phase,
            battery: rng.gen_range(0.0..100.0),
            synthetic: SyntheticFields::simulated(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for SimulatedProvider {
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        // Interval::tick is cancel safe
        self.interval.tick().await;

        let sample = self.generate();
        self.generated += 1;
        if self.generated % 100 == 0 {
            debug!(generated = self.generated, "Simulated samples emitted");
        }
        Ok(Some(sample))
    }

    fn link_status(&self) -> LinkStatus {
        self.status
    }

    fn source_hz(&self) -> f64 {
        1.0 / self.period.as_secs_f64()
    }
}
