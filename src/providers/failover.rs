//! Failover from a primary provider to simulated telemetry

use std::time::Duration;
use tracing::{info, warn};

use super::simulated::SimulatedProvider;
use crate::provider::Provider;
use crate::types::{LinkCommand, LinkStatus, TelemetrySample};
use crate::{Result, TelemetryError};

/// Serves the primary provider until its first transport error, then
/// simulated samples for the rest of the run.
///
/// The switch is one-way: the primary is dropped and never retried, so the
/// two sources never emit concurrently.
pub struct FailoverProvider<P> {
    primary: Option<P>,
    fallback_period: Duration,
    fallback: Option<SimulatedProvider>,
    source_hz: f64,
}

impl<P: Provider> FailoverProvider<P> {
    /// Wrap `primary`; after a failure samples arrive every `fallback_period`.
    pub fn new(primary: P, fallback_period: Duration) -> Self {
        let source_hz = primary.source_hz();
        Self { primary: Some(primary), fallback_period, fallback: None, source_hz }
    }

    /// True once the primary has been abandoned.
    pub fn has_failed_over(&self) -> bool {
        self.primary.is_none()
    }

    fn fail_over(&mut self, cause: &TelemetryError) -> &mut SimulatedProvider {
        if self.primary.take().is_some() {
            warn!(
                error = %cause,
                period_ms = self.fallback_period.as_millis() as u64,
                "Primary link failed, switching to simulated telemetry"
            );
        }
        let period = self.fallback_period;
        self.fallback.get_or_insert_with(|| {
            SimulatedProvider::new(period).with_status(LinkStatus::Disconnected)
        })
    }
}

#[async_trait::async_trait]
impl<P: Provider> Provider for FailoverProvider<P> {
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        if let Some(primary) = self.primary.as_mut() {
            let cause = match primary.next_sample().await {
                Ok(Some(sample)) => return Ok(Some(sample)),
                Ok(None) => TelemetryError::link_failed("primary source ended"),
                Err(e) => e,
            };
            let fallback = self.fail_over(&cause);
            self.source_hz = fallback.source_hz();
        }

        match self.fallback.as_mut() {
            Some(fallback) => fallback.next_sample().await,
            None => Ok(None),
        }
    }

    fn link_status(&self) -> LinkStatus {
        match &self.primary {
            Some(primary) => primary.link_status(),
            None => LinkStatus::Disconnected,
        }
    }

    fn source_hz(&self) -> f64 {
        self.source_hz
    }

    async fn send_command(&mut self, command: LinkCommand) -> Result<()> {
        match self.primary.as_mut() {
            Some(primary) => primary.send_command(command).await,
            None => {
                info!(command = ?command, "Command dropped, link is down");
                Err(TelemetryError::link_failed(format!(
                    "cannot send {:?}, running on simulated telemetry",
                    command
                )))
            }
        }
    }
}
