//! Provider trait for telemetry sources

use crate::types::{LinkCommand, LinkStatus, TelemetrySample};
use crate::{Result, TelemetryError};

/// Trait for telemetry data sources
///
/// Providers abstract over the serial link, the simulated generator and the
/// failover wrapper that switches between them. Each one handles its own
/// timing: the serial provider waits on the port, the simulated one on a
/// ticker.
///
/// The driver polls `next_sample` inside a `select!`, so implementations
/// must be cancel safe: dropping the future between samples must not lose
/// bytes already read from the transport.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next valid telemetry sample
    ///
    /// Returns:
    /// - `Ok(Some(sample))` - New sample available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Transport error
    ///
    /// Frames that fail framing or validation are dropped inside the
    /// provider and never surface here.
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>>;

    /// Current link state
    fn link_status(&self) -> LinkStatus;

    /// Nominal sample rate in Hz
    fn source_hz(&self) -> f64;

    /// Send an operator command down the link
    ///
    /// Fire-and-forget; no acknowledgement is awaited. Sources without an
    /// uplink reject every command.
    async fn send_command(&mut self, command: LinkCommand) -> Result<()> {
        Err(TelemetryError::link_failed(format!(
            "no uplink available for {:?} command",
            command
        )))
    }
}
