//! Telemetry source implementations

pub mod failover;
pub mod serial;
pub mod simulated;

pub use failover::FailoverProvider;
pub use serial::SerialProvider;
pub use simulated::SimulatedProvider;
