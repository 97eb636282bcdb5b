//! Core types for decoded telemetry and launch records.
//!
//! - [`TelemetrySample`] is one decoded, validated measurement snapshot
//! - [`LaunchRecord`] is the finalized artifact of a recording session
//! - [`LinkStatus`] and [`LinkCommand`] describe the physical link
//! - [`UpdateRate`] controls how often a subscriber receives samples
//!
//! All wire-visible types serialize with the camelCase field names the
//! dashboard clients expect.

mod link;
mod record;
mod sample;
mod update_rate;

pub use link::{LinkCommand, LinkStatus};
pub use record::{
    DEFAULT_LANDING_COORDS, LandingCoords, LaunchRecord, LaunchStatus, LaunchSummary,
};
pub use sample::{
    BATTERY_PLACEHOLDER, FlightPhase, ParachuteStatus, SyntheticFields, TelemetrySample,
};
pub use update_rate::UpdateRate;
