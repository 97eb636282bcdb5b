//! Link state and outbound link commands

use serde::{Deserialize, Serialize};

/// Where the station currently gets its samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Physical link open and delivering bytes
    Connected,
    /// The physical link dropped; simulated samples are flowing
    Disconnected,
    /// No physical link was available at startup
    Simulated,
}

impl LinkStatus {
    /// True when outbound commands can reach the vehicle.
    pub fn is_open(self) -> bool {
        matches!(self, LinkStatus::Connected)
    }
}

/// Fire-and-forget operator commands written to the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "snake_case")]
pub enum LinkCommand {
    /// Force parachute deployment
    Eject,
    /// Recenter the fin servos
    Center,
}

impl LinkCommand {
    /// ASCII line sent to the flight computer.
    pub fn wire_line(self) -> &'static [u8] {
        match self {
            LinkCommand::Eject => b"EJECT\n",
            LinkCommand::Center => b"CENTER\n",
        }
    }
}
