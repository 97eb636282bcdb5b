//! Decoded telemetry sample types

use serde::{Deserialize, Serialize};

/// Battery level reported until the flight computer transmits a real one.
pub const BATTERY_PLACEHOLDER: f32 = 100.0;

/// Flight phase reported by the flight computer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FlightPhase {
    #[default]
    Standby = 0,
    Launched = 1,
    Powered = 2,
    Coasting = 3,
    Apogee = 4,
    Descent = 5,
    Landed = 6,
}

impl FlightPhase {
    /// All phases in firmware order.
    pub const ALL: [FlightPhase; 7] = [
        FlightPhase::Standby,
        FlightPhase::Launched,
        FlightPhase::Powered,
        FlightPhase::Coasting,
        FlightPhase::Apogee,
        FlightPhase::Descent,
        FlightPhase::Landed,
    ];

    /// Human readable phase name.
    pub fn name(self) -> &'static str {
        match self {
            FlightPhase::Standby => "standby",
            FlightPhase::Launched => "launched",
            FlightPhase::Powered => "powered",
            FlightPhase::Coasting => "coasting",
            FlightPhase::Apogee => "apogee",
            FlightPhase::Descent => "descent",
            FlightPhase::Landed => "landed",
        }
    }
}

impl From<FlightPhase> for u8 {
    fn from(phase: FlightPhase) -> Self {
        phase as u8
    }
}

impl TryFrom<u8> for FlightPhase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FlightPhase::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("flight phase {} out of range 0..=6", value))
    }
}

/// Parachute state byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ParachuteStatus {
    #[default]
    Stowed = 0,
    Deployed = 1,
    /// Deployment forced by an operator `EJECT` command.
    EmergencyCommanded = 2,
}

impl From<ParachuteStatus> for u8 {
    fn from(status: ParachuteStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for ParachuteStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ParachuteStatus::Stowed),
            1 => Ok(ParachuteStatus::Deployed),
            2 => Ok(ParachuteStatus::EmergencyCommanded),
            other => Err(format!("parachute status {} out of range 0..=2", other)),
        }
    }
}

/// Marks which sample fields were fabricated instead of measured.
///
/// The current firmware does not transmit every field the ground station
/// publishes. Missing values are filled in by the decoder and flagged here so
/// consumers can tell real telemetry from placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct SyntheticFields {
    pub connect: bool,
    pub humidity: bool,
    pub speed: bool,
    pub pressure: bool,
    pub battery: bool,
    /// The whole sample came from the simulated source.
    pub all: bool,
}

impl SyntheticFields {
    /// Flags for a fully simulated sample.
    pub fn simulated() -> Self {
        Self {
            connect: true,
            humidity: true,
            speed: true,
            pressure: true,
            battery: true,
            all: true,
        }
    }

    /// True when at least one field was fabricated.
    pub fn any(&self) -> bool {
        self.all || self.connect || self.humidity || self.speed || self.pressure || self.battery
    }
}

/// One decoded, validated telemetry snapshot.
///
/// Every numeric field is finite. Samples are immutable once built and are
/// shared with subscribers behind an `Arc`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Degrees
    pub roll: f32,
    /// Degrees
    pub pitch: f32,
    /// Degrees
    pub yaw: f32,
    /// Degrees
    pub latitude: f32,
    /// Degrees
    pub longitude: f32,
    /// Meters
    pub altitude: f32,
    /// Degrees Celsius
    pub temperature: f32,
    /// Recovery pin state
    pub connect: f32,
    /// Percent relative humidity
    pub humidity: f32,
    /// m/s
    pub speed: f32,
    /// hPa
    pub pressure: f32,
    pub parachute_status: ParachuteStatus,
    pub flight_phase: FlightPhase,
    /// Percent
    pub battery: f32,
    #[serde(default)]
    pub synthetic: SyntheticFields,
}

impl TelemetrySample {
    /// Iterate over every float field with its name.
    pub fn float_fields(&self) -> [(&'static str, f32); 12] {
        [
            ("roll", self.roll),
            ("pitch", self.pitch),
            ("yaw", self.yaw),
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("altitude", self.altitude),
            ("temperature", self.temperature),
            ("connect", self.connect),
            ("humidity", self.humidity),
            ("speed", self.speed),
            ("pressure", self.pressure),
            ("battery", self.battery),
        ]
    }

    /// True when every float field is finite.
    pub fn is_finite(&self) -> bool {
        self.float_fields().iter().all(|(_, v)| v.is_finite())
    }
}

impl Default for TelemetrySample {
    fn default() -> Self {
        Self {
            timestamp: 0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            temperature: 0.0,
            connect: 0.0,
            humidity: 0.0,
            speed: 0.0,
            pressure: 0.0,
            parachute_status: ParachuteStatus::Stowed,
            flight_phase: FlightPhase::Standby,
            battery: BATTERY_PLACEHOLDER,
            synthetic: SyntheticFields::default(),
        }
    }
}
