//! Packet validation and field decoding

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::layout::{FrameLayout, SYNC_BYTE};
use crate::types::{
    BATTERY_PLACEHOLDER, FlightPhase, ParachuteStatus, SyntheticFields, TelemetrySample,
};
use crate::{Result, TelemetryError};

/// Additive checksum over the payload.
///
/// Wrapping sum of every byte after the sync byte and before the trailing
/// checksum byte. This is a weak check (byte transpositions go unnoticed) but
/// it is what the firmware sends; changing it needs a new protocol revision.
pub fn checksum(frame: &[u8]) -> u8 {
    if frame.len() < 2 {
        return 0;
    }
    frame[1..frame.len() - 1].iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// How values the firmware does not transmit are filled in.
///
/// Either way the affected fields are flagged in
/// [`TelemetrySample::synthetic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum SynthesisPolicy {
    /// Plausible random values, matching what dashboards have always shown
    #[default]
    Random,
    /// Deterministic constants
    Fixed,
}

impl SynthesisPolicy {
    fn speed(self) -> f32 {
        match self {
            SynthesisPolicy::Random => rand::thread_rng().gen_range(0.0..150.0),
            SynthesisPolicy::Fixed => 0.0,
        }
    }

    fn pressure(self) -> f32 {
        match self {
            SynthesisPolicy::Random => 1013.25 + rand::thread_rng().gen_range(-10.0..10.0),
            SynthesisPolicy::Fixed => 1013.25,
        }
    }

    fn humidity(self) -> f32 {
        match self {
            SynthesisPolicy::Random => rand::thread_rng().gen_range(50.0..80.0),
            SynthesisPolicy::Fixed => 0.0,
        }
    }
}

/// Validates candidate frames and decodes them into samples.
#[derive(Debug, Clone)]
pub struct PacketDecoder {
    layout: FrameLayout,
    synthesis: SynthesisPolicy,
}

impl PacketDecoder {
    /// Create a decoder for one frame layout.
    pub fn new(layout: FrameLayout, synthesis: SynthesisPolicy) -> Self {
        Self { layout, synthesis }
    }

    /// Layout this decoder expects.
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Decode a frame, stamping it with the current wall-clock time.
    pub fn decode(&self, frame: &[u8]) -> Result<TelemetrySample> {
        self.decode_at(frame, chrono::Utc::now().timestamp_millis())
    }

    /// Decode a frame with an explicit capture timestamp (ms since epoch).
    ///
    /// Returns an error without building anything when the length, sync
    /// byte or checksum is wrong, or when a field holds a non-finite float
    /// or an out-of-range enumeration byte.
    pub fn decode_at(&self, frame: &[u8], timestamp: i64) -> Result<TelemetrySample> {
        if frame.len() != self.layout.frame_len {
            return Err(TelemetryError::frame_error(format!(
                "expected {} bytes, got {}",
                self.layout.frame_len,
                frame.len()
            )));
        }
        if frame[0] != SYNC_BYTE {
            return Err(TelemetryError::frame_error(format!(
                "frame starts with {:#04x}, not the sync byte",
                frame[0]
            )));
        }

        let expected = checksum(frame);
        let found = frame[self.layout.checksum_offset()];
        if expected != found {
            return Err(TelemetryError::Checksum { expected, found });
        }

        let f = &self.layout.fields;
        let mut synthetic = SyntheticFields { battery: true, ..Default::default() };

        let connect = match f.connect {
            Some(offset) => read_f32(frame, offset, "connect")?,
            None => {
                synthetic.connect = true;
                0.0
            }
        };
        let humidity = match f.humidity {
            Some(offset) => read_f32(frame, offset, "humidity")?,
            None => {
                synthetic.humidity = true;
                self.synthesis.humidity()
            }
        };
        let speed = match f.speed {
            Some(offset) => read_f32(frame, offset, "speed")?,
            None => {
                synthetic.speed = true;
                self.synthesis.speed()
            }
        };
        let pressure = match f.pressure {
            Some(offset) => read_f32(frame, offset, "pressure")?,
            None => {
                synthetic.pressure = true;
                self.synthesis.pressure()
            }
        };

        let parachute_status = ParachuteStatus::try_from(frame[f.parachute_status])
            .map_err(|e| TelemetryError::decode_error("parachute_status", e))?;
        let flight_phase = FlightPhase::try_from(frame[f.flight_phase])
            .map_err(|e| TelemetryError::decode_error("flight_phase", e))?;

        Ok(TelemetrySample {
            timestamp,
            roll: read_f32(frame, f.roll, "roll")?,
            pitch: read_f32(frame, f.pitch, "pitch")?,
            yaw: read_f32(frame, f.yaw, "yaw")?,
            latitude: read_f32(frame, f.latitude, "latitude")?,
            longitude: read_f32(frame, f.longitude, "longitude")?,
            altitude: read_f32(frame, f.altitude, "altitude")?,
            temperature: read_f32(frame, f.temperature, "temperature")?,
            connect,
            humidity,
            speed,
            pressure,
            parachute_status,
            flight_phase,
            battery: BATTERY_PLACEHOLDER,
            synthetic,
        })
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new(FrameLayout::V2, SynthesisPolicy::default())
    }
}

fn read_f32(frame: &[u8], offset: usize, field: &'static str) -> Result<f32> {
    let bytes = frame.get(offset..offset + 4).ok_or_else(|| {
        TelemetryError::decode_error(field, format!("offset {} past frame end", offset))
    })?;
    let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if !value.is_finite() {
        return Err(TelemetryError::decode_error(field, format!("non-finite value {}", value)));
    }
    Ok(value)
}
