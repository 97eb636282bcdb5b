//! Binary frame layouts
//!
//! Each protocol revision freezes the byte offset of every field. The
//! firmware and the decoder must agree on the revision; moving a field is a
//! breaking change and gets a new revision.
//!
//! ## Revision 2 (44 bytes, current)
//!
//! | Offset | Width | Field | Type |
//! |---|---|---|---|
//! | 0 | 1 | sync | `0xAA` |
//! | 1 | 4 | roll | f32 LE |
//! | 5 | 4 | pitch | f32 LE |
//! | 9 | 4 | yaw | f32 LE |
//! | 13 | 4 | latitude | f32 LE |
//! | 17 | 4 | longitude | f32 LE |
//! | 21 | 4 | altitude | f32 LE |
//! | 25 | 4 | temperature | f32 LE |
//! | 29 | 4 | connect | f32 LE |
//! | 33 | 4 | speed | f32 LE |
//! | 37 | 4 | pressure | f32 LE |
//! | 41 | 1 | parachute status | u8 |
//! | 42 | 1 | flight phase | u8 |
//! | 43 | 1 | checksum | u8 |
//!
//! ## Revision 1 (36 bytes)
//!
//! Same prefix up to temperature, then humidity at 29, parachute status at
//! 33, flight phase at 34 and the checksum at 35. Speed, pressure and the
//! pin state are not transmitted.

use serde::{Deserialize, Serialize};

use crate::{Result, TelemetryError};

/// Marker byte that starts every frame.
pub const SYNC_BYTE: u8 = 0xAA;

const F32_WIDTH: usize = 4;

/// Firmware protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum ProtocolRevision {
    V1,
    #[default]
    V2,
}

impl ProtocolRevision {
    /// Frame layout for this revision.
    pub fn layout(self) -> &'static FrameLayout {
        match self {
            ProtocolRevision::V1 => &FrameLayout::V1,
            ProtocolRevision::V2 => &FrameLayout::V2,
        }
    }
}

/// Byte offsets of every field in a frame.
///
/// `None` marks a field the revision does not transmit; the decoder fills it
/// in and flags it as synthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOffsets {
    pub roll: usize,
    pub pitch: usize,
    pub yaw: usize,
    pub latitude: usize,
    pub longitude: usize,
    pub altitude: usize,
    pub temperature: usize,
    pub connect: Option<usize>,
    pub humidity: Option<usize>,
    pub speed: Option<usize>,
    pub pressure: Option<usize>,
    pub parachute_status: usize,
    pub flight_phase: usize,
}

/// Fixed-length frame description for one protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub revision: ProtocolRevision,
    pub frame_len: usize,
    pub fields: FieldOffsets,
}

impl FrameLayout {
    /// 36-byte frame of the first flight firmware.
    pub const V1: FrameLayout = FrameLayout {
        revision: ProtocolRevision::V1,
        frame_len: 36,
        fields: FieldOffsets {
            roll: 1,
            pitch: 5,
            yaw: 9,
            latitude: 13,
            longitude: 17,
            altitude: 21,
            temperature: 25,
            connect: None,
            humidity: Some(29),
            speed: None,
            pressure: None,
            parachute_status: 33,
            flight_phase: 34,
        },
    };

    /// 44-byte frame of the current firmware.
    pub const V2: FrameLayout = FrameLayout {
        revision: ProtocolRevision::V2,
        frame_len: 44,
        fields: FieldOffsets {
            roll: 1,
            pitch: 5,
            yaw: 9,
            latitude: 13,
            longitude: 17,
            altitude: 21,
            temperature: 25,
            connect: Some(29),
            humidity: None,
            speed: Some(33),
            pressure: Some(37),
            parachute_status: 41,
            flight_phase: 42,
        },
    };

    /// Offset of the trailing checksum byte.
    pub fn checksum_offset(&self) -> usize {
        self.frame_len - 1
    }

    /// Float fields with their offsets, transmitted or not.
    pub fn float_fields(&self) -> [(&'static str, Option<usize>); 11] {
        let f = &self.fields;
        [
            ("roll", Some(f.roll)),
            ("pitch", Some(f.pitch)),
            ("yaw", Some(f.yaw)),
            ("latitude", Some(f.latitude)),
            ("longitude", Some(f.longitude)),
            ("altitude", Some(f.altitude)),
            ("temperature", Some(f.temperature)),
            ("connect", f.connect),
            ("humidity", f.humidity),
            ("speed", f.speed),
            ("pressure", f.pressure),
        ]
    }

    /// Check every field lies between the sync byte and the checksum and no
    /// two fields overlap.
    pub fn validate(&self) -> Result<()> {
        if self.frame_len < 3 {
            return Err(TelemetryError::frame_error(format!(
                "frame length {} leaves no room for a payload",
                self.frame_len
            )));
        }

        let mut spans: Vec<(&'static str, usize, usize)> = self
            .float_fields()
            .into_iter()
            .filter_map(|(name, offset)| offset.map(|o| (name, o, o + F32_WIDTH)))
            .collect();
        let parachute = self.fields.parachute_status;
        let phase = self.fields.flight_phase;
        spans.push(("parachute_status", parachute, parachute + 1));
        spans.push(("flight_phase", phase, phase + 1));

        let payload_end = self.checksum_offset();
        for (name, start, end) in &spans {
            if *start < 1 || *end > payload_end {
                return Err(TelemetryError::frame_error(format!(
                    "field '{}' at {}..{} outside payload 1..{}",
                    name, start, end, payload_end
                )));
            }
        }

        spans.sort_by_key(|(_, start, _)| *start);
        for pair in spans.windows(2) {
            let (a, _, a_end) = pair[0];
            let (b, b_start, _) = pair[1];
            if b_start < a_end {
                return Err(TelemetryError::frame_error(format!(
                    "fields '{}' and '{}' overlap",
                    a, b
                )));
            }
        }

        Ok(())
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        FrameLayout::V2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_layouts_are_valid() {
        FrameLayout::V1.validate().unwrap();
        FrameLayout::V2.validate().unwrap();
        assert_eq!(FrameLayout::V2.checksum_offset(), 43);
        assert_eq!(FrameLayout::V1.checksum_offset(), 35);
    }

    #[test]
    fn revision_selects_layout() {
        assert_eq!(ProtocolRevision::V1.layout().frame_len, 36);
        assert_eq!(ProtocolRevision::default().layout().frame_len, 44);
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let mut layout = FrameLayout::V2;
        layout.fields.pitch = 3;
        assert!(matches!(layout.validate(), Err(TelemetryError::Frame { .. })));
    }

    #[test]
    fn field_over_checksum_is_rejected() {
        let mut layout = FrameLayout::V2;
        layout.fields.flight_phase = 43;
        assert!(layout.validate().is_err());
    }
}
