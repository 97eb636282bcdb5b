//! Test utilities for building wire frames and sample fixtures
//!
//! Shared by unit tests, integration tests and benches. Frames are encoded
//! the way the flight computer encodes them, so tests exercise the real
//! decoder rather than a mirror of it.

#![cfg(any(test, feature = "benchmark"))]

use tokio::sync::mpsc;

use crate::protocol::{FrameLayout, SYNC_BYTE, checksum};
use crate::provider::Provider;
use crate::types::{FlightPhase, LinkCommand, LinkStatus, ParachuteStatus, TelemetrySample};
use crate::{Result, TelemetryError};

/// Sample matching the documented reference frame.
///
/// roll 1.5, pitch -2.0, yaw 0.0, lat 37.5665, lon 126.9780, alt 100.0,
/// temp 22.0, connect 0.0, speed 10.0, pressure 1013.0, parachute stowed,
/// flight phase launched.
pub fn reference_sample() -> TelemetrySample {
    TelemetrySample {
        roll: 1.5,
        pitch: -2.0,
        yaw: 0.0,
        latitude: 37.5665,
        longitude: 126.978,
        altitude: 100.0,
        temperature: 22.0,
        connect: 0.0,
        speed: 10.0,
        pressure: 1013.0,
        parachute_status: ParachuteStatus::Stowed,
        flight_phase: FlightPhase::Launched,
        ..Default::default()
    }
}

/// Reference sample with the given altitude and speed.
pub fn sample_at(altitude: f32, speed: f32) -> TelemetrySample {
    TelemetrySample { altitude, speed, ..reference_sample() }
}

/// Encodes a sample into a wire frame for a given layout.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    layout: FrameLayout,
    bytes: Vec<u8>,
    checksum_override: Option<u8>,
}

impl FrameBuilder {
    /// Encode `sample` with an arbitrary layout.
    pub fn new(layout: FrameLayout, sample: &TelemetrySample) -> Self {
        let mut bytes = vec![0u8; layout.frame_len];
        bytes[0] = SYNC_BYTE;

        let f = &layout.fields;
        let floats = [
            (Some(f.roll), sample.roll),
            (Some(f.pitch), sample.pitch),
            (Some(f.yaw), sample.yaw),
            (Some(f.latitude), sample.latitude),
            (Some(f.longitude), sample.longitude),
            (Some(f.altitude), sample.altitude),
            (Some(f.temperature), sample.temperature),
            (f.connect, sample.connect),
            (f.humidity, sample.humidity),
            (f.speed, sample.speed),
            (f.pressure, sample.pressure),
        ];
        for (offset, value) in floats {
            if let Some(offset) = offset {
                bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
        bytes[f.parachute_status] = sample.parachute_status.into();
        bytes[f.flight_phase] = sample.flight_phase.into();

        Self { layout, bytes, checksum_override: None }
    }

    /// Encode with the current 44-byte layout.
    pub fn v2(sample: &TelemetrySample) -> Self {
        Self::new(FrameLayout::V2, sample)
    }

    /// Encode with the legacy 36-byte layout.
    pub fn v1(sample: &TelemetrySample) -> Self {
        Self::new(FrameLayout::V1, sample)
    }

    /// Write a raw flight phase byte, valid or not.
    pub fn flight_phase_byte(mut self, value: u8) -> Self {
        self.bytes[self.layout.fields.flight_phase] = value;
        self
    }

    /// Force a checksum byte instead of the computed one.
    pub fn checksum_byte(mut self, value: u8) -> Self {
        self.checksum_override = Some(value);
        self
    }

    /// Finish the frame, filling in the checksum.
    pub fn build(mut self) -> Vec<u8> {
        let sum = checksum(&self.bytes);
        let offset = self.layout.checksum_offset();
        self.bytes[offset] = self.checksum_override.unwrap_or(sum);
        self.bytes
    }
}

/// Concatenate frames for several samples into one byte stream.
pub fn encode_stream(layout: FrameLayout, samples: &[TelemetrySample]) -> Vec<u8> {
    samples.iter().flat_map(|s| FrameBuilder::new(layout, s).build()).collect()
}

/// Provider fed from a channel, so tests control sample timing.
///
/// Ends when every sender is dropped.
pub struct ChannelProvider {
    rx: mpsc::Receiver<TelemetrySample>,
    /// Errors to return before reading the channel
    failures: usize,
    uplink: Option<mpsc::UnboundedSender<LinkCommand>>,
}

impl ChannelProvider {
    pub fn new() -> (Self, mpsc::Sender<TelemetrySample>) {
        let (tx, rx) = mpsc::channel(64);
        (Self { rx, failures: 0, uplink: None }, tx)
    }

    /// Fail the first `count` reads with a link error.
    pub fn with_failures(mut self, count: usize) -> Self {
        self.failures = count;
        self
    }

    /// Accept link commands and forward them to the returned receiver.
    pub fn with_uplink(mut self) -> (Self, mpsc::UnboundedReceiver<LinkCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.uplink = Some(tx);
        (self, rx)
    }
}

#[async_trait::async_trait]
impl Provider for ChannelProvider {
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(TelemetryError::link_failed("scripted failure"));
        }
        Ok(self.rx.recv().await)
    }

    fn link_status(&self) -> LinkStatus {
        LinkStatus::Connected
    }

    fn source_hz(&self) -> f64 {
        10.0
    }

    async fn send_command(&mut self, command: LinkCommand) -> Result<()> {
        match &self.uplink {
            Some(uplink) => uplink
                .send(command)
                .map_err(|_| TelemetryError::link_failed("uplink receiver dropped")),
            None => Err(TelemetryError::link_failed("no uplink")),
        }
    }
}

/// Install a test tracing subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_frames_carry_a_valid_checksum() {
        let frame = FrameBuilder::v2(&reference_sample()).build();
        assert_eq!(frame[43], checksum(&frame));
    }

    #[test]
    fn checksum_override_is_applied() {
        let frame = FrameBuilder::v2(&reference_sample()).checksum_byte(0x00).build();
        assert_eq!(frame[43], 0x00);
    }

    #[test]
    fn stream_is_frame_aligned() {
        let bytes = encode_stream(FrameLayout::V1, &[reference_sample(), sample_at(5.0, 1.0)]);
        assert_eq!(bytes.len(), 72);
        assert_eq!(bytes[36], SYNC_BYTE);
    }
}
