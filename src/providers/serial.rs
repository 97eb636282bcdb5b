//! Serial link provider

use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, trace, warn};

use crate::protocol::{FrameLayout, FrameReader, FrameStats, PacketDecoder, SynthesisPolicy};
use crate::provider::Provider;
use crate::types::{LinkCommand, LinkStatus, TelemetrySample};
use crate::{Result, TelemetryError};

/// Rate the flight computer transmits at.
pub const NOMINAL_SOURCE_HZ: f64 = 10.0;

const READ_CHUNK: usize = 512;

/// Provider that decodes frames from a byte transport
///
/// Generic over the transport so tests can drive it with an in-memory
/// duplex stream. [`SerialProvider::open`] builds one over a real port.
pub struct SerialProvider<T> {
    io: T,
    /// Port name or other label for logs
    label: String,
    reader: FrameReader,
    decoder: PacketDecoder,
    /// Samples decoded from the last chunk, not yet handed out
    pending: VecDeque<TelemetrySample>,
    scratch: Box<[u8]>,
    open: bool,
}

impl SerialProvider<SerialStream> {
    /// Open a serial port at `baud`, 8N1 without flow control.
    pub fn open(
        path: &str,
        baud_rate: u32,
        layout: FrameLayout,
        synthesis: SynthesisPolicy,
    ) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                TelemetryError::link_failed_with_source(
                    format!("failed to open serial port {}", path),
                    Box::new(e),
                )
            })?;

        info!(port = path, baud_rate, frame_len = layout.frame_len, "Serial port opened");
        Ok(Self::new(port, path, layout, synthesis))
    }
}

impl<T> SerialProvider<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already open transport.
    pub fn new(
        io: T,
        label: impl Into<String>,
        layout: FrameLayout,
        synthesis: SynthesisPolicy,
    ) -> Self {
        Self {
            io,
            label: label.into(),
            reader: FrameReader::new(layout.frame_len),
            decoder: PacketDecoder::new(layout, synthesis),
            pending: VecDeque::new(),
            scratch: vec![0u8; READ_CHUNK].into_boxed_slice(),
            open: true,
        }
    }

    /// Framing counters for this link.
    pub fn frame_stats(&self) -> FrameStats {
        self.reader.stats()
    }

    /// Run every complete candidate in the buffer through the decoder.
    fn drain_frames(&mut self) {
        while let Some(frame) = self.reader.next_frame() {
            match self.decoder.decode(&frame) {
                Ok(sample) => {
                    trace!(
                        altitude = sample.altitude,
                        phase = sample.flight_phase.name(),
                        "Frame decoded"
                    );
                    self.pending.push_back(sample);
                }
                Err(e) => {
                    debug!(port = %self.label, error = %e, "Frame rejected, resyncing");
                    self.reader.reject(&frame);
                }
            }
        }
    }

    fn close(&mut self, reason: &str) {
        if self.open {
            let stats = self.reader.stats();
            warn!(
                port = %self.label,
                reason,
                frames = stats.frames_emitted,
                rejected = stats.frames_rejected,
                "Serial link lost"
            );
        }
        self.open = false;
    }
}

#[async_trait::async_trait]
impl<T> Provider for SerialProvider<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        loop {
            if let Some(sample) = self.pending.pop_front() {
                return Ok(Some(sample));
            }
            if !self.open {
                return Err(TelemetryError::link_failed(format!(
                    "serial link {} is closed",
                    self.label
                )));
            }

            // `read` is cancel safe and nothing below awaits, so a dropped
            // future never loses buffered bytes.
            let n = match self.io.read(&mut self.scratch).await {
                Ok(n) => n,
                Err(e) => {
                    self.close("read error");
                    return Err(TelemetryError::link_failed_with_source(
                        format!("read from {} failed", self.label),
                        Box::new(e),
                    ));
                }
            };

            if n == 0 {
                self.close("end of stream");
                return Err(TelemetryError::link_failed(format!(
                    "serial link {} closed by peer",
                    self.label
                )));
            }

            trace!(bytes = n, buffered = self.reader.buffered(), "Chunk received");
            self.reader.push(&self.scratch[..n]);
            self.drain_frames();
        }
    }

    fn link_status(&self) -> LinkStatus {
        if self.open { LinkStatus::Connected } else { LinkStatus::Disconnected }
    }

    fn source_hz(&self) -> f64 {
        NOMINAL_SOURCE_HZ
    }

    async fn send_command(&mut self, command: LinkCommand) -> Result<()> {
        if !self.open {
            return Err(TelemetryError::link_failed(format!(
                "cannot send {:?}, serial link {} is closed",
                command, self.label
            )));
        }

        let line = command.wire_line();
        let written = match self.io.write_all(line).await {
            Ok(()) => self.io.flush().await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => {
                info!(port = %self.label, command = ?command, "Command sent");
                Ok(())
            }
            Err(e) => {
                self.close("write error");
                Err(TelemetryError::link_failed_with_source(
                    format!("write of {:?} to {} failed", command, self.label),
                    Box::new(e),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FrameBuilder, encode_stream, reference_sample, sample_at};
    use tokio::io::duplex;

    fn provider_over(
        layout: FrameLayout,
    ) -> (SerialProvider<tokio::io::DuplexStream>, tokio::io::DuplexStream) {
        let (ours, theirs) = duplex(4096);
        (SerialProvider::new(ours, "test-link", layout, SynthesisPolicy::Fixed), theirs)
    }

    #[tokio::test]
    async fn decodes_frames_written_in_pieces() -> anyhow::Result<()> {
        let (mut provider, mut remote) = provider_over(FrameLayout::V2);
        let bytes = encode_stream(FrameLayout::V2, &[sample_at(10.0, 1.0), sample_at(20.0, 2.0)]);

        for piece in bytes.chunks(7) {
            remote.write_all(piece).await?;
        }

        let first = provider.next_sample().await?.expect("first sample");
        let second = provider.next_sample().await?.expect("second sample");
        assert_eq!(first.altitude, 10.0);
        assert_eq!(second.altitude, 20.0);
        assert_eq!(provider.link_status(), LinkStatus::Connected);
        Ok(())
    }

    #[tokio::test]
    async fn bad_checksum_is_skipped() -> anyhow::Result<()> {
        let (mut provider, mut remote) = provider_over(FrameLayout::V2);
        let bad = FrameBuilder::v2(&sample_at(1.0, 0.0)).checksum_byte(0x00).build();
        let good = FrameBuilder::v2(&sample_at(2.0, 0.0)).build();
        remote.write_all(&bad).await?;
        remote.write_all(&good).await?;

        let sample = provider.next_sample().await?.expect("good sample");
        assert_eq!(sample.altitude, 2.0);
        assert!(provider.frame_stats().frames_rejected >= 1);
        Ok(())
    }

    #[tokio::test]
    async fn peer_close_is_a_link_error() -> anyhow::Result<()> {
        let (mut provider, mut remote) = provider_over(FrameLayout::V2);
        remote.write_all(&FrameBuilder::v2(&reference_sample()).build()).await?;
        drop(remote);

        assert!(provider.next_sample().await?.is_some());
        let err = provider.next_sample().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Link { .. }));
        assert_eq!(provider.link_status(), LinkStatus::Disconnected);
        assert!(provider.send_command(LinkCommand::Eject).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn commands_are_written_as_lines() -> anyhow::Result<()> {
        let (mut provider, mut remote) = provider_over(FrameLayout::V2);
        provider.send_command(LinkCommand::Eject).await?;
        provider.send_command(LinkCommand::Center).await?;

        let mut received = vec![0u8; 13];
        remote.read_exact(&mut received).await?;
        assert_eq!(received, b"EJECT\nCENTER\n");
        Ok(())
    }

    #[tokio::test]
    async fn legacy_layout_is_supported() -> anyhow::Result<()> {
        let (mut provider, mut remote) = provider_over(FrameLayout::V1);
        remote.write_all(&FrameBuilder::v1(&reference_sample()).build()).await?;

        let sample = provider.next_sample().await?.expect("sample");
        assert_eq!(sample.latitude, 37.5665);
        assert!(sample.synthetic.speed);
        Ok(())
    }
}
