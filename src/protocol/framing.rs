//! Frame synchronization over an unframed byte stream
//!
//! The serial transport gives no message boundaries: a read may return half
//! a frame, several frames, or line noise. [`FrameReader`] owns a receive
//! buffer, scans for the sync byte and slices out fixed-length candidate
//! frames.
//!
//! A sync byte value inside a payload looks exactly like a real sync byte.
//! The reader does not try to tell them apart; the checksum rejects false
//! frames, and [`FrameReader::reject`] rewinds so the scan restarts one byte
//! after the rejected sync. Every failed attempt therefore advances the
//! stream by at least one byte.

use tracing::{debug, trace};

use super::layout::SYNC_BYTE;

/// Counters describing what the reader has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Candidate frames handed out
    pub frames_emitted: u64,
    /// Candidate frames given back as invalid
    pub frames_rejected: u64,
    /// Bytes dropped while searching for a sync byte
    pub bytes_discarded: u64,
}

/// Turns arbitrary byte chunks into aligned candidate frames.
#[derive(Debug)]
pub struct FrameReader {
    buffer: Vec<u8>,
    frame_len: usize,
    stats: FrameStats,
}

impl FrameReader {
    /// Create a reader for frames of `frame_len` bytes.
    pub fn new(frame_len: usize) -> Self {
        Self { buffer: Vec::with_capacity(frame_len * 4), frame_len, stats: FrameStats::default() }
    }

    /// Append a chunk received from the link.
    pub fn push(&mut self, chunk: &[u8]) {
        trace!(len = chunk.len(), buffered = self.buffer.len(), "Received chunk");
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next candidate frame, if a complete one is buffered.
    ///
    /// Call repeatedly until it returns `None`; a single chunk can hold
    /// several frames.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.buffer.len() < self.frame_len {
            return None;
        }

        match self.buffer.iter().position(|&b| b == SYNC_BYTE) {
            None => {
                let dropped = self.buffer.len();
                self.buffer.clear();
                self.stats.bytes_discarded += dropped as u64;
                trace!(dropped, "No sync byte in buffer, discarding");
                return None;
            }
            Some(0) => {}
            Some(offset) => {
                self.buffer.drain(..offset);
                self.stats.bytes_discarded += offset as u64;
                debug!(skipped = offset, "Resynchronized on sync byte");
            }
        }

        if self.buffer.len() < self.frame_len {
            return None;
        }

        let frame: Vec<u8> = self.buffer.drain(..self.frame_len).collect();
        self.stats.frames_emitted += 1;
        Some(frame)
    }

    /// Give back a frame the decoder refused.
    ///
    /// Everything after its sync byte goes back to the front of the buffer,
    /// so the next scan starts one byte further along the stream.
    pub fn reject(&mut self, frame: &[u8]) {
        self.stats.frames_rejected += 1;
        if frame.len() > 1 {
            self.buffer.splice(0..0, frame[1..].iter().copied());
        }
    }

    /// Bytes currently waiting in the receive buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Expected frame length.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Counters since creation.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize, fill: u8) -> Vec<u8> {
        let mut f = vec![fill; len];
        f[0] = SYNC_BYTE;
        f
    }

    #[test]
    fn waits_for_a_full_frame() {
        let mut reader = FrameReader::new(8);
        let f = frame(8, 1);
        reader.push(&f[..5]);
        assert_eq!(reader.next_frame(), None);
        reader.push(&f[5..]);
        assert_eq!(reader.next_frame(), Some(f));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn one_chunk_can_hold_several_frames() {
        let mut reader = FrameReader::new(4);
        let mut bytes = frame(4, 1);
        bytes.extend(frame(4, 2));
        bytes.extend(frame(4, 3));
        reader.push(&bytes);

        let mut out = Vec::new();
        while let Some(f) = reader.next_frame() {
            out.push(f[1]);
        }
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(reader.stats().frames_emitted, 3);
    }

    #[test]
    fn garbage_without_sync_is_dropped() {
        let mut reader = FrameReader::new(4);
        reader.push(&[1, 2, 3, 4, 5]);
        assert_eq!(reader.next_frame(), None);
        assert_eq!(reader.buffered(), 0);
        assert_eq!(reader.stats().bytes_discarded, 5);
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut reader = FrameReader::new(4);
        reader.push(&[9, 9, 9]);
        reader.push(&frame(4, 7));
        assert_eq!(reader.next_frame(), Some(frame(4, 7)));
        assert_eq!(reader.stats().bytes_discarded, 3);
    }

    #[test]
    fn partial_frame_after_resync_is_kept() {
        let mut reader = FrameReader::new(4);
        reader.push(&[1, 2, SYNC_BYTE, 5]);
        assert_eq!(reader.next_frame(), None);
        assert_eq!(reader.buffered(), 2);
        reader.push(&[6, 7]);
        assert_eq!(reader.next_frame(), Some(vec![SYNC_BYTE, 5, 6, 7]));
    }

    #[test]
    fn reject_advances_by_one_byte() {
        let mut reader = FrameReader::new(4);
        // False sync at 0, real frame starts at 2.
        reader.push(&[SYNC_BYTE, 1, SYNC_BYTE, 2, 3, 4]);
        let first = reader.next_frame().unwrap();
        assert_eq!(first, vec![SYNC_BYTE, 1, SYNC_BYTE, 2]);
        reader.reject(&first);
        assert_eq!(reader.next_frame(), Some(vec![SYNC_BYTE, 2, 3, 4]));
        assert_eq!(reader.stats().frames_rejected, 1);
        assert_eq!(reader.stats().bytes_discarded, 1);
    }
}
