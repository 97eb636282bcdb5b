//! Serial wire protocol.
//!
//! Bytes from the link pass through two stages:
//!
//! 1. [`FrameReader`] finds the sync byte and slices out fixed-length
//!    candidate frames, whatever the chunking of the transport.
//! 2. [`PacketDecoder`] checks the additive checksum and decodes the fields
//!    at the offsets fixed by the [`FrameLayout`] of the protocol revision.
//!
//! Neither stage ever stops the stream: a rejected candidate is logged by
//! the caller and handed back to the reader with [`FrameReader::reject`].
//!
//! ```rust
//! use groundlink::protocol::{FrameLayout, FrameReader, PacketDecoder, SynthesisPolicy};
//!
//! let decoder = PacketDecoder::new(FrameLayout::V2, SynthesisPolicy::Fixed);
//! let mut reader = FrameReader::new(FrameLayout::V2.frame_len);
//!
//! reader.push(&[0x00, 0x13, 0x37]); // line noise, no frame yet
//! while let Some(frame) = reader.next_frame() {
//!     match decoder.decode(&frame) {
//!         Ok(sample) => println!("altitude {}", sample.altitude),
//!         Err(_) => reader.reject(&frame),
//!     }
//! }
//! ```

mod decode;
mod framing;
mod layout;

pub use decode::{PacketDecoder, SynthesisPolicy, checksum};
pub use framing::{FrameReader, FrameStats};
pub use layout::{FieldOffsets, FrameLayout, ProtocolRevision, SYNC_BYTE};
