//! Raw transport frames and header parsing.
//!
//! The transport hands the pipeline opaque byte buffers with a channel tag.
//! During file streaming the tag is not always populated, in which case the
//! virtual-channel bits in the first header word discriminate the stream, the
//! same way the original event readers fall back from the frame flags to the
//! payload header.
//!
//! Header layout for image sub-frames (32-bit little-endian words):
//!
//! ```text
//! word 0: virtual-channel bits (low nibble)
//! word 1: acquisition number
//! word 2: bit 3 = is_ToA, bits 2..0 = ASIC index
//! ```

use bytes::Bytes;

/// Channel identifier for image frames.
pub const CHANNEL_IMAGE: u8 = 1;
/// Channel identifier for pseudo-oscilloscope frames.
pub const CHANNEL_SCOPE: u8 = 2;
/// Channel identifier for slow-monitoring frames. Offset by the timing-module
/// lane count when one is active (see `RouterConfig::timing_offset`).
pub const CHANNEL_MONITORING: u8 = 3;

/// Size of the transport header preceding single-packet image payloads and
/// monitoring payloads.
pub const TRANSPORT_HEADER_BYTES: usize = 32;

/// Payload size of one sub-frame of the four-sub-frame head: three header
/// words plus 48x48 `u16` pixels.
pub const SUB_FRAME_BYTES: usize = 4620;
/// Sub-frame payload size in 32-bit words.
pub const SUB_FRAME_WORDS: usize = SUB_FRAME_BYTES / 4;

/// An opaque frame as delivered by the transport.
///
/// Lifetime discipline: a `RawFrame` is consumed by the router within one
/// dispatch and is never stored beyond the assembler that accepts it. The
/// payload is a cheaply cloneable [`Bytes`] so the raw tee can observe every
/// frame without copying pixel data.
#[derive(Clone, Debug)]
pub struct RawFrame {
    /// Transport channel tag; 0 when the transport did not populate it.
    pub channel: u8,
    /// Entire frame contents, headers included.
    pub payload: Bytes,
}

impl RawFrame {
    /// Wrap a payload with its transport channel tag.
    pub fn new(channel: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Little-endian 32-bit header word at `index`, if present.
    pub fn header_word(&self, index: usize) -> Option<u32> {
        let start = index * 4;
        let bytes = self.payload.get(start..start + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Virtual-channel bits from the first header word.
    pub fn virtual_channel(&self) -> Option<u8> {
        Some((self.header_word(0)? & 0xF) as u8)
    }

    /// Acquisition number (header word 1).
    pub fn acq_number(&self) -> Option<u32> {
        self.header_word(1)
    }

    /// Time-of-arrival flag (header word 2, bit 3).
    pub fn is_toa(&self) -> Option<bool> {
        Some(self.header_word(2)? & 0x8 != 0)
    }

    /// ASIC index (header word 2, bits 2..0).
    pub fn asic_index(&self) -> Option<u8> {
        Some((self.header_word(2)? & 0x7) as u8)
    }

    /// Payload after the 32-byte transport header, or an empty slice when the
    /// frame is shorter than the header.
    pub fn body(&self) -> &[u8] {
        self.payload.get(TRANSPORT_HEADER_BYTES..).unwrap_or(&[])
    }
}

/// Reinterpret a little-endian byte slice as `u16` samples.
///
/// Trailing odd bytes are ignored; detector payloads are always word aligned.
pub fn as_u16_samples(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
