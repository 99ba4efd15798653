//! Sensor variant descriptions.
//!
//! Each supported camera head is described by a `Sensor` variant carrying its
//! logical geometry, default bit mask, and framing mode. The descrambler
//! selects its inverse-interleave routine from the variant, and the image
//! assembler uses the framing mode to decide whether a logical image arrives
//! as a single frame or as four tagged sub-frames.

use serde::{Deserialize, Serialize};

/// How a logical image maps onto transport frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// One transport frame carries one full image.
    SinglePacket,
    /// A logical image is four sub-frames tagged by `(is_toa, asic)`.
    FourSubFrames,
}

/// Supported camera heads.
///
/// Serialized names match the camera selector strings used by the original
/// detector software, so existing deployment configs translate directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensor {
    /// Row-interleaved dual-readout head, full resolution.
    #[serde(rename = "ePix100a")]
    Epix100a,
    /// Row-interleaved dual-readout head at half resolution, 14-bit pixels.
    #[serde(rename = "ePix10ka")]
    Epix10ka,
    /// Dual-measurement head: four 48x48 quadrants per image, two readings
    /// (time of arrival, time over threshold) per pixel.
    #[serde(rename = "Tixel48x48")]
    Tixel48x48,
    /// Six-lane streaming head.
    #[serde(rename = "ePixHr10kT")]
    EpixHr10kT,
}

/// Number of readout lanes in the six-lane streaming head.
pub const SIX_LANE_COUNT: usize = 6;
/// Samples per lane in the six-lane streaming head.
pub const SIX_LANE_SAMPLES: usize = 4672;
/// Samples per serializer block; the last two of each block are skewed.
pub const SIX_LANE_BLOCK: usize = 32;
/// Quadrant edge length for the four-quadrant head.
pub const QUADRANT_SIDE: usize = 48;

impl Sensor {
    /// Logical image height in pixels.
    pub fn height(self) -> usize {
        match self {
            Sensor::Epix100a => 708,
            Sensor::Epix10ka => 356,
            Sensor::Tixel48x48 => 2 * QUADRANT_SIDE,
            Sensor::EpixHr10kT => SIX_LANE_SAMPLES / SIX_LANE_BLOCK,
        }
    }

    /// Logical image width in pixels.
    pub fn width(self) -> usize {
        match self {
            Sensor::Epix100a | Sensor::Epix10ka => 768,
            Sensor::Tixel48x48 => 2 * QUADRANT_SIDE,
            Sensor::EpixHr10kT => SIX_LANE_COUNT * SIX_LANE_BLOCK,
        }
    }

    /// Logical image shape as `(rows, cols)`.
    pub fn shape(self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Default bit mask retaining only the bits the head populates.
    pub fn default_bit_mask(self) -> u16 {
        match self {
            Sensor::Epix10ka => 0x3FFF,
            _ => 0xFFFF,
        }
    }

    /// Transport framing used by this head.
    pub fn framing(self) -> Framing {
        match self {
            Sensor::Tixel48x48 => Framing::FourSubFrames,
            _ => Framing::SinglePacket,
        }
    }
}
