//! Sensor-specific inverse interleave.
//!
//! The detector front-end scrambles pixel data across parallel ADC and
//! serializer lanes; this module reassembles the lane-interleaved samples into
//! the logical 2D image. Three maps are implemented:
//!
//! * **Row-interleaved** (`ePix100a` family): the readout alternates between
//!   the two sensor halves, one super-row of `W` pixels at a time. Even
//!   super-rows belong to the bottom half in natural order; odd super-rows
//!   belong to the top half in reverse order. The output stacks bottom first,
//!   then top.
//!
//! * **Four-quadrant** (`Tixel48x48`): each sub-frame carries one 48x48
//!   quadrant; the logical 96x96 image is `[[Q0, Q1], [Q2, Q3]]`. Slots that
//!   never arrived stay all-zero.
//!
//! * **Six-lane stream** (`ePixHr10kT`): a 1D `u16` stream of 6 x 4672
//!   samples behind a 6-word header, sample `n` belonging to lane `n % 6`.
//!   Each lane reshapes to 32-sample blocks, one block per image row. A known
//!   two-sample skew in the serializer displaces the last two samples of each
//!   block, so every row past the first takes those samples from the block
//!   above it; the first block is left untouched, matching the front-end
//!   behavior this was calibrated against.
//!
//! After descrambling the caller applies a bit mask to strip bits the sensor
//! does not populate.

use crate::assembler::{BundlePayload, FrameBundle, QuadSlot};
use crate::error::{PipelineError, Result};
use crate::frame::as_u16_samples;
use crate::sensor::{
    Sensor, QUADRANT_SIDE, SIX_LANE_BLOCK, SIX_LANE_COUNT, SIX_LANE_SAMPLES,
};
use ndarray::{s, Array2};

/// Header words (u16) preceding the six-lane sample stream.
const SIX_LANE_HEADER_WORDS: usize = 6;
/// Sub-frame header words (u32) preceding quadrant pixel data.
const QUADRANT_HEADER_WORDS: usize = 3;

/// Descramble a logical frame into a `(height, width)` `u16` matrix.
pub fn descramble(sensor: Sensor, bundle: &FrameBundle) -> Result<Array2<u16>> {
    match (&bundle.payload, sensor) {
        (BundlePayload::Single(payload), Sensor::Epix100a | Sensor::Epix10ka) => {
            let body = payload.get(crate::frame::TRANSPORT_HEADER_BYTES..).unwrap_or(&[]);
            row_interleaved(body, sensor.height(), sensor.width())
        }
        (BundlePayload::Single(payload), Sensor::EpixHr10kT) => six_lane(payload),
        (BundlePayload::Quad(slots), Sensor::Tixel48x48) => Ok(four_quadrant(slots)),
        _ => Err(PipelineError::MalformedFrame(format!(
            "bundle framing does not match sensor {sensor:?}"
        ))),
    }
}

/// Mask every pixel in place, keeping only the populated bits.
pub fn apply_bit_mask(image: &mut Array2<u16>, mask: u16) {
    if mask == u16::MAX {
        return;
    }
    image.mapv_inplace(|px| px & mask);
}

/// Row-interleaved dual-readout descramble.
///
/// `body` is the payload after the transport header: `height` super-rows of
/// `width` little-endian `u16` pixels.
fn row_interleaved(body: &[u8], height: usize, width: usize) -> Result<Array2<u16>> {
    let samples = as_u16_samples(body);
    if samples.len() != height * width {
        return Err(PipelineError::DescrambleSize {
            expected: height * width,
            actual: samples.len(),
        });
    }

    let mut image = Array2::<u16>::zeros((height, width));
    let half = height / 2;
    for i in 0..half {
        // Even super-rows fill the bottom block in natural order.
        let bottom = &samples[(2 * i) * width..(2 * i + 1) * width];
        image
            .row_mut(i)
            .iter_mut()
            .zip(bottom)
            .for_each(|(dst, &src)| *dst = src);

        // Odd super-rows fill the top block in reverse order.
        let src_row = height - 1 - 2 * i;
        let top = &samples[src_row * width..(src_row + 1) * width];
        image
            .row_mut(half + i)
            .iter_mut()
            .zip(top)
            .for_each(|(dst, &src)| *dst = src);
    }
    Ok(image)
}

/// Four-quadrant composite: `[[Q0, Q1], [Q2, Q3]]`, zero-filled where a
/// quadrant's validity bit is clear.
fn four_quadrant(slots: &[QuadSlot; 4]) -> Array2<u16> {
    let side = QUADRANT_SIDE;
    let mut image = Array2::<u16>::zeros((2 * side, 2 * side));
    for (index, slot) in slots.iter().enumerate() {
        if !slot.valid {
            continue;
        }
        let pixels = as_u16_samples(slot.payload.get(QUADRANT_HEADER_WORDS * 4..).unwrap_or(&[]));
        if pixels.len() != side * side {
            continue;
        }
        let (r0, c0) = (side * (index / 2), side * (index % 2));
        let mut block = image.slice_mut(s![r0..r0 + side, c0..c0 + side]);
        for (k, &px) in pixels.iter().enumerate() {
            block[(k / side, k % side)] = px;
        }
    }
    image
}

/// Six-lane streaming descramble with the serializer skew correction.
fn six_lane(payload: &[u8]) -> Result<Array2<u16>> {
    let words = as_u16_samples(payload);
    let samples = words.get(SIX_LANE_HEADER_WORDS..).unwrap_or(&[]);
    let per_lane = samples.len() / SIX_LANE_COUNT;
    if per_lane != SIX_LANE_SAMPLES || samples.len() % SIX_LANE_COUNT != 0 {
        return Err(PipelineError::DescrambleSize {
            expected: SIX_LANE_SAMPLES,
            actual: per_lane,
        });
    }

    let rows = SIX_LANE_SAMPLES / SIX_LANE_BLOCK;
    let mut image = Array2::<u16>::zeros((rows, SIX_LANE_COUNT * SIX_LANE_BLOCK));
    for lane in 0..SIX_LANE_COUNT {
        let col0 = lane * SIX_LANE_BLOCK;
        for r in 0..rows {
            for c in 0..SIX_LANE_BLOCK {
                image[(r, col0 + c)] = samples[(r * SIX_LANE_BLOCK + c) * SIX_LANE_COUNT + lane];
            }
        }
        // Skew correction: every row past the first takes the last two
        // samples of the block above it. Walk bottom-to-top so each row
        // reads its predecessor's original value. Row 0 keeps its own.
        for c in [SIX_LANE_BLOCK - 2, SIX_LANE_BLOCK - 1] {
            for r in (1..rows).rev() {
                image[(r, col0 + c)] = image[(r - 1, col0 + c)];
            }
        }
    }
    Ok(image)
}
