//! Synthetic frame generation.
//!
//! Builds wire-accurate frames for every channel so the full pipeline can run
//! without a detector: the scramble functions are the exact inverses of the
//! descrambler maps, and the packet builders reproduce the transport layouts.
//! The `simulate` subcommand and the test suite both drive the pipeline with
//! these frames.

use crate::assembler::{BundlePayload, FrameBundle, QuadSlot};
use crate::frame::{RawFrame, CHANNEL_IMAGE, CHANNEL_MONITORING, CHANNEL_SCOPE, TRANSPORT_HEADER_BYTES};
use crate::sensor::{Framing, Sensor, QUADRANT_SIDE, SIX_LANE_BLOCK, SIX_LANE_COUNT, SIX_LANE_SAMPLES};
use bytes::Bytes;
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Inverse of the row-interleaved descramble: lay the image out as the
/// super-row sequence the front-end would emit, behind a zeroed transport
/// header. Works for both the full- and half-resolution heads.
pub fn scramble_row_interleaved(image: &Array2<u16>) -> Vec<u8> {
    let (height, width) = image.dim();
    let half = height / 2;
    let mut payload = vec![0u8; TRANSPORT_HEADER_BYTES + height * width * 2];

    let mut write_super_row = |index: usize, row: ndarray::ArrayView1<u16>| {
        let start = TRANSPORT_HEADER_BYTES + index * width * 2;
        for (k, &px) in row.iter().enumerate() {
            payload[start + 2 * k..start + 2 * k + 2].copy_from_slice(&px.to_le_bytes());
        }
    };

    for i in 0..half {
        write_super_row(2 * i, image.row(i));
        write_super_row(height - 1 - 2 * i, image.row(half + i));
    }
    payload
}

/// Inverse of the six-lane descramble: interleave the image across six lanes
/// behind a 6-word header, pre-compensating the serializer skew.
///
/// The skew correction is lossy at the block boundary, so an arbitrary image
/// only survives the round trip when rows 0 and 1 agree on the last two
/// columns of every lane block; constant images always do.
pub fn scramble_six_lane(image: &Array2<u16>) -> Vec<u8> {
    let rows = SIX_LANE_SAMPLES / SIX_LANE_BLOCK;
    let mut samples = vec![0u16; SIX_LANE_COUNT * SIX_LANE_SAMPLES];
    for lane in 0..SIX_LANE_COUNT {
        let col0 = lane * SIX_LANE_BLOCK;
        for r in 0..rows {
            for c in 0..SIX_LANE_BLOCK {
                // At the skewed columns, block r carries the sample that row
                // r + 1 reads after correction; the rest map through directly.
                let value = if c >= SIX_LANE_BLOCK - 2 && r + 1 < rows {
                    image[(r + 1, col0 + c)]
                } else {
                    image[(r, col0 + c)]
                };
                samples[(r * SIX_LANE_BLOCK + c) * SIX_LANE_COUNT + lane] = value;
            }
        }
    }

    let mut payload = vec![0u8; 6 * 2];
    for s in samples {
        payload.extend_from_slice(&s.to_le_bytes());
    }
    payload
}

fn set_header_word(payload: &mut [u8], index: usize, value: u32) {
    payload[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

/// Full image frame for a row-interleaved head.
pub fn row_interleaved_frame(acq: u32, image: &Array2<u16>) -> RawFrame {
    let mut payload = scramble_row_interleaved(image);
    set_header_word(&mut payload, 1, acq);
    RawFrame::new(CHANNEL_IMAGE, payload)
}

/// Full image frame for the six-lane streaming head.
pub fn six_lane_frame(acq: u32, image: &Array2<u16>) -> RawFrame {
    let mut payload = scramble_six_lane(image);
    // Word 1 of the 32-bit header view carries the acquisition number.
    set_header_word(&mut payload, 1, acq);
    RawFrame::new(CHANNEL_IMAGE, payload)
}

/// One sub-frame of the four-quadrant head.
pub fn quadrant_sub_frame(acq: u32, is_toa: bool, asic: u8, quadrant: &Array2<u16>) -> RawFrame {
    let mut payload = vec![0u8; 12];
    set_header_word(&mut payload, 1, acq);
    set_header_word(&mut payload, 2, ((is_toa as u32) << 3) | u32::from(asic));
    for &px in quadrant.iter() {
        payload.extend_from_slice(&px.to_le_bytes());
    }
    RawFrame::new(CHANNEL_IMAGE, payload)
}

/// The four sub-frames of one acquisition, slot order `(is_toa, asic)` =
/// `(0,0), (0,1), (1,0), (1,1)`.
pub fn quadrant_sub_frames(acq: u32, quadrants: &[Array2<u16>; 4]) -> [RawFrame; 4] {
    [
        quadrant_sub_frame(acq, false, 0, &quadrants[0]),
        quadrant_sub_frame(acq, false, 1, &quadrants[1]),
        quadrant_sub_frame(acq, true, 0, &quadrants[2]),
        quadrant_sub_frame(acq, true, 1, &quadrants[3]),
    ]
}

/// A pre-assembled quadrant bundle, for exercising the descrambler directly.
pub fn quadrant_bundle(acq: u32, quadrants: &[Array2<u16>; 4], valid: [bool; 4]) -> FrameBundle {
    let slots: Vec<QuadSlot> = quadrants
        .iter()
        .zip(valid)
        .map(|(quadrant, valid)| {
            if valid {
                let frame = quadrant_sub_frame(acq, false, 0, quadrant);
                QuadSlot {
                    valid: true,
                    payload: frame.payload,
                }
            } else {
                QuadSlot {
                    valid: false,
                    payload: Bytes::new(),
                }
            }
        })
        .collect();
    let slots: Box<[QuadSlot; 4]> = match slots.try_into() {
        Ok(arr) => Box::new(arr),
        Err(_) => unreachable!("four quadrants in, four slots out"),
    };
    FrameBundle {
        acq_num: acq,
        complete: valid.iter().all(|&v| v),
        payload: BundlePayload::Quad(slots),
    }
}

/// Slow-monitoring packet: 32-byte header, then eight little-endian `i32`
/// wire values (temperatures and humidity still in hundredths).
pub fn monitoring_frame(values: &[i32; 8]) -> RawFrame {
    let mut payload = vec![0u8; TRANSPORT_HEADER_BYTES];
    set_header_word(&mut payload, 0, u32::from(CHANNEL_MONITORING));
    for v in values {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    RawFrame::new(CHANNEL_MONITORING, payload)
}

/// Pseudo-oscilloscope packet: 16 head words, channel A then channel B raw
/// ADC samples, 14 tail words.
pub fn scope_frame(channel_a: &[u16], channel_b: &[u16]) -> RawFrame {
    let mut words = vec![0u16; 16];
    words[0] = u16::from(CHANNEL_SCOPE);
    words.extend_from_slice(channel_a);
    words.extend_from_slice(channel_b);
    words.extend(std::iter::repeat(0u16).take(14));

    let mut payload = Vec::with_capacity(words.len() * 2);
    for w in words {
        payload.extend_from_slice(&w.to_le_bytes());
    }
    RawFrame::new(CHANNEL_SCOPE, payload)
}

/// Generates a plausible detector stream: images around a pedestal with
/// Gaussian-ish noise, a sine burst on the scope channels, and slowly moving
/// telemetry.
pub struct FrameSimulator {
    sensor: Sensor,
    acq: u32,
    pedestal: u16,
    noise: u16,
    rng: StdRng,
}

impl FrameSimulator {
    /// Create a simulator for one sensor with a fixed RNG seed.
    pub fn new(sensor: Sensor, pedestal: u16, noise: u16, seed: u64) -> Self {
        Self {
            sensor,
            acq: 0,
            pedestal,
            noise,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pixel(&mut self) -> u16 {
        if self.noise == 0 {
            return self.pedestal;
        }
        let spread = i32::from(self.noise);
        let offset = self.rng.gen_range(-spread..=spread);
        (i32::from(self.pedestal) + offset).clamp(0, i32::from(u16::MAX)) as u16
    }

    /// The transport frames of the next acquisition: one frame for
    /// single-packet heads, four sub-frames for the dual-measurement head.
    pub fn next_image_frames(&mut self) -> Vec<RawFrame> {
        self.acq = self.acq.wrapping_add(1);
        let acq = self.acq;
        let (height, width) = self.sensor.shape();
        match self.sensor.framing() {
            Framing::SinglePacket => {
                let mut image = Array2::from_shape_fn((height, width), |_| self.pixel());
                match self.sensor {
                    Sensor::EpixHr10kT => {
                        // Keep rows 0 and 1 consistent at the skewed columns so
                        // the stream survives the lossy correction unchanged.
                        for lane in 0..SIX_LANE_COUNT {
                            for c in [SIX_LANE_BLOCK - 2, SIX_LANE_BLOCK - 1] {
                                let col = lane * SIX_LANE_BLOCK + c;
                                image[(1, col)] = image[(0, col)];
                            }
                        }
                        vec![six_lane_frame(acq, &image)]
                    }
                    _ => vec![row_interleaved_frame(acq, &image)],
                }
            }
            Framing::FourSubFrames => {
                let quads: [Array2<u16>; 4] = std::array::from_fn(|_| {
                    Array2::from_shape_fn((QUADRANT_SIDE, QUADRANT_SIDE), |_| self.pixel())
                });
                quadrant_sub_frames(acq, &quads).into_iter().collect::<Vec<_>>()
            }
        }
    }

    /// Next scope packet: a sine on channel A, noise on channel B.
    pub fn next_scope_frame(&mut self) -> RawFrame {
        let n = 512;
        let a: Vec<u16> = (0..n)
            .map(|i| {
                let phase = i as f64 / 32.0;
                (8192.0 + 4000.0 * phase.sin()) as u16
            })
            .collect();
        let b: Vec<u16> = (0..n).map(|_| self.rng.gen_range(8000..8400)).collect();
        scope_frame(&a, &b)
    }

    /// Next telemetry packet with slowly wandering values.
    pub fn next_monitoring_frame(&mut self) -> RawFrame {
        let t0 = 2300 + self.rng.gen_range(-20..20);
        let t1 = 2150 + self.rng.gen_range(-20..20);
        let rh = 4500 + self.rng.gen_range(-50..50);
        let values = [t0, t1, rh, 210, 180, 12, 3300, 1800];
        monitoring_frame(&values)
    }
}
