//! Pseudo-oscilloscope assembler.
//!
//! A scope packet is a `u16` word array: 16 framing words at the head, 14 at
//! the tail, and two equal-length analog channels in between, A first. Raw
//! ADC counts convert to volts through the front-end divider:
//! `volts = (2.0 - 0.053) + counts * (2.0 / 16384) * (-1.04)`, the polarity
//! factor being invertible per channel. Each accepted packet also yields the
//! real-FFT magnitude spectrum of both channels at the 25 MS/s fixed sampling
//! rate, with the DC-adjacent bins suppressed.

use crate::error::{PipelineError, Result};
use crate::frame::{as_u16_samples, RawFrame};
use num_complex::Complex;
use rustfft::FftPlanner;

/// Framing words stripped from the packet head.
pub const SCOPE_HEAD_WORDS: usize = 16;
/// Framing words stripped from the packet tail.
pub const SCOPE_TAIL_WORDS: usize = 14;
/// ADC sampling period in seconds.
pub const SAMPLE_PERIOD: f64 = 4e-8;

const ADC_VOLTS_PER_COUNT: f64 = 2.0 / 16384.0;
const FRONT_END_OFFSET: f64 = 2.0 - 0.053;
const FRONT_END_GAIN: f64 = 1.04;
/// First published FFT bin; bins 0 and 1 are dominated by the DC pedestal.
const FIRST_FFT_BIN: usize = 2;

/// A decoded two-channel scope trace with its magnitude spectra.
#[derive(Clone, Debug, Default)]
pub struct ScopeFrame {
    /// Channel A trace in volts.
    pub channel_a: Vec<f64>,
    /// Channel B trace in volts.
    pub channel_b: Vec<f64>,
    /// Frequencies (Hz) of the published FFT bins.
    pub frequencies: Vec<f64>,
    /// Channel A FFT magnitude per published bin.
    pub fft_a: Vec<f64>,
    /// Channel B FFT magnitude per published bin.
    pub fft_b: Vec<f64>,
}

/// Decodes scope packets; owns the FFT planner so repeated traces of the
/// same length reuse the plan.
pub struct ScopeAssembler {
    planner: FftPlanner<f64>,
    invert_a: bool,
    invert_b: bool,
}

impl ScopeAssembler {
    /// Create an assembler with per-channel polarity selection.
    pub fn new(invert_a: bool, invert_b: bool) -> Self {
        Self {
            planner: FftPlanner::new(),
            invert_a,
            invert_b,
        }
    }

    /// Decode one scope packet.
    pub fn accept(&mut self, frame: &RawFrame) -> Result<ScopeFrame> {
        let words = as_u16_samples(&frame.payload);
        if words.len() <= SCOPE_HEAD_WORDS + SCOPE_TAIL_WORDS {
            return Err(PipelineError::MalformedFrame(format!(
                "scope packet of {} words has no sample body",
                words.len()
            )));
        }
        let data = &words[SCOPE_HEAD_WORDS..words.len() - SCOPE_TAIL_WORDS];
        let half = data.len() / 2;

        let channel_a = to_volts(&data[..half], self.invert_a);
        let channel_b = to_volts(&data[half..2 * half], self.invert_b);

        let fft_a = self.magnitude_spectrum(&channel_a);
        let fft_b = self.magnitude_spectrum(&channel_b);
        let frequencies = bin_frequencies(half);

        Ok(ScopeFrame {
            channel_a,
            channel_b,
            frequencies,
            fft_a,
            fft_b,
        })
    }

    /// Real-FFT magnitudes for bins `FIRST_FFT_BIN..=n/2`.
    fn magnitude_spectrum(&mut self, trace: &[f64]) -> Vec<f64> {
        let n = trace.len();
        if n / 2 < FIRST_FFT_BIN {
            return Vec::new();
        }
        let mut buffer: Vec<Complex<f64>> =
            trace.iter().map(|&v| Complex::new(v, 0.0)).collect();
        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);
        buffer[FIRST_FFT_BIN..=n / 2]
            .iter()
            .map(|c| c.norm())
            .collect()
    }
}

fn to_volts(counts: &[u16], invert: bool) -> Vec<f64> {
    let polarity = if invert {
        FRONT_END_GAIN
    } else {
        -FRONT_END_GAIN
    };
    counts
        .iter()
        .map(|&c| FRONT_END_OFFSET + f64::from(c) * ADC_VOLTS_PER_COUNT * polarity)
        .collect()
}

fn bin_frequencies(n: usize) -> Vec<f64> {
    if n / 2 < FIRST_FFT_BIN {
        return Vec::new();
    }
    (FIRST_FFT_BIN..=n / 2)
        .map(|k| k as f64 / (n as f64 * SAMPLE_PERIOD))
        .collect()
}
