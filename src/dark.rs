//! Dark-frame accumulation, subtraction, and fixed-point gain correction.
//!
//! A dark collection is an explicit user request: `request(n)` clears the
//! accumulator and the next `n` descrambled images are summed element-wise
//! into an `i64` accumulator. When the count reaches the target the per-pixel
//! mean becomes the dark frame and `ready` is set. Applying the dark is an
//! independent toggle: apply-while-not-ready is a pass-through, not an error.
//!
//! Gain correction is optional. The per-pixel gain is 7-bit fixed point with
//! unity encoded as 128, so the corrected value is `(sub * gain) >> 7`,
//! saturated to the `u16` range.

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use serde::Serialize;
use tracing::info;

/// Unity gain in the 7-bit fixed-point encoding.
pub const GAIN_UNITY: i32 = 128;
/// Fixed-point shift applied after the gain multiply.
pub const GAIN_SHIFT: u32 = 7;

/// Dark collection status, published with every snapshot.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct DarkStatus {
    /// A collection is in progress.
    pub requested: bool,
    /// A dark frame is available for subtraction.
    pub ready: bool,
    /// Frames accumulated so far.
    pub count: u32,
    /// Frames requested for the current collection.
    pub target: u32,
}

/// Per-pixel dark mean plus optional gain map for one sensor shape.
pub struct DarkEngine {
    shape: (usize, usize),
    sum: Array2<i64>,
    mean: Array2<i32>,
    count: u32,
    target: u32,
    requested: bool,
    ready: bool,
    apply: bool,
    gain: Option<Array2<u16>>,
}

impl DarkEngine {
    /// Create an engine for images of the given `(rows, cols)` shape.
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            shape,
            sum: Array2::zeros(shape),
            mean: Array2::zeros(shape),
            count: 0,
            target: 0,
            requested: false,
            ready: false,
            apply: false,
            gain: None,
        }
    }

    /// Start collecting a new dark from the next `target` frames. Any
    /// previous dark is discarded.
    pub fn request(&mut self, target: u32) {
        self.sum.fill(0);
        self.count = 0;
        self.target = target.max(1);
        self.requested = true;
        self.ready = false;
        info!(target = self.target, "dark collection started");
    }

    /// Discard the current dark and stop any collection in progress.
    pub fn unset(&mut self) {
        self.requested = false;
        self.ready = false;
        self.count = 0;
    }

    /// Toggle subtraction. Returns true when the flag actually changed, which
    /// obliges the caller to flush the statistics buffers.
    pub fn set_apply(&mut self, apply: bool) -> bool {
        let changed = self.apply != apply;
        self.apply = apply;
        changed
    }

    /// Whether subtraction is enabled (independent of readiness).
    pub fn apply(&self) -> bool {
        self.apply
    }

    /// Whether a dark frame is ready.
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// The current dark mean. All zeros until a collection completes.
    pub fn mean(&self) -> &Array2<i32> {
        &self.mean
    }

    /// Mean and population standard deviation of the dark frame, for the
    /// show-dark contrast window.
    pub fn mean_std(&self) -> (f64, f64) {
        let n = self.mean.len() as f64;
        if n == 0.0 {
            return (0.0, 0.0);
        }
        let mean = self.mean.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let var = self
            .mean
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }

    /// Collection status for the snapshot.
    pub fn status(&self) -> DarkStatus {
        DarkStatus {
            requested: self.requested,
            ready: self.ready,
            count: self.count,
            target: self.target,
        }
    }

    /// Load a per-pixel gain map (7-bit fixed point, 128 = unity).
    pub fn load_gain(&mut self, gain: Array2<u16>) -> Result<()> {
        if gain.dim() != self.shape {
            return Err(PipelineError::ShapeMismatch {
                expected_rows: self.shape.0,
                expected_cols: self.shape.1,
                rows: gain.dim().0,
                cols: gain.dim().1,
            });
        }
        self.gain = Some(gain);
        Ok(())
    }

    /// Drop the gain map (identity gain).
    pub fn clear_gain(&mut self) {
        self.gain = None;
    }

    /// Process one descrambled image: accumulate into a pending collection,
    /// subtract the dark when applied and ready, then gain-correct.
    pub fn process(&mut self, image: &Array2<u16>) -> Array2<i32> {
        if self.requested {
            self.accumulate(image);
        }

        let mut out = if self.apply && self.ready {
            let mut sub = image.mapv(i32::from);
            sub -= &self.mean;
            sub
        } else {
            image.mapv(i32::from)
        };

        if let Some(gain) = &self.gain {
            ndarray::Zip::from(&mut out).and(gain).for_each(|px, &g| {
                *px = ((*px * i32::from(g)) >> GAIN_SHIFT).clamp(0, i32::from(u16::MAX));
            });
        }
        out
    }

    fn accumulate(&mut self, image: &Array2<u16>) {
        ndarray::Zip::from(&mut self.sum)
            .and(image)
            .for_each(|acc, &px| *acc += i64::from(px));
        self.count += 1;
        if self.count == self.target {
            let n = i64::from(self.target);
            self.mean = self.sum.mapv(|acc| (acc / n) as i32);
            self.ready = true;
            self.requested = false;
            info!(frames = self.target, "dark frame ready");
        }
    }
}
