//! Update dispatcher: coalesces assembler output into viewer snapshots.
//!
//! The ingest context pushes at most one update per animation tick (~16 ms)
//! per channel kind; pushes inside the window are dropped and the next
//! allowed push carries the then-latest products, so the viewer never lags
//! behind by more than one tick. Publication is a pointer swap under a single
//! lock: the viewer pulls an `Arc<Snapshot>` and reads a consistent frame for
//! as long as it holds the `Arc`, while the old snapshot is reclaimed on the
//! next swap.

use crate::dark::DarkStatus;
use crate::scope::ScopeFrame;
use crate::stats::Histogram;
use crate::telemetry::TelemetrySample;
use ndarray::Array2;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Channel kind for rate limiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    /// Image products (display buffer, slices, histogram, dark status).
    Image,
    /// Scope trace products.
    Scope,
    /// Telemetry products.
    Telemetry,
}

/// Aggregated drop/error counters across the pipeline.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct PipelineCounters {
    /// Frames dropped for a short or unparseable header.
    pub malformed: u64,
    /// Frames dropped on an unknown channel.
    pub unknown_channel: u64,
    /// Frames dropped for a descramble size mismatch.
    pub desc_errors: u64,
    /// Sub-frames that overwrote an occupied slot.
    pub duplicates: u64,
    /// Partial images emitted incomplete.
    pub incomplete: u64,
    /// Logical images published.
    pub images: u64,
}

/// Everything the viewer can pull, consistent as of one publication.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Acquisition number of the displayed image.
    pub acq_num: u32,
    /// Display buffer with overlay, `None` until the first image.
    pub image: Option<Arc<Array2<f32>>>,
    /// Contrast window maximum.
    pub contrast_max: i32,
    /// Contrast window minimum.
    pub contrast_min: i32,
    /// Horizontal slice through the cursor row; empty when disabled.
    pub horizontal: Vec<f32>,
    /// Vertical slice through the cursor column; empty when disabled.
    pub vertical: Vec<f32>,
    /// Value under the cursor, from the active display source.
    pub pixel_value: Option<f32>,
    /// Zoom window around the cursor; `None` unless enabled.
    pub zoom: Option<Arc<Array2<f32>>>,
    /// Cursor-pixel time series; empty when disabled.
    pub pixel_series: Arc<Vec<i32>>,
    /// Histogram of recent cursor samples.
    pub histogram: Option<Arc<Histogram>>,
    /// Dark collection status.
    pub dark: DarkStatus,
    /// Whether a noise map has been computed.
    pub noise_map_ready: bool,
    /// Latest telemetry sample.
    pub telemetry: Option<TelemetrySample>,
    /// Rolling telemetry history, oldest first.
    pub telemetry_history: Arc<Vec<TelemetrySample>>,
    /// Latest scope trace.
    pub scope: Option<Arc<ScopeFrame>>,
    /// Pipeline counters.
    pub counters: PipelineCounters,
}

/// Viewer-side pull handle. Clone freely.
#[derive(Clone)]
pub struct SnapshotHandle {
    current: Arc<Mutex<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<Snapshot> {
        match self.current.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

/// Ingest-side publisher with per-kind rate limiting.
pub struct UpdateDispatcher {
    current: Arc<Mutex<Arc<Snapshot>>>,
    min_interval: Duration,
    last_push: [Option<Instant>; 3],
}

impl UpdateDispatcher {
    /// Create a dispatcher pushing at most once per `min_interval` per kind.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            current: Arc::new(Mutex::new(Arc::new(Snapshot::default()))),
            min_interval,
            last_push: [None; 3],
        }
    }

    /// A pull handle for the viewer.
    pub fn handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            current: Arc::clone(&self.current),
        }
    }

    fn slot(kind: UpdateKind) -> usize {
        match kind {
            UpdateKind::Image => 0,
            UpdateKind::Scope => 1,
            UpdateKind::Telemetry => 2,
        }
    }

    /// Publish an update of `kind` unless its tick window is still open.
    /// Returns whether the snapshot was swapped.
    pub fn try_publish(
        &mut self,
        kind: UpdateKind,
        update: impl FnOnce(&mut Snapshot),
    ) -> bool {
        let slot = Self::slot(kind);
        let now = Instant::now();
        if let Some(last) = self.last_push[slot] {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_push[slot] = Some(now);

        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = (**guard).clone();
        update(&mut next);
        *guard = Arc::new(next);
        true
    }
}
