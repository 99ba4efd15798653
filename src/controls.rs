//! Viewer-facing control state.
//!
//! All user-adjustable scalars live behind one coarse lock: cursor position,
//! overlay toggles, bit mask, dark configuration, and the manual contrast
//! window. The viewer mutates them through `Controls` setters; the ingest
//! context takes a consistent copy once per frame with `begin_frame`, which
//! also drains one-shot commands (dark collection requests). The lock is held
//! only for scalar reads and writes, so neither side can stall the other.

use crate::sensor::Sensor;
use std::sync::{Arc, Mutex, MutexGuard};

/// A consistent copy of every user-facing control value.
#[derive(Clone, Debug)]
pub struct ControlState {
    /// Pixel of interest `(x, y)` = `(column, row)`.
    pub cursor: (usize, usize),
    /// Plot the horizontal slice through the cursor row.
    pub plot_horizontal: bool,
    /// Plot the vertical slice through the cursor column.
    pub plot_vertical: bool,
    /// Plot the cursor-pixel time series.
    pub plot_pixel_series: bool,
    /// Derive the contrast window from recent-frame statistics.
    pub auto_contrast: bool,
    /// Subtract the dark frame (no-op while none is ready).
    pub apply_dark: bool,
    /// Display the dark frame itself instead of the live image.
    pub show_dark: bool,
    /// Display the noise map instead of the live image.
    pub show_noise_map: bool,
    /// Publish a zoom window around the cursor.
    pub show_zoom: bool,
    /// Show scope channel A.
    pub show_scope_a: bool,
    /// Show scope channel B.
    pub show_scope_b: bool,
    /// Process every Nth logical image (1 = every image).
    pub frame_skip: u32,
    /// Bit mask applied to every descrambled pixel.
    pub bit_mask: u16,
    /// Frame count for the next dark collection.
    pub num_dark: u32,
    /// Manual contrast maximum.
    pub contrast_max: i32,
    /// Manual contrast minimum.
    pub contrast_min: i32,
}

/// One-shot commands drained by the ingest context each frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlCommands {
    /// Start a dark collection over this many frames.
    pub collect_dark: Option<u32>,
    /// Discard the current dark frame.
    pub unset_dark: bool,
}

struct Shared {
    state: ControlState,
    pending: ControlCommands,
}

/// Thread-safe handle to the control state. Clone freely; all clones share
/// the same underlying values.
#[derive(Clone)]
pub struct Controls {
    shared: Arc<Mutex<Shared>>,
}

impl Controls {
    /// Create controls with sensor-appropriate defaults.
    pub fn new(sensor: Sensor) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: ControlState {
                    cursor: (0, 0),
                    plot_horizontal: false,
                    plot_vertical: false,
                    plot_pixel_series: false,
                    auto_contrast: false,
                    apply_dark: false,
                    show_dark: false,
                    show_noise_map: false,
                    show_zoom: false,
                    show_scope_a: true,
                    show_scope_b: true,
                    frame_skip: 1,
                    bit_mask: sensor.default_bit_mask(),
                    num_dark: 10,
                    contrast_max: 12_000,
                    contrast_min: 10_000,
                },
                pending: ControlCommands::default(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // A poisoned lock means a panicking viewer thread; the control
        // scalars are still sound, so keep serving them.
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Copy the current state and drain pending one-shot commands. Called by
    /// the ingest context once per image frame.
    pub fn begin_frame(&self) -> (ControlState, ControlCommands) {
        let mut shared = self.lock();
        let commands = std::mem::take(&mut shared.pending);
        (shared.state.clone(), commands)
    }

    /// Copy the current state without draining commands.
    pub fn state(&self) -> ControlState {
        self.lock().state.clone()
    }

    /// Move the pixel of interest.
    pub fn set_cursor(&self, x: usize, y: usize) {
        self.lock().state.cursor = (x, y);
    }

    /// Enable/disable the horizontal slice plot.
    pub fn set_plot_horizontal(&self, on: bool) {
        self.lock().state.plot_horizontal = on;
    }

    /// Enable/disable the vertical slice plot.
    pub fn set_plot_vertical(&self, on: bool) {
        self.lock().state.plot_vertical = on;
    }

    /// Enable/disable the cursor-pixel time series plot.
    pub fn set_plot_pixel_series(&self, on: bool) {
        self.lock().state.plot_pixel_series = on;
    }

    /// Enable/disable automatic contrast.
    pub fn set_auto_contrast(&self, on: bool) {
        self.lock().state.auto_contrast = on;
    }

    /// Enable/disable dark subtraction.
    pub fn set_apply_dark(&self, on: bool) {
        self.lock().state.apply_dark = on;
    }

    /// Show or hide the dark frame itself.
    pub fn set_show_dark(&self, on: bool) {
        self.lock().state.show_dark = on;
    }

    /// Show or hide the noise map.
    pub fn set_show_noise_map(&self, on: bool) {
        self.lock().state.show_noise_map = on;
    }

    /// Publish or drop the zoom window around the cursor.
    pub fn set_show_zoom(&self, on: bool) {
        self.lock().state.show_zoom = on;
    }

    /// Process only every Nth logical image. Zero is clamped to 1.
    pub fn set_frame_skip(&self, every: u32) {
        self.lock().state.frame_skip = every.max(1);
    }

    /// Select which scope channels are displayed.
    pub fn set_scope_channels(&self, show_a: bool, show_b: bool) {
        let mut shared = self.lock();
        shared.state.show_scope_a = show_a;
        shared.state.show_scope_b = show_b;
    }

    /// Change the pixel bit mask.
    pub fn set_bit_mask(&self, mask: u16) {
        self.lock().state.bit_mask = mask;
    }

    /// Change the frame count used by future dark collections.
    pub fn set_num_dark(&self, frames: u32) {
        self.lock().state.num_dark = frames.max(1);
    }

    /// Set the manual contrast window `(max, min)`.
    pub fn set_contrast(&self, max: i32, min: i32) {
        let mut shared = self.lock();
        shared.state.contrast_max = max;
        shared.state.contrast_min = min;
    }

    /// Request a dark collection using the current `num_dark`.
    pub fn request_dark(&self) {
        let mut shared = self.lock();
        let frames = shared.state.num_dark;
        shared.pending.collect_dark = Some(frames);
    }

    /// Request a dark collection over an explicit frame count.
    pub fn request_dark_frames(&self, frames: u32) {
        let mut shared = self.lock();
        shared.state.num_dark = frames.max(1);
        shared.pending.collect_dark = Some(frames.max(1));
    }

    /// Discard the current dark frame.
    pub fn unset_dark(&self) {
        self.lock().pending.unset_dark = true;
    }
}
