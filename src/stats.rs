//! Ring-buffered statistics over the post-processed image stream.
//!
//! Four bounded FIFOs feed the live displays:
//!
//! * `pixel_series`: the value at the cursor pixel, one entry per frame;
//!   cleared when the cursor moves or when dark subtraction toggles.
//! * `histogram_samples`: the same cursor stream, deeper, binned on demand
//!   with unit-width bins spanning `[min - 10, max + 10)`.
//! * `recent`: the last few full frames, whose global mean/std drive the
//!   auto-contrast window.
//! * `noise`: a long frame queue reduced to a per-pixel standard-deviation
//!   map (the noise map) at most once per second.
//!
//! Producers never block: every queue evicts its oldest entry on overflow.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// Capacities and cadence for the statistics buffers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Depth of the cursor-pixel time series.
    #[serde(default = "default_pixel_series_depth")]
    pub pixel_series_depth: usize,
    /// Depth of the frame queue behind auto-contrast.
    #[serde(default = "default_recent_depth")]
    pub recent_depth: usize,
    /// Depth of the frame queue behind the noise map.
    #[serde(default = "default_noise_depth")]
    pub noise_depth: usize,
    /// Depth of the histogram sample buffer.
    #[serde(default = "default_histogram_depth")]
    pub histogram_depth: usize,
    /// Minimum interval between noise-map recomputations.
    #[serde(with = "humantime_serde", default = "default_noise_interval")]
    pub noise_interval: Duration,
}

fn default_pixel_series_depth() -> usize {
    50_000
}
fn default_recent_depth() -> usize {
    30
}
fn default_noise_depth() -> usize {
    1000
}
fn default_histogram_depth() -> usize {
    50_000
}
fn default_noise_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            pixel_series_depth: default_pixel_series_depth(),
            recent_depth: default_recent_depth(),
            noise_depth: default_noise_depth(),
            histogram_depth: default_histogram_depth(),
            noise_interval: default_noise_interval(),
        }
    }
}

/// A binned histogram of recent cursor-pixel values. `bins` holds the left
/// edge of each unit-width bin; `counts[i]` is the number of samples in
/// `[bins[i], bins[i] + 1)`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Histogram {
    /// Left bin edges.
    pub bins: Vec<i32>,
    /// Sample count per bin.
    pub counts: Vec<u32>,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, cap: usize) {
    while queue.len() >= cap.max(1) {
        queue.pop_front();
    }
    queue.push_back(value);
}

/// Owns the statistics ring buffers; one instance per pipeline.
pub struct StatsEngine {
    config: StatsConfig,
    pixel_series: VecDeque<i32>,
    histogram_samples: VecDeque<i32>,
    recent: VecDeque<Array2<i32>>,
    noise: VecDeque<Array2<i32>>,
    noise_map: Option<Array2<f32>>,
    last_noise_compute: Option<Instant>,
}

impl StatsEngine {
    /// Create an engine with the given buffer configuration.
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            pixel_series: VecDeque::new(),
            histogram_samples: VecDeque::new(),
            recent: VecDeque::new(),
            noise: VecDeque::new(),
            noise_map: None,
            last_noise_compute: None,
        }
    }

    /// Record the cursor-pixel value of the current frame.
    pub fn record_cursor_sample(&mut self, value: i32) {
        push_bounded(&mut self.pixel_series, value, self.config.pixel_series_depth);
        push_bounded(
            &mut self.histogram_samples,
            value,
            self.config.histogram_depth,
        );
    }

    /// Record a processed frame into the auto-contrast queue.
    pub fn record_image(&mut self, image: &Array2<i32>) {
        push_bounded(&mut self.recent, image.clone(), self.config.recent_depth);
    }

    /// Record a processed frame into the noise queue. Unlike the cursor
    /// buffers this happens for every frame, cursor position notwithstanding.
    pub fn record_noise(&mut self, image: &Array2<i32>) {
        push_bounded(&mut self.noise, image.clone(), self.config.noise_depth);
    }

    /// Clear the cursor-sample buffers (cursor moved).
    pub fn clear_cursor_series(&mut self) {
        self.pixel_series.clear();
        self.histogram_samples.clear();
    }

    /// Flush every frame-derived buffer. Called when dark subtraction
    /// toggles, since values on either side of the toggle are not comparable.
    /// A previously computed noise map stays visible until recomputed.
    pub fn flush(&mut self) {
        self.pixel_series.clear();
        self.histogram_samples.clear();
        self.recent.clear();
        self.noise.clear();
        debug!("statistics buffers flushed");
    }

    /// The cursor-pixel time series, oldest first.
    pub fn pixel_series(&self) -> Vec<i32> {
        self.pixel_series.iter().copied().collect()
    }

    /// Bin the histogram sample buffer, or `None` while it is empty.
    pub fn histogram(&self) -> Option<Histogram> {
        let low = *self.histogram_samples.iter().min()?;
        let high = *self.histogram_samples.iter().max()?;
        let first = low - 10;
        let bins: Vec<i32> = (first..high + 9).collect();
        let mut counts = vec![0u32; bins.len()];
        for &v in &self.histogram_samples {
            let index = (v - first) as usize;
            if let Some(slot) = counts.get_mut(index) {
                *slot += 1;
            }
        }
        Some(Histogram { bins, counts })
    }

    /// Global mean and population standard deviation over the recent-frame
    /// queue, or `None` while it is empty.
    pub fn image_mean_std(&self) -> Option<(f64, f64)> {
        if self.recent.is_empty() {
            return None;
        }
        let mut n = 0.0f64;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for image in &self.recent {
            for &v in image.iter() {
                let v = f64::from(v);
                n += 1.0;
                sum += v;
                sum_sq += v * v;
            }
        }
        let mean = sum / n;
        let var = (sum_sq / n - mean * mean).max(0.0);
        Some((mean, var.sqrt()))
    }

    /// Recompute the per-pixel noise map when the queue is non-empty and the
    /// recompute interval has elapsed. Returns true when a new map was
    /// published.
    pub fn maybe_update_noise_map(&mut self) -> bool {
        let Some(front) = self.noise.front() else {
            return false;
        };
        if let Some(last) = self.last_noise_compute {
            if last.elapsed() < self.config.noise_interval {
                return false;
            }
        }

        let shape = front.dim();
        let n = self.noise.len() as f64;
        let mut sum = Array2::<f64>::zeros(shape);
        let mut sum_sq = Array2::<f64>::zeros(shape);
        for image in &self.noise {
            if image.dim() != shape {
                continue;
            }
            ndarray::Zip::from(&mut sum)
                .and(&mut sum_sq)
                .and(image)
                .for_each(|s, sq, &v| {
                    let v = f64::from(v);
                    *s += v;
                    *sq += v * v;
                });
        }
        let map = ndarray::Zip::from(&sum).and(&sum_sq).map_collect(|&s, &sq| {
            let mean = s / n;
            ((sq / n - mean * mean).max(0.0)).sqrt() as f32
        });
        debug!(frames = self.noise.len(), "noise map recomputed");
        self.noise_map = Some(map);
        self.last_noise_compute = Some(Instant::now());
        true
    }

    /// The latest noise map, if one has ever been computed.
    pub fn noise_map(&self) -> Option<&Array2<f32>> {
        self.noise_map.as_ref()
    }

    /// Whether any noise map has been computed since startup.
    pub fn noise_map_ready(&self) -> bool {
        self.noise_map.is_some()
    }

    /// Buffer fill levels `(pixel_series, histogram, recent, noise)`.
    pub fn depths(&self) -> (usize, usize, usize, usize) {
        (
            self.pixel_series.len(),
            self.histogram_samples.len(),
            self.recent.len(),
            self.noise.len(),
        )
    }
}
