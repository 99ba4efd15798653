//! The ingest pipeline.
//!
//! Frames flow transport → router → { image assembler → descrambler →
//! dark/gain → statistics → display, telemetry, scope } → dispatcher. The
//! whole image path runs synchronously inside [`Pipeline::dispatch`]; the
//! async [`Pipeline::run`] loop only suspends at the ingest channel and at
//! the raw tee. User input never reaches the pipeline directly: the viewer
//! mutates the shared [`Controls`] block and the ingest context picks the
//! values up at its next frame.
//!
//! Every frame-level failure is absorbed here: the frame is dropped, a
//! counter increments, and the stream continues.

use crate::assembler::{FrameBundle, ImageAssembler};
use crate::config::LiveConfig;
use crate::controls::{ControlState, Controls};
use crate::dark::DarkEngine;
use crate::descramble::{apply_bit_mask, descramble};
use crate::dispatcher::{PipelineCounters, Snapshot, SnapshotHandle, UpdateDispatcher, UpdateKind};
use crate::display;
use crate::error::{PipelineError, Result};
use crate::frame::RawFrame;
use crate::router::{FrameClass, FrameRouter};
use crate::scope::ScopeAssembler;
use crate::sensor::Sensor;
use crate::sink::FrameSink;
use crate::stats::StatsEngine;
use crate::telemetry::TelemetryAssembler;
use ndarray::Array2;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The complete ingest-side pipeline for one camera.
pub struct Pipeline {
    sensor: Sensor,
    router: FrameRouter,
    assembler: ImageAssembler,
    dark: DarkEngine,
    stats: StatsEngine,
    scope: ScopeAssembler,
    telemetry: TelemetryAssembler,
    controls: Controls,
    dispatcher: UpdateDispatcher,
    sink: Option<Box<dyn FrameSink>>,
    desc_errors: u64,
    malformed_payloads: u64,
    images: u64,
    bundles_seen: u64,
    last_cursor: (usize, usize),
    contrast: (i32, i32),
}

impl Pipeline {
    /// Build a pipeline from configuration. The raw tee, if any, is attached
    /// separately with [`Pipeline::set_sink`].
    pub fn from_config(config: &LiveConfig) -> Result<Self> {
        let sensor = config.sensor.kind;
        let controls = Controls::new(sensor);
        controls.set_bit_mask(config.sensor.effective_bit_mask());
        controls.set_num_dark(config.dark.default_frames);
        info!(?sensor, shape = ?sensor.shape(), "pipeline configured");

        Ok(Self {
            sensor,
            router: FrameRouter::new(config.sensor.timing_offset),
            assembler: ImageAssembler::new(sensor),
            dark: DarkEngine::new(sensor.shape()),
            stats: StatsEngine::new(config.stats.clone()),
            scope: ScopeAssembler::new(config.scope.invert_a, config.scope.invert_b),
            telemetry: TelemetryAssembler::new(config.telemetry.history_depth),
            controls,
            dispatcher: UpdateDispatcher::new(config.display.tick),
            sink: None,
            desc_errors: 0,
            malformed_payloads: 0,
            images: 0,
            bundles_seen: 0,
            last_cursor: (0, 0),
            contrast: (12_000, 10_000),
        })
    }

    /// Attach a raw-frame tee. Every ingested frame reaches the sink before
    /// any processing.
    pub fn set_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sink = Some(sink);
    }

    /// The viewer-facing control handle.
    pub fn controls(&self) -> Controls {
        self.controls.clone()
    }

    /// The viewer-facing snapshot handle.
    pub fn snapshots(&self) -> SnapshotHandle {
        self.dispatcher.handle()
    }

    /// Load a per-pixel gain map.
    pub fn load_gain(&mut self, gain: Array2<u16>) -> Result<()> {
        self.dark.load_gain(gain)
    }

    /// Aggregated counters.
    pub fn counters(&self) -> PipelineCounters {
        let router = self.router.counters();
        let assembler = self.assembler.counters();
        PipelineCounters {
            malformed: router.malformed + self.malformed_payloads,
            unknown_channel: router.unknown_channel,
            desc_errors: self.desc_errors,
            duplicates: assembler.duplicates,
            incomplete: assembler.incomplete,
            images: self.images,
        }
    }

    /// Drive the pipeline from an ingest channel until the transport closes.
    pub async fn run(mut self, mut frames: mpsc::Receiver<RawFrame>) -> Result<()> {
        while let Some(frame) = frames.recv().await {
            // The tee sees every frame, whatever processing decides later.
            if let Some(sink) = &mut self.sink {
                if let Err(err) = sink.write_frame(&frame).await {
                    warn!(%err, "raw tee write failed");
                }
            }
            self.dispatch(&frame)?;
        }
        if let Some(sink) = &mut self.sink {
            sink.flush().await?;
        }
        info!(images = self.images, "ingest channel closed");
        Ok(())
    }

    /// Route and process one frame synchronously.
    ///
    /// Frame-level errors are consumed here (counted, logged, dropped); only
    /// non-recoverable errors surface to the caller.
    pub fn dispatch(&mut self, frame: &RawFrame) -> Result<()> {
        let Some(class) = self.router.classify(frame) else {
            return Ok(());
        };
        let outcome = match class {
            FrameClass::Image => self.on_image_frame(frame),
            FrameClass::Scope => self.on_scope_frame(frame),
            FrameClass::Monitoring => self.on_monitoring_frame(frame),
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(err) if err.is_frame_recoverable() => {
                self.malformed_payloads += 1;
                debug!(%err, "dropping frame");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn on_image_frame(&mut self, frame: &RawFrame) -> Result<()> {
        let Some(bundle) = self.assembler.accept(frame)? else {
            return Ok(());
        };
        self.process_bundle(bundle)
    }

    fn process_bundle(&mut self, bundle: FrameBundle) -> Result<()> {
        let (state, commands) = self.controls.begin_frame();

        if let Some(frames) = commands.collect_dark {
            self.dark.request(frames);
        }
        if commands.unset_dark {
            self.dark.unset();
        }
        // Toggling subtraction invalidates every frame-derived statistic.
        if self.dark.set_apply(state.apply_dark) {
            self.stats.flush();
        }

        // Frame skipping: process every Nth logical image.
        self.bundles_seen += 1;
        if (self.bundles_seen - 1) % u64::from(state.frame_skip.max(1)) != 0 {
            return Ok(());
        }

        let mut image = match descramble(self.sensor, &bundle) {
            Ok(image) => image,
            Err(err @ (PipelineError::DescrambleSize { .. } | PipelineError::MalformedFrame(_))) => {
                self.desc_errors += 1;
                warn!(%err, acq_num = bundle.acq_num, "descramble failed, frame dropped");
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        apply_bit_mask(&mut image, state.bit_mask);

        let processed = self.dark.process(&image);
        self.images += 1;

        let (x, y) = state.cursor;
        if (x, y) != self.last_cursor {
            self.stats.clear_cursor_series();
            self.last_cursor = (x, y);
        }
        let (rows, cols) = processed.dim();
        let in_bounds = x < cols && y < rows;
        if in_bounds {
            self.stats.record_cursor_sample(processed[(y, x)]);
            self.stats.record_image(&processed);
        }
        self.stats.record_noise(&processed);
        self.stats.maybe_update_noise_map();

        self.contrast = self.contrast_window(&state);

        let noise_view = state.show_noise_map && self.stats.noise_map_ready();
        let mut buffer = if state.show_dark {
            self.dark.mean().mapv(|v| v as f32)
        } else if noise_view {
            match self.stats.noise_map() {
                Some(map) => map.clone(),
                None => display::image_to_display(&processed),
            }
        } else {
            display::image_to_display(&processed)
        };
        if !state.show_dark {
            display::draw_crosshair(&mut buffer, x, y);
        }

        // Slices and the cursor readout come from the un-overlaid source.
        let (horizontal, vertical, pixel_value) = if in_bounds {
            let horizontal = if state.plot_horizontal {
                if noise_view {
                    self.stats
                        .noise_map()
                        .map(|map| display::noise_row_slice(map, y))
                        .unwrap_or_default()
                } else {
                    display::row_slice(&processed, y)
                }
            } else {
                Vec::new()
            };
            let vertical = if state.plot_vertical {
                if noise_view {
                    self.stats
                        .noise_map()
                        .map(|map| display::noise_column_slice(map, x))
                        .unwrap_or_default()
                } else {
                    display::column_slice(&processed, x)
                }
            } else {
                Vec::new()
            };
            let pixel_value = if noise_view {
                self.stats.noise_map().map(|map| map[(y, x)])
            } else {
                Some(processed[(y, x)] as f32)
            };
            (horizontal, vertical, pixel_value)
        } else {
            (Vec::new(), Vec::new(), None)
        };

        let zoom = if state.show_zoom && in_bounds {
            Some(Arc::new(display::zoom_region(&processed, x, y, 10)))
        } else {
            None
        };

        let pixel_series = if state.plot_pixel_series {
            Arc::new(self.stats.pixel_series())
        } else {
            Arc::new(Vec::new())
        };
        let histogram = self.stats.histogram().map(Arc::new);

        let acq_num = bundle.acq_num;
        let (contrast_max, contrast_min) = self.contrast;
        let dark = self.dark.status();
        let noise_map_ready = self.stats.noise_map_ready();
        let counters = self.counters();
        let buffer = Arc::new(buffer);
        self.dispatcher.try_publish(UpdateKind::Image, move |snap: &mut Snapshot| {
            snap.acq_num = acq_num;
            snap.image = Some(buffer);
            snap.contrast_max = contrast_max;
            snap.contrast_min = contrast_min;
            snap.horizontal = horizontal;
            snap.vertical = vertical;
            snap.pixel_value = pixel_value;
            snap.zoom = zoom;
            snap.pixel_series = pixel_series;
            snap.histogram = histogram;
            snap.dark = dark;
            snap.noise_map_ready = noise_map_ready;
            snap.counters = counters;
        });
        Ok(())
    }

    /// The contrast window for the current frame: manual values unless
    /// auto-contrast is on, in which case mean +/- k*std of the active source
    /// (k = 2, or 10 under dark subtraction), with a fixed (50, 0) window for
    /// the noise-map view. An empty statistics queue keeps the last window.
    fn contrast_window(&self, state: &ControlState) -> (i32, i32) {
        if !state.auto_contrast {
            return (state.contrast_max, state.contrast_min);
        }
        let k = if state.apply_dark { 10.0 } else { 2.0 };
        let window = if state.show_dark && self.dark.ready() {
            let (mean, std) = self.dark.mean_std();
            Some((mean + k * std, mean - k * std))
        } else {
            self.stats
                .image_mean_std()
                .map(|(mean, std)| (mean + k * std, mean - k * std))
        };
        let mut contrast = window
            .map(|(max, min)| (max as i32, min as i32))
            .unwrap_or(self.contrast);
        if state.show_noise_map {
            contrast = (50, 0);
        }
        contrast
    }

    fn on_scope_frame(&mut self, frame: &RawFrame) -> Result<()> {
        let state = self.controls.state();
        let mut decoded = self.scope.accept(frame)?;
        // A hidden channel publishes empty vectors rather than stale data.
        if !state.show_scope_a {
            decoded.channel_a.clear();
            decoded.fft_a.clear();
        }
        if !state.show_scope_b {
            decoded.channel_b.clear();
            decoded.fft_b.clear();
        }
        let scope = Arc::new(decoded);
        let counters = self.counters();
        self.dispatcher.try_publish(UpdateKind::Scope, move |snap| {
            snap.scope = Some(scope);
            snap.counters = counters;
        });
        Ok(())
    }

    fn on_monitoring_frame(&mut self, frame: &RawFrame) -> Result<()> {
        let sample = self.telemetry.accept(frame)?;
        let history = Arc::new(self.telemetry.history());
        let counters = self.counters();
        self.dispatcher
            .try_publish(UpdateKind::Telemetry, move |snap| {
                snap.telemetry = Some(sample);
                snap.telemetry_history = history;
                snap.counters = counters;
            });
        Ok(())
    }
}
