//! # ePix Live Pipeline
//!
//! This crate implements the image descrambling and live-view data pipeline
//! for the ePix family of hybrid-pixel X-ray detector cameras. The detector
//! front-end delivers pixel data scrambled across parallel ADC/serializer
//! lanes and split over multiple transport frames; this library reassembles
//! it into coherent frames, applies dark subtraction, gain correction, and
//! bit masking, maintains live statistics (cursor time series, slices,
//! histogram, auto-contrast, running noise map), and publishes display-ready
//! snapshots to a viewer while also ingesting slow-monitoring telemetry and
//! pseudo-oscilloscope traces.
//!
//! ## Crate Structure
//!
//! - **`frame`**: Raw transport frames and header field accessors.
//! - **`sensor`**: Supported camera heads with their geometry and framing.
//! - **`router`**: Classifies arriving frames into image/scope/telemetry.
//! - **`assembler`**: Matches multi-packet sub-frames into logical images.
//! - **`descramble`**: Sensor-specific inverse interleave and bit masking.
//! - **`dark`**: Dark-frame accumulation, subtraction, fixed-point gain.
//! - **`stats`**: Ring-buffered statistics behind the live displays.
//! - **`display`**: Display-buffer rendering, cross-hair, slice extraction.
//! - **`controls`**: Thread-safe viewer-facing setters (cursor, toggles).
//! - **`telemetry`**: Slow-monitoring packet decoding and history.
//! - **`scope`**: Pseudo-oscilloscope decoding and FFT spectra.
//! - **`dispatcher`**: Rate-limited snapshot publication to the viewer.
//! - **`pipeline`**: The ingest context wiring all of the above together.
//! - **`sink`**: Raw-frame tee to a stream file, plus replay reading.
//! - **`export`**: CSV export of slice/series data from a snapshot.
//! - **`sim`**: Wire-accurate synthetic frame generation.
//! - **`config`**: Figment-based configuration loading and validation.
//! - **`logging`**: Tracing subscriber setup.
//! - **`error`**: The crate-wide `PipelineError` type.

pub mod assembler;
pub mod config;
pub mod controls;
pub mod dark;
pub mod descramble;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod export;
pub mod frame;
pub mod logging;
pub mod pipeline;
pub mod router;
pub mod scope;
pub mod sensor;
pub mod sim;
pub mod sink;
pub mod stats;
pub mod telemetry;
