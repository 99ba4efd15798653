//! Custom error types for the pipeline.
//!
//! This module defines the primary error type, `PipelineError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and consistent
//! way to handle the different kinds of errors that can occur, from I/O and
//! configuration issues to malformed detector frames.
//!
//! Per the error policy of the live viewer, none of these errors is fatal to
//! the ingest path: the pipeline recovers from every frame-level error by
//! dropping the offending frame and incrementing the matching counter. The
//! error values exist so that frame handling stays explicit (`?` all the way
//! up to the dispatch loop, which decides what is droppable).

use thiserror::Error;

/// Convenience alias for results using the pipeline error type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors produced by the descrambling and live-view pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Descramble size mismatch: expected {expected} samples per lane, got {actual}")]
    DescrambleSize { expected: usize, actual: usize },

    #[error("Shape mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Ingest channel closed")]
    ChannelClosed,
}

impl PipelineError {
    /// Whether the ingest loop may recover from this error by dropping the
    /// current frame and continuing with the next one.
    pub fn is_frame_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedFrame(_)
                | PipelineError::DescrambleSize { .. }
                | PipelineError::ShapeMismatch { .. }
        )
    }
}
