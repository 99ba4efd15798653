//! CSV export of viewer series.
//!
//! Saves the slice vectors, the cursor-pixel time series, and the telemetry
//! history from a snapshot to CSV files, one file per series, suffixed
//! `_horizontal`, `_vertical`, `_pixel`, and `_telemetry` on the chosen base
//! name. Only non-empty series are written.

use crate::dispatcher::Snapshot;
use crate::error::Result;
use crate::telemetry::TelemetrySample;
use std::path::{Path, PathBuf};

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    base.with_file_name(format!("{stem}{suffix}.{extension}"))
}

fn write_column<T: std::fmt::Display>(path: &Path, values: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for value in values {
        writer.write_record([value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_telemetry(path: &Path, history: &[TelemetrySample]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer
        .write_record([
            "strongback_temp",
            "ambient_temp",
            "relative_humidity",
            "asic_analog_current",
            "asic_digital_current",
            "guard_ring_current",
            "vcc_analog",
            "vcc_digital",
        ])?;
    for sample in history {
        writer
            .write_record([
                sample.strongback_temp.to_string(),
                sample.ambient_temp.to_string(),
                sample.relative_humidity.to_string(),
                sample.asic_analog_current.to_string(),
                sample.asic_digital_current.to_string(),
                sample.guard_ring_current.to_string(),
                sample.vcc_analog.to_string(),
                sample.vcc_digital.to_string(),
            ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every non-empty series of `snapshot` next to `base`, returning the
/// paths created.
pub fn save_series(base: &Path, snapshot: &Snapshot) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if !snapshot.horizontal.is_empty() {
        let path = suffixed(base, "_horizontal");
        write_column(&path, &snapshot.horizontal)?;
        written.push(path);
    }
    if !snapshot.vertical.is_empty() {
        let path = suffixed(base, "_vertical");
        write_column(&path, &snapshot.vertical)?;
        written.push(path);
    }
    if !snapshot.pixel_series.is_empty() {
        let path = suffixed(base, "_pixel");
        write_column(&path, &snapshot.pixel_series)?;
        written.push(path);
    }
    if !snapshot.telemetry_history.is_empty() {
        let path = suffixed(base, "_telemetry");
        write_telemetry(&path, &snapshot.telemetry_history)?;
        written.push(path);
    }
    Ok(written)
}
