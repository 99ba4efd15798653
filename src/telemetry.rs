//! Slow-monitoring telemetry assembler.
//!
//! Each monitoring packet carries, behind the 32-byte transport header, eight
//! little-endian `i32` scalars at fixed offsets. The first three arrive in
//! hundredths (temperatures in centi-degrees, humidity in centi-percent) and
//! are scaled down before storage.

use crate::error::{PipelineError, Result};
use crate::frame::RawFrame;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Number of scalars per monitoring packet.
const SCALAR_COUNT: usize = 8;

/// One decoded monitoring packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySample {
    /// Strong-back temperature, degrees C.
    pub strongback_temp: i32,
    /// Ambient temperature, degrees C.
    pub ambient_temp: i32,
    /// Relative humidity, percent.
    pub relative_humidity: i32,
    /// ASIC analog current, mA.
    pub asic_analog_current: i32,
    /// ASIC digital current, mA.
    pub asic_digital_current: i32,
    /// Guard ring current, uA.
    pub guard_ring_current: i32,
    /// Analog supply voltage, mV.
    pub vcc_analog: i32,
    /// Digital supply voltage, mV.
    pub vcc_digital: i32,
    /// Arrival time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

/// Decodes monitoring packets and keeps a rolling history.
pub struct TelemetryAssembler {
    history: VecDeque<TelemetrySample>,
    depth: usize,
}

impl TelemetryAssembler {
    /// Create an assembler keeping `depth` historical samples.
    pub fn new(depth: usize) -> Self {
        Self {
            history: VecDeque::new(),
            depth: depth.max(1),
        }
    }

    /// Decode one monitoring frame and append it to the history.
    pub fn accept(&mut self, frame: &RawFrame) -> Result<TelemetrySample> {
        let body = frame.body();
        if body.len() < SCALAR_COUNT * 4 {
            return Err(PipelineError::MalformedFrame(format!(
                "monitoring payload is {} bytes, expected at least {}",
                body.len(),
                SCALAR_COUNT * 4
            )));
        }

        let mut values = [0i32; SCALAR_COUNT];
        for (j, value) in values.iter_mut().enumerate() {
            let word = &body[j * 4..j * 4 + 4];
            *value = i32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        }
        // Temperatures and humidity are transmitted in hundredths.
        for value in values.iter_mut().take(3) {
            *value /= 100;
        }

        let sample = TelemetrySample {
            strongback_temp: values[0],
            ambient_temp: values[1],
            relative_humidity: values[2],
            asic_analog_current: values[3],
            asic_digital_current: values[4],
            guard_ring_current: values[5],
            vcc_analog: values[6],
            vcc_digital: values[7],
            at: Some(Utc::now()),
        };

        while self.history.len() >= self.depth {
            self.history.pop_front();
        }
        self.history.push_back(sample);
        Ok(sample)
    }

    /// Most recent sample, if any packet has arrived.
    pub fn latest(&self) -> Option<TelemetrySample> {
        self.history.back().copied()
    }

    /// Rolling history, oldest first.
    pub fn history(&self) -> Vec<TelemetrySample> {
        self.history.iter().copied().collect()
    }
}
