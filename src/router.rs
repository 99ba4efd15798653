//! Frame router: classifies arriving frames by channel.
//!
//! The router is stateless between calls apart from its drop counters. It
//! prefers the transport channel tag; a zero tag (file streaming) falls back
//! to the virtual-channel bits of the first header word.

use crate::frame::{RawFrame, CHANNEL_IMAGE, CHANNEL_MONITORING, CHANNEL_SCOPE};
use serde::Serialize;
use tracing::debug;

/// Destination stream for a classified frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass {
    /// Pixel data for the image assembler.
    Image,
    /// Pseudo-oscilloscope trace.
    Scope,
    /// Slow-monitoring telemetry.
    Monitoring,
}

/// Drop counters published with every snapshot.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RouterCounters {
    /// Frames shorter than the minimum transport header.
    pub malformed: u64,
    /// Frames on a channel the router does not know.
    pub unknown_channel: u64,
}

/// Classifies frames into image / scope / monitoring streams.
pub struct FrameRouter {
    monitoring_channel: u8,
    counters: RouterCounters,
}

/// Minimum frame size the router accepts; anything shorter cannot carry a
/// complete transport header.
const MIN_FRAME_BYTES: usize = 32;

impl FrameRouter {
    /// Create a router. `timing_offset` shifts the monitoring channel id when
    /// a timing module occupies the lower virtual channels.
    pub fn new(timing_offset: u8) -> Self {
        Self {
            monitoring_channel: CHANNEL_MONITORING + timing_offset,
            counters: RouterCounters::default(),
        }
    }

    /// Classify one frame, or `None` when it must be dropped.
    ///
    /// Dropped frames are counted; the caller simply moves on to the next
    /// frame, matching the recover-by-dropping policy of the whole pipeline.
    pub fn classify(&mut self, frame: &RawFrame) -> Option<FrameClass> {
        if frame.len() < MIN_FRAME_BYTES {
            self.counters.malformed += 1;
            debug!(len = frame.len(), "dropping short frame");
            return None;
        }

        // During streaming the transport tag is zero and the header VC bits
        // discriminate instead.
        let channel = if frame.channel != 0 {
            frame.channel
        } else {
            frame.virtual_channel()?
        };

        if channel == CHANNEL_IMAGE || channel == 0 {
            Some(FrameClass::Image)
        } else if channel == CHANNEL_SCOPE {
            Some(FrameClass::Scope)
        } else if channel == self.monitoring_channel {
            Some(FrameClass::Monitoring)
        } else {
            self.counters.unknown_channel += 1;
            debug!(channel, "dropping frame on unknown channel");
            None
        }
    }

    /// Current drop counters.
    pub fn counters(&self) -> RouterCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(channel: u8, first_word: u32) -> RawFrame {
        let mut payload = first_word.to_le_bytes().to_vec();
        payload.resize(32, 0);
        RawFrame::new(channel, payload)
    }

    #[test]
    fn routes_by_transport_tag() {
        let mut router = FrameRouter::new(0);
        assert_eq!(router.classify(&frame(1, 0)), Some(FrameClass::Image));
        assert_eq!(router.classify(&frame(2, 0)), Some(FrameClass::Scope));
        assert_eq!(router.classify(&frame(3, 0)), Some(FrameClass::Monitoring));
    }

    #[test]
    fn falls_back_to_virtual_channel_bits() {
        let mut router = FrameRouter::new(0);
        assert_eq!(router.classify(&frame(0, 2)), Some(FrameClass::Scope));
        assert_eq!(router.classify(&frame(0, 3)), Some(FrameClass::Monitoring));
        // VC 0 is the streaming image channel.
        assert_eq!(router.classify(&frame(0, 0)), Some(FrameClass::Image));
    }

    #[test]
    fn counts_and_drops_short_frames() {
        let mut router = FrameRouter::new(0);
        assert_eq!(router.classify(&RawFrame::new(1, vec![0u8; 8])), None);
        assert_eq!(router.counters().malformed, 1);
    }

    #[test]
    fn counts_and_drops_unknown_channels() {
        let mut router = FrameRouter::new(0);
        assert_eq!(router.classify(&frame(9, 0)), None);
        assert_eq!(router.counters().unknown_channel, 1);
    }

    #[test]
    fn timing_offset_shifts_monitoring_channel() {
        let mut router = FrameRouter::new(2);
        assert_eq!(router.classify(&frame(5, 0)), Some(FrameClass::Monitoring));
        assert_eq!(router.classify(&frame(3, 0)), None);
        assert_eq!(router.counters().unknown_channel, 1);
    }
}
