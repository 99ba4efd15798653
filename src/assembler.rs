//! Image assembler: completes logical frames from transport frames.
//!
//! Single-packet heads pass straight through: one frame is one image. The
//! four-sub-frame head delivers a logical image as four frames tagged by
//! `(is_ToA, asic)` with a shared acquisition number, in no guaranteed order.
//! The assembler keeps at most one partial image; when a frame with a
//! different acquisition number arrives, the partial is emitted incomplete
//! (empty slots zero-filled) and a fresh one starts with the newcomer. An
//! acquisition-number wrap is nothing special: only equality with the current
//! number matters.

use crate::error::{PipelineError, Result};
use crate::frame::{RawFrame, SUB_FRAME_BYTES};
use crate::sensor::{Framing, Sensor};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, trace};

/// One sub-frame slot of a partial image.
#[derive(Clone, Debug)]
pub struct QuadSlot {
    /// Whether real data was received for this slot.
    pub valid: bool,
    /// Sub-frame payload including its three header words; empty when the
    /// slot was zero-filled.
    pub payload: Bytes,
}

impl QuadSlot {
    fn empty() -> Self {
        Self {
            valid: false,
            payload: Bytes::new(),
        }
    }
}

/// Payload carried by a completed (or superseded) logical frame.
#[derive(Clone, Debug)]
pub enum BundlePayload {
    /// Full image frame, transport header still attached.
    Single(Bytes),
    /// Four sub-frame slots indexed by `(is_toa, asic)`:
    /// `[ (0,0), (0,1), (1,0), (1,1) ]`.
    Quad(Box<[QuadSlot; 4]>),
}

/// A logical frame handed to the descrambler.
#[derive(Clone, Debug)]
pub struct FrameBundle {
    /// Acquisition number shared by all occupied slots.
    pub acq_num: u32,
    /// False when the bundle was emitted with missing sub-frames.
    pub complete: bool,
    /// The pixel payload.
    pub payload: BundlePayload,
}

/// Assembler counters published with every snapshot.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct AssemblerCounters {
    /// Sub-frames that overwrote an already-occupied slot.
    pub duplicates: u64,
    /// Partial images emitted incomplete because a new acquisition started.
    pub incomplete: u64,
}

/// Slot index for a sub-frame tag. ASIC indices are 0 or 1 by contract.
fn slot_index(is_toa: bool, asic: u8) -> usize {
    (is_toa as usize) * 2 + (asic & 0x1) as usize
}

struct PartialImage {
    acq_num: u32,
    slots: [Option<Bytes>; 4],
}

impl PartialImage {
    fn new(acq_num: u32) -> Self {
        Self {
            acq_num,
            slots: [None, None, None, None],
        }
    }

    fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn into_bundle(self, complete: bool) -> FrameBundle {
        let slots = self.slots.map(|slot| match slot {
            Some(payload) => QuadSlot {
                valid: true,
                payload,
            },
            None => QuadSlot::empty(),
        });
        FrameBundle {
            acq_num: self.acq_num,
            complete,
            payload: BundlePayload::Quad(Box::new(slots)),
        }
    }
}

/// Builds logical frames for one sensor.
pub struct ImageAssembler {
    sensor: Sensor,
    current: Option<PartialImage>,
    counters: AssemblerCounters,
}

impl ImageAssembler {
    /// Create an assembler for the given sensor variant.
    pub fn new(sensor: Sensor) -> Self {
        Self {
            sensor,
            current: None,
            counters: AssemblerCounters::default(),
        }
    }

    /// Feed one image-channel frame. Returns a bundle when a logical frame
    /// became available, which happens at most once per call.
    pub fn accept(&mut self, frame: &RawFrame) -> Result<Option<FrameBundle>> {
        match self.sensor.framing() {
            Framing::SinglePacket => {
                let acq_num = frame.acq_number().unwrap_or(0);
                Ok(Some(FrameBundle {
                    acq_num,
                    complete: true,
                    payload: BundlePayload::Single(frame.payload.clone()),
                }))
            }
            Framing::FourSubFrames => self.accept_sub_frame(frame),
        }
    }

    fn accept_sub_frame(&mut self, frame: &RawFrame) -> Result<Option<FrameBundle>> {
        if frame.len() != SUB_FRAME_BYTES {
            return Err(PipelineError::MalformedFrame(format!(
                "sub-frame payload is {} bytes, expected {}",
                frame.len(),
                SUB_FRAME_BYTES
            )));
        }
        // Length was checked, so the header words are present.
        let acq_num = frame.acq_number().unwrap_or(0);
        let is_toa = frame.is_toa().unwrap_or(false);
        let asic = frame.asic_index().unwrap_or(0);

        // A new acquisition supersedes the old partial: flush it incomplete
        // with whatever arrived.
        let mut emitted = None;
        let superseded = self
            .current
            .as_ref()
            .is_some_and(|partial| partial.acq_num != acq_num);
        if superseded {
            if let Some(stale) = self.current.take() {
                self.counters.incomplete += 1;
                let bundle = stale.into_bundle(false);
                debug!(
                    acq_num = bundle.acq_num,
                    next = acq_num,
                    "emitting incomplete image, new acquisition started"
                );
                emitted = Some(bundle);
            }
        }
        // Lazy start: the first sub-frame of an acquisition opens a partial.
        if self.current.is_none() {
            self.current = Some(PartialImage::new(acq_num));
        }

        let partial = self
            .current
            .as_mut()
            .ok_or_else(|| PipelineError::MalformedFrame("no partial image".into()))?;
        let index = slot_index(is_toa, asic);
        if partial.slots[index].is_some() {
            self.counters.duplicates += 1;
            trace!(acq_num, is_toa, asic, "duplicate sub-frame, overwriting");
        }
        partial.slots[index] = Some(frame.payload.clone());

        if partial.occupied() == 4 {
            let done = self
                .current
                .take()
                .map(|p| p.into_bundle(true))
                .ok_or_else(|| PipelineError::MalformedFrame("no partial image".into()))?;
            trace!(acq_num, "image complete");
            return Ok(Some(done));
        }
        Ok(emitted)
    }

    /// Current duplicate / incomplete counters.
    pub fn counters(&self) -> AssemblerCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub_frame(acq: u32, is_toa: bool, asic: u8, fill: u16) -> RawFrame {
        let mut payload = Vec::with_capacity(SUB_FRAME_BYTES);
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&acq.to_le_bytes());
        let info = ((is_toa as u32) << 3) | asic as u32;
        payload.extend_from_slice(&info.to_le_bytes());
        for _ in 0..(SUB_FRAME_BYTES - 12) / 2 {
            payload.extend_from_slice(&fill.to_le_bytes());
        }
        RawFrame::new(1, payload)
    }

    #[test]
    fn single_packet_sensor_passes_through() {
        let mut asm = ImageAssembler::new(Sensor::EpixHr10kT);
        let frame = RawFrame::new(1, vec![0u8; 64]);
        let bundle = asm.accept(&frame).unwrap().unwrap();
        assert!(bundle.complete);
        assert!(matches!(bundle.payload, BundlePayload::Single(_)));
    }

    #[test]
    fn four_sub_frames_in_permuted_order_complete_once() {
        let mut asm = ImageAssembler::new(Sensor::Tixel48x48);
        let order = [(true, 1), (false, 0), (false, 1)];
        for (toa, asic) in order {
            assert!(asm.accept(&sub_frame(7, toa, asic, 1)).unwrap().is_none());
        }
        let bundle = asm.accept(&sub_frame(7, true, 0, 1)).unwrap().unwrap();
        assert!(bundle.complete);
        assert_eq!(bundle.acq_num, 7);
        match bundle.payload {
            BundlePayload::Quad(slots) => assert!(slots.iter().all(|s| s.valid)),
            BundlePayload::Single(_) => panic!("expected quad payload"),
        }
        assert_eq!(asm.counters().incomplete, 0);
    }

    #[test]
    fn new_acquisition_flushes_partial_as_incomplete() {
        let mut asm = ImageAssembler::new(Sensor::Tixel48x48);
        assert!(asm.accept(&sub_frame(10, false, 0, 1)).unwrap().is_none());
        assert!(asm.accept(&sub_frame(10, false, 1, 1)).unwrap().is_none());

        let bundle = asm.accept(&sub_frame(11, true, 0, 2)).unwrap().unwrap();
        assert!(!bundle.complete);
        assert_eq!(bundle.acq_num, 10);
        match bundle.payload {
            BundlePayload::Quad(slots) => {
                assert!(slots[0].valid && slots[1].valid);
                assert!(!slots[2].valid && !slots[3].valid);
            }
            BundlePayload::Single(_) => panic!("expected quad payload"),
        }
        assert_eq!(asm.counters().incomplete, 1);
    }

    #[test]
    fn duplicate_sub_frame_overwrites_and_counts() {
        let mut asm = ImageAssembler::new(Sensor::Tixel48x48);
        assert!(asm.accept(&sub_frame(3, false, 0, 1)).unwrap().is_none());
        assert!(asm.accept(&sub_frame(3, false, 0, 9)).unwrap().is_none());
        assert_eq!(asm.counters().duplicates, 1);
    }

    #[test]
    fn wrong_sized_sub_frame_is_malformed() {
        let mut asm = ImageAssembler::new(Sensor::Tixel48x48);
        let err = asm.accept(&RawFrame::new(1, vec![0u8; 100])).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedFrame(_)));
    }

    #[test]
    fn completion_resets_for_next_acquisition() {
        let mut asm = ImageAssembler::new(Sensor::Tixel48x48);
        for (toa, asic) in [(false, 0), (false, 1), (true, 0)] {
            assert!(asm.accept(&sub_frame(10, toa, asic, 1)).unwrap().is_none());
        }
        assert!(asm.accept(&sub_frame(10, true, 1, 1)).unwrap().unwrap().complete);

        // Next acquisition starts a fresh partial holding only its own slot.
        assert!(asm.accept(&sub_frame(11, false, 0, 1)).unwrap().is_none());
        assert_eq!(asm.counters().incomplete, 0);
    }
}
