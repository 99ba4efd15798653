//! End-to-end pipeline scenarios.
//!
//! Each test drives the full ingest path (router, assembler, descrambler,
//! dark engine, statistics, dispatcher) with wire-accurate synthetic frames
//! and asserts on what the viewer would pull.

use epix_live::config::LiveConfig;
use epix_live::display::CROSSHAIR_SENTINEL;
use epix_live::frame::RawFrame;
use epix_live::pipeline::Pipeline;
use epix_live::sensor::Sensor;
use epix_live::sim;
use ndarray::Array2;
use std::time::Duration;

fn pipeline_for(sensor: Sensor) -> Pipeline {
    let mut config = LiveConfig::default();
    config.sensor.kind = sensor;
    // No pacing in tests: every frame publishes, noise maps recompute freely.
    config.display.tick = Duration::from_millis(0);
    config.stats.noise_interval = Duration::from_millis(0);
    Pipeline::from_config(&config).unwrap()
}

#[test]
fn constant_row_interleaved_stream_is_stable() {
    let mut config = LiveConfig::default();
    config.sensor.kind = Sensor::Epix100a;
    config.display.tick = Duration::from_millis(0);
    // Full-frame statistics over deep queues are wasted effort on a
    // constant stream; shallow queues keep this test brisk.
    config.stats.noise_depth = 10;
    config.stats.recent_depth = 5;
    let mut pipeline = Pipeline::from_config(&config).unwrap();
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_bit_mask(0x3FFF);
    controls.set_plot_pixel_series(true);

    let image = Array2::from_elem((708, 768), 1234u16);
    for acq in 0..97 {
        pipeline.dispatch(&sim::row_interleaved_frame(acq, &image)).unwrap();
        let snap = snapshots.latest();
        let buffer = snap.image.as_ref().unwrap();
        // 1234 & 0x3FFF == 1234: the mask must not disturb the values.
        assert_eq!(buffer[(300, 400)], 1234.0);
    }
    controls.set_auto_contrast(true);
    for acq in 97..100 {
        pipeline.dispatch(&sim::row_interleaved_frame(acq, &image)).unwrap();
    }

    let snap = snapshots.latest();
    assert_eq!(snap.counters.images, 100);

    // A constant stream collapses into a single histogram bin...
    let histogram = snap.histogram.as_ref().unwrap();
    let occupied: Vec<_> = histogram
        .counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .collect();
    assert_eq!(occupied.len(), 1);
    assert_eq!(histogram.bins[occupied[0].0], 1234);

    // ...and a zero-std auto-contrast window centred on the value.
    assert_eq!(snap.contrast_max, 1234);
    assert_eq!(snap.contrast_min, 1234);
}

#[test]
fn permuted_sub_frames_assemble_exactly_one_image() {
    let mut pipeline = pipeline_for(Sensor::Tixel48x48);
    let snapshots = pipeline.snapshots();

    let quads: [Array2<u16>; 4] =
        [10u16, 20, 30, 40].map(|v| Array2::from_elem((48, 48), v));
    let frames = sim::quadrant_sub_frames(33, &quads);
    // Arrival order (ToA=1,asic=1), (ToA=0,asic=0), (ToA=0,asic=1), (ToA=1,asic=0).
    for index in [3, 0, 1, 2] {
        pipeline.dispatch(&frames[index]).unwrap();
    }

    let snap = snapshots.latest();
    assert_eq!(snap.counters.images, 1);
    assert_eq!(snap.counters.incomplete, 0);
    assert_eq!(snap.acq_num, 33);
    let buffer = snap.image.as_ref().unwrap();
    assert_eq!(buffer[(10, 10)], 10.0);
    assert_eq!(buffer[(10, 60)], 20.0);
    assert_eq!(buffer[(60, 10)], 30.0);
    assert_eq!(buffer[(60, 60)], 40.0);
}

#[test]
fn completed_acquisition_then_new_sub_frame_keeps_partial_private() {
    let mut pipeline = pipeline_for(Sensor::Tixel48x48);
    let snapshots = pipeline.snapshots();

    let quads: [Array2<u16>; 4] = std::array::from_fn(|_| Array2::from_elem((48, 48), 7u16));
    for frame in sim::quadrant_sub_frames(10, &quads) {
        pipeline.dispatch(&frame).unwrap();
    }
    // One more sub-frame for the next acquisition.
    pipeline
        .dispatch(&sim::quadrant_sub_frame(11, false, 0, &quads[0]))
        .unwrap();

    let snap = snapshots.latest();
    // Exactly one complete image; the acq=11 slot stays in the assembler.
    assert_eq!(snap.counters.images, 1);
    assert_eq!(snap.counters.incomplete, 0);
    assert_eq!(snap.acq_num, 10);
}

#[test]
fn dark_collection_and_subtraction_centre_the_contrast() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();

    controls.request_dark_frames(10);
    let dark = Array2::from_elem((146, 192), 3000u16);
    for acq in 0..10 {
        pipeline.dispatch(&sim::six_lane_frame(acq, &dark)).unwrap();
    }
    let snap = snapshots.latest();
    assert!(snap.dark.ready);
    assert_eq!(snap.dark.count, 10);

    controls.set_apply_dark(true);
    controls.set_auto_contrast(true);
    let bright = Array2::from_elem((146, 192), 5000u16);
    pipeline.dispatch(&sim::six_lane_frame(20, &bright)).unwrap();

    let snap = snapshots.latest();
    assert_eq!(snap.image.as_ref().unwrap()[(100, 100)], 2000.0);
    assert_eq!(snap.contrast_max, 2000);
    assert_eq!(snap.contrast_min, 2000);
}

#[test]
fn short_lane_increments_desc_errors_and_publishes_nothing() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let snapshots = pipeline.snapshots();

    // Six-lane stream with one sample missing: lane length 4671.
    let words = 6 + (6 * 4672 - 1);
    let frame = RawFrame::new(1, vec![0u8; words * 2]);
    pipeline.dispatch(&frame).unwrap();

    let snap = snapshots.latest();
    assert_eq!(snap.counters.desc_errors, 1);
    assert_eq!(snap.counters.images, 0);
    assert!(snap.image.is_none());
}

#[test]
fn noise_map_of_constant_stream_is_zero_with_fixed_contrast() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_auto_contrast(true);

    let image = Array2::from_elem((146, 192), 2500u16);
    for acq in 0..20 {
        pipeline.dispatch(&sim::six_lane_frame(acq, &image)).unwrap();
    }
    assert!(snapshots.latest().noise_map_ready);

    controls.set_show_noise_map(true);
    pipeline.dispatch(&sim::six_lane_frame(21, &image)).unwrap();

    let snap = snapshots.latest();
    assert_eq!(snap.contrast_max, 50);
    assert_eq!(snap.contrast_min, 0);
    let buffer = snap.image.as_ref().unwrap();
    assert!(buffer.iter().all(|&v| v.abs() < 1e-6));
}

#[test]
fn crosshair_sentinel_never_reaches_slices_or_series() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_cursor(96, 73);
    controls.set_plot_horizontal(true);
    controls.set_plot_vertical(true);
    controls.set_plot_pixel_series(true);

    let image = Array2::from_elem((146, 192), 900u16);
    for acq in 0..5 {
        pipeline.dispatch(&sim::six_lane_frame(acq, &image)).unwrap();
    }

    let snap = snapshots.latest();
    let buffer = snap.image.as_ref().unwrap();
    assert_eq!(buffer[(73, 96)], CROSSHAIR_SENTINEL);

    assert_eq!(snap.horizontal.len(), 192);
    assert_eq!(snap.vertical.len(), 146);
    assert!(snap.horizontal.iter().all(|&v| v == 900.0));
    assert!(snap.vertical.iter().all(|&v| v == 900.0));
    assert!(snap.pixel_series.iter().all(|&v| v == 900));
    assert_eq!(snap.pixel_value, Some(900.0));
}

#[test]
fn toggling_apply_dark_flushes_the_statistics() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_plot_pixel_series(true);

    let image = Array2::from_elem((146, 192), 1500u16);
    for acq in 0..8 {
        pipeline.dispatch(&sim::six_lane_frame(acq, &image)).unwrap();
    }
    assert_eq!(snapshots.latest().pixel_series.len(), 8);

    controls.set_apply_dark(true);
    pipeline.dispatch(&sim::six_lane_frame(9, &image)).unwrap();

    // Only the post-toggle frame remains in any buffer.
    let snap = snapshots.latest();
    assert_eq!(snap.pixel_series.len(), 1);
}

#[test]
fn cursor_move_clears_the_pixel_series() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_plot_pixel_series(true);
    controls.set_cursor(10, 10);

    let image = Array2::from_elem((146, 192), 100u16);
    for acq in 0..4 {
        pipeline.dispatch(&sim::six_lane_frame(acq, &image)).unwrap();
    }
    assert_eq!(snapshots.latest().pixel_series.len(), 4);

    controls.set_cursor(11, 10);
    pipeline.dispatch(&sim::six_lane_frame(5, &image)).unwrap();
    assert_eq!(snapshots.latest().pixel_series.len(), 1);
}

#[test]
fn mask_strips_unpopulated_bits_end_to_end() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_bit_mask(0x00FF);

    let image = Array2::from_elem((146, 192), 0xABCDu16);
    pipeline.dispatch(&sim::six_lane_frame(1, &image)).unwrap();

    let snap = snapshots.latest();
    assert_eq!(snap.image.as_ref().unwrap()[(50, 50)], f32::from(0xCDu8));
}

#[test]
fn auto_contrast_widens_from_k2_to_k10_under_dark_subtraction() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_auto_contrast(true);

    let low = Array2::from_elem((146, 192), 100u16);
    let high = Array2::from_elem((146, 192), 300u16);
    pipeline.dispatch(&sim::six_lane_frame(1, &low)).unwrap();
    pipeline.dispatch(&sim::six_lane_frame(2, &high)).unwrap();

    // Dark off: mean 200, std 100, k = 2.
    let snap = snapshots.latest();
    assert_eq!(snap.contrast_max, 400);
    assert_eq!(snap.contrast_min, 0);

    // An all-zero dark keeps pixel values unchanged under subtraction, so
    // only the k factor moves the window.
    controls.request_dark_frames(1);
    pipeline
        .dispatch(&sim::six_lane_frame(3, &Array2::from_elem((146, 192), 0u16)))
        .unwrap();
    controls.set_apply_dark(true);
    pipeline.dispatch(&sim::six_lane_frame(4, &low)).unwrap();
    pipeline.dispatch(&sim::six_lane_frame(5, &high)).unwrap();

    // Dark on: same mean and std, k = 10.
    let snap = snapshots.latest();
    assert_eq!(snap.contrast_max, 1200);
    assert_eq!(snap.contrast_min, -800);
}

#[test]
fn show_dark_displays_the_dark_frame_without_overlay() {
    let mut pipeline = pipeline_for(Sensor::EpixHr10kT);
    let controls = pipeline.controls();
    let snapshots = pipeline.snapshots();
    controls.set_cursor(96, 73);

    controls.request_dark_frames(2);
    let dark = Array2::from_elem((146, 192), 3000u16);
    for acq in 0..2 {
        pipeline.dispatch(&sim::six_lane_frame(acq, &dark)).unwrap();
    }

    controls.set_show_dark(true);
    let live = Array2::from_elem((146, 192), 9000u16);
    pipeline.dispatch(&sim::six_lane_frame(3, &live)).unwrap();

    let snap = snapshots.latest();
    let buffer = snap.image.as_ref().unwrap();
    // The dark frame itself is displayed, with no cross-hair drawn into it.
    assert!(buffer.iter().all(|&v| v == 3000.0));
}

#[test]
fn telemetry_and_scope_streams_do_not_disturb_images() {
    let mut pipeline = pipeline_for(Sensor::Tixel48x48);
    let snapshots = pipeline.snapshots();

    let quads: [Array2<u16>; 4] = std::array::from_fn(|_| Array2::from_elem((48, 48), 5u16));
    let frames = sim::quadrant_sub_frames(2, &quads);
    // Interleave sideband traffic with the image sub-frames.
    pipeline.dispatch(&frames[0]).unwrap();
    pipeline
        .dispatch(&sim::monitoring_frame(&[2000, 2000, 5000, 1, 2, 3, 4, 5]))
        .unwrap();
    pipeline.dispatch(&frames[1]).unwrap();
    let trace = vec![8192u16; 64];
    pipeline.dispatch(&sim::scope_frame(&trace, &trace)).unwrap();
    pipeline.dispatch(&frames[2]).unwrap();
    pipeline.dispatch(&frames[3]).unwrap();

    let snap = snapshots.latest();
    assert_eq!(snap.counters.images, 1);
    assert_eq!(snap.counters.incomplete, 0);
    assert!(snap.telemetry.is_some());
    assert!(snap.scope.is_some());
}
