//! Criterion benchmarks for the descramble hot path.
//!
//! Descrambling runs once per acquisition on the ingest context and must
//! never block the stream; these benchmarks establish baselines per sensor
//! map.
//!
//! Run with: cargo bench --bench descramble

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use epix_live::assembler::{BundlePayload, FrameBundle};
use epix_live::descramble::{apply_bit_mask, descramble};
use epix_live::sensor::Sensor;
use epix_live::sim;
use ndarray::Array2;

fn bundle_from(payload: Vec<u8>) -> FrameBundle {
    FrameBundle {
        acq_num: 0,
        complete: true,
        payload: BundlePayload::Single(payload.into()),
    }
}

fn row_interleaved(c: &mut Criterion) {
    let mut group = c.benchmark_group("descramble_row_interleaved");
    let image = Array2::from_elem((708, 768), 1234u16);
    let payload = sim::scramble_row_interleaved(&image);
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("708x768", |b| {
        b.iter(|| {
            let bundle = bundle_from(black_box(payload.clone()));
            descramble(Sensor::Epix100a, &bundle).unwrap()
        });
    });
    group.finish();
}

fn six_lane(c: &mut Criterion) {
    let mut group = c.benchmark_group("descramble_six_lane");
    let image = Array2::from_elem((146, 192), 1234u16);
    let payload = sim::scramble_six_lane(&image);
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("146x192", |b| {
        b.iter(|| {
            let bundle = bundle_from(black_box(payload.clone()));
            descramble(Sensor::EpixHr10kT, &bundle).unwrap()
        });
    });
    group.finish();
}

fn masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit_mask");
    group.bench_function("708x768", |b| {
        b.iter(|| {
            let mut image = Array2::from_elem((708, 768), 0xABCDu16);
            apply_bit_mask(black_box(&mut image), 0x3FFF);
            image
        });
    });
    group.finish();
}

criterion_group!(benches, row_interleaved, six_lane, masking);
criterion_main!(benches);
