//! Frame decode and normalize throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use goodix_53xd::frame::{decode_frame, normalize, RAW_FRAME_SIZE};
use goodix_53xd::protocol::{pack_frame, ridge_pattern};

fn bench_frames(c: &mut Criterion) {
    let raw = pack_frame(&ridge_pattern(5));
    let decoded = decode_frame(&raw).expect("packed pattern decodes");

    let mut group = c.benchmark_group("frame");
    group.throughput(Throughput::Bytes(RAW_FRAME_SIZE as u64));
    group.bench_function("decode", |b| b.iter(|| decode_frame(black_box(&raw))));
    group.bench_function("normalize", |b| b.iter(|| normalize(black_box(&decoded))));
    group.bench_function("decode_normalize", |b| {
        b.iter(|| decode_frame(black_box(&raw)).map(|frame| normalize(&frame)))
    });
    group.finish();
}

criterion_group!(benches, bench_frames);
criterion_main!(benches);
