// SPDX-License-Identifier: MPL-2.0
use cineview::AudioRingBuffer;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn ring_buffer_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");

    // Chunk sizes chosen to mirror real traffic: a resampled AAC frame on
    // the producer side, a device callback period on the consumer side.
    let frame = vec![0.1f32; 2048];
    let mut callback = vec![0.0f32; 960];

    group.bench_function("push_pop_cycle", |b| {
        let ring = AudioRingBuffer::new(1 << 20);
        b.iter(|| {
            black_box(ring.push(black_box(&frame)));
            black_box(ring.read(black_box(&mut callback)));
        });
    });

    group.bench_function("read_through_compaction", |b| {
        let ring = AudioRingBuffer::new(8192);
        b.iter(|| {
            while ring.push(&frame) > 0 {}
            while ring.read(&mut callback) > 0 {}
        });
    });

    group.finish();
}

criterion_group!(benches, ring_buffer_benchmark);
criterion_main!(benches);
