//! Benchmarks for the ingest path from raw bytes to decoded samples
//!
//! Covers checksum and field decoding of a single frame, and resync cost
//! when the byte stream is polluted with noise and false sync bytes.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use groundlink::protocol::{FrameLayout, FrameReader, PacketDecoder, SYNC_BYTE, SynthesisPolicy};
use groundlink::test_utils::{FrameBuilder, encode_stream, reference_sample, sample_at};
use std::hint::black_box;

fn bench_decode_frame(c: &mut Criterion) {
    let decoder = PacketDecoder::new(FrameLayout::V2, SynthesisPolicy::Fixed);
    let frame = FrameBuilder::v2(&reference_sample()).build();

    let mut group = c.benchmark_group("decode_frame");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("v2_valid", |b| {
        b.iter(|| black_box(decoder.decode_at(black_box(&frame), 0)))
    });

    let corrupt = FrameBuilder::v2(&reference_sample()).checksum_byte(0x00).build();
    group.bench_function("v2_bad_checksum", |b| {
        b.iter(|| black_box(decoder.decode_at(black_box(&corrupt), 0)))
    });
    group.finish();
}

fn decode_all(decoder: &PacketDecoder, bytes: &[u8], chunk: usize) -> usize {
    let mut reader = FrameReader::new(decoder.layout().frame_len);
    let mut decoded = 0;
    for piece in bytes.chunks(chunk) {
        reader.push(piece);
        while let Some(frame) = reader.next_frame() {
            match decoder.decode_at(&frame, 0) {
                Ok(_) => decoded += 1,
                Err(_) => reader.reject(&frame),
            }
        }
    }
    decoded
}

fn bench_stream_resync(c: &mut Criterion) {
    let decoder = PacketDecoder::new(FrameLayout::V2, SynthesisPolicy::Fixed);
    let samples: Vec<_> = (0..100).map(|i| sample_at(i as f32, 1.0)).collect();
    let clean = encode_stream(FrameLayout::V2, &samples);

    // Every frame preceded by a false sync and a few noise bytes
    let noisy: Vec<u8> = clean
        .chunks(FrameLayout::V2.frame_len)
        .flat_map(|frame| [SYNC_BYTE, 0x01, 0x02, 0x03].into_iter().chain(frame.iter().copied()))
        .collect();

    let mut group = c.benchmark_group("frame_stream");
    for (name, bytes) in [("clean", &clean), ("noisy", &noisy)] {
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        for chunk in [7usize, 64, 512] {
            group.bench_with_input(BenchmarkId::new(name, chunk), &chunk, |b, &chunk| {
                b.iter(|| black_box(decode_all(&decoder, black_box(bytes), chunk)))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_decode_frame, bench_stream_resync);
criterion_main!(benches);
