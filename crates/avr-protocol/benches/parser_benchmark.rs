//! Display parser throughput.

use avr_protocol::{FrameParser, DEVICE_SIGNATURE, MARKER_END, MARKER_LOWER, MARKER_UPPER, META_TEXT};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn display_stream(frames: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..frames {
        buf.extend_from_slice(DEVICE_SIGNATURE);
        buf.push(META_TEXT);
        buf.push(MARKER_UPPER);
        buf.extend_from_slice(b"  DOLBY PLII  ");
        buf.push(MARKER_LOWER);
        buf.extend_from_slice(format!("  VOL -{:02}dB   ", i % 80).as_bytes());
        buf.push(MARKER_END);
        // Interleaved status noise between frames
        buf.extend_from_slice(&[0x00, 0x13, 0x7F, 0x4D]);
    }
    buf
}

fn bench_parser(c: &mut Criterion) {
    let stream = display_stream(1000);
    let mut group = c.benchmark_group("frame_parser");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("feed", |b| {
        b.iter(|| {
            let mut parser = FrameParser::new();
            let mut frames = 0usize;
            for &byte in black_box(&stream) {
                if parser.feed(byte).is_some() {
                    frames += 1;
                }
            }
            frames
        })
    });

    group.bench_function("feed_and_volume", |b| {
        b.iter(|| {
            let mut parser = FrameParser::new();
            black_box(&stream)
                .iter()
                .filter_map(|&byte| parser.feed(byte))
                .filter_map(|event| event.volume())
                .sum::<i32>()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parser);
criterion_main!(benches);
