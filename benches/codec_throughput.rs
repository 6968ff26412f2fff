//! Frame and event encode/decode throughput.

use std::io::Cursor;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tfw_harness::link::{
    encode_frame, Event, FrameCodec, LinkSource, Outcome, ReadPolicy, StateBlob, TestName,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

fn bench_encode_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");

    for size in [16usize, 4 * 1024, 256 * 1024] {
        let payload = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("payload", size), &payload, |b, p| {
            b.iter(|| encode_frame(0x00, black_box(p)))
        });
    }

    group.finish();
}

fn bench_read_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_packet");
    let rt = runtime();
    let codec = FrameCodec::new(Duration::ZERO);

    for size in [16usize, 4 * 1024, 256 * 1024] {
        let frame = encode_frame(0x02, &vec![0xC3u8; size]).unwrap();
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("payload", size), &frame, |b, f| {
            b.iter(|| {
                let mut source = LinkSource::new(Cursor::new(f.clone()), ReadPolicy::default());
                rt.block_on(codec.read_packet(&mut source)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_event_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("event");

    let started = Event::TestStarted {
        name: TestName::new(b"sched_round_robin_fairness").unwrap(),
        nightly_only: false,
        state: StateBlob::new(vec![0x11; 512]).unwrap(),
    }
    .encode();
    let finished = Event::TestResult {
        outcome: Outcome::Pass,
        is_final: false,
        state: StateBlob::new(vec![0x22; 512]).unwrap(),
    }
    .encode();

    group.bench_function("decode_test_started", |b| {
        b.iter(|| Event::decode(black_box(&started)))
    });
    group.bench_function("decode_test_result", |b| {
        b.iter(|| Event::decode(black_box(&finished)))
    });

    group.finish();
}

criterion_group!(benches, bench_encode_frame, bench_read_packet, bench_event_codec);
criterion_main!(benches);
