//! 세그먼트 코덱 인코딩/디코딩 처리량 벤치마크

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nmt::{MediaBuffer, Segmenter};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for &size in &[512usize, 4096, 65536] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let buffer = MediaBuffer::new(vec![0xAB; size], 0, 33_000_000);
            b.iter(|| {
                let mut segmenter = Segmenter::new(4096);
                let mut packets = Vec::new();
                segmenter.encode(black_box(&buffer), true, true, &mut |p| packets.push(p));
                packets
            });
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    // 버퍼 64개를 한 번 인코딩해 두고 디코딩만 반복 측정
    let mut segmenter = Segmenter::new(4096);
    let mut packets = Vec::new();
    for i in 0..64u64 {
        let buffer = MediaBuffer::new(vec![i as u8; 1200], i * 33_000_000, 33_000_000);
        let flush = i == 63;
        segmenter.encode(&buffer, false, flush, &mut |p| packets.push(p));
    }

    let total: usize = packets.iter().map(|p| p.len()).sum();
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(total as u64));
    group.bench_function("stream_64", |b| {
        b.iter(|| {
            let mut decoder = Segmenter::new(4096);
            let mut count = 0usize;
            for packet in &packets {
                decoder
                    .decode(black_box(packet), &mut |_| count += 1)
                    .unwrap();
            }
            count
        });
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
