use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use es60_core::builder::RawPingBuilder;
use es60_core::codec::{decode_telegram_from_bytes, encode_telegram, ByteOrder};
use es60_core::corrector::correct;

fn ping(samples: usize) -> es60_core::Telegram {
    RawPingBuilder::new(1)
        .power(vec![0x1234; samples])
        .build(ByteOrder::LittleEndian)
        .unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for samples in [100, 1000, 5000] {
        let telegram = ping(samples);
        group.throughput(Throughput::Bytes(telegram.encoded_len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &telegram, |b, t| {
            b.iter(|| encode_telegram(black_box(t), ByteOrder::LittleEndian));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for samples in [100, 1000, 5000] {
        let encoded = encode_telegram(&ping(samples), ByteOrder::LittleEndian);
        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &encoded, |b, data| {
            b.iter(|| {
                let telegram = decode_telegram_from_bytes(black_box(data), ByteOrder::LittleEndian).unwrap();
                telegram.as_raw().unwrap().fields().unwrap().count
            });
        });
    }

    group.finish();
}

fn bench_correct(c: &mut Criterion) {
    let mut group = c.benchmark_group("correct");

    for samples in [100, 1000, 5000] {
        let raw = ping(samples).as_raw().cloned().unwrap();
        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &raw, |b, raw| {
            b.iter(|| {
                let mut raw = raw.clone();
                correct(&mut raw, black_box(680)).unwrap();
                raw
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_correct);
criterion_main!(benches);
