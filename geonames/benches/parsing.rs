//! Benchmarks pour le parsing geonames

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::io::Cursor;
use std::num::NonZeroUsize;

use geonames::{parse_line, BatchExt, RecordStream};

fn synthetic_input(lines: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(lines * 64);
    for i in 0..lines {
        let line = format!(
            "{}\tPlace {}\tplace\tPl\t{:.5}\t{:.5}\tP\tPPL\tFR\n",
            i,
            i,
            (i % 360) as f64 - 180.0,
            (i % 180) as f64 - 90.0
        );
        data.extend_from_slice(line.as_bytes());
    }
    data
}

fn bench_parse_line(c: &mut Criterion) {
    let line = b"2988507\tParis\tParis\tLutece\t2.3488\t48.85341\tP\tPPLC\tFR\n";

    c.bench_function("parse_line", |b| {
        b.iter(|| black_box(parse_line(black_box(line))))
    });
}

fn bench_stream(c: &mut Criterion) {
    let data = synthetic_input(100_000);

    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("records", |b| {
        b.iter(|| {
            let count = RecordStream::new(Cursor::new(black_box(&data[..])))
                .filter(|r| r.is_ok())
                .count();
            black_box(count)
        })
    });

    group.bench_function("batches_10000", |b| {
        let size = NonZeroUsize::new(10_000).unwrap();
        b.iter(|| {
            let count = RecordStream::new(Cursor::new(black_box(&data[..])))
                .batched(size)
                .count();
            black_box(count)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse_line, bench_stream);
criterion_main!(benches);
