use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use udpring::prelude::*;
use udpring::ByteQueue;

fn bench_ring_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_write_read");

    for size in [64usize, 512, 1500, 9000].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("datagram", size), size, |b, &size| {
            let mut ring = RingBuffer::with_capacity(1 << 20).unwrap();
            let payload = vec![0x42u8; size];
            let mut out = vec![0u8; size];
            b.iter(|| {
                ring.write(black_box(&payload));
                ring.read(black_box(&mut out));
            });
        });
    }

    group.finish();
}

fn bench_ring_wrap(c: &mut Criterion) {
    c.bench_function("ring_wrap_non_pow2", |b| {
        let mut ring = RingBuffer::with_capacity(1000).unwrap();
        let payload = [7u8; 333];
        let mut out = [0u8; 333];
        b.iter(|| {
            ring.write(black_box(&payload));
            ring.read(black_box(&mut out));
        });
    });
}

fn bench_queue_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_contention");

    for producers in [1usize, 2, 4].iter() {
        group.bench_with_input(
            BenchmarkId::new("producers", producers),
            producers,
            |b, &producers| {
                b.iter(|| {
                    let queue = Arc::new(ByteQueue::new(64 * 1024).unwrap());
                    let handles: Vec<_> = (0..producers)
                        .map(|_| {
                            let queue = Arc::clone(&queue);
                            thread::spawn(move || {
                                for _ in 0..1000 {
                                    queue.push(black_box(&[0u8; 128]));
                                }
                            })
                        })
                        .collect();

                    let mut out = [0u8; 4096];
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    while queue.try_pop(&mut out) > 0 {}
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ring_write_read,
    bench_ring_wrap,
    bench_queue_contention
);
criterion_main!(benches);
