//! Benchmarks for the fair queue.
//!
//! Benchmarks cover:
//! - Waiting store operations (enqueue/extract, priority and fairness ordering)
//! - Submit-to-drain throughput of the admission controller

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

use prometheus_fair_queue::core::{from_fn, Task, TaskMetadata};
use prometheus_fair_queue::infra::queue::{Extracted, InMemoryQueue};
use prometheus_fair_queue::util::clock;
use prometheus_fair_queue::QueueBuilder;

use tokio::runtime::Runtime;
use tokio::sync::Notify;
use uuid::Uuid;

// ============================================================================
// Helpers
// ============================================================================

fn task(priority: i64, key: u32) -> Task<u64, u64, u32> {
    let meta = TaskMetadata {
        id: Uuid::new_v4(),
        priority,
        enqueued_at: clock::now(),
        deadline: None,
    };
    Task::new(meta, key, 0, Box::new(|_| {}))
}

fn drain(store: &mut InMemoryQueue<u64, u64, u32>) -> usize {
    let now = clock::now();
    let mut expired = Vec::new();
    let mut count = 0;
    while let Extracted::Ready(task) = store.extract_next(now, &mut expired) {
        black_box(task.meta.id);
        count += 1;
    }
    count
}

// ============================================================================
// Waiting Store Benchmarks
// ============================================================================

fn bench_store_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_enqueue");

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut store = InMemoryQueue::new();
                for i in 0..size {
                    store.enqueue(task(i64::try_from(i % 10).unwrap_or_default(), 0));
                }
                black_box(store.len())
            });
        });
    }

    group.finish();
}

fn bench_store_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_extract");

    for partitions in [1_u32, 16, 256] {
        group.throughput(Throughput::Elements(4_096));
        group.bench_with_input(
            BenchmarkId::new("partitions", partitions),
            &partitions,
            |b, &partitions| {
                b.iter_batched(
                    || {
                        let mut store = InMemoryQueue::new();
                        for i in 0..4_096_u32 {
                            store.enqueue(task(i64::from(i % 7), i % partitions));
                        }
                        store
                    },
                    |mut store| black_box(drain(&mut store)),
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

// ============================================================================
// Admission Benchmarks
// ============================================================================

fn bench_submit_to_drain(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("submit_to_drain");

    for concurrency in [1_usize, 8, 64] {
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(
            BenchmarkId::new("concurrency", concurrency),
            &concurrency,
            |b, &concurrency| {
                b.to_async(&rt).iter(|| async move {
                    let queue = QueueBuilder::<u64>::new("bench")
                        .with_concurrency(concurrency)
                        .with_priority(|n: &u64| i64::try_from(n % 5).unwrap_or_default())
                        .with_fairness(|n: &u64| n % 4)
                        .build_on_current(from_fn(|n: u64| async move { Ok(n * 2) }))
                        .expect("queue");

                    let drained = Arc::new(Notify::new());
                    let signal = Arc::clone(&drained);
                    queue.on_drain(move || signal.notify_one());

                    for n in 0..1_000_u64 {
                        queue.submit(n, |result| {
                            black_box(result.ok());
                        });
                    }
                    drained.notified().await;
                });
            },
        );
    }

    group.finish();
}

criterion_group!(store, bench_store_enqueue, bench_store_extract);
criterion_group!(admission, bench_submit_to_drain);
criterion_main!(store, admission);
