use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use seqring::Queue;

/// The size of the queue to use
pub const SCALE_QUEUE_SIZE: u32 = 256;
/// The number of messages
pub const SCALE_MSG_COUNT: usize = 1_000_000;
/// The number of producers in the multi-producer benches
pub const SCALE_PRODUCERS: usize = 5;
/// The number of consumers in the multi-consumer benches
pub const SCALE_CONSUMERS: usize = 5;

fn queue_spsc() {
    let queue = Arc::new(Queue::<usize>::new(SCALE_QUEUE_SIZE));

    let consumer = std::thread::spawn({
        let queue = queue.clone();
        move || {
            for expected in 0..SCALE_MSG_COUNT {
                let (value, _) = queue.pop();
                assert_eq!(expected, value);
            }
        }
    });

    for i in 0..SCALE_MSG_COUNT {
        queue.push(i);
    }

    consumer.join().unwrap();
}

fn queue_mpmc() {
    let queue = Arc::new(Queue::<usize>::new(SCALE_QUEUE_SIZE));

    let consumers = (0..SCALE_CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            std::thread::spawn(move || {
                for _ in 0..(SCALE_MSG_COUNT / SCALE_CONSUMERS) {
                    let _ = queue.pop();
                }
            })
        })
        .collect::<Vec<_>>();

    let producers = (0..SCALE_PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            std::thread::spawn(move || {
                for i in 0..(SCALE_MSG_COUNT / SCALE_PRODUCERS) {
                    queue.push((p * SCALE_MSG_COUNT / SCALE_PRODUCERS) + i);
                }
            })
        })
        .collect::<Vec<_>>();

    for producer in producers {
        producer.join().unwrap();
    }
    for consumer in consumers {
        consumer.join().unwrap();
    }
}

pub fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(SCALE_MSG_COUNT as u64));
    group.bench_function("queue_spsc", |b| b.iter(queue_spsc));
    group.bench_function("queue_mpmc", |b| b.iter(queue_mpmc));
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(10);
    targets = bench_queue
);
criterion_main!(benches);
