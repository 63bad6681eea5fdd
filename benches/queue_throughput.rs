//! Benchmarks comparing the lock-free queue to a mutex-guarded baseline

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use parking_lot::Mutex;
use strela::queue::{MpmcQueue, PushError};
use strela::util::Backoff;

const TOTAL: usize = 100_000;

fn pump_lockfree(producers: usize, consumers: usize) {
    let queue = Arc::new(MpmcQueue::new(1024));
    let claimed = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..producers {
        let queue = Arc::clone(&queue);
        let claimed = Arc::clone(&claimed);
        handles.push(thread::spawn(move || loop {
            let value = claimed.fetch_add(1, Ordering::Relaxed);
            if value >= TOTAL {
                return;
            }
            let mut value = value;
            let mut backoff = Backoff::new();
            loop {
                match queue.push(value) {
                    Ok(()) => break,
                    Err(PushError::Full(v)) => {
                        value = v;
                        backoff.wait();
                    }
                    Err(PushError::Closed(_)) => return,
                }
            }
        }));
    }
    for _ in 0..consumers {
        let queue = Arc::clone(&queue);
        let consumed = Arc::clone(&consumed);
        handles.push(thread::spawn(move || loop {
            if queue.pop().is_some() {
                consumed.fetch_add(1, Ordering::Release);
            } else if consumed.load(Ordering::Acquire) >= TOTAL {
                return;
            } else {
                thread::yield_now();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn pump_mutex(producers: usize, consumers: usize) {
    let queue = Arc::new(Mutex::new(VecDeque::new()));
    let claimed = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..producers {
        let queue = Arc::clone(&queue);
        let claimed = Arc::clone(&claimed);
        handles.push(thread::spawn(move || loop {
            let value = claimed.fetch_add(1, Ordering::Relaxed);
            if value >= TOTAL {
                return;
            }
            queue.lock().push_back(value);
        }));
    }
    for _ in 0..consumers {
        let queue = Arc::clone(&queue);
        let consumed = Arc::clone(&consumed);
        handles.push(thread::spawn(move || loop {
            if queue.lock().pop_front().is_some() {
                consumed.fetch_add(1, Ordering::Release);
            } else if consumed.load(Ordering::Acquire) >= TOTAL {
                return;
            } else {
                thread::yield_now();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_throughput");
    group.throughput(Throughput::Elements(TOTAL as u64));
    group.sample_size(10);

    for threads in [2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("lockfree", threads),
            &threads,
            |b, &threads| {
                b.iter(|| pump_lockfree(threads, threads));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("mutex", threads),
            &threads,
            |b, &threads| {
                b.iter(|| pump_mutex(threads, threads));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
