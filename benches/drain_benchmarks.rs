use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::convert::Infallible;
use std::time::Duration;
use tasker_batch::config::BatchJobConfig;
use tasker_batch::execution::PendingResult;
use tasker_batch::pagination::{BatchSource, Cursor, Paginator};
use tasker_batch::processor::BatchJobProcessor;
use tasker_batch::tracking::CompletionTracker;

struct Counter {
    total: u64,
}

impl BatchSource for Counter {
    type Item = u64;
    type Error = Infallible;

    fn load_next_batch(
        &mut self,
        after: &Cursor,
        batch_size: usize,
    ) -> Result<Vec<u64>, Infallible> {
        let start: u64 = after.as_str().parse().unwrap_or(0);
        Ok((start + 1..=self.total).take(batch_size).collect())
    }

    fn cursor_of(&self, item: &u64) -> Cursor {
        Cursor::new(item.to_string())
    }
}

fn bench_config() -> BatchJobConfig {
    BatchJobConfig {
        job_name: "bench_job".to_string(),
        batch_size: 500,
        drain_poll_interval_ms: 1,
        ..BatchJobConfig::default()
    }
}

fn benchmark_submit_and_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_and_drain");

    for total in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(total));
        group.bench_with_input(BenchmarkId::from_parameter(total), &total, |b, &total| {
            b.iter(|| {
                let config = bench_config();
                let mut processor = BatchJobProcessor::builder(
                    Paginator::from_config(Counter { total }, &config),
                    |n: &u64| Ok(PendingResult::succeeded(*n)),
                )
                .config(config)
                .build()
                .unwrap();
                black_box(processor.run().unwrap())
            })
        });
    }

    group.finish();
}

fn benchmark_tracker_settlement(c: &mut Criterion) {
    c.bench_function("tracker_settle_1000_cross_thread", |b| {
        b.iter(|| {
            let tracker = CompletionTracker::from_config(&bench_config()).unwrap();
            let completers: Vec<_> = (0..1_000u64)
                .map(|_| {
                    let (pending, completer) = PendingResult::<u64>::channel();
                    tracker.record_submission();
                    tracker.observe(&pending);
                    completer
                })
                .collect();

            let settler = std::thread::spawn(move || {
                for (n, completer) in completers.into_iter().enumerate() {
                    completer.succeed(n as u64);
                }
            });

            let outcome = tracker.await_drain_or_timeout(Duration::from_secs(30));
            settler.join().unwrap();
            black_box(outcome)
        })
    });
}

criterion_group!(benches, benchmark_submit_and_drain, benchmark_tracker_settlement);
criterion_main!(benches);
