use std::time::Duration;

use criterion::*;
use thpool::ThreadPool;

const JOBS: usize = 1000;

fn fifo_single_worker(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_worker");
    group.sample_size(10);
    group.throughput(Throughput::Elements(JOBS as u64));

    group.bench_function("execute_then_wait", |b| {
        let pool = ThreadPool::new(1).unwrap();

        b.iter(|| {
            for i in 0..JOBS {
                pool.execute(move || {
                    black_box(i);
                })
                .unwrap();
            }

            pool.wait();
        });
    });

    group.finish();
}

fn many_submitters(c: &mut Criterion) {
    let threads = num_cpus::get().max(1);

    let mut group = c.benchmark_group("submitters");
    group.sample_size(10);
    group.throughput(Throughput::Elements(JOBS as u64));

    for submitters in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(submitters),
            &submitters,
            |b, &submitters| {
                let pool = ThreadPool::new(threads).unwrap();

                b.iter(|| {
                    std::thread::scope(|scope| {
                        for _ in 0..submitters {
                            let submitter = pool.submitter();

                            scope.spawn(move || {
                                for i in 0..JOBS / submitters {
                                    submitter
                                        .execute(move || {
                                            black_box(i);
                                        })
                                        .unwrap();
                                }
                            });
                        }
                    });

                    pool.wait();
                });
            },
        );
    }

    group.finish();
}

fn wait_poll_interval(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_poll_interval");
    group.sample_size(10);

    let intervals = [
        Duration::ZERO,
        Duration::from_micros(100),
        Duration::from_millis(1),
        Duration::from_millis(5),
    ];

    for interval in intervals {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", interval)),
            &interval,
            |b, &interval| {
                let pool = ThreadPool::builder()
                    .size(2)
                    .poll_interval(interval)
                    .build()
                    .unwrap();

                // A short job, so the time is dominated by how quickly wait
                // notices the pool has drained.
                b.iter(|| {
                    pool.execute(|| std::thread::sleep(Duration::from_micros(50)))
                        .unwrap();
                    pool.wait();
                });
            },
        );
    }

    group.finish();
}

fn versus_other_pools(c: &mut Criterion) {
    let threads = num_cpus::get().max(1);

    let mut group = c.benchmark_group("create_run_destroy");
    group.sample_size(10);

    group.bench_function("thpool", |b| {
        b.iter_batched(
            || ThreadPool::new(threads).unwrap(),
            |pool| {
                for i in 0..JOBS {
                    pool.execute(move || {
                        black_box(i);
                    })
                    .unwrap();
                }

                pool.wait();
                pool.destroy();
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("threadpool", |b| {
        b.iter_batched(
            || threadpool::ThreadPool::new(threads),
            |pool| {
                for i in 0..JOBS {
                    pool.execute(move || {
                        black_box(i);
                    });
                }

                pool.join();
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("rusty_pool", |b| {
        b.iter_batched(
            || rusty_pool::ThreadPool::new(threads, threads, Duration::ZERO),
            |pool| {
                for i in 0..JOBS {
                    pool.execute(move || {
                        black_box(i);
                    });
                }

                pool.shutdown_join();
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    fifo_single_worker,
    many_submitters,
    wait_poll_interval,
    versus_other_pools
);
criterion_main!(benches);
