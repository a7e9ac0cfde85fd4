use criterion::{criterion_group, BatchSize, Criterion};
use ella_sparse::{driver::Queue, Cache, Config};
use ella_utils::SystemClock;
use rand::Rng;
use std::hint::black_box;

#[cfg(not(full_bench))]
const N_INDICES: [usize; 2] = [1_000, 10_000];
#[cfg(full_bench)]
const N_INDICES: [usize; 3] = [1_000, 10_000, 100_000];

/// Upper bound of the index space sampled from.
const SPAN: u64 = 1_000_000;

fn bench_get_many(c: &mut Criterion) {
    for n in N_INDICES {
        c.bench_function(&format!("{}/n={}", module_path!(), n), |b| {
            b.iter_batched(
                || {
                    let mut rng = rand::thread_rng();
                    let indices: Vec<u64> = (0..n).map(|_| rng.gen_range(0..SPAN)).collect();
                    let mut cache: Cache<u64, _, _> =
                        Cache::new(Queue::default(), SystemClock, Config::default());
                    cache.provide_length(SPAN);
                    (cache, indices)
                },
                |(mut cache, indices)| {
                    black_box(cache.get_many(&indices).len());
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_get_many
}
