use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng, rngs::StdRng};
use segalloc::{Allocator, ArenaConfig};

fn allocator() -> Allocator {
  let config = ArenaConfig {
    reserve_bytes: 1 << 30,
    ..ArenaConfig::default()
  };
  Allocator::with_config(config).unwrap()
}

fn alloc_free(c: &mut Criterion) {
  let mut a = allocator();

  c.bench_function("allocate+deallocate 64", |b| {
    b.iter(|| {
      let ptr = a.allocate(black_box(64)).unwrap();
      unsafe { a.deallocate(ptr).unwrap() };
    });
  });
}

fn churn(c: &mut Criterion) {
  c.bench_function("random churn 1k", |b| {
    b.iter_batched(
      || (allocator(), StdRng::seed_from_u64(7)),
      |(mut a, mut rng)| {
        let mut live = Vec::with_capacity(256);

        for _ in 0..1000 {
          if live.is_empty() || rng.gen_bool(0.6) {
            live.push(a.allocate(rng.gen_range(8..2048)).unwrap());
          } else {
            let ptr = live.swap_remove(rng.gen_range(0..live.len()));
            unsafe { a.deallocate(ptr).unwrap() };
          }
        }

        black_box(a.stats())
      },
      BatchSize::SmallInput,
    );
  });
}

fn realloc_growth(c: &mut Criterion) {
  c.bench_function("reallocate doubling", |b| {
    b.iter_batched(
      allocator,
      |mut a| {
        let mut ptr = a.allocate(8).unwrap();
        let mut size = 8;

        while size < 1 << 20 {
          size *= 2;
          ptr = unsafe { a.reallocate(ptr, size).unwrap() };
        }

        black_box(ptr)
      },
      BatchSize::SmallInput,
    );
  });
}

criterion_group!(benches, alloc_free, churn, realloc_growth);
criterion_main!(benches);
