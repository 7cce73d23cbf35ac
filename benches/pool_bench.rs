use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use poolalloc::{PoolAllocator, PrimaryAllocator};

fn small_objects(c: &mut Criterion) {
    let pool = PoolAllocator::new();
    let primary = PrimaryAllocator::new();

    c.bench_function("pool alloc+free 32B", |b| {
        b.iter(|| unsafe {
            let block = pool.allocate(32).unwrap();
            pool.deallocate(block, 32);
        });
    });

    c.bench_function("primary alloc+free 32B", |b| {
        b.iter(|| unsafe {
            let block = primary.allocate(32).unwrap();
            primary.deallocate(block, 32);
        });
    });

    c.bench_function("pool 1000 mixed sizes", |b| {
        b.iter_batched(
            || Vec::with_capacity(1000),
            |mut blocks| {
                for i in 0..1000usize {
                    let size = 8 + (i % 16) * 8;
                    blocks.push((pool.allocate(size).unwrap(), size));
                }
                for (block, size) in blocks.drain(..) {
                    unsafe { pool.deallocate(block, size) };
                }
                blocks
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, small_objects);
criterion_main!(benches);
