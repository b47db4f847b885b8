/*!
 * Slot Pool Benchmarks
 *
 * Acquire/arm/release cycles at steady state and under bursts
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slotfs::native::OpKind;
use slotfs::requests::SlotPool;

fn arm_and_acquire(pool: &mut SlotPool) -> u32 {
    let slot = pool.acquire();
    slot.arm(OpKind::Stat, None, Box::new(|_| {}));
    slot.identity()
}

fn bench_single_cycle(c: &mut Criterion) {
    let mut pool = SlotPool::with_capacity(1);

    c.bench_function("acquire_release_single", |b| {
        b.iter(|| {
            let id = arm_and_acquire(&mut pool);
            let detached = pool.release(black_box(id)).map(|slot| slot.detach());
            black_box(detached.is_ok());
        });
    });
}

fn bench_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("burst");

    for depth in [8usize, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut pool = SlotPool::with_capacity(depth);
            let mut ids = Vec::with_capacity(depth);

            b.iter(|| {
                ids.clear();
                for _ in 0..depth {
                    ids.push(arm_and_acquire(&mut pool));
                }
                // Releasing mid-prefix forces a swap on most completions
                while pool.active() > 0 {
                    let id = pool.active() as u32 / 2;
                    if let Ok(slot) = pool.release(id) {
                        black_box(slot.detach());
                    }
                }
                black_box(ids.len());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_cycle, bench_burst);
criterion_main!(benches);
