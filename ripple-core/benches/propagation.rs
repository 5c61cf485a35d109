//! Propagation benchmarks for ripple-core
//!
//! Measures fan-out, memo chains and property tracking.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ripple_core::reactive::{observe, Effect, Memo, Object, Signal};

/// One signal read by `width` effects.
fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for width in [10usize, 100, 1000] {
        let source = Signal::new(0u64);
        let effects: Vec<Effect> = (0..width)
            .map(|_| {
                let source = source.clone();
                Effect::new(move || {
                    black_box(source.get());
                })
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                source.set(next);
            })
        });
        drop(effects);
    }
    group.finish();
}

/// An effect at the end of a chain of `depth` memos.
fn bench_memo_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("memo_chain");
    for depth in [10usize, 100] {
        let source = Signal::new(0u64);
        let mut memos: Vec<Memo<u64>> = Vec::with_capacity(depth);
        for i in 0..depth {
            let memo = match memos.last() {
                Some(prev) => {
                    let prev = prev.clone();
                    Memo::new(move || prev.get() + 1)
                }
                None => {
                    let source = source.clone();
                    Memo::new(move || source.get() + i as u64)
                }
            };
            memos.push(memo);
        }
        let effect = {
            let last = memos[depth - 1].clone();
            Effect::new(move || {
                black_box(last.get());
            })
        };

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                source.set(next);
            })
        });
        drop(effect);
    }
    group.finish();
}

/// Re-running an effect that reads many properties, with unchanged reads.
fn bench_property_tracking(c: &mut Criterion) {
    let state = observe(&Object::from_pairs(
        (0..100).map(|i| (format!("field{i}"), i)),
    ));
    let effect = {
        let state = state.clone();
        Effect::new(move || {
            for key in state.keys() {
                black_box(state.get(key));
            }
        })
    };

    c.bench_function("property_tracking_rerun", |b| b.iter(|| effect.run()));
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_memo_chain,
    bench_property_tracking
);
criterion_main!(benches);
