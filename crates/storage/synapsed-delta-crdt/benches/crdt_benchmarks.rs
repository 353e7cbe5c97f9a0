//! Benchmarks for delta-state CRDT implementations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use synapsed_delta_crdt::*;

// OR-Set Benchmarks
fn bench_or_set_take_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("or_set_take_delta");

    for size in [100u64, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("adds", size), size, |b, &size| {
            b.iter(|| {
                let mut set = OrSet::new();
                for i in 0..size {
                    set.add(i);
                }
                black_box(set.take_delta(false))
            });
        });
    }

    group.finish();
}

fn bench_or_set_apply_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("or_set_apply_delta");

    for size in [100u64, 1000, 10000].iter() {
        let mut origin = OrSet::new();
        origin.add_all(0..*size);
        let delta = origin.take_delta(false);

        group.bench_with_input(BenchmarkId::new("adds", size), &delta, |b, delta| {
            b.iter(|| {
                let mut replica = OrSet::new();
                if let Some(delta) = delta.clone() {
                    replica.apply_delta(delta).unwrap();
                }
                black_box(replica.len())
            });
        });
    }

    group.finish();
}

// PN-Counter Benchmarks
fn bench_pn_counter(c: &mut Criterion) {
    c.bench_function("pn_counter_increment_take", |b| {
        let mut counter = PnCounter::new();
        b.iter(|| {
            for i in 0..100 {
                counter.increment(black_box(i));
            }
            black_box(counter.take_delta(false))
        });
    });
}

// Counter Map Benchmarks
fn bench_counter_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_map");

    for keys in [10u64, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("increment_take", keys), keys, |b, &keys| {
            let mut map = CounterMap::new();
            b.iter(|| {
                for key in 0..keys {
                    map.increment(key, 1);
                }
                black_box(map.take_delta(false))
            });
        });
    }

    group.finish();
}

// Heterogeneous tree Benchmarks
fn bench_replicated_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("replicated_tree");

    for entries in [10i64, 100].iter() {
        let mut tree = OrMap::new();
        for i in 0..*entries {
            tree.set(Value::from(i), ReplicatedData::from(PnCounter::new()));
        }
        let mut local = ReplicatedState::with_data(ReplicaConfig::default(), tree);
        let snapshot = local.take_outgoing_delta();

        group.bench_with_input(BenchmarkId::new("json_round_trip", entries), &snapshot, |b, snapshot| {
            b.iter(|| {
                if let Some(outgoing) = snapshot {
                    let json = outgoing.to_json().unwrap();
                    black_box(OutgoingDelta::from_json(&json).unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("apply_snapshot", entries), &snapshot, |b, snapshot| {
            b.iter(|| {
                let mut remote = ReplicatedState::new(ReplicaConfig::default());
                if let Some(outgoing) = snapshot {
                    remote.apply_incoming_delta(outgoing.delta.clone()).unwrap();
                }
                black_box(remote.kind())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_or_set_take_delta,
    bench_or_set_apply_delta,
    bench_pn_counter,
    bench_counter_map,
    bench_replicated_tree
);
criterion_main!(benches);
