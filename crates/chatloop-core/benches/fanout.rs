//! Registry fan-out benchmarks.

use chatloop_core::{ConnectionRegistry, Handle};
use chatloop_protocol::{ServerEvent, UserId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

/// Bind `identities` users with `sessions` handles each. Receivers are kept
/// alive and drained by the caller.
fn populate(
    identities: usize,
    sessions: usize,
) -> (
    ConnectionRegistry,
    Vec<tokio::sync::mpsc::Receiver<Arc<ServerEvent>>>,
) {
    let registry = ConnectionRegistry::new();
    let mut receivers = Vec::with_capacity(identities * sessions);
    for i in 0..identities {
        let identity = UserId::new(format!("user-{i}"));
        for _ in 0..sessions {
            let (handle, rx) = Handle::new(1024);
            registry.bind(&identity, handle);
            receivers.push(rx);
        }
    }
    (registry, receivers)
}

fn drain(receivers: &mut [tokio::sync::mpsc::Receiver<Arc<ServerEvent>>]) {
    for rx in receivers {
        while rx.try_recv().is_ok() {}
    }
}

fn bench_push_to(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_to");

    for sessions in [1usize, 4, 16] {
        let (registry, mut receivers) = populate(1, sessions);
        let target = UserId::new("user-0");
        let event = Arc::new(ServerEvent::typing(UserId::new("peer")));

        group.throughput(Throughput::Elements(sessions as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sessions), &sessions, |b, _| {
            b.iter(|| {
                let report = registry.push_to(black_box(&target), Arc::clone(&event));
                drain(&mut receivers);
                report
            })
        });
    }

    group.finish();
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast");

    for identities in [10usize, 100, 1000] {
        let (registry, mut receivers) = populate(identities, 1);
        let roster: Vec<UserId> = registry.list_online().into_iter().collect();
        let event = Arc::new(ServerEvent::OnlineUsers(roster));

        group.throughput(Throughput::Elements(identities as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(identities),
            &identities,
            |b, _| {
                b.iter(|| {
                    let report = registry.broadcast(Arc::clone(&event));
                    drain(&mut receivers);
                    report
                })
            },
        );
    }

    group.finish();
}

fn bench_bind_unbind(c: &mut Criterion) {
    c.bench_function("bind_unbind", |b| {
        let registry = ConnectionRegistry::new();
        let identity = UserId::new("user");
        b.iter(|| {
            let (handle, _rx) = Handle::new(1);
            let id = handle.id().clone();
            registry.bind(black_box(&identity), handle);
            registry.unbind(black_box(&id))
        })
    });
}

criterion_group!(benches, bench_push_to, bench_broadcast, bench_bind_unbind);
criterion_main!(benches);
