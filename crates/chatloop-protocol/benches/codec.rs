//! Codec benchmarks for chatloop-protocol.

use chatloop_protocol::{codec, ChatMessage, MessageId, ServerEvent, UserId};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn message_event(text_len: usize) -> ServerEvent {
    ServerEvent::NewMessage(ChatMessage {
        id: MessageId(1),
        sender_id: UserId::new("alice"),
        receiver_id: UserId::new("bob"),
        text: Some("x".repeat(text_len)),
        image: None,
        seen: false,
        created_at: 1_700_000_000_000,
    })
}

fn bench_json(c: &mut Criterion) {
    let event = message_event(64);

    let mut group = c.benchmark_group("json");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("encode_64B", |b| {
        b.iter(|| codec::encode_json(black_box(&event)))
    });

    let text = codec::encode_json(&event).unwrap();
    group.bench_function("decode_64B", |b| {
        b.iter(|| codec::decode_json::<ServerEvent>(black_box(&text)))
    });
    group.finish();
}

fn bench_binary(c: &mut Criterion) {
    let event = message_event(64);

    let mut group = c.benchmark_group("msgpack");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("encode_64B", |b| {
        b.iter(|| codec::encode_binary(black_box(&event)))
    });

    let encoded = codec::encode_binary(&event).unwrap();
    group.bench_function("decode_64B", |b| {
        b.iter(|| codec::decode_binary::<ServerEvent>(black_box(&encoded)))
    });
    group.finish();
}

fn bench_roster(c: &mut Criterion) {
    let roster = ServerEvent::OnlineUsers(
        (0..256).map(|i| UserId::new(format!("user-{i}"))).collect(),
    );

    c.bench_function("roster_256_json", |b| {
        b.iter(|| codec::encode_json(black_box(&roster)).unwrap())
    });
}

criterion_group!(benches, bench_json, bench_binary, bench_roster);
criterion_main!(benches);
