use criterion::{criterion_group, criterion_main, Criterion};

use aodv_core::types::{Address, RequestId, SeqNum};
use aodv_core::wire::{ControlMessage, Datagram, RouteError, RouteReply, RouteRequest};

fn make_request() -> ControlMessage {
    ControlMessage::Request(RouteRequest {
        gratuitous: true,
        dest_only: false,
        unknown_seq: false,
        hop_count: 4,
        request_id: RequestId(1234),
        destination: Address::new([10, 0, 0, 9]),
        dest_seq: SeqNum(17),
        originator: Address::new([10, 0, 0, 1]),
        orig_seq: SeqNum(42),
    })
}

fn make_reply() -> ControlMessage {
    ControlMessage::Reply(RouteReply {
        ack_required: false,
        prefix_size: 0,
        hop_count: 2,
        destination: Address::new([10, 0, 0, 9]),
        dest_seq: SeqNum(17),
        originator: Address::new([10, 0, 0, 1]),
        lifetime_ms: 3000,
    })
}

fn make_error(dests: usize) -> ControlMessage {
    let destinations = (0..dests)
        .map(|i| (Address::from_bits(0x0A00_0000 + i as u32), SeqNum(i as u32)))
        .collect();
    ControlMessage::Error(RouteError::new(destinations).unwrap())
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for (label, msg) in [
        ("request", make_request()),
        ("reply", make_reply()),
        ("error_4", make_error(4)),
        ("error_64", make_error(64)),
    ] {
        let raw = Datagram::new(35, msg.clone()).serialize();

        group.bench_function(format!("serialize_{label}"), |b| {
            b.iter(|| Datagram::new(35, msg.clone()).serialize());
        });
        group.bench_function(format!("parse_{label}"), |b| {
            b.iter(|| Datagram::parse(&raw).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
