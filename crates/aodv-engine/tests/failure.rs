//! Link failures, error propagation, and unidirectional-link handling.

mod common;

use aodv_core::types::{Address, RequestId, SeqNum};
use aodv_core::wire::{ControlMessage, Datagram, RouteReply, RouteRequest};
use aodv_engine::config::Config;
use aodv_engine::engine::RoutingEngine;
use aodv_engine::table::RouteState;
use aodv_engine::traits::{DeliveryFailure, PacketHeader};

use common::{addr, Events, Network, Outgoing, IFACE};

#[test]
fn broken_link_invalidates_routes_at_the_precursor() {
    let (a, b, c) = (addr(1), addr(2), addr(3));
    let mut net = Network::new(&[a, b, c]);
    net.link(a, b);
    net.link(b, c);

    net.send(a, c, b"prime");
    net.advance(300);
    assert_eq!(net.delivered_at(c), 1);

    // B's link layer notices C is gone and errors toward its precursor A.
    net.unlink(b, c);
    net.break_link_at(b, c);

    assert_eq!(net.node(b).route(&c).unwrap().state, RouteState::Invalid);
    assert_eq!(net.node(a).route(&c).unwrap().state, RouteState::Invalid);
}

#[test]
fn rediscovery_after_a_break_starts_from_the_last_known_distance() {
    let (a, b, c) = (addr(1), addr(2), addr(3));
    let mut net = Network::new(&[a, b, c]);
    net.link(a, b);
    net.link(b, c);

    net.send(a, c, b"prime");
    net.advance(300);
    net.unlink(b, c);
    net.break_link_at(b, c);

    net.send(a, c, b"again");
    let entry = net.node(a).route(&c).unwrap();
    assert_eq!(entry.state, RouteState::InSearch);
    // Last known hop count 2, widened by one increment.
    assert_eq!(entry.ttl, 4);

    // With C gone for good the search runs out of retries.
    net.advance(25_000);
    let failures = net.failures_at(a);
    assert!(failures
        .iter()
        .any(|(_, reason)| *reason == DeliveryFailure::Unreachable));
}

fn request_from(originator: Address, destination: Address, id: u32, seq: u32) -> Vec<u8> {
    let req = RouteRequest {
        gratuitous: false,
        dest_only: false,
        unknown_seq: true,
        hop_count: 0,
        request_id: RequestId(id),
        destination,
        dest_seq: SeqNum(0),
        originator,
        orig_seq: SeqNum(seq),
    };
    Datagram::new(1, ControlMessage::Request(req)).serialize()
}

fn reply_from(destination: Address, seq: u32, hops: u8, originator: Address, ttl: u8) -> Vec<u8> {
    let rep = RouteReply {
        ack_required: false,
        prefix_size: 0,
        hop_count: hops,
        destination,
        dest_seq: SeqNum(seq),
        originator,
        lifetime_ms: 3000,
    };
    Datagram::new(ttl, ControlMessage::Reply(rep)).serialize()
}

fn single_node() -> RoutingEngine {
    let mut engine = RoutingEngine::new(addr(1), Config::default(), 0);
    engine.add_interface(IFACE);
    engine
}

fn reply_in(frames: &Outgoing) -> Option<(Address, aodv_core::wire::RouteReply)> {
    frames.frames.iter().find_map(|(to, raw)| {
        match Datagram::parse(raw).ok()?.message {
            ControlMessage::Reply(rep) => Some(((*to)?, rep)),
            _ => None,
        }
    })
}

#[test]
fn reply_demands_ack_only_while_the_link_is_suspect() {
    let mut engine = single_node();
    let n = addr(2);

    // A clean link gets a plain reply.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&request_from(n, addr(1), 1, 5), n, IFACE, &mut t, &mut s, 0)
        .unwrap();
    let (to, rep) = reply_in(&t).unwrap();
    assert_eq!(to, n);
    assert!(!rep.ack_required);

    // After a link failure the neighbor is suspect.
    let mut t = Outgoing::default();
    engine.on_link_broken(n, &mut t, 10);

    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&request_from(n, addr(1), 2, 6), n, IFACE, &mut t, &mut s, 20)
        .unwrap();
    let (_, rep) = reply_in(&t).unwrap();
    assert!(rep.ack_required);
}

#[test]
fn unacknowledged_reply_blacklists_the_neighbor() {
    let mut engine = single_node();
    let n = addr(2);

    let mut t = Outgoing::default();
    engine.on_link_broken(n, &mut t, 0);

    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&request_from(n, addr(1), 1, 5), n, IFACE, &mut t, &mut s, 10)
        .unwrap();
    assert!(reply_in(&t).unwrap().1.ack_required);

    // The ack never arrives; the wait timer fires.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine.poll(&mut t, &mut s, 200);

    // Requests from the blacklisted neighbor are ignored outright.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&request_from(n, addr(1), 2, 6), n, IFACE, &mut t, &mut s, 210)
        .unwrap();
    assert!(reply_in(&t).is_none());
}

#[test]
fn acknowledgment_clears_the_suspicion() {
    let mut engine = single_node();
    let n = addr(2);

    let mut t = Outgoing::default();
    engine.on_link_broken(n, &mut t, 0);

    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&request_from(n, addr(1), 1, 5), n, IFACE, &mut t, &mut s, 10)
        .unwrap();
    assert!(reply_in(&t).unwrap().1.ack_required);

    // The neighbor acknowledges in time.
    let raw = Datagram::new(1, ControlMessage::ReplyAck).serialize();
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&raw, n, IFACE, &mut t, &mut s, 20)
        .unwrap();

    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine.poll(&mut t, &mut s, 200);

    // Not blacklisted, and no longer suspect.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&request_from(n, addr(1), 2, 6), n, IFACE, &mut t, &mut s, 210)
        .unwrap();
    let (_, rep) = reply_in(&t).unwrap();
    assert!(!rep.ack_required);
}

#[test]
fn transit_packet_without_a_route_errors_back_upstream() {
    let mut engine = single_node();
    let upstream = addr(2);
    let lost_dest = addr(9);

    let header = PacketHeader {
        source: upstream,
        destination: lost_dest,
        id: 0,
        ttl: 5,
    };
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine.route_input(header, b"data", upstream, IFACE, &mut t, &mut s, 0);

    assert_eq!(s.failures.len(), 1);
    assert_eq!(s.failures[0].1, DeliveryFailure::NoRoute);

    let error = t
        .frames
        .iter()
        .find_map(|(to, raw)| match Datagram::parse(raw).ok()?.message {
            ControlMessage::Error(err) => Some((*to, err)),
            _ => None,
        })
        .unwrap();
    assert_eq!(error.0, Some(upstream));
    assert_eq!(error.1.destinations, vec![(lost_dest, SeqNum(0))]);
}

#[test]
fn stale_reply_does_not_stall_the_discovery() {
    let mut engine = single_node();
    let n = addr(2);
    let d = addr(9);

    // Learn a fresh route to D, then lose the link; the invalidated entry
    // keeps an incremented sequence number.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&reply_from(d, 11, 0, addr(1), 5), n, IFACE, &mut t, &mut s, 0)
        .unwrap();
    let mut t = Outgoing::default();
    engine.on_link_broken(n, &mut t, 10);
    assert_eq!(engine.route(&d).unwrap().state, RouteState::Invalid);

    // New traffic restarts the search.
    let header = PacketHeader {
        source: addr(1),
        destination: d,
        id: 0,
        ttl: 35,
    };
    let mut s = Events::default();
    engine.route_output(header, b"data", &mut s, 20);
    assert_eq!(engine.route(&d).unwrap().state, RouteState::InSearch);

    // A reply carrying an outdated sequence number is rejected by the
    // replace policy; the retry timer must survive it.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&reply_from(d, 5, 1, addr(1), 5), n, IFACE, &mut t, &mut s, 30)
        .unwrap();
    assert_eq!(engine.route(&d).unwrap().state, RouteState::InSearch);

    // The search keeps running: more requests leave on the retry schedule.
    let mut requests = 0;
    for now in 30..2_000u64 {
        let mut t = Outgoing::default();
        let mut s = Events::default();
        engine.poll(&mut t, &mut s, now);
        requests += t
            .frames
            .iter()
            .filter(|(to, raw)| {
                to.is_none()
                    && matches!(
                        Datagram::parse(raw).map(|d| d.message),
                        Ok(ControlMessage::Request(_))
                    )
            })
            .count();
    }
    assert!(requests >= 2, "only {requests} requests after the stale reply");
}

#[test]
fn transit_reply_scope_decrements_and_exhausts() {
    let mut engine = single_node();
    let orig = addr(2);
    let dest = addr(3);

    // The originator's request flood leaves a reverse route behind.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&request_from(orig, addr(7), 1, 5), orig, IFACE, &mut t, &mut s, 0)
        .unwrap();

    // A reply whose hop limit is exhausted dies here.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&reply_from(dest, 9, 0, orig, 1), dest, IFACE, &mut t, &mut s, 10)
        .unwrap();
    assert!(reply_in(&t).is_none());

    // With scope remaining it moves one hop, decremented.
    let mut t = Outgoing::default();
    let mut s = Events::default();
    engine
        .handle_control(&reply_from(dest, 10, 0, orig, 3), dest, IFACE, &mut t, &mut s, 20)
        .unwrap();
    let (to, raw) = t
        .frames
        .iter()
        .find(|(to, _)| to.is_some())
        .cloned()
        .unwrap();
    assert_eq!(to, Some(orig));
    assert_eq!(Datagram::parse(&raw).unwrap().ttl, 2);
}
