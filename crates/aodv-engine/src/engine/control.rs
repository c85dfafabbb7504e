//! Route replies, keep-alives, and reply acknowledgments.

use tracing::{debug, trace, warn};

use aodv_core::types::{Address, InterfaceId};
use aodv_core::wire::{ControlMessage, ReplyKind, RouteReply, RouteRequest};

use crate::table::RouteCandidate;
use crate::timers::TimerKey;
use crate::traits::{DeliveryFailure, PacketSink, Transport};

use super::RoutingEngine;

impl RoutingEngine {
    /// Answer a request naming this node as the destination.
    pub(super) fn reply_as_destination<T: Transport>(
        &mut self,
        req: &RouteRequest,
        previous_hop: Address,
        interface: InterfaceId,
        transport: &mut T,
        now: u64,
    ) {
        // The requester may be probing for our next sequence number; step
        // up to it so the answer is at least as fresh as the question.
        if !req.unknown_seq && req.dest_seq == self.seq.next() {
            self.seq.increment();
        }

        let lifetime = self.config.my_route_timeout();
        let reply = RouteReply {
            ack_required: false,
            prefix_size: 0,
            hop_count: 0,
            destination: self.address,
            dest_seq: self.seq,
            originator: req.originator,
            lifetime_ms: lifetime as u32,
        };
        debug!(to = %req.originator, via = %previous_hop, "answering discovery as destination");
        let ttl = self.config.net_diameter;
        self.send_reply(transport, interface, previous_hop, reply, ttl, now);
    }

    /// Answer a request from a cached route, and optionally tell the
    /// destination about the originator so the path works both ways.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn reply_from_cache<T: Transport>(
        &mut self,
        req: &RouteRequest,
        hops: u8,
        seq: aodv_core::types::SeqNum,
        expires: u64,
        previous_hop: Address,
        interface: InterfaceId,
        transport: &mut T,
        now: u64,
    ) {
        // Each side of the answered path becomes a precursor of the other.
        let forward_next = self.table.lookup(&req.destination).and_then(|e| e.next_hop);
        if let Some(next) = forward_next {
            self.table.add_precursor(&req.destination, previous_hop);
            self.table.add_precursor(&req.originator, next);
        }

        let reply = RouteReply {
            ack_required: false,
            prefix_size: 0,
            hop_count: hops,
            destination: req.destination,
            dest_seq: seq,
            originator: req.originator,
            lifetime_ms: expires.saturating_sub(now) as u32,
        };
        debug!(dest = %req.destination, to = %req.originator, "answering discovery from cache");
        let ttl = self.config.net_diameter;
        self.send_reply(transport, interface, previous_hop, reply, ttl, now);

        if req.gratuitous {
            self.send_gratuitous_reply(req, transport, now);
        }
    }

    /// Unsolicited reply toward the destination, carrying the route back to
    /// the originator. Without it the destination would have to run its own
    /// discovery before it could answer.
    fn send_gratuitous_reply<T: Transport>(
        &mut self,
        req: &RouteRequest,
        transport: &mut T,
        now: u64,
    ) {
        let route = self
            .table
            .lookup_valid(&req.destination, now)
            .and_then(|e| Some((e.next_hop?, e.interface?)));
        let Some((next_hop, iface)) = route else {
            return;
        };
        let reverse_lifetime = self
            .table
            .lookup(&req.originator)
            .map(|e| e.expires.saturating_sub(now))
            .unwrap_or(self.config.active_route_timeout);

        let gratuitous = RouteReply {
            ack_required: false,
            prefix_size: 0,
            hop_count: req.hop_count,
            destination: req.originator,
            dest_seq: req.orig_seq,
            originator: req.destination,
            lifetime_ms: reverse_lifetime as u32,
        };
        trace!(dest = %req.destination, about = %req.originator, "sending gratuitous reply");
        let ttl = self.config.net_diameter;
        self.send_reply(transport, iface, next_hop, gratuitous, ttl, now);
    }

    /// Handle a received reply: a keep-alive from a neighbor, an answer to
    /// our own discovery, or a reply in transit along the reverse path.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn handle_reply<T: Transport, S: PacketSink>(
        &mut self,
        mut rep: RouteReply,
        ttl: u8,
        previous_hop: Address,
        interface: InterfaceId,
        transport: &mut T,
        sink: &mut S,
        now: u64,
    ) {
        if rep.kind() == ReplyKind::SelfAnnouncement {
            let candidate = RouteCandidate {
                next_hop: previous_hop,
                interface,
                hop_count: 1,
                seq: rep.dest_seq,
                seq_known: true,
                expires: now + rep.lifetime_ms as u64,
            };
            self.table.apply_candidate(rep.destination, &candidate, now);
            return;
        }

        if rep.ack_required {
            self.unicast_control(transport, interface, previous_hop, 1, ControlMessage::ReplyAck);
        }

        rep.hop_count = rep.hop_count.saturating_add(1);
        let candidate = RouteCandidate {
            next_hop: previous_hop,
            interface,
            hop_count: rep.hop_count,
            seq: rep.dest_seq,
            seq_known: true,
            expires: now + rep.lifetime_ms as u64,
        };
        let adopted = self.table.apply_candidate(rep.destination, &candidate, now);

        if rep.originator == self.address {
            // A stale reply must not disarm the search; the retry timer
            // stays until the route actually becomes usable.
            if self.table.lookup_valid(&rep.destination, now).is_none() {
                debug!(dest = %rep.destination, "reply rejected, discovery continues");
                return;
            }
            if adopted {
                debug!(dest = %rep.destination, hops = rep.hop_count, "discovery complete");
            }
            self.deferred_requests.remove(&rep.destination);
            self.timers.cancel(&TimerKey::DiscoveryRetry(rep.destination));
            self.flush_queue_for(rep.destination, sink, now);
            return;
        }

        if ttl <= 1 {
            trace!(dest = %rep.destination, "reply hop limit exhausted, dropping");
            return;
        }

        // In transit: pass it along the reverse path.
        let reverse = self
            .table
            .lookup_valid(&rep.originator, now)
            .and_then(|e| Some((e.next_hop?, e.interface?)));
        let Some((reverse_next, reverse_iface)) = reverse else {
            debug!(orig = %rep.originator, "reverse path gone, dropping reply");
            return;
        };

        self.table.add_precursor(&rep.destination, reverse_next);
        self.table.add_precursor(&rep.originator, previous_hop);
        self.table
            .refresh(&rep.originator, now + self.config.active_route_timeout, now);

        rep.ack_required = false;
        self.send_reply(transport, reverse_iface, reverse_next, rep, ttl - 1, now);
    }

    /// Send the queued packets a completed discovery was holding back.
    fn flush_queue_for<S: PacketSink>(&mut self, dest: Address, sink: &mut S, now: u64) {
        for stale in self.queue.expire(now) {
            sink.fail(
                &stale.header,
                &stale.payload,
                DeliveryFailure::QueueTimeout,
            );
        }
        let route = self
            .table
            .lookup_valid(&dest, now)
            .and_then(|e| Some((e.next_hop?, e.interface?)));
        let Some((next_hop, iface)) = route else {
            return;
        };
        let packets = self.queue.take_for(&dest);
        if !packets.is_empty() {
            debug!(dest = %dest, count = packets.len(), "flushing deferred packets");
        }
        for packet in packets {
            sink.forward(iface, next_hop, &packet.header, &packet.payload);
        }
        self.refresh_active_path(&dest, next_hop, now);
    }

    /// Unicast a reply, demanding an acknowledgment when the next hop is
    /// under unidirectional-link suspicion.
    fn send_reply<T: Transport>(
        &mut self,
        transport: &mut T,
        interface: InterfaceId,
        next_hop: Address,
        mut rep: RouteReply,
        ttl: u8,
        now: u64,
    ) {
        if self.neighbors.is_suspect(&next_hop, now) {
            rep.ack_required = true;
            self.timers.schedule(
                TimerKey::AckWait(next_hop),
                now + self.config.next_hop_wait(),
            );
        }
        self.unicast_control(transport, interface, next_hop, ttl, ControlMessage::Reply(rep));
    }

    pub(super) fn handle_reply_ack(&mut self, previous_hop: Address) {
        self.timers.cancel(&TimerKey::AckWait(previous_hop));
        self.neighbors.clear_suspect(&previous_hop);
    }

    /// No acknowledgment arrived in time: the link only works one way.
    pub(super) fn on_ack_timeout(&mut self, next_hop: Address, now: u64) {
        warn!(neighbor = %next_hop, "reply unacknowledged, blacklisting");
        self.neighbors
            .blacklist(next_hop, now + self.config.blacklist_timeout());
    }

    /// Periodic keep-alive, emitted only while this node participates in
    /// at least one active route.
    pub(super) fn on_hello_timer<T: Transport>(&mut self, transport: &mut T, now: u64) {
        self.timers
            .schedule(TimerKey::HelloEmit, now + self.config.hello_interval);
        if !self.table.any_valid(now) {
            return;
        }
        let hello = RouteReply {
            ack_required: false,
            prefix_size: 0,
            hop_count: 0,
            destination: self.address,
            dest_seq: self.seq,
            originator: self.address,
            lifetime_ms: (self.config.allowed_hello_loss as u64 * self.config.hello_interval)
                as u32,
        };
        self.broadcast_control(transport, 1, ControlMessage::Reply(hello));
    }
}
