//! The routing engine: a sans-IO state machine driven by packet arrivals
//! and a monotonic millisecond clock.
//!
//! All operations take `now` explicitly and borrow the host's [`Transport`]
//! and [`PacketSink`] for the duration of the call. Nothing here blocks,
//! sleeps, or touches a socket; the host owns the event loop and calls
//! [`RoutingEngine::poll`] whenever [`RoutingEngine::next_wakeup`] elapses.

mod control;
mod discovery;
mod error_prop;

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use aodv_core::types::{Address, InterfaceId, RequestId, SeqNum};
use aodv_core::wire::{ControlMessage, Datagram};
use aodv_core::WireError;

use crate::config::Config;
use crate::dedup::{SeenBroadcasts, SeenRequests};
use crate::limits::MessageBudget;
use crate::neighbors::NeighborTable;
use crate::queue::{DropReason, PacketQueue};
use crate::table::{RouteCandidate, RoutingTable};
use crate::timers::{TimerKey, TimerQueue};
use crate::traits::{DeliveryFailure, PacketHeader, PacketSink, Transport};

/// Interval between housekeeping sweeps, in milliseconds.
const SWEEP_INTERVAL: u64 = 500;
/// Budget refill interval, in milliseconds.
const BUDGET_WINDOW: u64 = 1_000;
/// Upper bound on flood re-broadcast jitter, in milliseconds.
const REBROADCAST_JITTER: u64 = 10;

/// A serialized frame awaiting its jittered send instant.
struct PendingBroadcast {
    due: u64,
    interface: InterfaceId,
    payload: Vec<u8>,
}

/// Reactive multi-hop routing for a single node.
#[must_use]
pub struct RoutingEngine {
    address: Address,
    config: Config,
    seq: SeqNum,
    request_id: RequestId,
    pub(crate) table: RoutingTable,
    pub(crate) neighbors: NeighborTable,
    queue: PacketQueue,
    seen_requests: SeenRequests,
    seen_broadcasts: SeenBroadcasts,
    timers: TimerQueue,
    rreq_budget: MessageBudget,
    rerr_budget: MessageBudget,
    outbox: Vec<PendingBroadcast>,
    /// Discoveries whose last attempt was held back by the request budget.
    deferred_requests: BTreeSet<Address>,
    interfaces: BTreeSet<InterfaceId>,
    rng: StdRng,
}

impl RoutingEngine {
    pub fn new(address: Address, config: Config, now: u64) -> Self {
        let mut timers = TimerQueue::new();
        timers.schedule(TimerKey::Sweep, now + SWEEP_INTERVAL);
        timers.schedule(TimerKey::RateLimitReset, now + BUDGET_WINDOW);
        if config.hello_enabled {
            timers.schedule(TimerKey::HelloEmit, now + config.hello_interval);
        }

        let window = config.path_discovery_time();
        Self {
            address,
            seq: SeqNum::ZERO,
            request_id: RequestId(0),
            table: RoutingTable::new(),
            neighbors: NeighborTable::new(),
            queue: PacketQueue::new(config.max_queued_packets, config.max_queued_per_dest),
            seen_requests: SeenRequests::new(window),
            seen_broadcasts: SeenBroadcasts::new(window),
            timers,
            rreq_budget: MessageBudget::new(config.rreq_rate_limit),
            rerr_budget: MessageBudget::new(config.rerr_rate_limit),
            outbox: Vec::new(),
            deferred_requests: BTreeSet::new(),
            interfaces: BTreeSet::new(),
            rng: StdRng::seed_from_u64(config.rng_seed),
            config,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sequence_number(&self) -> SeqNum {
        self.seq
    }

    /// Read-only view of the route for a destination, if any.
    pub fn route(&self, dest: &Address) -> Option<&crate::table::RouteEntry> {
        self.table.lookup(dest)
    }

    /// Packets currently deferred awaiting routes.
    pub fn queued_packets(&self) -> usize {
        self.queue.len()
    }

    pub fn add_interface(&mut self, iface: InterfaceId) {
        self.interfaces.insert(iface);
    }

    /// Tear down an interface, dropping every route and neighbor learned
    /// on it. No errors are propagated; downstream nodes will notice via
    /// their own liveness checks.
    pub fn remove_interface(&mut self, iface: InterfaceId) {
        self.interfaces.remove(&iface);
        let routes = self.table.remove_interface(iface);
        let neighbors = self.neighbors.remove_on_interface(iface);
        self.outbox.retain(|p| p.interface != iface);
        debug!(
            interface = iface.0,
            routes = routes.len(),
            neighbors = neighbors.len(),
            "interface removed"
        );
    }

    /// Route a data packet leaving this node, or one the host re-submits.
    ///
    /// With a usable route the packet is forwarded immediately and the
    /// route's lifetime refreshed. Otherwise it is queued and a discovery
    /// started, unless one is already in flight. Discovery requests leave
    /// through the jittered outbox on the next [`poll`](Self::poll).
    pub fn route_output<S: PacketSink>(
        &mut self,
        header: PacketHeader,
        payload: &[u8],
        sink: &mut S,
        now: u64,
    ) {
        if header.destination == self.address {
            sink.deliver(&header, payload);
            return;
        }
        if self.interfaces.is_empty() {
            warn!(dest = %header.destination, "no active interfaces, cannot route");
            sink.fail(&header, payload, DeliveryFailure::NoRoute);
            return;
        }
        if header.destination.is_broadcast() {
            self.seen_broadcasts
                .check_and_record(header.source, header.id, now);
            for iface in self.interfaces.clone() {
                sink.forward(iface, Address::BROADCAST, &header, payload);
            }
            return;
        }

        let route = self
            .table
            .lookup_valid(&header.destination, now)
            .and_then(|e| Some((e.next_hop?, e.interface?)));
        if let Some((next_hop, iface)) = route {
            self.refresh_active_path(&header.destination, next_hop, now);
            sink.forward(iface, next_hop, &header, payload);
            return;
        }

        let discovering = self
            .table
            .lookup(&header.destination)
            .is_some_and(|e| e.state == crate::table::RouteState::InSearch);
        if !discovering {
            self.start_discovery(header.destination, now);
        }
        self.enqueue_or_fail(header, payload, sink, now);
    }

    /// Route a data packet received from a neighbor.
    pub fn route_input<T: Transport, S: PacketSink>(
        &mut self,
        mut header: PacketHeader,
        payload: &[u8],
        previous_hop: Address,
        interface: InterfaceId,
        transport: &mut T,
        sink: &mut S,
        now: u64,
    ) {
        self.note_neighbor(previous_hop, interface, now);

        if header.destination.is_broadcast() {
            if self
                .seen_broadcasts
                .check_and_record(header.source, header.id, now)
                || header.source == self.address
            {
                return;
            }
            sink.deliver(&header, payload);
            if header.ttl > 1 {
                header.ttl -= 1;
                for iface in self.interfaces.clone() {
                    sink.forward(iface, Address::BROADCAST, &header, payload);
                }
            }
            return;
        }

        if header.destination == self.address {
            sink.deliver(&header, payload);
            return;
        }

        if header.ttl <= 1 {
            trace!(dest = %header.destination, "hop limit exhausted, dropping");
            return;
        }

        let route = self
            .table
            .lookup_valid(&header.destination, now)
            .and_then(|e| Some((e.next_hop?, e.interface?)));
        match route {
            Some((next_hop, iface)) => {
                header.ttl -= 1;
                self.refresh_active_path(&header.destination, next_hop, now);
                // The reverse path is active too.
                self.table
                    .refresh(&header.source, now + self.config.active_route_timeout, now);
                self.table
                    .refresh(&previous_hop, now + self.config.active_route_timeout, now);
                sink.forward(iface, next_hop, &header, payload);
            }
            None => {
                debug!(dest = %header.destination, from = %previous_hop, "no route for transit packet");
                self.report_broken_destination(header.destination, previous_hop, transport, now);
                sink.fail(&header, payload, DeliveryFailure::NoRoute);
            }
        }
    }

    /// Process a received control frame.
    pub fn handle_control<T: Transport, S: PacketSink>(
        &mut self,
        raw: &[u8],
        previous_hop: Address,
        interface: InterfaceId,
        transport: &mut T,
        sink: &mut S,
        now: u64,
    ) -> Result<(), WireError> {
        let datagram = Datagram::parse(raw)?;
        self.note_neighbor(previous_hop, interface, now);

        match datagram.message {
            ControlMessage::Request(req) => {
                self.handle_request(req, datagram.ttl, previous_hop, interface, transport, now);
            }
            ControlMessage::Reply(rep) => {
                self.handle_reply(rep, datagram.ttl, previous_hop, interface, transport, sink, now);
            }
            ControlMessage::Error(err) => {
                self.handle_error(err, previous_hop, transport, now);
            }
            ControlMessage::ReplyAck => {
                self.handle_reply_ack(previous_hop);
            }
        }
        Ok(())
    }

    /// The host detected a send failure toward a neighbor.
    pub fn on_link_broken<T: Transport>(
        &mut self,
        neighbor: Address,
        transport: &mut T,
        now: u64,
    ) {
        self.route_broken(neighbor, transport, now);
    }

    /// Fire due timers, flush jittered sends, and run housekeeping.
    pub fn poll<T: Transport, S: PacketSink>(
        &mut self,
        transport: &mut T,
        sink: &mut S,
        now: u64,
    ) {
        for key in self.timers.due(now) {
            match key {
                TimerKey::DiscoveryRetry(dest) => {
                    self.on_discovery_timeout(dest, sink, now);
                }
                TimerKey::AckWait(next_hop) => self.on_ack_timeout(next_hop, now),
                TimerKey::HelloEmit => self.on_hello_timer(transport, now),
                TimerKey::RateLimitReset => {
                    self.rreq_budget.reset();
                    self.rerr_budget.reset();
                    self.timers
                        .schedule(TimerKey::RateLimitReset, now + BUDGET_WINDOW);
                }
                TimerKey::Sweep => self.sweep(transport, sink, now),
            }
        }

        let mut i = 0;
        while i < self.outbox.len() {
            if self.outbox[i].due <= now {
                let pending = self.outbox.swap_remove(i);
                transport.broadcast(pending.interface, &pending.payload);
            } else {
                i += 1;
            }
        }
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_wakeup(&self) -> Option<u64> {
        let candidates = [
            self.timers.next_deadline(),
            self.queue.next_deadline(),
            self.outbox.iter().map(|p| p.due).min(),
        ];
        candidates.into_iter().flatten().min()
    }

    // --- shared internals ---

    /// Record a neighbor sighting and keep a one-hop route to it.
    fn note_neighbor(&mut self, neighbor: Address, interface: InterfaceId, now: u64) {
        self.neighbors.touch(neighbor, interface, now);
        let candidate = RouteCandidate {
            next_hop: neighbor,
            interface,
            hop_count: 1,
            seq: SeqNum::ZERO,
            seq_known: false,
            expires: now + self.config.active_route_timeout,
        };
        self.table.apply_candidate(neighbor, &candidate, now);
    }

    fn refresh_active_path(&mut self, dest: &Address, next_hop: Address, now: u64) {
        let until = now + self.config.active_route_timeout;
        self.table.refresh(dest, until, now);
        self.table.refresh(&next_hop, until, now);
    }

    fn enqueue_or_fail<S: PacketSink>(
        &mut self,
        header: PacketHeader,
        payload: &[u8],
        sink: &mut S,
        now: u64,
    ) {
        for stale in self.queue.expire(now) {
            sink.fail(
                &stale.header,
                &stale.payload,
                DeliveryFailure::QueueTimeout,
            );
        }
        let deadline = now + self.config.queue_timeout;
        match self.queue.enqueue(header, payload.to_vec(), deadline) {
            Ok(Some((evicted, reason))) => {
                sink.fail(&evicted.header, &evicted.payload, map_drop(reason));
            }
            Ok(None) => {}
            Err((rejected, reason)) => {
                warn!(dest = %rejected.header.destination, "queue admission refused");
                sink.fail(&rejected.header, &rejected.payload, map_drop(reason));
            }
        }
    }

    fn next_request_id(&mut self) -> RequestId {
        self.request_id = self.request_id.next();
        self.request_id
    }

    fn bump_seq(&mut self) -> SeqNum {
        self.seq.increment();
        self.seq
    }

    fn unicast_control<T: Transport>(
        &self,
        transport: &mut T,
        interface: InterfaceId,
        next_hop: Address,
        ttl: u8,
        message: ControlMessage,
    ) {
        let raw = Datagram::new(ttl, message).serialize();
        transport.unicast(interface, next_hop, &raw);
    }

    fn broadcast_control<T: Transport>(&mut self, transport: &mut T, ttl: u8, message: ControlMessage) {
        let raw = Datagram::new(ttl, message).serialize();
        for iface in self.interfaces.clone() {
            transport.broadcast(iface, &raw);
        }
    }

    /// Defer a flood re-broadcast by a small random delay so neighbors that
    /// heard the same frame do not answer in lockstep.
    fn broadcast_jittered(&mut self, ttl: u8, message: ControlMessage, now: u64) {
        let raw = Datagram::new(ttl, message).serialize();
        for iface in self.interfaces.clone() {
            let due = now + self.rng.gen_range(0..=REBROADCAST_JITTER);
            self.outbox.push(PendingBroadcast {
                due,
                interface: iface,
                payload: raw.clone(),
            });
        }
    }

    fn sweep<T: Transport, S: PacketSink>(&mut self, transport: &mut T, sink: &mut S, now: u64) {
        let outcome = self.table.purge(now, self.config.delete_period());
        if !outcome.invalidated.is_empty() || !outcome.deleted.is_empty() {
            debug!(
                invalidated = outcome.invalidated.len(),
                deleted = outcome.deleted.len(),
                "route table swept"
            );
        }

        let validity = self.config.neighbor_validity();
        for dead in self.neighbors.cull_silent(now, validity) {
            debug!(neighbor = %dead, "neighbor silent past validity window");
            self.route_broken(dead, transport, now);
        }
        self.neighbors.cull_blacklist(now);
        self.seen_requests.cull(now);
        self.seen_broadcasts.cull(now);

        for expired in self.queue.expire(now) {
            sink.fail(
                &expired.header,
                &expired.payload,
                DeliveryFailure::QueueTimeout,
            );
        }

        self.timers.schedule(TimerKey::Sweep, now + SWEEP_INTERVAL);
    }
}

fn map_drop(reason: DropReason) -> DeliveryFailure {
    match reason {
        DropReason::Overflow | DropReason::DestinationFull => DeliveryFailure::QueueOverflow,
        DropReason::TimedOut => DeliveryFailure::QueueTimeout,
        DropReason::Unreachable => DeliveryFailure::Unreachable,
    }
}
