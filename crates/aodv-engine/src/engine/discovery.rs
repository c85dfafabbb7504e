//! Route discovery: expanding-ring search, retry backoff, and handling of
//! flooded route requests.

use tracing::{debug, trace, warn};

use aodv_core::types::{Address, InterfaceId};
use aodv_core::wire::{ControlMessage, RouteRequest};

use crate::table::{RouteCandidate, RouteEntry, RouteState};
use crate::timers::TimerKey;
use crate::traits::{DeliveryFailure, PacketSink, Transport};

use super::{RoutingEngine, BUDGET_WINDOW};

impl RoutingEngine {
    /// Begin (or restart) a discovery for a destination without a usable
    /// route. An invalid entry's last known hop count seeds the first ring
    /// so a recently broken route is not rediscovered from scratch.
    pub(super) fn start_discovery(&mut self, dest: Address, now: u64) {
        let deadline = now + self.config.path_discovery_time();
        let initial_ttl = match self.table.lookup(&dest) {
            Some(e) if e.seq_known && e.hop_count > 0 => (e.hop_count + self.config.ttl_increment)
                .min(self.config.ttl_threshold),
            _ => self.config.ttl_start,
        };

        match self.table.lookup_mut(&dest) {
            Some(entry) => {
                entry.state = RouteState::InSearch;
                entry.next_hop = None;
                entry.ttl = initial_ttl;
                entry.retries = 0;
                entry.expires = deadline;
            }
            None => {
                self.table
                    .insert(RouteEntry::in_search(dest, initial_ttl, deadline));
            }
        }

        debug!(dest = %dest, ttl = initial_ttl, "starting route discovery");
        self.send_request(dest, now);
    }

    /// Queue one discovery attempt using the entry's current ring scope and
    /// arm the retry timer. When the request budget is exhausted the same
    /// attempt is held until the budget refills; scope and retry count do
    /// not advance for a request that never left.
    fn send_request(&mut self, dest: Address, now: u64) {
        let Some(entry) = self.table.lookup(&dest) else {
            return;
        };
        let ttl = entry.ttl;
        let retries = entry.retries;
        let (dest_seq, seq_known) = (entry.seq, entry.seq_known);

        if !self.rreq_budget.try_consume() {
            warn!(dest = %dest, "route request held by rate limit");
            self.deferred_requests.insert(dest);
            let resume = self
                .timers
                .deadline_of(&TimerKey::RateLimitReset)
                .unwrap_or(now + BUDGET_WINDOW);
            self.timers
                .schedule(TimerKey::DiscoveryRetry(dest), resume.max(now) + 1);
            return;
        }
        self.deferred_requests.remove(&dest);

        let timeout = if ttl >= self.config.net_diameter {
            // Binary exponential backoff once the whole network is in scope.
            self.config.net_traversal_time() << retries.min(8)
        } else {
            self.config.ring_traversal_time(ttl)
        };
        self.timers
            .schedule(TimerKey::DiscoveryRetry(dest), now + timeout);

        let orig_seq = self.bump_seq();
        let request_id = self.next_request_id();
        // Our own flood will echo back; pre-record it as seen.
        self.seen_requests.check_and_record(self.address, request_id, now);

        let request = RouteRequest {
            gratuitous: self.config.gratuitous_replies,
            dest_only: self.config.dest_only,
            unknown_seq: !seq_known,
            hop_count: 0,
            request_id,
            destination: dest,
            dest_seq,
            originator: self.address,
            orig_seq,
        };
        self.broadcast_jittered(ttl, ControlMessage::Request(request), now);
    }

    /// The ring search timed out without a reply: widen the ring, or at
    /// full diameter burn a retry, or give up.
    pub(super) fn on_discovery_timeout<S: PacketSink>(
        &mut self,
        dest: Address,
        sink: &mut S,
        now: u64,
    ) {
        // The timer may have raced a reply that resolved the route.
        let Some(entry) = self.table.lookup_mut(&dest) else {
            self.deferred_requests.remove(&dest);
            return;
        };
        if entry.state != RouteState::InSearch {
            self.deferred_requests.remove(&dest);
            return;
        }

        // A budget-held attempt goes out as-is once the budget refills.
        if self.deferred_requests.remove(&dest) {
            self.send_request(dest, now);
            return;
        }

        let Some(entry) = self.table.lookup_mut(&dest) else {
            return;
        };
        if entry.ttl >= self.config.net_diameter {
            entry.retries += 1;
            if entry.retries > self.config.rreq_retries {
                debug!(dest = %dest, "discovery exhausted, destination unreachable");
                self.abandon_discovery(dest, sink);
                return;
            }
        } else {
            let widened = entry.ttl.saturating_add(self.config.ttl_increment);
            entry.ttl = if widened > self.config.ttl_threshold {
                self.config.net_diameter
            } else {
                widened
            };
        }

        trace!(dest = %dest, ttl = self.table.lookup(&dest).map(|e| e.ttl).unwrap_or(0), "widening ring search");
        self.send_request(dest, now);
    }

    fn abandon_discovery<S: PacketSink>(&mut self, dest: Address, sink: &mut S) {
        self.table.delete(&dest);
        self.deferred_requests.remove(&dest);
        self.timers.cancel(&TimerKey::DiscoveryRetry(dest));
        for packet in self.queue.take_for(&dest) {
            sink.fail(&packet.header, &packet.payload, DeliveryFailure::Unreachable);
        }
    }

    /// Handle a flooded route request.
    pub(super) fn handle_request<T: Transport>(
        &mut self,
        mut req: RouteRequest,
        ttl: u8,
        previous_hop: Address,
        interface: InterfaceId,
        transport: &mut T,
        now: u64,
    ) {
        if self.neighbors.is_blacklisted(&previous_hop, now) {
            trace!(from = %previous_hop, "request from blacklisted neighbor ignored");
            return;
        }
        if req.originator == self.address {
            return;
        }
        if self
            .seen_requests
            .check_and_record(req.originator, req.request_id, now)
        {
            return;
        }

        req.hop_count = req.hop_count.saturating_add(1);

        // Reverse route back to the originator.
        let reverse_lifetime = now
            + self
                .config
                .net_traversal_time()
                .saturating_sub(2 * self.config.node_traversal_time * req.hop_count as u64);
        let reverse = RouteCandidate {
            next_hop: previous_hop,
            interface,
            hop_count: req.hop_count,
            seq: req.orig_seq,
            seq_known: true,
            expires: reverse_lifetime.max(now + self.config.active_route_timeout),
        };
        self.table.apply_candidate(req.originator, &reverse, now);

        if req.destination == self.address {
            self.reply_as_destination(&req, previous_hop, interface, transport, now);
            return;
        }

        let cached = self.table.lookup_valid(&req.destination, now).filter(|e| {
            e.seq_known && (req.unknown_seq || e.seq.at_least(req.dest_seq))
        });
        if !req.dest_only {
            if let Some(entry) = cached {
                let (hops, seq, expires) = (entry.hop_count, entry.seq, entry.expires);
                self.reply_from_cache(&req, hops, seq, expires, previous_hop, interface, transport, now);
                return;
            }
        }

        // Not ours to answer; shrink the scope and keep flooding.
        if ttl <= 1 {
            return;
        }
        let mut forwarded = req.clone();
        // Carry the freshest sequence number we know of.
        if let Some(entry) = self.table.lookup(&req.destination) {
            if entry.seq_known && entry.seq.newer_than(forwarded.dest_seq) {
                forwarded.dest_seq = entry.seq;
                forwarded.unknown_seq = false;
            }
        }
        self.broadcast_jittered(ttl - 1, ControlMessage::Request(forwarded), now);
    }
}
