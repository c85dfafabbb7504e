//! Route error propagation: link failures, received errors, and stale
//! transit misses.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use aodv_core::constants::MAX_ERROR_DESTS;
use aodv_core::types::{Address, SeqNum};
use aodv_core::wire::{ControlMessage, RouteError};

use crate::traits::Transport;

use super::RoutingEngine;

impl RoutingEngine {
    /// A neighbor is gone. Invalidate every route through it and tell the
    /// nodes that were using us to reach those destinations.
    pub(super) fn route_broken<T: Transport>(
        &mut self,
        neighbor: Address,
        transport: &mut T,
        now: u64,
    ) {
        self.neighbors.remove(&neighbor);
        // Replies sent through this neighbor must prove the link works
        // both ways before it is trusted again.
        self.neighbors
            .suspect(neighbor, now + self.config.blacklist_timeout());

        // The one-hop route to the neighbor itself shows up in
        // destinations_via; no separate handling needed.
        let broken: Vec<(Address, SeqNum)> = self
            .table
            .destinations_via(&neighbor)
            .into_iter()
            .map(|(dest, seq)| (dest, seq.next()))
            .collect();
        if broken.is_empty() {
            return;
        }

        debug!(neighbor = %neighbor, routes = broken.len(), "link broken");
        let delete_at = now + self.config.delete_period();
        let precursors = self.table.invalidate_set(&broken, delete_at);
        self.send_error(&broken, &precursors, transport);
    }

    /// A neighbor reported destinations it can no longer reach. Adopt the
    /// losses for routes that actually ran through it and pass them on.
    pub(super) fn handle_error<T: Transport>(
        &mut self,
        err: RouteError,
        previous_hop: Address,
        transport: &mut T,
        now: u64,
    ) {
        let affected: Vec<(Address, SeqNum)> = err
            .destinations
            .into_iter()
            .filter(|(dest, _)| {
                self.table
                    .lookup_valid(dest, now)
                    .is_some_and(|e| e.next_hop == Some(previous_hop))
            })
            .collect();
        if affected.is_empty() {
            return;
        }

        debug!(from = %previous_hop, routes = affected.len(), "adopting route error");
        let delete_at = now + self.config.delete_period();
        let precursors = self.table.invalidate_set(&affected, delete_at);
        self.send_error(&affected, &precursors, transport);
    }

    /// A transit packet arrived for a destination we cannot reach. Tell the
    /// upstream node so it stops using us.
    pub(super) fn report_broken_destination<T: Transport>(
        &mut self,
        dest: Address,
        previous_hop: Address,
        transport: &mut T,
        now: u64,
    ) {
        let seq = self
            .table
            .lookup(&dest)
            .filter(|e| e.seq_known)
            .map(|e| e.seq)
            .unwrap_or(SeqNum::ZERO);
        let precursors = BTreeSet::from([previous_hop]);
        self.send_error(&[(dest, seq)], &precursors, transport);
    }

    /// Emit route errors toward the given precursors, split across frames
    /// when the destination list outgrows one message. A single precursor
    /// gets a unicast; more than one, a hop-limited broadcast.
    fn send_error<T: Transport>(
        &mut self,
        broken: &[(Address, SeqNum)],
        precursors: &BTreeSet<Address>,
        transport: &mut T,
    ) {
        if precursors.is_empty() {
            return;
        }
        let unicast_target = if precursors.len() == 1 {
            precursors.iter().next().copied().and_then(|p| {
                let iface = self.neighbors.get(&p).map(|n| n.interface)?;
                Some((p, iface))
            })
        } else {
            None
        };

        for chunk in broken.chunks(MAX_ERROR_DESTS) {
            if !self.rerr_budget.try_consume() {
                warn!("route error suppressed by rate limit");
                return;
            }
            let Some(err) = RouteError::new(chunk.to_vec()) else {
                continue;
            };
            let message = ControlMessage::Error(err);
            match unicast_target {
                Some((next_hop, iface)) => {
                    self.unicast_control(transport, iface, next_hop, 1, message);
                }
                None => self.broadcast_control(transport, 1, message),
            }
        }
    }
}
