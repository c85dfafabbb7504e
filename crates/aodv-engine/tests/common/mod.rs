//! Deterministic in-memory network for multi-node scenarios.
//!
//! Every node runs a real engine; the harness plays the role of the medium,
//! delivering frames only where a directed link exists. Time is a stepped
//! counter, so timer-driven behavior (ring growth, retries, sweeps) is
//! exercised exactly.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use aodv_core::types::{Address, InterfaceId};
use aodv_engine::config::Config;
use aodv_engine::engine::RoutingEngine;
use aodv_engine::traits::{DeliveryFailure, PacketHeader, PacketSink, Transport};

pub const IFACE: InterfaceId = InterfaceId(1);

pub fn addr(last: u8) -> Address {
    Address::new([10, 0, 0, last])
}

/// Captures a single engine call's outgoing control frames.
#[derive(Default)]
pub struct Outgoing {
    /// `(next_hop, payload)`; `None` is a broadcast.
    pub frames: Vec<(Option<Address>, Vec<u8>)>,
}

impl Transport for Outgoing {
    fn broadcast(&mut self, _interface: InterfaceId, payload: &[u8]) {
        self.frames.push((None, payload.to_vec()));
    }

    fn unicast(&mut self, _interface: InterfaceId, next_hop: Address, payload: &[u8]) {
        self.frames.push((Some(next_hop), payload.to_vec()));
    }
}

/// Captures a single engine call's data-plane decisions.
#[derive(Default)]
pub struct Events {
    pub forwards: Vec<(Address, PacketHeader, Vec<u8>)>,
    pub delivered: Vec<(PacketHeader, Vec<u8>)>,
    pub failures: Vec<(PacketHeader, DeliveryFailure)>,
}

impl PacketSink for Events {
    fn forward(
        &mut self,
        _interface: InterfaceId,
        next_hop: Address,
        header: &PacketHeader,
        payload: &[u8],
    ) {
        self.forwards.push((next_hop, *header, payload.to_vec()));
    }

    fn deliver(&mut self, header: &PacketHeader, payload: &[u8]) {
        self.delivered.push((*header, payload.to_vec()));
    }

    fn fail(&mut self, header: &PacketHeader, _payload: &[u8], reason: DeliveryFailure) {
        self.failures.push((*header, reason));
    }
}

enum Wire {
    Control {
        from: Address,
        to: Option<Address>,
        raw: Vec<u8>,
    },
    Data {
        from: Address,
        next: Address,
        header: PacketHeader,
        payload: Vec<u8>,
    },
}

pub struct Network {
    nodes: BTreeMap<Address, RoutingEngine>,
    links: BTreeSet<(Address, Address)>,
    pending: VecDeque<Wire>,
    /// Data packets handed up the stack, per node.
    pub delivered: BTreeMap<Address, Vec<(PacketHeader, Vec<u8>)>>,
    /// Delivery failures reported to the host, per node.
    pub failures: BTreeMap<Address, Vec<(PacketHeader, DeliveryFailure)>>,
    pub now: u64,
    next_packet_id: u16,
}

impl Network {
    pub fn new(addrs: &[Address]) -> Self {
        Self::with_config(addrs, Config::default())
    }

    pub fn with_config(addrs: &[Address], config: Config) -> Self {
        let mut nodes = BTreeMap::new();
        for &a in addrs {
            let mut engine = RoutingEngine::new(a, config.clone(), 0);
            engine.add_interface(IFACE);
            nodes.insert(a, engine);
        }
        Self {
            nodes,
            links: BTreeSet::new(),
            pending: VecDeque::new(),
            delivered: BTreeMap::new(),
            failures: BTreeMap::new(),
            now: 0,
            next_packet_id: 0,
        }
    }

    pub fn node(&self, a: Address) -> &RoutingEngine {
        &self.nodes[&a]
    }

    /// Symmetric link between two nodes.
    pub fn link(&mut self, a: Address, b: Address) {
        self.links.insert((a, b));
        self.links.insert((b, a));
    }

    pub fn unlink(&mut self, a: Address, b: Address) {
        self.links.remove(&(a, b));
        self.links.remove(&(b, a));
    }

    /// Tell a node its link-layer noticed a dead neighbor.
    pub fn break_link_at(&mut self, node: Address, neighbor: Address) {
        let mut transport = Outgoing::default();
        if let Some(engine) = self.nodes.get_mut(&node) {
            engine.on_link_broken(neighbor, &mut transport, self.now);
        }
        self.absorb_control(node, transport);
        self.process();
    }

    /// Originate a data packet and let the network settle. Advances the
    /// clock past the origination jitter window so any discovery request
    /// actually leaves the node.
    pub fn send(&mut self, from: Address, to: Address, payload: &[u8]) {
        let id = self.next_packet_id;
        self.next_packet_id += 1;
        let header = PacketHeader {
            source: from,
            destination: to,
            id,
            ttl: 35,
        };
        let mut events = Events::default();
        let now = self.now;
        if let Some(engine) = self.nodes.get_mut(&from) {
            engine.route_output(header, payload, &mut events, now);
        }
        self.absorb_events(from, events);
        self.process();
        self.advance(10);
    }

    /// Advance the clock in fixed steps, polling every node and settling
    /// the medium after each step.
    pub fn advance(&mut self, ms: u64) {
        let step = 10;
        let target = self.now + ms;
        while self.now < target {
            self.now = (self.now + step).min(target);
            let addrs: Vec<Address> = self.nodes.keys().copied().collect();
            for a in addrs {
                let mut transport = Outgoing::default();
                let mut events = Events::default();
                let now = self.now;
                if let Some(engine) = self.nodes.get_mut(&a) {
                    engine.poll(&mut transport, &mut events, now);
                }
                self.absorb_control(a, transport);
                self.absorb_events(a, events);
            }
            self.process();
        }
    }

    /// Deliver pending frames until the medium is quiet.
    pub fn process(&mut self) {
        while let Some(wire) = self.pending.pop_front() {
            match wire {
                Wire::Control { from, to, raw } => {
                    let recipients: Vec<Address> = match to {
                        Some(next) => {
                            if self.links.contains(&(from, next)) {
                                vec![next]
                            } else {
                                Vec::new()
                            }
                        }
                        None => self
                            .links
                            .iter()
                            .filter(|(a, _)| *a == from)
                            .map(|(_, b)| *b)
                            .collect(),
                    };
                    for r in recipients {
                        let mut transport = Outgoing::default();
                        let mut events = Events::default();
                        let now = self.now;
                        if let Some(engine) = self.nodes.get_mut(&r) {
                            let _ = engine.handle_control(
                                &raw,
                                from,
                                IFACE,
                                &mut transport,
                                &mut events,
                                now,
                            );
                        }
                        self.absorb_control(r, transport);
                        self.absorb_events(r, events);
                    }
                }
                Wire::Data {
                    from,
                    next,
                    header,
                    payload,
                } => {
                    let recipients: Vec<Address> = if next.is_broadcast() {
                        self.links
                            .iter()
                            .filter(|(a, _)| *a == from)
                            .map(|(_, b)| *b)
                            .collect()
                    } else if self.links.contains(&(from, next)) {
                        vec![next]
                    } else {
                        Vec::new()
                    };
                    for r in recipients {
                        let mut transport = Outgoing::default();
                        let mut events = Events::default();
                        let now = self.now;
                        if let Some(engine) = self.nodes.get_mut(&r) {
                            engine.route_input(
                                header,
                                &payload,
                                from,
                                IFACE,
                                &mut transport,
                                &mut events,
                                now,
                            );
                        }
                        self.absorb_control(r, transport);
                        self.absorb_events(r, events);
                    }
                }
            }
        }
    }

    pub fn delivered_at(&self, node: Address) -> usize {
        self.delivered.get(&node).map(|v| v.len()).unwrap_or(0)
    }

    pub fn failures_at(&self, node: Address) -> &[(PacketHeader, DeliveryFailure)] {
        self.failures
            .get(&node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn absorb_control(&mut self, from: Address, transport: Outgoing) {
        for (to, raw) in transport.frames {
            self.pending.push_back(Wire::Control { from, to, raw });
        }
    }

    fn absorb_events(&mut self, node: Address, events: Events) {
        for (next, header, payload) in events.forwards {
            self.pending.push_back(Wire::Data {
                from: node,
                next,
                header,
                payload,
            });
        }
        self.delivered
            .entry(node)
            .or_default()
            .extend(events.delivered);
        self.failures
            .entry(node)
            .or_default()
            .extend(events.failures);
    }
}
