//! UDP-backed implementations of the engine's collaborator traits.
//!
//! Each configured interface is one broadcast-capable UDP socket on the
//! control port. Sends are best-effort `try_send_to`; UDP loss is part of
//! the protocol's threat model, so a full send buffer is just loss.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use aodv_core::constants::CONTROL_PORT;
use aodv_core::types::{Address, InterfaceId};
use aodv_engine::traits::{DeliveryFailure, PacketHeader, PacketSink, Transport};

use crate::config::InterfaceEntry;
use crate::error::NodeError;
use crate::frame::DataFrame;

/// One bound interface socket and its subnet broadcast target.
#[derive(Clone)]
pub struct IfaceSocket {
    pub name: String,
    pub socket: Arc<UdpSocket>,
    pub broadcast: SocketAddr,
}

impl IfaceSocket {
    /// Bind and configure a socket for an interface entry.
    pub async fn bind(entry: &InterfaceEntry) -> Result<Self, NodeError> {
        let bind = entry.bind_addr()?;
        let socket = UdpSocket::bind(bind).await?;
        socket.set_broadcast(true)?;
        info!(name = %entry.name, %bind, "interface up");
        Ok(Self {
            name: entry.name.clone(),
            socket: Arc::new(socket),
            broadcast: entry.broadcast_addr()?,
        })
    }

    fn send(&self, target: SocketAddr, payload: &[u8]) {
        if let Err(e) = self.socket.try_send_to(payload, target) {
            debug!(name = %self.name, %target, "send failed: {e}");
        }
    }
}

fn control_addr(next_hop: Address) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::from(next_hop)), CONTROL_PORT)
}

/// Control-plane sender over the interface sockets.
pub struct UdpTransport {
    ifaces: HashMap<InterfaceId, IfaceSocket>,
}

impl UdpTransport {
    pub fn new(ifaces: HashMap<InterfaceId, IfaceSocket>) -> Self {
        Self { ifaces }
    }
}

impl Transport for UdpTransport {
    fn broadcast(&mut self, interface: InterfaceId, payload: &[u8]) {
        if let Some(iface) = self.ifaces.get(&interface) {
            trace!(name = %iface.name, len = payload.len(), "control broadcast");
            iface.send(iface.broadcast, payload);
        }
    }

    fn unicast(&mut self, interface: InterfaceId, next_hop: Address, payload: &[u8]) {
        if let Some(iface) = self.ifaces.get(&interface) {
            trace!(name = %iface.name, to = %next_hop, len = payload.len(), "control unicast");
            iface.send(control_addr(next_hop), payload);
        }
    }
}

/// Data-plane sink: forwards go back onto the wire as data frames, local
/// deliveries are handed to the host through a channel.
pub struct DataPlane {
    ifaces: HashMap<InterfaceId, IfaceSocket>,
    delivered: mpsc::Sender<(PacketHeader, Vec<u8>)>,
}

impl DataPlane {
    pub fn new(
        ifaces: HashMap<InterfaceId, IfaceSocket>,
        delivered: mpsc::Sender<(PacketHeader, Vec<u8>)>,
    ) -> Self {
        Self { ifaces, delivered }
    }
}

impl PacketSink for DataPlane {
    fn forward(
        &mut self,
        interface: InterfaceId,
        next_hop: Address,
        header: &PacketHeader,
        payload: &[u8],
    ) {
        let Some(iface) = self.ifaces.get(&interface) else {
            return;
        };
        let raw = DataFrame {
            header: *header,
            payload: payload.to_vec(),
        }
        .serialize();
        let target = if next_hop.is_broadcast() {
            iface.broadcast
        } else {
            control_addr(next_hop)
        };
        trace!(dest = %header.destination, via = %next_hop, "forwarding data");
        iface.send(target, &raw);
    }

    fn deliver(&mut self, header: &PacketHeader, payload: &[u8]) {
        if self
            .delivered
            .try_send((*header, payload.to_vec()))
            .is_err()
        {
            warn!(source = %header.source, "delivery channel full, dropping packet");
        }
    }

    fn fail(&mut self, header: &PacketHeader, _payload: &[u8], reason: DeliveryFailure) {
        warn!(dest = %header.destination, ?reason, "delivery failed");
    }
}
