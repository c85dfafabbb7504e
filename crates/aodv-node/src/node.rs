//! The daemon: sockets in, engine decisions out.
//!
//! A single task owns the engine. Socket reads are bridged into one mpsc
//! channel, and the loop alternates between handling inbound frames and
//! waking the engine at its next deadline, so every engine call sees a
//! consistent, single-threaded view of the routing state.

use std::collections::HashMap;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{info, warn};

use aodv_core::types::{Address, InterfaceId};
use aodv_engine::engine::RoutingEngine;
use aodv_engine::traits::PacketHeader;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::frame::{is_data_frame, DataFrame};
use crate::udp::{DataPlane, IfaceSocket, UdpTransport};

/// Events delivered to the event loop from socket receive bridges.
#[derive(Debug)]
enum NodeEvent {
    Inbound {
        interface: InterfaceId,
        from: SocketAddr,
        raw: Vec<u8>,
    },
}

/// Requests shutdown of a running node from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// A routing node bound to one or more UDP interfaces.
pub struct Node {
    config: NodeConfig,
    address: Address,
    engine: RoutingEngine,
    started: Instant,
    transport: Option<UdpTransport>,
    data_plane: Option<DataPlane>,
    delivered_rx: Option<mpsc::Receiver<(PacketHeader, Vec<u8>)>>,
    event_tx: mpsc::Sender<NodeEvent>,
    event_rx: mpsc::Receiver<NodeEvent>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    bridge_handles: Vec<tokio::task::JoinHandle<()>>,
    next_packet_id: u16,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let address = config.address()?;
        let engine = RoutingEngine::new(address, config.protocol.clone(), 0);
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            address,
            engine,
            started: Instant::now(),
            transport: None,
            data_plane: None,
            delivered_rx: None,
            event_tx,
            event_rx,
            shutdown_tx,
            shutdown_rx,
            bridge_handles: Vec::new(),
            next_packet_id: 0,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Take the stream of locally delivered data packets. The first caller
    /// gets it; the daemon binary leaves it in place and just logs.
    pub fn take_deliveries(&mut self) -> Option<mpsc::Receiver<(PacketHeader, Vec<u8>)>> {
        self.delivered_rx.take()
    }

    /// Bind all configured interfaces and start their receive bridges.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.transport.is_some() {
            return Err(NodeError::AlreadyRunning);
        }
        if self.config.interfaces.is_empty() {
            return Err(NodeError::NoInterfaces);
        }

        let mut ifaces = HashMap::new();
        for (n, entry) in self.config.interfaces.clone().iter().enumerate() {
            let id = InterfaceId(n as u32 + 1);
            let iface = IfaceSocket::bind(entry).await?;
            self.spawn_bridge(id, iface.clone());
            self.engine.add_interface(id);
            ifaces.insert(id, iface);
        }

        let (delivered_tx, delivered_rx) = mpsc::channel(256);
        self.transport = Some(UdpTransport::new(ifaces.clone()));
        self.data_plane = Some(DataPlane::new(ifaces, delivered_tx));
        self.delivered_rx = Some(delivered_rx);
        info!(address = %self.address, "node started");
        Ok(())
    }

    fn spawn_bridge(&mut self, id: InterfaceId, iface: IfaceSocket) {
        let tx = self.event_tx.clone();
        let mut shutdown = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    recv = iface.socket.recv_from(&mut buf) => match recv {
                        Ok((len, from)) => {
                            let event = NodeEvent::Inbound {
                                interface: id,
                                from,
                                raw: buf[..len].to_vec(),
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(name = %iface.name, "receive error: {e}");
                        }
                    },
                }
            }
        });
        self.bridge_handles.push(handle);
    }

    fn now(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Originate a data packet from this node.
    pub fn send(&mut self, destination: Address, payload: &[u8]) {
        let header = PacketHeader {
            source: self.address,
            destination,
            id: self.next_packet_id,
            ttl: self.config.protocol.net_diameter,
        };
        self.next_packet_id = self.next_packet_id.wrapping_add(1);
        let now = self.now();
        if let Some(plane) = self.data_plane.as_mut() {
            self.engine.route_output(header, payload, plane, now);
        }
    }

    /// Run the event loop until shutdown is requested.
    pub async fn run(&mut self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            let wakeup = match self.engine.next_wakeup() {
                Some(at) => self.started + Duration::from_millis(at),
                None => Instant::now() + Duration::from_secs(1),
            };
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                Some(event) = self.event_rx.recv() => self.handle_event(event),
                _ = tokio::time::sleep_until(wakeup) => {
                    let now = self.now();
                    if let (Some(transport), Some(plane)) =
                        (self.transport.as_mut(), self.data_plane.as_mut())
                    {
                        self.engine.poll(transport, plane, now);
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, event: NodeEvent) {
        let NodeEvent::Inbound {
            interface,
            from,
            raw,
        } = event;
        let IpAddr::V4(ip) = from.ip() else {
            return;
        };
        let previous_hop = Address::from(ip);
        // Broadcast sockets hear their own sends.
        if previous_hop == self.address {
            return;
        }
        let now = self.now();
        let (Some(transport), Some(plane)) = (self.transport.as_mut(), self.data_plane.as_mut())
        else {
            return;
        };

        if is_data_frame(&raw) {
            match DataFrame::parse(&raw) {
                Ok(frame) => self.engine.route_input(
                    frame.header,
                    &frame.payload,
                    previous_hop,
                    interface,
                    transport,
                    plane,
                    now,
                ),
                Err(e) => warn!(from = %previous_hop, "dropping data frame: {e}"),
            }
        } else if let Err(e) =
            self.engine
                .handle_control(&raw, previous_hop, interface, transport, plane, now)
        {
            warn!(from = %previous_hop, "dropping control frame: {e}");
        }
    }

    /// Stop the receive bridges and release sockets.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.bridge_handles.drain(..) {
            handle.abort();
        }
        self.transport = None;
        self.data_plane = None;
        info!("node stopped");
    }
}
