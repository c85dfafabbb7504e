//! TOML-based configuration for routing nodes.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use aodv_core::constants::CONTROL_PORT;
use aodv_core::types::Address;

use crate::error::NodeError;

/// Top-level node configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub protocol: aodv_engine::Config,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub interfaces: Vec<InterfaceEntry>,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// The node's own routing address.
    pub fn address(&self) -> Result<Address, NodeError> {
        let ip: Ipv4Addr = self
            .node
            .address
            .parse()
            .map_err(|_| NodeError::Address(self.node.address.clone()))?;
        Ok(Address::from(ip))
    }
}

/// The `[node]` section.
#[derive(Debug, Default, Deserialize)]
pub struct NodeSection {
    /// This node's routing address, dotted-quad.
    pub address: String,
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// A `[[interfaces]]` entry describing one UDP-backed link.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceEntry {
    pub name: String,
    /// Local bind address; port defaults to the well-known control port.
    pub bind: String,
    /// Subnet broadcast address frames are flooded to.
    pub broadcast: String,
}

impl InterfaceEntry {
    pub fn bind_addr(&self) -> Result<SocketAddr, NodeError> {
        parse_socket_addr(&self.bind)
    }

    pub fn broadcast_addr(&self) -> Result<SocketAddr, NodeError> {
        parse_socket_addr(&self.broadcast)
    }
}

/// Parse `ip` or `ip:port`, defaulting the port to the control port.
fn parse_socket_addr(s: &str) -> Result<SocketAddr, NodeError> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<Ipv4Addr>()
        .map(|ip| SocketAddr::from((ip, CONTROL_PORT)))
        .map_err(|_| NodeError::Address(s.to_string()))
}
