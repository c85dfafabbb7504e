//! Routing daemon pieces: configuration, UDP transport, and the event loop
//! that drives the engine.

pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod node;
pub mod udp;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::{Node, ShutdownHandle};
