//! Reactive on-demand multi-hop routing.
//!
//! Routes are discovered only when traffic needs them, kept alive while
//! used, and torn down with targeted error propagation when a link fails.
//! The engine is sans-IO: the host feeds it packets, control frames, and a
//! monotonic clock, and lends it a [`Transport`](traits::Transport) and a
//! [`PacketSink`](traits::PacketSink) to act through.

pub mod config;
pub mod dedup;
pub mod engine;
pub mod limits;
pub mod neighbors;
pub mod queue;
pub mod table;
pub mod timers;
pub mod traits;

pub use config::Config;
pub use engine::RoutingEngine;
pub use traits::{DeliveryFailure, PacketHeader, PacketSink, Transport};
