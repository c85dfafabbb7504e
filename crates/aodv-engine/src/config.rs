//! Protocol configuration and derived RFC 3561 timing values.
//!
//! All knobs are independently overridable; `Deserialize` defaults mirror
//! `Default` so a partial `[protocol]` TOML section only overrides what it
//! names. Times are milliseconds throughout the engine.

use serde::Deserialize;

/// Tunable protocol parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discovery attempts allowed at maximum TTL before a destination is
    /// declared unreachable.
    pub rreq_retries: u8,
    /// Scope of the first ring search.
    pub ttl_start: u8,
    /// Scope growth per retry during the expanding-ring phase.
    pub ttl_increment: u8,
    /// Scope above which the search jumps to the full network diameter.
    pub ttl_threshold: u8,
    /// Assumed network diameter in hops.
    pub net_diameter: u8,
    /// Conservative estimate of one-hop traversal time, in milliseconds.
    pub node_traversal_time: u64,
    /// Route requests allowed per second.
    pub rreq_rate_limit: u32,
    /// Route errors allowed per second.
    pub rerr_rate_limit: u32,
    /// Lifetime granted to a route on each use, in milliseconds.
    pub active_route_timeout: u64,
    /// Keep-alive emission interval, in milliseconds.
    pub hello_interval: u64,
    /// Whether keep-alives are emitted at all.
    pub hello_enabled: bool,
    /// Keep-alive intervals a neighbor may miss before it is declared dead.
    pub allowed_hello_loss: u32,
    /// Global bound on deferred packets.
    pub max_queued_packets: usize,
    /// Per-destination bound on deferred packets.
    pub max_queued_per_dest: usize,
    /// How long a deferred packet may wait for a route, in milliseconds.
    pub queue_timeout: u64,
    /// Request gratuitous replies toward the destination.
    pub gratuitous_replies: bool,
    /// Demand that only the destination itself answers discoveries.
    pub dest_only: bool,
    /// Seed for the jitter RNG; a fixed seed makes runs reproducible.
    pub rng_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rreq_retries: 2,
            ttl_start: 1,
            ttl_increment: 2,
            ttl_threshold: 7,
            net_diameter: 35,
            node_traversal_time: 40,
            rreq_rate_limit: 10,
            rerr_rate_limit: 10,
            active_route_timeout: 3_000,
            hello_interval: 1_000,
            hello_enabled: true,
            allowed_hello_loss: 2,
            max_queued_packets: 64,
            max_queued_per_dest: 16,
            queue_timeout: 30_000,
            gratuitous_replies: true,
            dest_only: false,
            rng_seed: 0,
        }
    }
}

impl Config {
    /// Worst-case round trip across the whole network.
    pub fn net_traversal_time(&self) -> u64 {
        2 * self.node_traversal_time * self.net_diameter as u64
    }

    /// Worst-case round trip across a ring of the given scope.
    ///
    /// The additive constant absorbs processing slack at each end, per
    /// RFC 3561's `RING_TRAVERSAL_TIME` with `TIMEOUT_BUFFER = 2`.
    pub fn ring_traversal_time(&self, ttl: u8) -> u64 {
        2 * self.node_traversal_time * (ttl as u64 + 2)
    }

    /// Window during which a (originator, request id) pair is a duplicate.
    pub fn path_discovery_time(&self) -> u64 {
        2 * self.net_traversal_time()
    }

    /// Lifetime granted by a destination answering its own discovery.
    pub fn my_route_timeout(&self) -> u64 {
        2 * self.active_route_timeout
    }

    /// How long an invalidated entry lingers before deletion.
    pub fn delete_period(&self) -> u64 {
        5 * self.allowed_hello_loss as u64 * self.hello_interval
    }

    /// How long a suspected-unidirectional neighbor stays blacklisted.
    pub fn blacklist_timeout(&self) -> u64 {
        self.rreq_retries as u64 * self.net_traversal_time()
    }

    /// How long to wait for a reply acknowledgment from a next hop.
    pub fn next_hop_wait(&self) -> u64 {
        self.node_traversal_time + 10
    }

    /// How long a neighbor stays alive without any traffic from it.
    pub fn neighbor_validity(&self) -> u64 {
        self.allowed_hello_loss as u64 * self.hello_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.rreq_retries, 2);
        assert_eq!(cfg.ttl_start, 1);
        assert_eq!(cfg.ttl_increment, 2);
        assert_eq!(cfg.ttl_threshold, 7);
        assert_eq!(cfg.net_diameter, 35);
        assert_eq!(cfg.rreq_rate_limit, 10);
        assert_eq!(cfg.rerr_rate_limit, 10);
        assert_eq!(cfg.active_route_timeout, 3_000);
        assert_eq!(cfg.hello_interval, 1_000);
        assert_eq!(cfg.allowed_hello_loss, 2);
        assert_eq!(cfg.max_queued_packets, 64);
        assert_eq!(cfg.queue_timeout, 30_000);
    }

    #[test]
    fn derived_timings() {
        let cfg = Config::default();
        assert_eq!(cfg.net_traversal_time(), 2 * 40 * 35);
        assert_eq!(cfg.ring_traversal_time(1), 2 * 40 * 3);
        assert_eq!(cfg.ring_traversal_time(7), 2 * 40 * 9);
        assert_eq!(cfg.path_discovery_time(), 2 * cfg.net_traversal_time());
        assert_eq!(cfg.my_route_timeout(), 6_000);
        assert_eq!(cfg.delete_period(), 10_000);
        assert_eq!(cfg.neighbor_validity(), 2_000);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: Config = toml::from_str("rreq_retries = 5\nhello_enabled = false").unwrap();
        assert_eq!(cfg.rreq_retries, 5);
        assert!(!cfg.hello_enabled);
        // Everything else keeps its default.
        assert_eq!(cfg.net_diameter, 35);
        assert_eq!(cfg.queue_timeout, 30_000);
    }
}
