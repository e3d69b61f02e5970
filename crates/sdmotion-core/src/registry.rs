//! `SubscriberRegistry`: the set of UDP peers currently subscribed to the
//! motion stream, keyed by address and port with TTL-based eviction.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Idle window after which a subscriber is evicted.
pub const SUBSCRIBER_TTL: Duration = Duration::from_secs(30);

/// A thread-safe set of UDP peers with last-seen timestamps and TTL
/// eviction, safe for one writer (the receive loop) and many readers (the
/// send loop) at once.
#[derive(Default)]
pub struct SubscriberRegistry {
    peers: RwLock<HashMap<SocketAddr, Instant>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh `addr`'s `last_seen` to now, inserting it if it wasn't
    /// already registered. Logs only on genuine insertions.
    pub fn touch(&self, addr: SocketAddr) {
        let now = Instant::now();
        let mut peers = self.peers.write();
        if peers.insert(addr, now).is_none() {
            debug!(%addr, "sdmotion-core: subscriber registered");
        }
    }

    /// Remove every entry idle for longer than [`SUBSCRIBER_TTL`].
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut peers = self.peers.write();
        peers.retain(|addr, last_seen| {
            let alive = now.saturating_duration_since(*last_seen) <= SUBSCRIBER_TTL;
            if !alive {
                debug!(%addr, "sdmotion-core: subscriber evicted");
            }
            alive
        });
    }

    /// A consistent, point-in-time snapshot of currently registered peers.
    pub fn snapshot(&self) -> Vec<SocketAddr> {
        self.peers.read().keys().copied().collect()
    }

    /// Number of currently registered peers, for diagnostics.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn touch_inserts_new_peer() {
        let registry = SubscriberRegistry::new();
        registry.touch(addr(1000));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot(), vec![addr(1000)]);
    }

    #[test]
    fn touch_is_idempotent_on_membership() {
        let registry = SubscriberRegistry::new();
        registry.touch(addr(1000));
        registry.touch(addr(1000));
        registry.touch(addr(1000));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_ports_are_distinct_peers() {
        let registry = SubscriberRegistry::new();
        registry.touch(addr(1000));
        registry.touch(addr(1001));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn sweep_evicts_only_stale_entries() {
        let registry = SubscriberRegistry {
            peers: RwLock::new(HashMap::from([
                (addr(1000), Instant::now()),
                (addr(1001), Instant::now() - SUBSCRIBER_TTL - Duration::from_secs(1)),
            ])),
        };
        registry.sweep();
        let remaining = registry.snapshot();
        assert_eq!(remaining, vec![addr(1000)]);
    }

    #[test]
    fn snapshot_reflects_current_membership() {
        let registry = SubscriberRegistry::new();
        registry.touch(addr(1000));
        registry.touch(addr(1001));
        let mut snapshot = registry.snapshot();
        snapshot.sort();
        let mut expected = vec![addr(1000), addr(1001)];
        expected.sort();
        assert_eq!(snapshot, expected);
    }
}
