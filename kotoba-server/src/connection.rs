//! WebSocket connection admission control (spec §4.3, §5). Grounded on
//! `original_source/src/api/websocket.py`'s `ConnectionManager` (capacity
//! cap, 1008 close code) and `ferrex-server/src/infra/websocket/manager.rs`'s
//! `DashMap`-backed registry shape.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;

/// Caps concurrent `/ws` subscribers at `M` (`max_ws_connections`).
/// Connections beyond the cap are rejected with close code 1008.
pub struct ConnectionManager {
    active: DashSet<u64>,
    max_connections: usize,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            active: DashSet::new(),
            max_connections,
            next_id: AtomicU64::new(0),
        }
    }

    /// Attempts to admit a new connection. Returns `Some(id)` on success;
    /// `None` if the cap is already reached, in which case the caller
    /// must close the socket with code 1008 ("Maximum connections
    /// reached") without registering it.
    pub fn try_connect(&self) -> Option<u64> {
        if self.active.len() >= self.max_connections {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.active.insert(id);
        Some(id)
    }

    pub fn disconnect(&self, id: u64) {
        self.active.remove(&id);
    }

    pub fn count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_beyond_capacity() {
        let manager = ConnectionManager::new(2);
        let a = manager.try_connect();
        let b = manager.try_connect();
        let c = manager.try_connect();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
        assert_eq!(manager.count(), 2);
    }

    #[test]
    fn disconnect_frees_a_slot() {
        let manager = ConnectionManager::new(1);
        let id = manager.try_connect().unwrap();
        assert!(manager.try_connect().is_none());
        manager.disconnect(id);
        assert!(manager.try_connect().is_some());
    }
}
