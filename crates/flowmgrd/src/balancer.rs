//! Round-robin backend selection for the virtual service.

use ofctl_types::{MacAddress, PortNo};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// One real server fronted by the virtual service address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// The backend's real IP address.
    pub ip: Ipv4Addr,
    /// The backend's MAC address.
    pub mac: MacAddress,
    /// The switch port the backend is attached to.
    pub port: PortNo,
}

/// Round-robin selector over the configured backend pool.
///
/// The cursor is the only mutable state and is advanced under a mutex so
/// that selection and advance are one atomic unit: concurrent callers from
/// different switch event streams never observe a duplicated or skipped
/// backend.
#[derive(Debug)]
pub struct LoadBalancer {
    backends: Vec<Backend>,
    cursor: Mutex<usize>,
}

impl LoadBalancer {
    /// Creates a selector over `backends`, in pool order.
    ///
    /// The pool must not be empty; configuration validation enforces this
    /// before construction.
    pub fn new(backends: Vec<Backend>) -> Self {
        assert!(!backends.is_empty(), "backend pool must not be empty");
        LoadBalancer {
            backends,
            cursor: Mutex::new(0),
        }
    }

    /// Returns the next backend in pool order, wrapping at the end.
    ///
    /// The very first call returns the first configured backend.
    pub fn select(&self) -> Backend {
        let mut cursor = self.cursor.lock();
        let backend = self.backends[*cursor];
        *cursor = (*cursor + 1) % self.backends.len();
        backend
    }

    /// The configured pool, in selection order.
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }
}
