//! Per-switch MAC learning table.

use ofctl_types::{MacAddress, PortNo};
use std::collections::HashMap;

/// Maps learned host addresses to the port they were last seen on.
///
/// One table exists per switch. Observations overwrite unconditionally, so
/// a host that moves ports is re-learned on its next packet. Entries are
/// never aged out; the table lives exactly as long as the switch's
/// connection.
#[derive(Debug, Clone, Default)]
pub struct MacLearningTable {
    entries: HashMap<MacAddress, PortNo>,
}

impl MacLearningTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        MacLearningTable {
            entries: HashMap::new(),
        }
    }

    /// Records that `mac` was seen on `port`, replacing any prior
    /// observation.
    pub fn record(&mut self, mac: MacAddress, port: PortNo) {
        self.entries.insert(mac, port);
    }

    /// Returns the port `mac` was last seen on.
    ///
    /// A miss is an ordinary outcome (the caller floods), not an error.
    pub fn lookup(&self, mac: &MacAddress) -> Option<PortNo> {
        self.entries.get(mac).copied()
    }

    /// Number of learned addresses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been learned yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
