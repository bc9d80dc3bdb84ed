//! Switch port numbers, including the OpenFlow reserved pseudo-ports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An OpenFlow port number.
///
/// Physical ports are numbered from 1. Values at and above
/// [`PortNo::MAX_PHYSICAL`] are reserved pseudo-ports with special
/// forwarding semantics ([`PortNo::FLOOD`], [`PortNo::CONTROLLER`], ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNo(u32);

impl PortNo {
    /// Highest assignable physical port number (OFPP_MAX).
    pub const MAX_PHYSICAL: PortNo = PortNo(0xffff_ff00);

    /// The switch-local port (OFPP_LOCAL).
    pub const LOCAL: PortNo = PortNo(0xffff_fffe);

    /// Flood to all ports except the ingress port (OFPP_FLOOD).
    pub const FLOOD: PortNo = PortNo(0xffff_fffb);

    /// Send to the controller (OFPP_CONTROLLER).
    pub const CONTROLLER: PortNo = PortNo(0xffff_fffd);

    /// Wildcard port used in flow-mod out_port fields (OFPP_ANY).
    pub const ANY: PortNo = PortNo(0xffff_ffff);

    /// Creates a port number from its raw value.
    pub const fn new(raw: u32) -> Self {
        PortNo(raw)
    }

    /// Returns the raw 32-bit value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns true if this is a reserved pseudo-port.
    pub const fn is_reserved(&self) -> bool {
        self.0 >= Self::MAX_PHYSICAL.0
    }

    /// Returns true if this is the flood pseudo-port.
    pub const fn is_flood(&self) -> bool {
        self.0 == Self::FLOOD.0
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PortNo::FLOOD => write!(f, "FLOOD"),
            PortNo::CONTROLLER => write!(f, "CONTROLLER"),
            PortNo::LOCAL => write!(f, "LOCAL"),
            PortNo::ANY => write!(f, "ANY"),
            PortNo(n) => write!(f, "{}", n),
        }
    }
}

impl From<u32> for PortNo {
    fn from(raw: u32) -> Self {
        PortNo(raw)
    }
}
