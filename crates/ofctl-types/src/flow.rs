//! The flow-rule data model: match predicates, actions, and rule priorities.

use crate::{MacAddress, PortNo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Rule priorities used by the flow manager.
///
/// Higher priority wins on overlapping matches. The three tiers are spaced
/// so that load-balancer rewrites always beat learned unicast forwarding,
/// which in turn beats the table-miss fallback.
pub mod priority {
    /// Catch-all table-miss rule routing unmatched traffic to the controller.
    pub const TABLE_MISS: u16 = 0;
    /// Learned unicast forwarding rule.
    pub const LEARNED: u16 = 10;
    /// Load-balancer rewrite rule (forward and reverse).
    pub const LOAD_BALANCER: u16 = 20;
}

/// An Ethernet frame type (EtherType) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EtherType(u16);

impl EtherType {
    /// IPv4 (0x0800).
    pub const IPV4: EtherType = EtherType(0x0800);
    /// ARP (0x0806).
    pub const ARP: EtherType = EtherType(0x0806);
    /// IPv6 (0x86dd).
    pub const IPV6: EtherType = EtherType(0x86dd);
    /// LLDP topology announcements (0x88cc).
    pub const LLDP: EtherType = EtherType(0x88cc);

    /// Creates an EtherType from its raw value.
    pub const fn new(raw: u16) -> Self {
        EtherType(raw)
    }

    /// Returns the raw 16-bit value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// An IP protocol number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IpProto(u8);

impl IpProto {
    /// ICMP (1).
    pub const ICMP: IpProto = IpProto(1);
    /// TCP (6).
    pub const TCP: IpProto = IpProto(6);
    /// UDP (17).
    pub const UDP: IpProto = IpProto(17);

    /// Creates a protocol number from its raw value.
    pub const fn new(raw: u8) -> Self {
        IpProto(raw)
    }

    /// Returns the raw 8-bit value.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for IpProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference to a packet buffered at the switch.
///
/// Carried by packet-in events when the switch queued the triggering frame
/// instead of sending it in full. Supplying the reference with a flow
/// installation makes the switch replay the buffered packet through the
/// newly installed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u32);

impl BufferId {
    /// Wire value meaning "no buffered packet" (OFP_NO_BUFFER).
    pub const NO_BUFFER_RAW: u32 = 0xffff_ffff;

    /// Creates a buffer reference from a raw wire value.
    ///
    /// Returns `None` for the reserved "no buffer" value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        if raw == Self::NO_BUFFER_RAW {
            None
        } else {
            Some(BufferId(raw))
        }
    }

    /// Returns the raw 32-bit value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// A partial match predicate over packet header fields.
///
/// Unset fields are wildcards. An all-default match matches every packet
/// (the table-miss predicate).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMatch {
    /// Ingress port.
    pub in_port: Option<PortNo>,
    /// Exact source MAC address.
    pub eth_src: Option<MacAddress>,
    /// Exact destination MAC address.
    pub eth_dst: Option<MacAddress>,
    /// Ethernet frame type.
    pub eth_type: Option<EtherType>,
    /// IP protocol number. Requires `eth_type` = IPv4.
    pub ip_proto: Option<IpProto>,
    /// Source IPv4 address. Requires `eth_type` = IPv4.
    pub ipv4_src: Option<Ipv4Addr>,
    /// Destination IPv4 address. Requires `eth_type` = IPv4.
    pub ipv4_dst: Option<Ipv4Addr>,
    /// Destination TCP port. Requires `ip_proto` = TCP.
    pub tcp_dst: Option<u16>,
}

impl FlowMatch {
    /// Creates an empty (match-everything) predicate.
    pub fn any() -> Self {
        FlowMatch::default()
    }

    /// Returns true if no field is constrained.
    pub fn is_any(&self) -> bool {
        *self == FlowMatch::default()
    }

    /// Sets the ingress port.
    pub fn with_in_port(mut self, port: PortNo) -> Self {
        self.in_port = Some(port);
        self
    }

    /// Sets the exact source MAC address.
    pub fn with_eth_src(mut self, mac: MacAddress) -> Self {
        self.eth_src = Some(mac);
        self
    }

    /// Sets the exact destination MAC address.
    pub fn with_eth_dst(mut self, mac: MacAddress) -> Self {
        self.eth_dst = Some(mac);
        self
    }

    /// Sets the Ethernet frame type.
    pub fn with_eth_type(mut self, eth_type: EtherType) -> Self {
        self.eth_type = Some(eth_type);
        self
    }

    /// Sets the IP protocol number.
    pub fn with_ip_proto(mut self, proto: IpProto) -> Self {
        self.ip_proto = Some(proto);
        self
    }

    /// Sets the source IPv4 address.
    pub fn with_ipv4_src(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4_src = Some(addr);
        self
    }

    /// Sets the destination IPv4 address.
    pub fn with_ipv4_dst(mut self, addr: Ipv4Addr) -> Self {
        self.ipv4_dst = Some(addr);
        self
    }

    /// Sets the destination TCP port.
    pub fn with_tcp_dst(mut self, port: u16) -> Self {
        self.tcp_dst = Some(port);
        self
    }
}

/// A single action applied to matching packets, in list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    /// Forward out of the given port (physical or pseudo-port).
    Output(PortNo),
    /// Rewrite the destination IPv4 address.
    SetIpv4Dst(Ipv4Addr),
    /// Rewrite the source IPv4 address.
    SetIpv4Src(Ipv4Addr),
}

/// A flow rule: priority, match predicate, and ordered action list.
///
/// Rules are installed idempotently; re-installing an equivalent rule
/// replaces the previous one on the switch. Among overlapping matches the
/// higher priority wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    /// Rule priority; see [`priority`] for the tiers in use.
    pub priority: u16,
    /// Match predicate.
    pub matches: FlowMatch,
    /// Actions applied in order to matching packets.
    pub actions: Vec<FlowAction>,
}

impl FlowRule {
    /// Creates a new flow rule.
    pub fn new(priority: u16, matches: FlowMatch, actions: Vec<FlowAction>) -> Self {
        FlowRule {
            priority,
            matches,
            actions,
        }
    }

    /// The catch-all table-miss rule: match everything, punt to the
    /// controller without truncation.
    pub fn table_miss() -> Self {
        FlowRule::new(
            priority::TABLE_MISS,
            FlowMatch::any(),
            vec![FlowAction::Output(PortNo::CONTROLLER)],
        )
    }
}
