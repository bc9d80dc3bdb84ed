//! Common types for the ofctl OpenFlow control plane.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the codec and the flow-management daemon:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`DatapathId`]: OpenFlow switch (datapath) identifiers
//! - [`PortNo`]: switch port numbers, including the reserved pseudo-ports
//! - [`FlowRule`] / [`FlowMatch`] / [`FlowAction`]: the flow-rule data model

mod datapath;
mod flow;
mod mac;
mod port;

pub use datapath::DatapathId;
pub use flow::{
    priority, BufferId, EtherType, FlowAction, FlowMatch, FlowRule, IpProto,
};
pub use mac::MacAddress;
pub use port::PortNo;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid datapath id: {0}")]
    InvalidDatapathId(String),

    #[error("invalid port number: {0}")]
    InvalidPortNo(String),
}
