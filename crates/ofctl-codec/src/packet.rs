//! Classification of raw Ethernet frames.
//!
//! The controller needs only a handful of header fields to make forwarding
//! and load-balancing decisions; this module extracts exactly those and
//! nothing else. Frames are never retained.

use crate::error::{CodecError, CodecResult};
use crate::wire::get_u16;
use ofctl_types::{EtherType, IpProto, MacAddress};
use std::net::Ipv4Addr;

const ETH_HEADER_LEN: usize = 14;
const IPV4_MIN_IHL: u8 = 5;

/// IPv4 header fields relevant to flow decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Info {
    /// Source address.
    pub src: Ipv4Addr,
    /// Destination address.
    pub dst: Ipv4Addr,
    /// Carried protocol.
    pub proto: IpProto,
}

/// The header fields extracted from one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedPacket {
    /// Source MAC address.
    pub eth_src: MacAddress,
    /// Destination MAC address.
    pub eth_dst: MacAddress,
    /// Ethernet frame type.
    pub eth_type: EtherType,
    /// IPv4 fields, present only for IPv4 frames.
    pub ipv4: Option<Ipv4Info>,
    /// Destination TCP port, present only for IPv4 TCP segments.
    pub tcp_dst: Option<u16>,
}

impl ClassifiedPacket {
    /// Returns the IPv4 info and destination TCP port when this is an
    /// IPv4 TCP segment.
    pub fn tcp_segment(&self) -> Option<(Ipv4Info, u16)> {
        match (self.ipv4, self.tcp_dst) {
            (Some(ipv4), Some(port)) if ipv4.proto == IpProto::TCP => Some((ipv4, port)),
            _ => None,
        }
    }
}

/// Outcome of classifying a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A frame the controller should act on.
    Frame(ClassifiedPacket),
    /// Link-layer discovery traffic (LLDP); dropped without further
    /// processing or logging.
    Discovery,
}

/// Parses the headers of a raw Ethernet frame.
///
/// IPv4 fields are populated only for EtherType 0x0800; the TCP
/// destination port only when the IP protocol is TCP. A frame whose
/// declared headers extend past the captured bytes is malformed.
pub fn classify(frame: &[u8]) -> CodecResult<Classification> {
    if frame.len() < ETH_HEADER_LEN {
        return Err(CodecError::truncated(
            "ethernet header",
            ETH_HEADER_LEN,
            frame.len(),
        ));
    }
    // from_slice cannot fail after the length check above.
    let eth_dst = MacAddress::from_slice(&frame[0..6])
        .ok_or_else(|| CodecError::truncated("ethernet header", 6, frame.len()))?;
    let eth_src = MacAddress::from_slice(&frame[6..12])
        .ok_or_else(|| CodecError::truncated("ethernet header", 12, frame.len()))?;
    let eth_type = EtherType::new(get_u16(frame, 12, "ethernet header")?);

    if eth_type == EtherType::LLDP {
        return Ok(Classification::Discovery);
    }

    let mut packet = ClassifiedPacket {
        eth_src,
        eth_dst,
        eth_type,
        ipv4: None,
        tcp_dst: None,
    };

    if eth_type == EtherType::IPV4 {
        let ip = frame
            .get(ETH_HEADER_LEN..)
            .filter(|rest| rest.len() >= 20)
            .ok_or_else(|| {
                CodecError::truncated("ipv4 header", ETH_HEADER_LEN + 20, frame.len())
            })?;

        let ihl = ip[0] & 0x0f;
        if ip[0] >> 4 != 4 || ihl < IPV4_MIN_IHL {
            return Err(CodecError::BadLength {
                what: "ipv4 header",
                len: ihl as usize,
            });
        }
        let header_len = ihl as usize * 4;
        if ip.len() < header_len {
            return Err(CodecError::truncated(
                "ipv4 options",
                ETH_HEADER_LEN + header_len,
                frame.len(),
            ));
        }

        let proto = IpProto::new(ip[9]);
        packet.ipv4 = Some(Ipv4Info {
            src: Ipv4Addr::new(ip[12], ip[13], ip[14], ip[15]),
            dst: Ipv4Addr::new(ip[16], ip[17], ip[18], ip[19]),
            proto,
        });

        if proto == IpProto::TCP {
            let tcp_at = ETH_HEADER_LEN + header_len;
            packet.tcp_dst = Some(get_u16(frame, tcp_at + 2, "tcp header")?);
        }
    }

    Ok(Classification::Frame(packet))
}
