//! FLOW_MOD and PACKET_OUT encoding.
//!
//! Rules always go to table 0 as OFPFC_ADD with no timeouts, matching the
//! controller's install-and-forget rule lifecycle. Matches are emitted as
//! OXM TLVs in field-number order, which also satisfies the OpenFlow 1.3
//! prerequisite ordering (eth_type before ip_proto before the IPv4 and TCP
//! fields).

use crate::message::{Header, MsgType, OFP_VERSION};
use crate::oxm;
use crate::wire::{pad_to, put_u16, put_u32, put_u64};
use byteorder::{BigEndian, ByteOrder};
use ofctl_types::{BufferId, FlowAction, FlowMatch, FlowRule, PortNo};

/// Flow-mod command: add a new rule (OFPFC_ADD).
const OFPFC_ADD: u8 = 0;

/// Instruction type: apply the action list immediately.
const OFPIT_APPLY_ACTIONS: u16 = 4;

/// Action types.
const OFPAT_OUTPUT: u16 = 0;
const OFPAT_SET_FIELD: u16 = 25;

/// Controller max_len value requesting the full frame (OFPCML_NO_BUFFER).
const OFPCML_NO_BUFFER: u16 = 0xffff;
/// Default max_len for non-controller output ports (OFPCML_MAX).
const OFPCML_MAX: u16 = 0xffe5;

/// Group wildcard for flow-mod out_group (OFPG_ANY).
const OFPG_ANY: u32 = 0xffff_ffff;

/// Encodes an OFPT_FLOW_MOD installing `rule` on table 0.
///
/// When `buffer` is supplied, the switch replays the referenced buffered
/// packet through the new rule, so no separate packet-out is needed for
/// the triggering frame.
pub fn flow_mod(xid: u32, rule: &FlowRule, buffer: Option<BufferId>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(96);
    buf.push(OFP_VERSION);
    buf.push(MsgType::FlowMod.as_u8());
    put_u16(&mut buf, 0); // length, patched below
    put_u32(&mut buf, xid);

    put_u64(&mut buf, 0); // cookie
    put_u64(&mut buf, 0); // cookie_mask
    buf.push(0); // table_id
    buf.push(OFPFC_ADD);
    put_u16(&mut buf, 0); // idle_timeout
    put_u16(&mut buf, 0); // hard_timeout
    put_u16(&mut buf, rule.priority);
    put_u32(
        &mut buf,
        buffer.map_or(BufferId::NO_BUFFER_RAW, |b| b.as_u32()),
    );
    put_u32(&mut buf, PortNo::ANY.as_u32()); // out_port
    put_u32(&mut buf, OFPG_ANY); // out_group
    put_u16(&mut buf, 0); // flags
    put_u16(&mut buf, 0); // pad

    encode_match(&mut buf, &rule.matches);

    // Single apply-actions instruction wrapping the action list.
    let inst_at = buf.len();
    put_u16(&mut buf, OFPIT_APPLY_ACTIONS);
    put_u16(&mut buf, 0); // patched below
    put_u32(&mut buf, 0); // pad
    encode_actions(&mut buf, &rule.actions);
    let inst_len = (buf.len() - inst_at) as u16;
    BigEndian::write_u16(&mut buf[inst_at + 2..inst_at + 4], inst_len);

    patch_length(&mut buf);
    buf
}

/// Encodes an OFPT_PACKET_OUT sending one frame through `actions`.
///
/// With a buffer reference the switch replays its queued copy and `data`
/// is omitted from the wire; otherwise the frame travels in the message.
pub fn packet_out(
    xid: u32,
    in_port: PortNo,
    buffer: Option<BufferId>,
    actions: &[FlowAction],
    data: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(Header::SIZE + 24 + data.len());
    buf.push(OFP_VERSION);
    buf.push(MsgType::PacketOut.as_u8());
    put_u16(&mut buf, 0); // length, patched below
    put_u32(&mut buf, xid);

    put_u32(
        &mut buf,
        buffer.map_or(BufferId::NO_BUFFER_RAW, |b| b.as_u32()),
    );
    put_u32(&mut buf, in_port.as_u32());

    let actions_len_at = buf.len();
    put_u16(&mut buf, 0); // actions_len, patched below
    buf.extend_from_slice(&[0; 6]); // pad
    let actions_at = buf.len();
    encode_actions(&mut buf, actions);
    let actions_len = (buf.len() - actions_at) as u16;
    BigEndian::write_u16(
        &mut buf[actions_len_at..actions_len_at + 2],
        actions_len,
    );

    if buffer.is_none() {
        buf.extend_from_slice(data);
    }

    patch_length(&mut buf);
    buf
}

fn patch_length(buf: &mut [u8]) {
    let total = buf.len() as u16;
    BigEndian::write_u16(&mut buf[2..4], total);
}

/// Appends an ofp_match with the set fields as OXM TLVs, 8-byte padded.
fn encode_match(buf: &mut Vec<u8>, matches: &FlowMatch) {
    let match_at = buf.len();
    put_u16(buf, 1); // OFPMT_OXM
    put_u16(buf, 0); // length, patched below

    if let Some(port) = matches.in_port {
        oxm::push(buf, oxm::field::IN_PORT, &port.as_u32().to_be_bytes());
    }
    if let Some(mac) = matches.eth_dst {
        oxm::push(buf, oxm::field::ETH_DST, mac.as_bytes());
    }
    if let Some(mac) = matches.eth_src {
        oxm::push(buf, oxm::field::ETH_SRC, mac.as_bytes());
    }
    if let Some(eth_type) = matches.eth_type {
        oxm::push(buf, oxm::field::ETH_TYPE, &eth_type.as_u16().to_be_bytes());
    }
    if let Some(proto) = matches.ip_proto {
        oxm::push(buf, oxm::field::IP_PROTO, &[proto.as_u8()]);
    }
    if let Some(addr) = matches.ipv4_src {
        oxm::push(buf, oxm::field::IPV4_SRC, &addr.octets());
    }
    if let Some(addr) = matches.ipv4_dst {
        oxm::push(buf, oxm::field::IPV4_DST, &addr.octets());
    }
    if let Some(port) = matches.tcp_dst {
        oxm::push(buf, oxm::field::TCP_DST, &port.to_be_bytes());
    }

    // Length covers type, length, and TLVs; padding is excluded.
    let match_len = (buf.len() - match_at) as u16;
    BigEndian::write_u16(&mut buf[match_at + 2..match_at + 4], match_len);
    pad_to(buf, 8);
}

/// Appends the encoded action list.
fn encode_actions(buf: &mut Vec<u8>, actions: &[FlowAction]) {
    for action in actions {
        match action {
            FlowAction::Output(port) => {
                put_u16(buf, OFPAT_OUTPUT);
                put_u16(buf, 16);
                put_u32(buf, port.as_u32());
                // Only controller-bound output respects max_len; ask for
                // the full frame there, default elsewhere.
                let max_len = if *port == PortNo::CONTROLLER {
                    OFPCML_NO_BUFFER
                } else {
                    OFPCML_MAX
                };
                put_u16(buf, max_len);
                buf.extend_from_slice(&[0; 6]);
            }
            FlowAction::SetIpv4Dst(addr) => {
                encode_set_field(buf, oxm::field::IPV4_DST, &addr.octets());
            }
            FlowAction::SetIpv4Src(addr) => {
                encode_set_field(buf, oxm::field::IPV4_SRC, &addr.octets());
            }
        }
    }
}

/// Appends an OFPAT_SET_FIELD action carrying one OXM TLV.
fn encode_set_field(buf: &mut Vec<u8>, field: u8, payload: &[u8]) {
    let action_at = buf.len();
    put_u16(buf, OFPAT_SET_FIELD);
    put_u16(buf, 0); // patched below
    oxm::push(buf, field, payload);
    pad_to(buf, 8);
    let action_len = (buf.len() - action_at) as u16;
    BigEndian::write_u16(&mut buf[action_at + 2..action_at + 4], action_len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{get_u16, get_u32};
    use ofctl_types::{priority, EtherType, IpProto};
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    // Body offsets within an encoded flow-mod, after the 8-byte header.
    const PRIORITY_AT: usize = 8 + 22;
    const BUFFER_AT: usize = 8 + 24;
    const MATCH_AT: usize = 8 + 40;

    #[test]
    fn test_table_miss_flow_mod_layout() {
        let msg = flow_mod(1, &FlowRule::table_miss(), None);
        let header = Header::parse(&msg).unwrap();
        assert_eq!(header.version, OFP_VERSION);
        assert_eq!(header.msg_type, MsgType::FlowMod.as_u8());
        assert_eq!(header.length as usize, msg.len());

        assert_eq!(get_u16(&msg, PRIORITY_AT, "t").unwrap(), priority::TABLE_MISS);
        assert_eq!(
            get_u32(&msg, BUFFER_AT, "t").unwrap(),
            BufferId::NO_BUFFER_RAW
        );

        // Empty match: type 1, length 4, padded to 8.
        assert_eq!(get_u16(&msg, MATCH_AT, "t").unwrap(), 1);
        assert_eq!(get_u16(&msg, MATCH_AT + 2, "t").unwrap(), 4);

        // Apply-actions instruction with a single 16-byte output action
        // requesting the full frame at the controller.
        let inst_at = MATCH_AT + 8;
        assert_eq!(get_u16(&msg, inst_at, "t").unwrap(), OFPIT_APPLY_ACTIONS);
        assert_eq!(get_u16(&msg, inst_at + 2, "t").unwrap(), 8 + 16);
        let action_at = inst_at + 8;
        assert_eq!(get_u16(&msg, action_at, "t").unwrap(), OFPAT_OUTPUT);
        assert_eq!(
            get_u32(&msg, action_at + 4, "t").unwrap(),
            PortNo::CONTROLLER.as_u32()
        );
        assert_eq!(get_u16(&msg, action_at + 8, "t").unwrap(), OFPCML_NO_BUFFER);
    }

    #[test]
    fn test_flow_mod_carries_buffer_id() {
        let rule = FlowRule::new(
            priority::LEARNED,
            FlowMatch::any().with_in_port(PortNo::new(3)),
            vec![FlowAction::Output(PortNo::new(1))],
        );
        let msg = flow_mod(2, &rule, BufferId::from_raw(77));
        assert_eq!(get_u16(&msg, PRIORITY_AT, "t").unwrap(), priority::LEARNED);
        assert_eq!(get_u32(&msg, BUFFER_AT, "t").unwrap(), 77);
    }

    #[test]
    fn test_match_oxm_prerequisite_order() {
        let matches = FlowMatch::any()
            .with_tcp_dst(8080)
            .with_ipv4_dst(Ipv4Addr::new(10, 0, 0, 100))
            .with_ip_proto(IpProto::TCP)
            .with_eth_type(EtherType::IPV4)
            .with_in_port(PortNo::new(2));
        let rule = FlowRule::new(priority::LOAD_BALANCER, matches, vec![]);
        let msg = flow_mod(3, &rule, None);

        // in_port(4) + eth_type(2) + ip_proto(1) + ipv4_dst(4) + tcp_dst(2)
        // with 4-byte TLV headers: 4 + 20 + 13 = 37.
        assert_eq!(get_u16(&msg, MATCH_AT + 2, "t").unwrap(), 37);

        let fields: Vec<u8> = {
            let area = &msg[MATCH_AT + 4..MATCH_AT + 37];
            crate::oxm::OxmIter::new(area)
                .map(|o| o.unwrap().field)
                .collect()
        };
        assert_eq!(
            fields,
            vec![
                oxm::field::IN_PORT,
                oxm::field::ETH_TYPE,
                oxm::field::IP_PROTO,
                oxm::field::IPV4_DST,
                oxm::field::TCP_DST,
            ]
        );
    }

    #[test]
    fn test_set_field_action_padded() {
        let rule = FlowRule::new(
            priority::LOAD_BALANCER,
            FlowMatch::any(),
            vec![
                FlowAction::SetIpv4Dst(Ipv4Addr::new(10, 0, 0, 101)),
                FlowAction::Output(PortNo::new(1)),
            ],
        );
        let msg = flow_mod(4, &rule, None);

        // Empty match occupies 8 bytes; instruction header 8 bytes.
        let action_at = MATCH_AT + 8 + 8;
        assert_eq!(get_u16(&msg, action_at, "t").unwrap(), OFPAT_SET_FIELD);
        // 4 header + 8 oxm, padded to 16.
        assert_eq!(get_u16(&msg, action_at + 2, "t").unwrap(), 16);
        assert_eq!(&msg[action_at + 8..action_at + 12], &[10, 0, 0, 101]);

        let output_at = action_at + 16;
        assert_eq!(get_u16(&msg, output_at, "t").unwrap(), OFPAT_OUTPUT);
        assert_eq!(get_u16(&msg, output_at + 8, "t").unwrap(), OFPCML_MAX);
    }

    #[test]
    fn test_packet_out_with_data() {
        let frame = [0xaa, 0xbb, 0xcc];
        let msg = packet_out(
            5,
            PortNo::new(3),
            None,
            &[FlowAction::Output(PortNo::FLOOD)],
            &frame,
        );
        let header = Header::parse(&msg).unwrap();
        assert_eq!(header.msg_type, MsgType::PacketOut.as_u8());
        assert_eq!(header.length as usize, msg.len());

        assert_eq!(get_u32(&msg, 8, "t").unwrap(), BufferId::NO_BUFFER_RAW);
        assert_eq!(get_u32(&msg, 12, "t").unwrap(), 3);
        assert_eq!(get_u16(&msg, 16, "t").unwrap(), 16); // one output action
        let action_at = 8 + 16;
        assert_eq!(
            get_u32(&msg, action_at + 4, "t").unwrap(),
            PortNo::FLOOD.as_u32()
        );
        assert_eq!(&msg[msg.len() - 3..], &frame);
    }

    #[test]
    fn test_packet_out_buffered_omits_data() {
        let frame = [0xaa, 0xbb, 0xcc];
        let msg = packet_out(
            6,
            PortNo::new(3),
            BufferId::from_raw(9),
            &[FlowAction::Output(PortNo::FLOOD)],
            &frame,
        );
        assert_eq!(get_u32(&msg, 8, "t").unwrap(), 9);
        // Header + packet-out fixed part + one action, no payload.
        assert_eq!(msg.len(), 8 + 16 + 16);
    }
}
