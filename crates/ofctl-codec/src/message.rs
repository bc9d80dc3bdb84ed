//! OpenFlow message header and the control messages the channel exchanges.

use crate::error::{CodecError, CodecResult};
use crate::oxm::{field, OxmIter, OXM_CLASS_OPENFLOW_BASIC};
use crate::wire::{get_u16, get_u32, get_u64, get_u8, put_u16, put_u32};
use byteorder::{BigEndian, ByteOrder};
use ofctl_types::{BufferId, DatapathId, PortNo};

/// The OpenFlow protocol version this codec speaks (1.3).
pub const OFP_VERSION: u8 = 0x04;

/// OpenFlow message types in use by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    PacketIn = 10,
    PacketOut = 13,
    FlowMod = 14,
}

impl MsgType {
    /// Maps a wire value to a known message type.
    ///
    /// Unknown types return `None`; the channel skips those by length.
    pub fn from_u8(raw: u8) -> Option<MsgType> {
        match raw {
            0 => Some(MsgType::Hello),
            1 => Some(MsgType::Error),
            2 => Some(MsgType::EchoRequest),
            3 => Some(MsgType::EchoReply),
            5 => Some(MsgType::FeaturesRequest),
            6 => Some(MsgType::FeaturesReply),
            10 => Some(MsgType::PacketIn),
            13 => Some(MsgType::PacketOut),
            14 => Some(MsgType::FlowMod),
            _ => None,
        }
    }

    /// Returns the wire value.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The fixed 8-byte header every OpenFlow message starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Wire protocol version.
    pub version: u8,
    /// Raw message type (may be one this codec does not model).
    pub msg_type: u8,
    /// Total message length including this header.
    pub length: u16,
    /// Transaction id echoed by replies.
    pub xid: u32,
}

impl Header {
    /// Header size on the wire.
    pub const SIZE: usize = 8;

    /// Parses a header from the start of `buf`.
    pub fn parse(buf: &[u8]) -> CodecResult<Header> {
        let version = get_u8(buf, 0, "message header")?;
        let msg_type = get_u8(buf, 1, "message header")?;
        let length = get_u16(buf, 2, "message header")?;
        let xid = get_u32(buf, 4, "message header")?;
        if (length as usize) < Header::SIZE {
            return Err(CodecError::BadLength {
                what: "message header",
                len: length as usize,
            });
        }
        Ok(Header {
            version,
            msg_type,
            length,
            xid,
        })
    }

    /// Number of body bytes following the header.
    pub fn body_len(&self) -> usize {
        self.length as usize - Header::SIZE
    }
}

/// Starts an encoded message: header with a placeholder length.
fn begin(buf: &mut Vec<u8>, msg_type: MsgType, xid: u32) {
    buf.push(OFP_VERSION);
    buf.push(msg_type.as_u8());
    put_u16(buf, 0); // patched by finish()
    put_u32(buf, xid);
}

/// Patches the length field once the body is complete.
fn finish(buf: &mut [u8]) {
    let total = buf.len() as u16;
    BigEndian::write_u16(&mut buf[2..4], total);
}

/// Encodes an OFPT_HELLO with no elements.
pub fn hello(xid: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(Header::SIZE);
    begin(&mut buf, MsgType::Hello, xid);
    finish(&mut buf);
    buf
}

/// Encodes an OFPT_ECHO_REPLY echoing the request payload.
pub fn echo_reply(xid: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(Header::SIZE + payload.len());
    begin(&mut buf, MsgType::EchoReply, xid);
    buf.extend_from_slice(payload);
    finish(&mut buf);
    buf
}

/// Encodes an OFPT_FEATURES_REQUEST.
pub fn features_request(xid: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(Header::SIZE);
    begin(&mut buf, MsgType::FeaturesRequest, xid);
    finish(&mut buf);
    buf
}

/// A decoded OFPT_FEATURES_REPLY body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturesReply {
    /// The switch's datapath id.
    pub datapath_id: DatapathId,
    /// Number of packet buffers the switch offers.
    pub n_buffers: u32,
    /// Number of flow tables.
    pub n_tables: u8,
}

impl FeaturesReply {
    /// Parses the body (bytes after the header).
    pub fn parse(body: &[u8]) -> CodecResult<FeaturesReply> {
        let datapath_id = get_u64(body, 0, "features reply")?;
        let n_buffers = get_u32(body, 8, "features reply")?;
        let n_tables = get_u8(body, 12, "features reply")?;
        Ok(FeaturesReply {
            datapath_id: DatapathId::new(datapath_id),
            n_buffers,
            n_tables,
        })
    }
}

/// A decoded OFPT_PACKET_IN body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketInMsg {
    /// Buffer reference, when the switch queued the packet.
    pub buffer_id: Option<BufferId>,
    /// Full length of the frame as seen by the switch; the captured
    /// `data` may be shorter.
    pub total_len: u16,
    /// Reason the packet was sent up (table miss, action, ...).
    pub reason: u8,
    /// Ingress port, taken from the embedded match.
    pub in_port: PortNo,
    /// Captured frame bytes.
    pub data: Vec<u8>,
}

impl PacketInMsg {
    /// Parses the body (bytes after the header).
    pub fn parse(body: &[u8]) -> CodecResult<PacketInMsg> {
        let buffer_raw = get_u32(body, 0, "packet-in")?;
        let total_len = get_u16(body, 4, "packet-in")?;
        let reason = get_u8(body, 6, "packet-in")?;

        let match_len = get_u16(body, 18, "packet-in match")? as usize;
        if match_len < 4 {
            return Err(CodecError::BadLength {
                what: "packet-in match",
                len: match_len,
            });
        }
        let oxm_area = body
            .get(20..16 + match_len)
            .ok_or_else(|| CodecError::truncated("packet-in match", 16 + match_len, body.len()))?;

        let mut in_port = None;
        for oxm in OxmIter::new(oxm_area) {
            let oxm = oxm?;
            if oxm.class == OXM_CLASS_OPENFLOW_BASIC
                && oxm.field == field::IN_PORT
                && !oxm.has_mask
                && oxm.value.len() == 4
            {
                in_port = Some(PortNo::new(BigEndian::read_u32(oxm.value)));
            }
        }
        let in_port = in_port.ok_or(CodecError::MissingField("packet-in in_port"))?;

        // The match is padded to 8 bytes and followed by 2 pad bytes.
        let data_at = 16 + (match_len + 7) / 8 * 8 + 2;
        let data = body
            .get(data_at..)
            .ok_or_else(|| CodecError::truncated("packet-in payload", data_at, body.len()))?
            .to_vec();

        Ok(PacketInMsg {
            buffer_id: BufferId::from_raw(buffer_raw),
            total_len,
            reason,
            in_port,
            data,
        })
    }
}
