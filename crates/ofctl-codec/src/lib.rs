//! OpenFlow 1.3 wire codec subset and Ethernet frame classification.
//!
//! This crate carries exactly the message surface the flow manager speaks:
//!
//! - [`message`]: header handling plus HELLO / ECHO / FEATURES messages and
//!   PACKET_IN decoding
//! - [`flow_mod`]: FLOW_MOD and PACKET_OUT encoding, including OXM match
//!   serialization with OpenFlow prerequisite ordering
//! - [`packet`]: classification of raw Ethernet frames into the header
//!   fields the controller bases decisions on
//!
//! The codec is pure: no sockets, no logging, no state. All multi-byte
//! fields are network byte order.

pub mod error;
pub mod flow_mod;
pub mod message;
mod oxm;
pub mod packet;
mod wire;

pub use error::{CodecError, CodecResult};
pub use flow_mod::{flow_mod, packet_out};
pub use message::{
    echo_reply, features_request, hello, FeaturesReply, Header, MsgType, PacketInMsg,
    OFP_VERSION,
};
pub use packet::{classify, Classification, ClassifiedPacket, Ipv4Info};
