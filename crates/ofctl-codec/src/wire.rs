//! Byte-level helpers shared by the encoders and decoders.

use crate::error::{CodecError, CodecResult};
use byteorder::{BigEndian, ByteOrder};

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16) {
    let mut raw = [0u8; 2];
    BigEndian::write_u16(&mut raw, value);
    buf.extend_from_slice(&raw);
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    let mut raw = [0u8; 4];
    BigEndian::write_u32(&mut raw, value);
    buf.extend_from_slice(&raw);
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, value: u64) {
    let mut raw = [0u8; 8];
    BigEndian::write_u64(&mut raw, value);
    buf.extend_from_slice(&raw);
}

pub(crate) fn pad_to(buf: &mut Vec<u8>, alignment: usize) {
    while buf.len() % alignment != 0 {
        buf.push(0);
    }
}

pub(crate) fn get_u8(buf: &[u8], offset: usize, what: &'static str) -> CodecResult<u8> {
    buf.get(offset)
        .copied()
        .ok_or_else(|| CodecError::truncated(what, offset + 1, buf.len()))
}

pub(crate) fn get_u16(buf: &[u8], offset: usize, what: &'static str) -> CodecResult<u16> {
    let raw = buf
        .get(offset..offset + 2)
        .ok_or_else(|| CodecError::truncated(what, offset + 2, buf.len()))?;
    Ok(BigEndian::read_u16(raw))
}

pub(crate) fn get_u32(buf: &[u8], offset: usize, what: &'static str) -> CodecResult<u32> {
    let raw = buf
        .get(offset..offset + 4)
        .ok_or_else(|| CodecError::truncated(what, offset + 4, buf.len()))?;
    Ok(BigEndian::read_u32(raw))
}

pub(crate) fn get_u64(buf: &[u8], offset: usize, what: &'static str) -> CodecResult<u64> {
    let raw = buf
        .get(offset..offset + 8)
        .ok_or_else(|| CodecError::truncated(what, offset + 8, buf.len()))?;
    Ok(BigEndian::read_u64(raw))
}
