//! Wire primitives: big-endian scalar reads/writes and protocol errors.
//!
//! The stream has no length framing, so every field must be consumed
//! exactly. All integers and floats are big-endian; strings are an `i16`
//! byte count followed by that many UTF-8 bytes.

use std::io::{Read, Write};
use thiserror::Error;

/// Hard cap on any single variable-length payload (compressed chunk data,
/// strings). A peer claiming more than this is treated as malformed.
pub const MAX_PAYLOAD: usize = 1 << 20;

/// Errors raised by the codec. Every variant is fatal to the connection
/// that produced it; the stream cannot be re-synchronised.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error on connection")]
    Io(#[from] std::io::Error),
    #[error("unknown packet id {0:#04x}")]
    UnknownPacketId(u8),
    #[error("expected packet id {expected:#04x}, got {got:#04x}")]
    UnexpectedPacketId { expected: u8, got: u8 },
    #[error("unsupported protocol version {got} (expected {expected})")]
    VersionMismatch { expected: i32, got: i32 },
    #[error("string field is not valid UTF-8")]
    InvalidString,
    #[error("negative length {0} in packet field")]
    NegativeLength(i32),
    #[error("payload of {0} bytes exceeds the per-packet limit")]
    PayloadTooLarge(usize),
    #[error("invalid value {value} for {field}")]
    InvalidField { field: &'static str, value: i32 },
}

impl ProtocolError {
    /// True when the error only means "not enough bytes buffered yet",
    /// which an incremental decoder treats as "wait for more input".
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8, ProtocolError> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

pub fn read_i8<R: Read>(r: &mut R) -> Result<i8, ProtocolError> {
    Ok(read_u8(r)? as i8)
}

pub fn read_i16<R: Read>(r: &mut R) -> Result<i16, ProtocolError> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    Ok(i16::from_be_bytes(b))
}

pub fn read_i32<R: Read>(r: &mut R) -> Result<i32, ProtocolError> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(i32::from_be_bytes(b))
}

pub fn read_i64<R: Read>(r: &mut R) -> Result<i64, ProtocolError> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(i64::from_be_bytes(b))
}

pub fn read_f32<R: Read>(r: &mut R) -> Result<f32, ProtocolError> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(f32::from_be_bytes(b))
}

pub fn read_f64<R: Read>(r: &mut R) -> Result<f64, ProtocolError> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(f64::from_be_bytes(b))
}

pub fn read_bool<R: Read>(r: &mut R) -> Result<bool, ProtocolError> {
    Ok(read_u8(r)? != 0)
}

/// Read an `i16`-prefixed UTF-8 string, rejecting invalid sequences.
pub fn read_string<R: Read>(r: &mut R) -> Result<String, ProtocolError> {
    let len = read_i16(r)?;
    if len < 0 {
        return Err(ProtocolError::NegativeLength(len as i32));
    }
    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidString)
}

/// Read exactly `len` raw bytes, capped by [`MAX_PAYLOAD`].
pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>, ProtocolError> {
    if len > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge(len));
    }
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(bytes)
}

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<(), ProtocolError> {
    w.write_all(&[v])?;
    Ok(())
}

pub fn write_i8<W: Write>(w: &mut W, v: i8) -> Result<(), ProtocolError> {
    write_u8(w, v as u8)
}

pub fn write_i16<W: Write>(w: &mut W, v: i16) -> Result<(), ProtocolError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn write_i32<W: Write>(w: &mut W, v: i32) -> Result<(), ProtocolError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn write_i64<W: Write>(w: &mut W, v: i64) -> Result<(), ProtocolError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn write_f32<W: Write>(w: &mut W, v: f32) -> Result<(), ProtocolError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn write_f64<W: Write>(w: &mut W, v: f64) -> Result<(), ProtocolError> {
    w.write_all(&v.to_be_bytes())?;
    Ok(())
}

pub fn write_bool<W: Write>(w: &mut W, v: bool) -> Result<(), ProtocolError> {
    write_u8(w, v as u8)
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> Result<(), ProtocolError> {
    if s.len() > i16::MAX as usize {
        return Err(ProtocolError::PayloadTooLarge(s.len()));
    }
    write_i16(w, s.len() as i16)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}
