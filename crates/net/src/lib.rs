//! Wire codec for the beta-era block-world protocol.
//!
//! A connection is a raw TCP byte stream carrying packets identified by a
//! leading type byte, big-endian fields, and no length framing. This
//! crate provides the per-packet readers and writers ([`codec`]), the
//! typed entity metadata records ([`metadata`]), the shared primitives
//! and error type ([`wire`]), and an incremental decoder for pump loops
//! ([`stream`]).

pub mod codec;
pub mod metadata;
pub mod stream;
pub mod wire;

pub use codec::{
    ids, read_from_client, read_from_server, read_handshake_request, read_login_request,
    ClientReceiver, CommonReceiver, LoginRequest, MultiBlockChange, ServerReceiver,
    PROTOCOL_VERSION,
};
pub use metadata::{MetadataEntry, MetadataValue};
pub use stream::StreamDecoder;
pub use wire::ProtocolError;
