//! Incremental packet decoding over an unframed byte stream.
//!
//! The protocol has no length prefixes, so a socket read may end in the
//! middle of a packet. [`StreamDecoder`] buffers incoming bytes and
//! repeatedly attempts a full decode from the front of the buffer; a
//! decode that runs out of bytes leaves the buffer untouched and reports
//! "not yet". Packet readers only invoke their receiver after consuming
//! every field, so a retried decode never double-delivers.

use crate::codec::{
    read_from_client, read_handshake_request, read_login_request, LoginRequest, ServerReceiver,
};
use crate::wire::ProtocolError;
use std::io::Cursor;

/// Buffers stream bytes and decodes whole packets as they complete.
#[derive(Default)]
pub struct StreamDecoder {
    buf: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes received from the socket.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes currently buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn try_decode<T>(
        &mut self,
        decode: impl FnOnce(&mut Cursor<&[u8]>) -> Result<T, ProtocolError>,
    ) -> Result<Option<T>, ProtocolError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let mut cursor = Cursor::new(self.buf.as_slice());
        match decode(&mut cursor) {
            Ok(value) => {
                let used = cursor.position() as usize;
                self.buf.drain(..used);
                Ok(Some(value))
            }
            Err(e) if e.is_incomplete() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decode the opening handshake if it is fully buffered.
    pub fn decode_handshake(&mut self) -> Result<Option<String>, ProtocolError> {
        self.try_decode(|cursor| read_handshake_request(cursor))
    }

    /// Decode the login request if it is fully buffered. The protocol
    /// version gate applies here.
    pub fn decode_login(&mut self) -> Result<Option<LoginRequest>, ProtocolError> {
        self.try_decode(|cursor| read_login_request(cursor))
    }

    /// Decode and dispatch the next packet if it is fully buffered.
    /// Returns `true` when a packet was delivered.
    pub fn decode_packet(&mut self, rx: &mut impl ServerReceiver) -> Result<bool, ProtocolError> {
        Ok(self
            .try_decode(|cursor| read_from_client(cursor, rx))?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{write_chat_message, write_handshake_request, CommonReceiver};
    use chunkwright_core::{
        AbsPos, BlockPos, DigStatus, EntityId, Face, ItemTypeId, LookDegrees, Slot, SlotId, TxId,
        WindowId,
    };

    #[derive(Default)]
    struct ChatSink {
        messages: Vec<String>,
    }

    impl CommonReceiver for ChatSink {
        fn keep_alive(&mut self) {}
        fn chat_message(&mut self, message: String) {
            self.messages.push(message);
        }
        fn on_ground(&mut self, _: bool) {}
        fn player_position(&mut self, _: AbsPos, _: f64, _: bool) {}
        fn player_look(&mut self, _: LookDegrees, _: bool) {}
        fn player_digging(&mut self, _: DigStatus, _: BlockPos, _: Face) {}
        fn player_block_placement(&mut self, _: ItemTypeId, _: BlockPos, _: Face, _: i8, _: i16) {}
        fn player_animation(&mut self, _: EntityId, _: i8) {}
        fn disconnect(&mut self, _: String) {}
    }

    impl ServerReceiver for ChatSink {
        fn player_position_look(&mut self, _: AbsPos, _: f64, _: LookDegrees, _: bool) {}
        fn holding_change(&mut self, _: ItemTypeId) {}
        fn window_click(&mut self, _: WindowId, _: SlotId, _: bool, _: TxId, _: Slot) {}
    }

    #[test]
    fn partial_packet_waits_for_more_bytes() {
        let mut packet = Vec::new();
        write_chat_message(&mut packet, "hello shard").unwrap();

        let mut decoder = StreamDecoder::new();
        let mut sink = ChatSink::default();

        decoder.feed(&packet[..5]);
        assert!(!decoder.decode_packet(&mut sink).unwrap());
        assert!(sink.messages.is_empty());

        decoder.feed(&packet[5..]);
        assert!(decoder.decode_packet(&mut sink).unwrap());
        assert_eq!(sink.messages, ["hello shard"]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn back_to_back_packets_decode_in_order() {
        let mut bytes = Vec::new();
        write_chat_message(&mut bytes, "one").unwrap();
        write_chat_message(&mut bytes, "two").unwrap();

        let mut decoder = StreamDecoder::new();
        let mut sink = ChatSink::default();
        decoder.feed(&bytes);

        assert!(decoder.decode_packet(&mut sink).unwrap());
        assert!(decoder.decode_packet(&mut sink).unwrap());
        assert!(!decoder.decode_packet(&mut sink).unwrap());
        assert_eq!(sink.messages, ["one", "two"]);
    }

    #[test]
    fn handshake_decodes_incrementally() {
        let mut packet = Vec::new();
        write_handshake_request(&mut packet, "alex").unwrap();

        let mut decoder = StreamDecoder::new();
        decoder.feed(&packet[..2]);
        assert!(decoder.decode_handshake().unwrap().is_none());
        decoder.feed(&packet[2..]);
        assert_eq!(decoder.decode_handshake().unwrap().as_deref(), Some("alex"));
    }

    #[test]
    fn garbage_byte_is_fatal() {
        let mut decoder = StreamDecoder::new();
        let mut sink = ChatSink::default();
        decoder.feed(&[0x42]);
        assert!(matches!(
            decoder.decode_packet(&mut sink),
            Err(ProtocolError::UnknownPacketId(0x42))
        ));
    }
}
