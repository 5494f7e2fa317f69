//! Fuzz-style property tests for the wire codec.
//!
//! The stream has no framing, so the decoders must fail cleanly (never
//! panic) on arbitrary and truncated input, and every structured field
//! must survive an encode/decode round-trip.

use chunkwright_core::{
    AbsIntPos, AbsPos, BlockPos, ChunkPos, LookBytes, LookDegrees, Slot, SubChunkPos,
};
use chunkwright_net::codec::{self, MultiBlockChange};
use chunkwright_net::{
    ClientReceiver, CommonReceiver, MetadataEntry, ServerReceiver, StreamDecoder,
};
use proptest::prelude::*;
use std::io::Cursor;

/// Receiver that counts deliveries and discards payloads.
#[derive(Default)]
struct NullReceiver {
    delivered: usize,
}

impl CommonReceiver for NullReceiver {
    fn keep_alive(&mut self) {
        self.delivered += 1;
    }
    fn chat_message(&mut self, _: String) {
        self.delivered += 1;
    }
    fn on_ground(&mut self, _: bool) {
        self.delivered += 1;
    }
    fn player_position(&mut self, _: AbsPos, _: f64, _: bool) {
        self.delivered += 1;
    }
    fn player_look(&mut self, _: LookDegrees, _: bool) {
        self.delivered += 1;
    }
    fn player_digging(&mut self, _: chunkwright_core::DigStatus, _: BlockPos, _: i8) {
        self.delivered += 1;
    }
    fn player_block_placement(&mut self, _: i16, _: BlockPos, _: i8, _: i8, _: i16) {
        self.delivered += 1;
    }
    fn player_animation(&mut self, _: i32, _: i8) {
        self.delivered += 1;
    }
    fn disconnect(&mut self, _: String) {
        self.delivered += 1;
    }
}

impl ServerReceiver for NullReceiver {
    fn player_position_look(&mut self, _: AbsPos, _: f64, _: LookDegrees, _: bool) {
        self.delivered += 1;
    }
    fn holding_change(&mut self, _: i16) {
        self.delivered += 1;
    }
    fn window_click(&mut self, _: i8, _: i16, _: bool, _: i16, _: Slot) {
        self.delivered += 1;
    }
}

fn slot_strategy() -> impl Strategy<Value = Slot> {
    prop_oneof![
        Just(Slot::EMPTY),
        (0i16..400, 1i8..=64, 0i16..200).prop_map(|(t, c, u)| Slot::new(t, c, u)),
    ]
}

proptest! {
    /// Arbitrary bytes never panic the client-to-server decoder.
    #[test]
    fn arbitrary_bytes_dont_crash_server_decoder(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let mut rx = NullReceiver::default();
        let _ = chunkwright_net::read_from_client(&mut Cursor::new(&random_bytes), &mut rx);
    }

    /// Arbitrary bytes never panic the server-to-client decoder.
    #[test]
    fn arbitrary_bytes_dont_crash_client_decoder(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        #[derive(Default)]
        struct Sink;
        impl CommonReceiver for Sink {
            fn keep_alive(&mut self) {}
            fn chat_message(&mut self, _: String) {}
            fn on_ground(&mut self, _: bool) {}
            fn player_position(&mut self, _: AbsPos, _: f64, _: bool) {}
            fn player_look(&mut self, _: LookDegrees, _: bool) {}
            fn player_digging(&mut self, _: chunkwright_core::DigStatus, _: BlockPos, _: i8) {}
            fn player_block_placement(&mut self, _: i16, _: BlockPos, _: i8, _: i8, _: i16) {}
            fn player_animation(&mut self, _: i32, _: i8) {}
            fn disconnect(&mut self, _: String) {}
        }
        impl ClientReceiver for Sink {
            fn login(&mut self, _: i32, _: String, _: String, _: i64, _: i8) {}
            fn handshake_reply(&mut self, _: String) {}
            fn time_update(&mut self, _: i64) {}
            fn entity_equipment(&mut self, _: i32, _: i16, _: i16, _: i16) {}
            fn spawn_position(&mut self, _: BlockPos) {}
            fn use_entity(&mut self, _: i32, _: i32, _: bool) {}
            fn update_health(&mut self, _: i16) {}
            fn player_position_look(&mut self, _: AbsPos, _: f64, _: LookDegrees, _: bool) {}
            fn named_entity_spawn(&mut self, _: i32, _: String, _: AbsIntPos, _: LookBytes, _: i16) {}
            fn pickup_spawn(&mut self, _: i32, _: Slot, _: AbsIntPos, _: chunkwright_core::OrientationBytes) {}
            fn item_collect(&mut self, _: i32, _: i32) {}
            fn entity_spawn(&mut self, _: i32, _: i8, _: AbsIntPos, _: LookBytes, _: Vec<MetadataEntry>) {}
            fn unknown_x19(&mut self, _: i32, _: String, _: [i32; 4]) {}
            fn entity_velocity(&mut self, _: i32, _: chunkwright_core::Velocity) {}
            fn entity_destroy(&mut self, _: i32) {}
            fn entity(&mut self, _: i32) {}
            fn entity_rel_move(&mut self, _: i32, _: (i8, i8, i8)) {}
            fn entity_look(&mut self, _: i32, _: LookBytes) {}
            fn entity_look_and_rel_move(&mut self, _: i32, _: (i8, i8, i8), _: LookBytes) {}
            fn entity_teleport(&mut self, _: i32, _: AbsIntPos, _: LookBytes) {}
            fn entity_status(&mut self, _: i32, _: i8) {}
            fn unknown_x28(&mut self, _: i32, _: Vec<MetadataEntry>) {}
            fn pre_chunk(&mut self, _: ChunkPos, _: chunkwright_core::ChunkLoadMode) {}
            fn map_chunk(&mut self, _: BlockPos, _: (u8, u8, u8), _: Vec<u8>) {}
            fn multi_block_change(&mut self, _: ChunkPos, _: Vec<MultiBlockChange>) {}
            fn block_change(&mut self, _: BlockPos, _: u8, _: u8) {}
            fn unknown_x36(&mut self, _: i32, _: i16, _: i32, _: u8, _: u8) {}
            fn window_open(&mut self, _: i8, _: i8, _: String, _: u8) {}
            fn window_close(&mut self, _: i8) {}
            fn set_slot(&mut self, _: i8, _: i16, _: Slot) {}
            fn window_items(&mut self, _: i8, _: Vec<Slot>) {}
        }
        let mut rx = Sink;
        let _ = chunkwright_net::read_from_server(&mut Cursor::new(&random_bytes), &mut rx);
    }

    /// A truncated packet is reported as incomplete, not delivered.
    #[test]
    fn truncated_packets_never_deliver(
        message in "[a-z ]{0,40}",
        truncate_at in 0usize..20,
    ) {
        let mut encoded = Vec::new();
        codec::write_chat_message(&mut encoded, &message).unwrap();

        if truncate_at < encoded.len() {
            encoded.truncate(truncate_at);
            let mut rx = NullReceiver::default();
            match chunkwright_net::read_from_client(&mut Cursor::new(&encoded), &mut rx) {
                Ok(()) => prop_assert!(truncate_at == 0 || rx.delivered > 0),
                Err(e) => {
                    if truncate_at > 0 {
                        prop_assert!(e.is_incomplete());
                    }
                    prop_assert_eq!(rx.delivered, 0);
                }
            }
        }
    }

    /// The stream decoder delivers every packet exactly once no matter
    /// how the bytes are chopped up.
    #[test]
    fn stream_decoder_is_split_insensitive(
        messages in prop::collection::vec("[a-z]{1,12}", 1..8),
        split in 1usize..32,
    ) {
        let mut bytes = Vec::new();
        for message in &messages {
            codec::write_chat_message(&mut bytes, message).unwrap();
        }

        let mut decoder = StreamDecoder::new();
        let mut rx = NullReceiver::default();
        for piece in bytes.chunks(split) {
            decoder.feed(piece);
            while decoder.decode_packet(&mut rx).unwrap() {}
        }
        prop_assert_eq!(rx.delivered, messages.len());
    }

    /// The protocol version gate admits exactly version 8.
    #[test]
    fn version_gate_admits_only_version_8(version in any::<i32>()) {
        let mut encoded = Vec::new();
        codec::write_login_request(&mut encoded, version, "alex", "", 0, 0).unwrap();
        let result = chunkwright_net::read_login_request(&mut Cursor::new(&encoded));
        if version == codec::PROTOCOL_VERSION {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(
                matches!(
                    result,
                    Err(chunkwright_net::ProtocolError::VersionMismatch { .. })
                ),
                "expected VersionMismatch error"
            );
        }
    }

    /// Slots round-trip through the set-slot packet.
    #[test]
    fn slots_round_trip(slot in slot_strategy()) {
        let mut encoded = Vec::new();
        codec::write_set_slot(&mut encoded, 0, 9, slot).unwrap();

        struct Capture(Option<Slot>);
        impl CommonReceiver for Capture {
            fn keep_alive(&mut self) {}
            fn chat_message(&mut self, _: String) {}
            fn on_ground(&mut self, _: bool) {}
            fn player_position(&mut self, _: AbsPos, _: f64, _: bool) {}
            fn player_look(&mut self, _: LookDegrees, _: bool) {}
            fn player_digging(&mut self, _: chunkwright_core::DigStatus, _: BlockPos, _: i8) {}
            fn player_block_placement(&mut self, _: i16, _: BlockPos, _: i8, _: i8, _: i16) {}
            fn player_animation(&mut self, _: i32, _: i8) {}
            fn disconnect(&mut self, _: String) {}
        }
        impl ClientReceiver for Capture {
            fn login(&mut self, _: i32, _: String, _: String, _: i64, _: i8) {}
            fn handshake_reply(&mut self, _: String) {}
            fn time_update(&mut self, _: i64) {}
            fn entity_equipment(&mut self, _: i32, _: i16, _: i16, _: i16) {}
            fn spawn_position(&mut self, _: BlockPos) {}
            fn use_entity(&mut self, _: i32, _: i32, _: bool) {}
            fn update_health(&mut self, _: i16) {}
            fn player_position_look(&mut self, _: AbsPos, _: f64, _: LookDegrees, _: bool) {}
            fn named_entity_spawn(&mut self, _: i32, _: String, _: AbsIntPos, _: LookBytes, _: i16) {}
            fn pickup_spawn(&mut self, _: i32, _: Slot, _: AbsIntPos, _: chunkwright_core::OrientationBytes) {}
            fn item_collect(&mut self, _: i32, _: i32) {}
            fn entity_spawn(&mut self, _: i32, _: i8, _: AbsIntPos, _: LookBytes, _: Vec<MetadataEntry>) {}
            fn unknown_x19(&mut self, _: i32, _: String, _: [i32; 4]) {}
            fn entity_velocity(&mut self, _: i32, _: chunkwright_core::Velocity) {}
            fn entity_destroy(&mut self, _: i32) {}
            fn entity(&mut self, _: i32) {}
            fn entity_rel_move(&mut self, _: i32, _: (i8, i8, i8)) {}
            fn entity_look(&mut self, _: i32, _: LookBytes) {}
            fn entity_look_and_rel_move(&mut self, _: i32, _: (i8, i8, i8), _: LookBytes) {}
            fn entity_teleport(&mut self, _: i32, _: AbsIntPos, _: LookBytes) {}
            fn entity_status(&mut self, _: i32, _: i8) {}
            fn unknown_x28(&mut self, _: i32, _: Vec<MetadataEntry>) {}
            fn pre_chunk(&mut self, _: ChunkPos, _: chunkwright_core::ChunkLoadMode) {}
            fn map_chunk(&mut self, _: BlockPos, _: (u8, u8, u8), _: Vec<u8>) {}
            fn multi_block_change(&mut self, _: ChunkPos, _: Vec<MultiBlockChange>) {}
            fn block_change(&mut self, _: BlockPos, _: u8, _: u8) {}
            fn unknown_x36(&mut self, _: i32, _: i16, _: i32, _: u8, _: u8) {}
            fn window_open(&mut self, _: i8, _: i8, _: String, _: u8) {}
            fn window_close(&mut self, _: i8) {}
            fn set_slot(&mut self, _: i8, _: i16, item: Slot) {
                self.0 = Some(item);
            }
            fn window_items(&mut self, _: i8, _: Vec<Slot>) {}
        }

        let mut rx = Capture(None);
        chunkwright_net::read_from_server(&mut Cursor::new(&encoded), &mut rx).unwrap();
        prop_assert_eq!(rx.0, Some(slot));
    }

    /// Multi-block-change location packing round-trips for every cell.
    #[test]
    fn multi_block_change_locations_round_trip(
        x in 0u8..16, y in 0u8..128, z in 0u8..16, block_id in any::<u8>(), meta in 0u8..16,
    ) {
        let change = MultiBlockChange {
            loc: SubChunkPos { x, y, z },
            block_id,
            meta,
        };
        let mut encoded = Vec::new();
        codec::write_multi_block_change(&mut encoded, ChunkPos::new(-3, 9), &[change]).unwrap();

        struct Capture(Vec<MultiBlockChange>);
        impl CommonReceiver for Capture {
            fn keep_alive(&mut self) {}
            fn chat_message(&mut self, _: String) {}
            fn on_ground(&mut self, _: bool) {}
            fn player_position(&mut self, _: AbsPos, _: f64, _: bool) {}
            fn player_look(&mut self, _: LookDegrees, _: bool) {}
            fn player_digging(&mut self, _: chunkwright_core::DigStatus, _: BlockPos, _: i8) {}
            fn player_block_placement(&mut self, _: i16, _: BlockPos, _: i8, _: i8, _: i16) {}
            fn player_animation(&mut self, _: i32, _: i8) {}
            fn disconnect(&mut self, _: String) {}
        }
        impl ClientReceiver for Capture {
            fn login(&mut self, _: i32, _: String, _: String, _: i64, _: i8) {}
            fn handshake_reply(&mut self, _: String) {}
            fn time_update(&mut self, _: i64) {}
            fn entity_equipment(&mut self, _: i32, _: i16, _: i16, _: i16) {}
            fn spawn_position(&mut self, _: BlockPos) {}
            fn use_entity(&mut self, _: i32, _: i32, _: bool) {}
            fn update_health(&mut self, _: i16) {}
            fn player_position_look(&mut self, _: AbsPos, _: f64, _: LookDegrees, _: bool) {}
            fn named_entity_spawn(&mut self, _: i32, _: String, _: AbsIntPos, _: LookBytes, _: i16) {}
            fn pickup_spawn(&mut self, _: i32, _: Slot, _: AbsIntPos, _: chunkwright_core::OrientationBytes) {}
            fn item_collect(&mut self, _: i32, _: i32) {}
            fn entity_spawn(&mut self, _: i32, _: i8, _: AbsIntPos, _: LookBytes, _: Vec<MetadataEntry>) {}
            fn unknown_x19(&mut self, _: i32, _: String, _: [i32; 4]) {}
            fn entity_velocity(&mut self, _: i32, _: chunkwright_core::Velocity) {}
            fn entity_destroy(&mut self, _: i32) {}
            fn entity(&mut self, _: i32) {}
            fn entity_rel_move(&mut self, _: i32, _: (i8, i8, i8)) {}
            fn entity_look(&mut self, _: i32, _: LookBytes) {}
            fn entity_look_and_rel_move(&mut self, _: i32, _: (i8, i8, i8), _: LookBytes) {}
            fn entity_teleport(&mut self, _: i32, _: AbsIntPos, _: LookBytes) {}
            fn entity_status(&mut self, _: i32, _: i8) {}
            fn unknown_x28(&mut self, _: i32, _: Vec<MetadataEntry>) {}
            fn pre_chunk(&mut self, _: ChunkPos, _: chunkwright_core::ChunkLoadMode) {}
            fn map_chunk(&mut self, _: BlockPos, _: (u8, u8, u8), _: Vec<u8>) {}
            fn multi_block_change(&mut self, _: ChunkPos, changes: Vec<MultiBlockChange>) {
                self.0 = changes;
            }
            fn block_change(&mut self, _: BlockPos, _: u8, _: u8) {}
            fn unknown_x36(&mut self, _: i32, _: i16, _: i32, _: u8, _: u8) {}
            fn window_open(&mut self, _: i8, _: i8, _: String, _: u8) {}
            fn window_close(&mut self, _: i8) {}
            fn set_slot(&mut self, _: i8, _: i16, _: Slot) {}
            fn window_items(&mut self, _: i8, _: Vec<Slot>) {}
        }

        let mut rx = Capture(Vec::new());
        chunkwright_net::read_from_server(&mut Cursor::new(&encoded), &mut rx).unwrap();
        // The decoder writes entry i into index i: exactly one change out.
        prop_assert_eq!(&rx.0[..], &[change][..]);
    }
}
