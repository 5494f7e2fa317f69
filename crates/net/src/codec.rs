//! Packet readers and writers.
//!
//! Each packet starts with a one-byte type id and has no length prefix,
//! so the reader for an id must consume its payload exactly. Three
//! registries exist: packets common to both directions, client-to-server
//! only, and server-to-client only.
//!
//! The read side is parameterised over a receiver: [`CommonReceiver`]
//! carries the operations both peers understand, and the direction
//! specific receivers extend it. Every reader performs all of its input
//! reads before invoking the receiver, so a failed read never leaves a
//! half-delivered packet.

use crate::metadata::{read_metadata, write_metadata, MetadataEntry};
use crate::wire::*;
use chunkwright_core::{
    AbsIntPos, AbsPos, BlockId, BlockPos, ChunkLoadMode, ChunkPos, DigStatus, DimensionId,
    EntityId, Face, ItemTypeId, LookBytes, LookDegrees, OrientationBytes, RandomSeed, Slot,
    SlotId, SubChunkPos, TimeOfDay, TxId, Velocity, WindowId, CHUNK_SIZE_X, CHUNK_SIZE_Y,
    CHUNK_SIZE_Z, CHUNK_VOLUME, NIBBLE_VOLUME,
};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// The single protocol version this codec speaks.
pub const PROTOCOL_VERSION: i32 = 8;

/// Packet type ids.
pub mod ids {
    pub const KEEP_ALIVE: u8 = 0x00;
    pub const LOGIN: u8 = 0x01;
    pub const HANDSHAKE: u8 = 0x02;
    pub const CHAT_MESSAGE: u8 = 0x03;
    pub const TIME_UPDATE: u8 = 0x04;
    pub const ENTITY_EQUIPMENT: u8 = 0x05;
    pub const SPAWN_POSITION: u8 = 0x06;
    pub const USE_ENTITY: u8 = 0x07;
    pub const UPDATE_HEALTH: u8 = 0x08;
    pub const FLYING: u8 = 0x0a;
    pub const PLAYER_POSITION: u8 = 0x0b;
    pub const PLAYER_LOOK: u8 = 0x0c;
    pub const PLAYER_POSITION_LOOK: u8 = 0x0d;
    pub const PLAYER_DIGGING: u8 = 0x0e;
    pub const PLAYER_BLOCK_PLACEMENT: u8 = 0x0f;
    pub const HOLDING_CHANGE: u8 = 0x10;
    pub const PLAYER_ANIMATION: u8 = 0x12;
    pub const NAMED_ENTITY_SPAWN: u8 = 0x14;
    pub const PICKUP_SPAWN: u8 = 0x15;
    pub const ITEM_COLLECT: u8 = 0x16;
    pub const ENTITY_SPAWN: u8 = 0x18;
    pub const UNKNOWN_X19: u8 = 0x19;
    pub const ENTITY_VELOCITY: u8 = 0x1c;
    pub const ENTITY_DESTROY: u8 = 0x1d;
    pub const ENTITY: u8 = 0x1e;
    pub const ENTITY_REL_MOVE: u8 = 0x1f;
    pub const ENTITY_LOOK: u8 = 0x20;
    pub const ENTITY_LOOK_AND_REL_MOVE: u8 = 0x21;
    pub const ENTITY_TELEPORT: u8 = 0x22;
    pub const ENTITY_STATUS: u8 = 0x26;
    pub const UNKNOWN_X28: u8 = 0x28;
    pub const PRE_CHUNK: u8 = 0x32;
    pub const MAP_CHUNK: u8 = 0x33;
    pub const BLOCK_CHANGE_MULTI: u8 = 0x34;
    pub const BLOCK_CHANGE: u8 = 0x35;
    pub const UNKNOWN_X36: u8 = 0x36;
    pub const WINDOW_OPEN: u8 = 0x64;
    pub const WINDOW_CLOSE: u8 = 0x65;
    pub const WINDOW_CLICK: u8 = 0x66;
    pub const SET_SLOT: u8 = 0x67;
    pub const WINDOW_ITEMS: u8 = 0x68;
    pub const DISCONNECT: u8 = 0xff;
}

/// One entry of a multi-block-change packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiBlockChange {
    pub loc: SubChunkPos,
    pub block_id: BlockId,
    pub meta: u8,
}

/// Login fields sent by a connecting client.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub map_seed: RandomSeed,
    pub dimension: DimensionId,
}

/// Operations meaningful to both ends of the connection.
pub trait CommonReceiver {
    fn keep_alive(&mut self);
    fn chat_message(&mut self, message: String);
    fn on_ground(&mut self, on_ground: bool);
    fn player_position(&mut self, pos: AbsPos, stance: f64, on_ground: bool);
    fn player_look(&mut self, look: LookDegrees, on_ground: bool);
    fn player_digging(&mut self, status: DigStatus, loc: BlockPos, face: Face);
    fn player_block_placement(
        &mut self,
        item_type: ItemTypeId,
        loc: BlockPos,
        face: Face,
        amount: i8,
        uses: i16,
    );
    fn player_animation(&mut self, entity_id: EntityId, animation: i8);
    fn disconnect(&mut self, reason: String);
}

/// Receiver for a server reading packets from a client.
pub trait ServerReceiver: CommonReceiver {
    fn player_position_look(&mut self, pos: AbsPos, stance: f64, look: LookDegrees, on_ground: bool);
    fn holding_change(&mut self, item_type: ItemTypeId);
    fn window_click(
        &mut self,
        window_id: WindowId,
        slot_id: SlotId,
        right_click: bool,
        tx_id: TxId,
        item: Slot,
    );
}

/// Receiver for a client reading packets from a server.
pub trait ClientReceiver: CommonReceiver {
    fn login(
        &mut self,
        entity_id: EntityId,
        str1: String,
        str2: String,
        map_seed: RandomSeed,
        dimension: DimensionId,
    );
    fn handshake_reply(&mut self, server_id: String);
    fn time_update(&mut self, time: TimeOfDay);
    fn entity_equipment(&mut self, entity_id: EntityId, slot_id: SlotId, item_type: ItemTypeId, uses: i16);
    fn spawn_position(&mut self, loc: BlockPos);
    fn use_entity(&mut self, user: EntityId, target: EntityId, left_click: bool);
    fn update_health(&mut self, health: i16);
    fn player_position_look(&mut self, pos: AbsPos, stance: f64, look: LookDegrees, on_ground: bool);
    fn named_entity_spawn(
        &mut self,
        entity_id: EntityId,
        name: String,
        pos: AbsIntPos,
        look: LookBytes,
        current_item: ItemTypeId,
    );
    fn pickup_spawn(
        &mut self,
        entity_id: EntityId,
        item: Slot,
        pos: AbsIntPos,
        orientation: OrientationBytes,
    );
    fn item_collect(&mut self, collected: EntityId, collector: EntityId);
    fn entity_spawn(
        &mut self,
        entity_id: EntityId,
        mob_type: i8,
        pos: AbsIntPos,
        look: LookBytes,
        metadata: Vec<MetadataEntry>,
    );
    fn unknown_x19(&mut self, field1: i32, field2: String, fields: [i32; 4]);
    fn entity_velocity(&mut self, entity_id: EntityId, velocity: Velocity);
    fn entity_destroy(&mut self, entity_id: EntityId);
    fn entity(&mut self, entity_id: EntityId);
    fn entity_rel_move(&mut self, entity_id: EntityId, delta: (i8, i8, i8));
    fn entity_look(&mut self, entity_id: EntityId, look: LookBytes);
    fn entity_look_and_rel_move(&mut self, entity_id: EntityId, delta: (i8, i8, i8), look: LookBytes);
    fn entity_teleport(&mut self, entity_id: EntityId, pos: AbsIntPos, look: LookBytes);
    fn entity_status(&mut self, entity_id: EntityId, status: i8);
    fn unknown_x28(&mut self, field1: i32, metadata: Vec<MetadataEntry>);
    fn pre_chunk(&mut self, loc: ChunkPos, mode: ChunkLoadMode);
    fn map_chunk(&mut self, corner: BlockPos, size: (u8, u8, u8), compressed: Vec<u8>);
    fn multi_block_change(&mut self, chunk: ChunkPos, changes: Vec<MultiBlockChange>);
    fn block_change(&mut self, loc: BlockPos, block_id: BlockId, meta: u8);
    fn unknown_x36(&mut self, field1: i32, field2: i16, field3: i32, field4: u8, field5: u8);
    fn window_open(&mut self, window_id: WindowId, inv_type_id: i8, title: String, num_slots: u8);
    fn window_close(&mut self, window_id: WindowId);
    fn set_slot(&mut self, window_id: WindowId, slot_id: SlotId, item: Slot);
    fn window_items(&mut self, window_id: WindowId, items: Vec<Slot>);
}

// Dedicated pre-session readers. Handshake and login are consumed before
// the packet loop starts, so they get explicit entry points with the
// protocol version gate.

/// Read the client's opening handshake, returning the username.
pub fn read_handshake_request<R: Read>(r: &mut R) -> Result<String, ProtocolError> {
    let id = read_u8(r)?;
    if id != ids::HANDSHAKE {
        return Err(ProtocolError::UnexpectedPacketId {
            expected: ids::HANDSHAKE,
            got: id,
        });
    }
    read_string(r)
}

/// Read the client's login packet, rejecting any protocol version other
/// than [`PROTOCOL_VERSION`].
pub fn read_login_request<R: Read>(r: &mut R) -> Result<LoginRequest, ProtocolError> {
    let id = read_u8(r)?;
    if id != ids::LOGIN {
        return Err(ProtocolError::UnexpectedPacketId {
            expected: ids::LOGIN,
            got: id,
        });
    }
    let version = read_i32(r)?;
    let username = read_string(r)?;
    let password = read_string(r)?;
    let map_seed = read_i64(r)?;
    let dimension = read_i8(r)?;
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: version,
        });
    }
    Ok(LoginRequest {
        username,
        password,
        map_seed,
        dimension,
    })
}

/// Read and dispatch one packet arriving from a client.
pub fn read_from_client<R: Read>(
    r: &mut R,
    rx: &mut impl ServerReceiver,
) -> Result<(), ProtocolError> {
    let id = read_u8(r)?;
    match id {
        ids::KEEP_ALIVE => {
            rx.keep_alive();
            Ok(())
        }
        ids::CHAT_MESSAGE => read_chat_message(r, rx),
        ids::FLYING => read_flying(r, rx),
        ids::PLAYER_POSITION => read_player_position(r, rx),
        ids::PLAYER_LOOK => read_player_look(r, rx),
        ids::PLAYER_DIGGING => read_player_digging(r, rx),
        ids::PLAYER_BLOCK_PLACEMENT => read_player_block_placement(r, rx),
        ids::PLAYER_ANIMATION => read_player_animation(r, rx),
        ids::DISCONNECT => read_disconnect(r, rx),
        ids::PLAYER_POSITION_LOOK => {
            // Client-to-server field order: x, stance, y, z.
            let x = read_f64(r)?;
            let stance = read_f64(r)?;
            let y = read_f64(r)?;
            let z = read_f64(r)?;
            let yaw = read_f32(r)?;
            let pitch = read_f32(r)?;
            let on_ground = read_bool(r)?;
            rx.player_position_look(
                AbsPos::new(x, y, z),
                stance,
                LookDegrees::new(yaw, pitch),
                on_ground,
            );
            Ok(())
        }
        ids::HOLDING_CHANGE => {
            let item_type = read_i16(r)?;
            rx.holding_change(item_type);
            Ok(())
        }
        ids::WINDOW_CLICK => {
            let window_id = read_i8(r)?;
            let slot_id = read_i16(r)?;
            let right_click = read_bool(r)?;
            let tx_id = read_i16(r)?;
            let item = read_slot(r)?;
            rx.window_click(window_id, slot_id, right_click, tx_id, item);
            Ok(())
        }
        other => Err(ProtocolError::UnknownPacketId(other)),
    }
}

/// Read and dispatch one packet arriving from a server.
pub fn read_from_server<R: Read>(
    r: &mut R,
    rx: &mut impl ClientReceiver,
) -> Result<(), ProtocolError> {
    let id = read_u8(r)?;
    match id {
        ids::KEEP_ALIVE => {
            rx.keep_alive();
            Ok(())
        }
        ids::CHAT_MESSAGE => read_chat_message(r, rx),
        ids::FLYING => read_flying(r, rx),
        ids::PLAYER_POSITION => read_player_position(r, rx),
        ids::PLAYER_LOOK => read_player_look(r, rx),
        ids::PLAYER_DIGGING => read_player_digging(r, rx),
        ids::PLAYER_BLOCK_PLACEMENT => read_player_block_placement(r, rx),
        ids::PLAYER_ANIMATION => read_player_animation(r, rx),
        ids::DISCONNECT => read_disconnect(r, rx),
        ids::LOGIN => {
            let entity_id = read_i32(r)?;
            let str1 = read_string(r)?;
            let str2 = read_string(r)?;
            let map_seed = read_i64(r)?;
            let dimension = read_i8(r)?;
            rx.login(entity_id, str1, str2, map_seed, dimension);
            Ok(())
        }
        ids::HANDSHAKE => {
            let server_id = read_string(r)?;
            rx.handshake_reply(server_id);
            Ok(())
        }
        ids::TIME_UPDATE => {
            let time = read_i64(r)?;
            rx.time_update(time);
            Ok(())
        }
        ids::ENTITY_EQUIPMENT => {
            let entity_id = read_i32(r)?;
            let slot_id = read_i16(r)?;
            let item_type = read_i16(r)?;
            let uses = read_i16(r)?;
            rx.entity_equipment(entity_id, slot_id, item_type, uses);
            Ok(())
        }
        ids::SPAWN_POSITION => {
            let x = read_i32(r)?;
            let y = read_i32(r)?;
            let z = read_i32(r)?;
            rx.spawn_position(BlockPos {
                x,
                y: y as i8,
                z,
            });
            Ok(())
        }
        ids::USE_ENTITY => {
            let user = read_i32(r)?;
            let target = read_i32(r)?;
            let left_click = read_bool(r)?;
            rx.use_entity(user, target, left_click);
            Ok(())
        }
        ids::UPDATE_HEALTH => {
            let health = read_i16(r)?;
            rx.update_health(health);
            Ok(())
        }
        ids::PLAYER_POSITION_LOOK => {
            // Server-to-client field order: x, y, stance, z.
            let x = read_f64(r)?;
            let y = read_f64(r)?;
            let stance = read_f64(r)?;
            let z = read_f64(r)?;
            let yaw = read_f32(r)?;
            let pitch = read_f32(r)?;
            let on_ground = read_bool(r)?;
            rx.player_position_look(
                AbsPos::new(x, y, z),
                stance,
                LookDegrees::new(yaw, pitch),
                on_ground,
            );
            Ok(())
        }
        ids::NAMED_ENTITY_SPAWN => {
            let entity_id = read_i32(r)?;
            let name = read_string(r)?;
            let pos = read_abs_int(r)?;
            let look = read_look_bytes(r)?;
            let current_item = read_i16(r)?;
            rx.named_entity_spawn(entity_id, name, pos, look, current_item);
            Ok(())
        }
        ids::PICKUP_SPAWN => {
            let entity_id = read_i32(r)?;
            let item_type = read_i16(r)?;
            let count = read_i8(r)?;
            let uses = read_i16(r)?;
            let pos = read_abs_int(r)?;
            let yaw = read_i8(r)?;
            let pitch = read_i8(r)?;
            let roll = read_i8(r)?;
            rx.pickup_spawn(
                entity_id,
                Slot::new(item_type, count, uses),
                pos,
                OrientationBytes { yaw, pitch, roll },
            );
            Ok(())
        }
        ids::ITEM_COLLECT => {
            let collected = read_i32(r)?;
            let collector = read_i32(r)?;
            rx.item_collect(collected, collector);
            Ok(())
        }
        ids::ENTITY_SPAWN => {
            let entity_id = read_i32(r)?;
            let mob_type = read_i8(r)?;
            let pos = read_abs_int(r)?;
            let look = read_look_bytes(r)?;
            let metadata = read_metadata(r)?;
            rx.entity_spawn(entity_id, mob_type, pos, look, metadata);
            Ok(())
        }
        ids::UNKNOWN_X19 => {
            let field1 = read_i32(r)?;
            let field2 = read_string(r)?;
            let fields = [read_i32(r)?, read_i32(r)?, read_i32(r)?, read_i32(r)?];
            rx.unknown_x19(field1, field2, fields);
            Ok(())
        }
        ids::ENTITY_VELOCITY => {
            let entity_id = read_i32(r)?;
            let velocity = Velocity {
                x: read_i16(r)?,
                y: read_i16(r)?,
                z: read_i16(r)?,
            };
            rx.entity_velocity(entity_id, velocity);
            Ok(())
        }
        ids::ENTITY_DESTROY => {
            let entity_id = read_i32(r)?;
            rx.entity_destroy(entity_id);
            Ok(())
        }
        ids::ENTITY => {
            let entity_id = read_i32(r)?;
            rx.entity(entity_id);
            Ok(())
        }
        ids::ENTITY_REL_MOVE => {
            let entity_id = read_i32(r)?;
            let delta = (read_i8(r)?, read_i8(r)?, read_i8(r)?);
            rx.entity_rel_move(entity_id, delta);
            Ok(())
        }
        ids::ENTITY_LOOK => {
            let entity_id = read_i32(r)?;
            let look = read_look_bytes(r)?;
            rx.entity_look(entity_id, look);
            Ok(())
        }
        ids::ENTITY_LOOK_AND_REL_MOVE => {
            let entity_id = read_i32(r)?;
            let delta = (read_i8(r)?, read_i8(r)?, read_i8(r)?);
            let look = read_look_bytes(r)?;
            rx.entity_look_and_rel_move(entity_id, delta, look);
            Ok(())
        }
        ids::ENTITY_TELEPORT => {
            let entity_id = read_i32(r)?;
            let pos = read_abs_int(r)?;
            let look = read_look_bytes(r)?;
            rx.entity_teleport(entity_id, pos, look);
            Ok(())
        }
        ids::ENTITY_STATUS => {
            let entity_id = read_i32(r)?;
            let status = read_i8(r)?;
            rx.entity_status(entity_id, status);
            Ok(())
        }
        ids::UNKNOWN_X28 => {
            let field1 = read_i32(r)?;
            let metadata = read_metadata(r)?;
            rx.unknown_x28(field1, metadata);
            Ok(())
        }
        ids::PRE_CHUNK => {
            let x = read_i32(r)?;
            let z = read_i32(r)?;
            let mode_byte = read_u8(r)?;
            let mode = ChunkLoadMode::from_wire(mode_byte).ok_or(ProtocolError::InvalidField {
                field: "pre-chunk mode",
                value: mode_byte as i32,
            })?;
            rx.pre_chunk(ChunkPos::new(x, z), mode);
            Ok(())
        }
        ids::MAP_CHUNK => {
            let x = read_i32(r)?;
            let y = read_i8(r)?;
            let z = read_i32(r)?;
            let size = (read_u8(r)?, read_u8(r)?, read_u8(r)?);
            let compressed_len = read_i32(r)?;
            if compressed_len < 0 {
                return Err(ProtocolError::NegativeLength(compressed_len));
            }
            let compressed = read_bytes(r, compressed_len as usize)?;
            rx.map_chunk(BlockPos { x, y, z }, size, compressed);
            Ok(())
        }
        ids::BLOCK_CHANGE_MULTI => {
            let chunk = ChunkPos::new(read_i32(r)?, read_i32(r)?);
            let count = read_i16(r)?;
            if count < 0 {
                return Err(ProtocolError::NegativeLength(count as i32));
            }
            let count = count as usize;
            let mut raw_locs = Vec::with_capacity(count);
            for _ in 0..count {
                raw_locs.push(read_i16(r)?);
            }
            let mut block_ids = Vec::with_capacity(count);
            for _ in 0..count {
                block_ids.push(read_u8(r)?);
            }
            let mut changes = Vec::with_capacity(count);
            for (i, raw_loc) in raw_locs.iter().enumerate() {
                let meta = read_u8(r)?;
                changes.push(MultiBlockChange {
                    loc: SubChunkPos {
                        x: ((raw_loc >> 12) & 0xf) as u8,
                        y: (raw_loc & 0xff) as u8,
                        z: ((raw_loc >> 8) & 0xf) as u8,
                    },
                    block_id: block_ids[i],
                    meta,
                });
            }
            rx.multi_block_change(chunk, changes);
            Ok(())
        }
        ids::BLOCK_CHANGE => {
            let x = read_i32(r)?;
            let y = read_i8(r)?;
            let z = read_i32(r)?;
            let block_id = read_u8(r)?;
            let meta = read_u8(r)?;
            rx.block_change(BlockPos { x, y, z }, block_id, meta);
            Ok(())
        }
        ids::UNKNOWN_X36 => {
            let field1 = read_i32(r)?;
            let field2 = read_i16(r)?;
            let field3 = read_i32(r)?;
            let field4 = read_u8(r)?;
            let field5 = read_u8(r)?;
            rx.unknown_x36(field1, field2, field3, field4, field5);
            Ok(())
        }
        ids::WINDOW_OPEN => {
            let window_id = read_i8(r)?;
            let inv_type_id = read_i8(r)?;
            let title = read_string(r)?;
            let num_slots = read_u8(r)?;
            rx.window_open(window_id, inv_type_id, title, num_slots);
            Ok(())
        }
        ids::WINDOW_CLOSE => {
            let window_id = read_i8(r)?;
            rx.window_close(window_id);
            Ok(())
        }
        ids::SET_SLOT => {
            let window_id = read_i8(r)?;
            let slot_id = read_i16(r)?;
            let item = read_slot(r)?;
            rx.set_slot(window_id, slot_id, item);
            Ok(())
        }
        ids::WINDOW_ITEMS => {
            let window_id = read_i8(r)?;
            let count = read_i16(r)?;
            if count < 0 {
                return Err(ProtocolError::NegativeLength(count as i32));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_slot(r)?);
            }
            rx.window_items(window_id, items);
            Ok(())
        }
        other => Err(ProtocolError::UnknownPacketId(other)),
    }
}

// Readers for the packets common to both directions.

fn read_chat_message<R: Read>(r: &mut R, rx: &mut impl CommonReceiver) -> Result<(), ProtocolError> {
    let message = read_string(r)?;
    rx.chat_message(message);
    Ok(())
}

fn read_flying<R: Read>(r: &mut R, rx: &mut impl CommonReceiver) -> Result<(), ProtocolError> {
    let on_ground = read_bool(r)?;
    rx.on_ground(on_ground);
    Ok(())
}

fn read_player_position<R: Read>(
    r: &mut R,
    rx: &mut impl CommonReceiver,
) -> Result<(), ProtocolError> {
    let x = read_f64(r)?;
    let y = read_f64(r)?;
    let stance = read_f64(r)?;
    let z = read_f64(r)?;
    let on_ground = read_bool(r)?;
    rx.player_position(AbsPos::new(x, y, z), stance, on_ground);
    Ok(())
}

fn read_player_look<R: Read>(r: &mut R, rx: &mut impl CommonReceiver) -> Result<(), ProtocolError> {
    let yaw = read_f32(r)?;
    let pitch = read_f32(r)?;
    let on_ground = read_bool(r)?;
    rx.player_look(LookDegrees::new(yaw, pitch), on_ground);
    Ok(())
}

fn read_player_digging<R: Read>(
    r: &mut R,
    rx: &mut impl CommonReceiver,
) -> Result<(), ProtocolError> {
    let status_byte = read_i8(r)?;
    let x = read_i32(r)?;
    let y = read_i8(r)?;
    let z = read_i32(r)?;
    let face = read_i8(r)?;
    let status = DigStatus::from_wire(status_byte).ok_or(ProtocolError::InvalidField {
        field: "dig status",
        value: status_byte as i32,
    })?;
    rx.player_digging(status, BlockPos { x, y, z }, face);
    Ok(())
}

fn read_player_block_placement<R: Read>(
    r: &mut R,
    rx: &mut impl CommonReceiver,
) -> Result<(), ProtocolError> {
    let x = read_i32(r)?;
    let y = read_i8(r)?;
    let z = read_i32(r)?;
    let face = read_i8(r)?;
    let item_type = read_i16(r)?;
    // The amount/uses tail is only present for a real item id.
    let (amount, uses) = if item_type >= 0 {
        (read_i8(r)?, read_i16(r)?)
    } else {
        (0, 0)
    };
    rx.player_block_placement(item_type, BlockPos { x, y, z }, face, amount, uses);
    Ok(())
}

fn read_player_animation<R: Read>(
    r: &mut R,
    rx: &mut impl CommonReceiver,
) -> Result<(), ProtocolError> {
    let entity_id = read_i32(r)?;
    let animation = read_i8(r)?;
    rx.player_animation(entity_id, animation);
    Ok(())
}

fn read_disconnect<R: Read>(r: &mut R, rx: &mut impl CommonReceiver) -> Result<(), ProtocolError> {
    let reason = read_string(r)?;
    rx.disconnect(reason);
    Ok(())
}

fn read_abs_int<R: Read>(r: &mut R) -> Result<AbsIntPos, ProtocolError> {
    Ok(AbsIntPos {
        x: read_i32(r)?,
        y: read_i32(r)?,
        z: read_i32(r)?,
    })
}

fn read_look_bytes<R: Read>(r: &mut R) -> Result<LookBytes, ProtocolError> {
    Ok(LookBytes {
        yaw: read_i8(r)?,
        pitch: read_i8(r)?,
    })
}

/// Read an item slot with the conditional `(amount, uses)` tail.
fn read_slot<R: Read>(r: &mut R) -> Result<Slot, ProtocolError> {
    let item_type = read_i16(r)?;
    if item_type == -1 {
        return Ok(Slot::EMPTY);
    }
    let amount = read_i8(r)?;
    let uses = read_i16(r)?;
    Ok(Slot::new(item_type, amount, uses))
}

/// Write an item slot with the conditional `(amount, uses)` tail.
fn write_slot<W: Write>(w: &mut W, slot: &Slot) -> Result<(), ProtocolError> {
    write_i16(w, slot.item_type)?;
    if slot.item_type != -1 {
        write_i8(w, slot.count)?;
        write_i16(w, slot.uses)?;
    }
    Ok(())
}

// Writers. Each produces bytes that round-trip through the matching
// reader above.

pub fn write_keep_alive<W: Write>(w: &mut W) -> Result<(), ProtocolError> {
    write_u8(w, ids::KEEP_ALIVE)
}

pub fn write_login_request<W: Write>(
    w: &mut W,
    version: i32,
    username: &str,
    password: &str,
    map_seed: RandomSeed,
    dimension: DimensionId,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::LOGIN)?;
    write_i32(w, version)?;
    write_string(w, username)?;
    write_string(w, password)?;
    write_i64(w, map_seed)?;
    write_i8(w, dimension)
}

pub fn write_login_response<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    str1: &str,
    str2: &str,
    map_seed: RandomSeed,
    dimension: DimensionId,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::LOGIN)?;
    write_i32(w, entity_id)?;
    write_string(w, str1)?;
    write_string(w, str2)?;
    write_i64(w, map_seed)?;
    write_i8(w, dimension)
}

pub fn write_handshake_request<W: Write>(w: &mut W, username: &str) -> Result<(), ProtocolError> {
    write_u8(w, ids::HANDSHAKE)?;
    write_string(w, username)
}

pub fn write_handshake_reply<W: Write>(w: &mut W, server_id: &str) -> Result<(), ProtocolError> {
    write_u8(w, ids::HANDSHAKE)?;
    write_string(w, server_id)
}

pub fn write_chat_message<W: Write>(w: &mut W, message: &str) -> Result<(), ProtocolError> {
    write_u8(w, ids::CHAT_MESSAGE)?;
    write_string(w, message)
}

pub fn write_time_update<W: Write>(w: &mut W, time: TimeOfDay) -> Result<(), ProtocolError> {
    write_u8(w, ids::TIME_UPDATE)?;
    write_i64(w, time)
}

pub fn write_entity_equipment<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    slot_id: SlotId,
    item_type: ItemTypeId,
    uses: i16,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_EQUIPMENT)?;
    write_i32(w, entity_id)?;
    write_i16(w, slot_id)?;
    write_i16(w, item_type)?;
    write_i16(w, uses)
}

pub fn write_spawn_position<W: Write>(w: &mut W, loc: BlockPos) -> Result<(), ProtocolError> {
    write_u8(w, ids::SPAWN_POSITION)?;
    write_i32(w, loc.x)?;
    write_i32(w, loc.y as i32)?;
    write_i32(w, loc.z)
}

pub fn write_use_entity<W: Write>(
    w: &mut W,
    user: EntityId,
    target: EntityId,
    left_click: bool,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::USE_ENTITY)?;
    write_i32(w, user)?;
    write_i32(w, target)?;
    write_bool(w, left_click)
}

pub fn write_update_health<W: Write>(w: &mut W, health: i16) -> Result<(), ProtocolError> {
    write_u8(w, ids::UPDATE_HEALTH)?;
    write_i16(w, health)
}

pub fn write_on_ground<W: Write>(w: &mut W, on_ground: bool) -> Result<(), ProtocolError> {
    write_u8(w, ids::FLYING)?;
    write_bool(w, on_ground)
}

pub fn write_player_position<W: Write>(
    w: &mut W,
    pos: AbsPos,
    stance: f64,
    on_ground: bool,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PLAYER_POSITION)?;
    write_f64(w, pos.x)?;
    write_f64(w, pos.y)?;
    write_f64(w, stance)?;
    write_f64(w, pos.z)?;
    write_bool(w, on_ground)
}

pub fn write_player_look<W: Write>(
    w: &mut W,
    look: LookDegrees,
    on_ground: bool,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PLAYER_LOOK)?;
    write_f32(w, look.yaw)?;
    write_f32(w, look.pitch)?;
    write_bool(w, on_ground)
}

/// Position+look in the server-to-client field order (x, y, stance, z).
pub fn write_player_position_look_to_client<W: Write>(
    w: &mut W,
    pos: AbsPos,
    stance: f64,
    look: LookDegrees,
    on_ground: bool,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PLAYER_POSITION_LOOK)?;
    write_f64(w, pos.x)?;
    write_f64(w, pos.y)?;
    write_f64(w, stance)?;
    write_f64(w, pos.z)?;
    write_f32(w, look.yaw)?;
    write_f32(w, look.pitch)?;
    write_bool(w, on_ground)
}

/// Position+look in the client-to-server field order (x, stance, y, z).
pub fn write_player_position_look_to_server<W: Write>(
    w: &mut W,
    pos: AbsPos,
    stance: f64,
    look: LookDegrees,
    on_ground: bool,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PLAYER_POSITION_LOOK)?;
    write_f64(w, pos.x)?;
    write_f64(w, stance)?;
    write_f64(w, pos.y)?;
    write_f64(w, pos.z)?;
    write_f32(w, look.yaw)?;
    write_f32(w, look.pitch)?;
    write_bool(w, on_ground)
}

pub fn write_player_digging<W: Write>(
    w: &mut W,
    status: DigStatus,
    loc: BlockPos,
    face: Face,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PLAYER_DIGGING)?;
    write_i8(w, status.to_wire())?;
    write_i32(w, loc.x)?;
    write_i8(w, loc.y)?;
    write_i32(w, loc.z)?;
    write_i8(w, face)
}

pub fn write_player_block_placement<W: Write>(
    w: &mut W,
    item_type: ItemTypeId,
    loc: BlockPos,
    face: Face,
    amount: i8,
    uses: i16,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PLAYER_BLOCK_PLACEMENT)?;
    write_i32(w, loc.x)?;
    write_i8(w, loc.y)?;
    write_i32(w, loc.z)?;
    write_i8(w, face)?;
    write_i16(w, item_type)?;
    if item_type >= 0 {
        write_i8(w, amount)?;
        write_i16(w, uses)?;
    }
    Ok(())
}

pub fn write_holding_change<W: Write>(w: &mut W, item_type: ItemTypeId) -> Result<(), ProtocolError> {
    write_u8(w, ids::HOLDING_CHANGE)?;
    write_i16(w, item_type)
}

pub fn write_player_animation<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    animation: i8,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PLAYER_ANIMATION)?;
    write_i32(w, entity_id)?;
    write_i8(w, animation)
}

pub fn write_named_entity_spawn<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    name: &str,
    pos: AbsIntPos,
    look: LookBytes,
    current_item: ItemTypeId,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::NAMED_ENTITY_SPAWN)?;
    write_i32(w, entity_id)?;
    write_string(w, name)?;
    write_abs_int(w, pos)?;
    write_look_bytes(w, look)?;
    write_i16(w, current_item)
}

pub fn write_pickup_spawn<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    item: Slot,
    pos: AbsIntPos,
    orientation: OrientationBytes,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PICKUP_SPAWN)?;
    write_i32(w, entity_id)?;
    write_i16(w, item.item_type)?;
    write_i8(w, item.count)?;
    write_i16(w, item.uses)?;
    write_abs_int(w, pos)?;
    write_i8(w, orientation.yaw)?;
    write_i8(w, orientation.pitch)?;
    write_i8(w, orientation.roll)
}

pub fn write_item_collect<W: Write>(
    w: &mut W,
    collected: EntityId,
    collector: EntityId,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ITEM_COLLECT)?;
    write_i32(w, collected)?;
    write_i32(w, collector)
}

pub fn write_entity_spawn<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    mob_type: i8,
    pos: AbsIntPos,
    look: LookBytes,
    metadata: &[MetadataEntry],
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_SPAWN)?;
    write_i32(w, entity_id)?;
    write_i8(w, mob_type)?;
    write_abs_int(w, pos)?;
    write_look_bytes(w, look)?;
    write_metadata(w, metadata)
}

pub fn write_unknown_x19<W: Write>(
    w: &mut W,
    field1: i32,
    field2: &str,
    fields: [i32; 4],
) -> Result<(), ProtocolError> {
    write_u8(w, ids::UNKNOWN_X19)?;
    write_i32(w, field1)?;
    write_string(w, field2)?;
    for field in fields {
        write_i32(w, field)?;
    }
    Ok(())
}

pub fn write_entity_velocity<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    velocity: Velocity,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_VELOCITY)?;
    write_i32(w, entity_id)?;
    write_i16(w, velocity.x)?;
    write_i16(w, velocity.y)?;
    write_i16(w, velocity.z)
}

pub fn write_entity_destroy<W: Write>(w: &mut W, entity_id: EntityId) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_DESTROY)?;
    write_i32(w, entity_id)
}

pub fn write_entity<W: Write>(w: &mut W, entity_id: EntityId) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY)?;
    write_i32(w, entity_id)
}

pub fn write_entity_rel_move<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    delta: (i8, i8, i8),
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_REL_MOVE)?;
    write_i32(w, entity_id)?;
    write_i8(w, delta.0)?;
    write_i8(w, delta.1)?;
    write_i8(w, delta.2)
}

pub fn write_entity_look<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    look: LookBytes,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_LOOK)?;
    write_i32(w, entity_id)?;
    write_look_bytes(w, look)
}

pub fn write_entity_look_and_rel_move<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    delta: (i8, i8, i8),
    look: LookBytes,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_LOOK_AND_REL_MOVE)?;
    write_i32(w, entity_id)?;
    write_i8(w, delta.0)?;
    write_i8(w, delta.1)?;
    write_i8(w, delta.2)?;
    write_look_bytes(w, look)
}

pub fn write_entity_teleport<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    pos: AbsIntPos,
    look: LookBytes,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_TELEPORT)?;
    write_i32(w, entity_id)?;
    write_abs_int(w, pos)?;
    write_look_bytes(w, look)
}

pub fn write_entity_status<W: Write>(
    w: &mut W,
    entity_id: EntityId,
    status: i8,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::ENTITY_STATUS)?;
    write_i32(w, entity_id)?;
    write_i8(w, status)
}

pub fn write_unknown_x28<W: Write>(
    w: &mut W,
    field1: i32,
    metadata: &[MetadataEntry],
) -> Result<(), ProtocolError> {
    write_u8(w, ids::UNKNOWN_X28)?;
    write_i32(w, field1)?;
    write_metadata(w, metadata)
}

pub fn write_pre_chunk<W: Write>(
    w: &mut W,
    loc: ChunkPos,
    mode: ChunkLoadMode,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::PRE_CHUNK)?;
    write_i32(w, loc.x)?;
    write_i32(w, loc.z)?;
    write_u8(w, mode.to_wire())
}

/// Write a map-chunk packet for a full chunk column.
///
/// The payload is the zlib-compressed concatenation of the block id,
/// metadata, block light and sky light arrays.
pub fn write_map_chunk<W: Write>(
    w: &mut W,
    chunk: ChunkPos,
    blocks: &[u8],
    block_data: &[u8],
    block_light: &[u8],
    sky_light: &[u8],
) -> Result<(), ProtocolError> {
    if blocks.len() != CHUNK_VOLUME
        || block_data.len() != NIBBLE_VOLUME
        || block_light.len() != NIBBLE_VOLUME
        || sky_light.len() != NIBBLE_VOLUME
    {
        return Err(ProtocolError::InvalidField {
            field: "map chunk array length",
            value: blocks.len() as i32,
        });
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(blocks)?;
    encoder.write_all(block_data)?;
    encoder.write_all(block_light)?;
    encoder.write_all(sky_light)?;
    let compressed = encoder.finish()?;

    let corner = chunk.corner_block();
    write_u8(w, ids::MAP_CHUNK)?;
    write_i32(w, corner.x)?;
    write_i8(w, corner.y)?;
    write_i32(w, corner.z)?;
    write_u8(w, (CHUNK_SIZE_X - 1) as u8)?;
    write_u8(w, (CHUNK_SIZE_Y - 1) as u8)?;
    write_u8(w, (CHUNK_SIZE_Z - 1) as u8)?;
    write_i32(w, compressed.len() as i32)?;
    w.write_all(&compressed)?;
    Ok(())
}

/// Inflate a map-chunk payload back into its four concatenated arrays.
pub fn inflate_map_chunk(compressed: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    Ok(data)
}

pub fn write_multi_block_change<W: Write>(
    w: &mut W,
    chunk: ChunkPos,
    changes: &[MultiBlockChange],
) -> Result<(), ProtocolError> {
    write_u8(w, ids::BLOCK_CHANGE_MULTI)?;
    write_i32(w, chunk.x)?;
    write_i32(w, chunk.z)?;
    write_i16(w, changes.len() as i16)?;
    for change in changes {
        let raw = ((change.loc.x as i16) << 12) | ((change.loc.z as i16) << 8) | change.loc.y as i16;
        write_i16(w, raw)?;
    }
    for change in changes {
        write_u8(w, change.block_id)?;
    }
    for change in changes {
        write_u8(w, change.meta)?;
    }
    Ok(())
}

pub fn write_block_change<W: Write>(
    w: &mut W,
    loc: BlockPos,
    block_id: BlockId,
    meta: u8,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::BLOCK_CHANGE)?;
    write_i32(w, loc.x)?;
    write_i8(w, loc.y)?;
    write_i32(w, loc.z)?;
    write_u8(w, block_id)?;
    write_u8(w, meta)
}

pub fn write_unknown_x36<W: Write>(
    w: &mut W,
    field1: i32,
    field2: i16,
    field3: i32,
    field4: u8,
    field5: u8,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::UNKNOWN_X36)?;
    write_i32(w, field1)?;
    write_i16(w, field2)?;
    write_i32(w, field3)?;
    write_u8(w, field4)?;
    write_u8(w, field5)
}

pub fn write_window_open<W: Write>(
    w: &mut W,
    window_id: WindowId,
    inv_type_id: i8,
    title: &str,
    num_slots: u8,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::WINDOW_OPEN)?;
    write_i8(w, window_id)?;
    write_i8(w, inv_type_id)?;
    write_string(w, title)?;
    write_u8(w, num_slots)
}

pub fn write_window_close<W: Write>(w: &mut W, window_id: WindowId) -> Result<(), ProtocolError> {
    write_u8(w, ids::WINDOW_CLOSE)?;
    write_i8(w, window_id)
}

pub fn write_window_click<W: Write>(
    w: &mut W,
    window_id: WindowId,
    slot_id: SlotId,
    right_click: bool,
    tx_id: TxId,
    item: Slot,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::WINDOW_CLICK)?;
    write_i8(w, window_id)?;
    write_i16(w, slot_id)?;
    write_bool(w, right_click)?;
    write_i16(w, tx_id)?;
    write_slot(w, &item)
}

pub fn write_set_slot<W: Write>(
    w: &mut W,
    window_id: WindowId,
    slot_id: SlotId,
    item: Slot,
) -> Result<(), ProtocolError> {
    write_u8(w, ids::SET_SLOT)?;
    write_i8(w, window_id)?;
    write_i16(w, slot_id)?;
    write_slot(w, &item)
}

pub fn write_window_items<W: Write>(
    w: &mut W,
    window_id: WindowId,
    items: &[Slot],
) -> Result<(), ProtocolError> {
    write_u8(w, ids::WINDOW_ITEMS)?;
    write_i8(w, window_id)?;
    write_i16(w, items.len() as i16)?;
    for item in items {
        write_slot(w, item)?;
    }
    Ok(())
}

pub fn write_disconnect<W: Write>(w: &mut W, reason: &str) -> Result<(), ProtocolError> {
    write_u8(w, ids::DISCONNECT)?;
    write_string(w, reason)
}

fn write_abs_int<W: Write>(w: &mut W, pos: AbsIntPos) -> Result<(), ProtocolError> {
    write_i32(w, pos.x)?;
    write_i32(w, pos.y)?;
    write_i32(w, pos.z)
}

fn write_look_bytes<W: Write>(w: &mut W, look: LookBytes) -> Result<(), ProtocolError> {
    write_i8(w, look.yaw)?;
    write_i8(w, look.pitch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn login_version_gate_rejects_other_versions() {
        let mut buf = Vec::new();
        write_login_request(&mut buf, 7, "alex", "", 0, 0).unwrap();
        match read_login_request(&mut Cursor::new(buf)) {
            Err(ProtocolError::VersionMismatch { expected: 8, got: 7 }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn login_version_gate_accepts_version_8() {
        let mut buf = Vec::new();
        write_login_request(&mut buf, PROTOCOL_VERSION, "alex", "", 0, 0).unwrap();
        let login = read_login_request(&mut Cursor::new(buf)).unwrap();
        assert_eq!(login.username, "alex");
        assert_eq!(login.map_seed, 0);
    }

    #[test]
    fn handshake_expects_its_packet_id() {
        let mut buf = Vec::new();
        write_chat_message(&mut buf, "hi").unwrap();
        assert!(matches!(
            read_handshake_request(&mut Cursor::new(buf)),
            Err(ProtocolError::UnexpectedPacketId {
                expected: ids::HANDSHAKE,
                got: ids::CHAT_MESSAGE,
            })
        ));
    }

    #[test]
    fn placement_tail_absent_for_empty_hand() {
        let mut buf = Vec::new();
        write_player_block_placement(&mut buf, -1, BlockPos { x: 1, y: 2, z: 3 }, 4, 0, 0)
            .unwrap();
        // id + x + y + z + face + item id, and nothing else.
        assert_eq!(buf.len(), 1 + 4 + 1 + 4 + 1 + 2);
    }

    #[test]
    fn placement_tail_present_for_real_item() {
        let mut buf = Vec::new();
        write_player_block_placement(&mut buf, 3, BlockPos { x: 1, y: 2, z: 3 }, 4, 5, 6).unwrap();
        assert_eq!(buf.len(), 1 + 4 + 1 + 4 + 1 + 2 + 1 + 2);
    }

    #[test]
    fn empty_slot_encodes_as_bare_sentinel() {
        let mut buf = Vec::new();
        write_set_slot(&mut buf, 1, 36, Slot::EMPTY).unwrap();
        // id + window + slot + item id (-1), no amount/uses tail.
        assert_eq!(buf.len(), 1 + 1 + 2 + 2);
        assert_eq!(&buf[4..], [0xff, 0xff]);
    }

    #[test]
    fn map_chunk_payload_inflates_to_full_column() {
        let blocks = vec![1u8; chunkwright_core::CHUNK_VOLUME];
        let nibbles = vec![0u8; chunkwright_core::NIBBLE_VOLUME];
        let mut buf = Vec::new();
        write_map_chunk(&mut buf, ChunkPos::new(1, 1), &blocks, &nibbles, &nibbles, &nibbles)
            .unwrap();

        // Corner block and size fields for chunk (1, 1).
        assert_eq!(buf[0], ids::MAP_CHUNK);
        assert_eq!(&buf[1..5], 16i32.to_be_bytes());
        assert_eq!(buf[5], 0);
        assert_eq!(&buf[6..10], 16i32.to_be_bytes());
        assert_eq!(&buf[10..13], [15, 127, 15]);

        let compressed_len = i32::from_be_bytes(buf[13..17].try_into().unwrap()) as usize;
        assert_eq!(buf.len(), 17 + compressed_len);
        let inflated = inflate_map_chunk(&buf[17..]).unwrap();
        assert_eq!(inflated.len(), 81920);
        assert_eq!(&inflated[..chunkwright_core::CHUNK_VOLUME], &blocks[..]);
    }

    #[test]
    fn multi_block_change_packs_locations() {
        let changes = [MultiBlockChange {
            loc: SubChunkPos { x: 5, y: 64, z: 7 },
            block_id: 0,
            meta: 0,
        }];
        let mut buf = Vec::new();
        write_multi_block_change(&mut buf, ChunkPos::new(0, 0), &changes).unwrap();
        let raw = i16::from_be_bytes(buf[11..13].try_into().unwrap());
        assert_eq!((raw >> 12) & 0xf, 5);
        assert_eq!((raw >> 8) & 0xf, 7);
        assert_eq!(raw & 0xff, 64);
    }
}
