//! Core types shared by every chunkwright crate.
//!
//! Defines the coordinate spaces of the world (absolute, fixed-point,
//! block, chunk-local, chunk, shard) with explicit conversions between
//! them, the scalar types that appear on the wire, and the item [`Slot`]
//! used by inventories and pickup entities.

pub mod coords;
pub mod slot;
pub mod types;

pub use coords::{
    AbsIntPos, AbsPos, BlockPos, ChunkPos, OutOfBounds, ShardPos, SubChunkPos, CHUNK_SIZE_X,
    CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME, HEIGHT_MAP_LEN, NIBBLE_VOLUME, PIXELS_PER_BLOCK,
    SHARD_SIZE,
};
pub use slot::{Slot, MAX_STACK};
pub use types::{
    AngleBytes, AngleDegrees, BlockId, ChunkLoadMode, DigStatus, DimensionId, EntityId, Face,
    ItemTypeId, LookBytes, LookDegrees, OrientationBytes, RandomSeed, SlotId, TimeOfDay, TxId,
    Velocity, WindowId, FACE_NONE,
};
