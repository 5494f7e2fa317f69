//! Coordinate spaces and the conversions between them.
//!
//! Every spatial quantity is tagged by its space so that a block address
//! can never be confused with a chunk address or a fixed-point entity
//! position. Conversions are explicit methods; the block to
//! (chunk, chunk-local) decomposition is a pure total function and
//! round-trips exactly.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Chunk width (X axis) in blocks.
pub const CHUNK_SIZE_X: usize = 16;
/// Chunk height (Y axis) in blocks.
pub const CHUNK_SIZE_Y: usize = 128;
/// Chunk depth (Z axis) in blocks.
pub const CHUNK_SIZE_Z: usize = 16;
/// Total block count per chunk.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;
/// Length of the packed half-byte arrays (metadata and light).
pub const NIBBLE_VOLUME: usize = CHUNK_VOLUME / 2;
/// Length of the per-column height map.
pub const HEIGHT_MAP_LEN: usize = CHUNK_SIZE_X * CHUNK_SIZE_Z;
/// Chunks per shard edge. A shard owns `SHARD_SIZE * SHARD_SIZE` chunks.
pub const SHARD_SIZE: i32 = 16;
/// Fixed-point scale of [`AbsIntPos`]: 32 units per block.
pub const PIXELS_PER_BLOCK: i32 = 32;

/// Error for arithmetic that would leave a coordinate space.
///
/// Recoverable by policy: the offending request is ignored and logged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("coordinate out of bounds: {0}")]
pub struct OutOfBounds(pub String);

/// Absolute position with fractional precision. Player and entity pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsPos {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AbsPos {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert to the 1/32-block fixed point used for spawned entities.
    pub fn to_abs_int(self) -> AbsIntPos {
        AbsIntPos {
            x: (self.x * PIXELS_PER_BLOCK as f64) as i32,
            y: (self.y * PIXELS_PER_BLOCK as f64) as i32,
            z: (self.z * PIXELS_PER_BLOCK as f64) as i32,
        }
    }

    /// Block containing this position. Fails when y leaves the world slab.
    pub fn to_block(self) -> Result<BlockPos, OutOfBounds> {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    /// Chunk column containing this position.
    pub fn to_chunk(self) -> ChunkPos {
        ChunkPos {
            x: (self.x / CHUNK_SIZE_X as f64).floor() as i32,
            z: (self.z / CHUNK_SIZE_Z as f64).floor() as i32,
        }
    }
}

/// Fixed-point absolute position, 1/32 of a block per unit.
///
/// This is the wire representation of spawned entity positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsIntPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl AbsIntPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_abs(self) -> AbsPos {
        AbsPos {
            x: self.x as f64 / PIXELS_PER_BLOCK as f64,
            y: self.y as f64 / PIXELS_PER_BLOCK as f64,
            z: self.z as f64 / PIXELS_PER_BLOCK as f64,
        }
    }

    /// Block containing this position.
    pub fn to_block(self) -> Result<BlockPos, OutOfBounds> {
        BlockPos::new(
            self.x.div_euclid(PIXELS_PER_BLOCK),
            self.y.div_euclid(PIXELS_PER_BLOCK),
            self.z.div_euclid(PIXELS_PER_BLOCK),
        )
    }
}

/// World-block address. `y` is confined to the 128-block world slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i8,
    pub z: i32,
}

impl BlockPos {
    /// Build a block address, validating the y range.
    pub fn new(x: i32, y: i32, z: i32) -> Result<Self, OutOfBounds> {
        if !(0..CHUNK_SIZE_Y as i32).contains(&y) {
            return Err(OutOfBounds(format!("block y={y} outside [0,127]")));
        }
        Ok(Self { x, y: y as i8, z })
    }

    /// Decompose into the owning chunk and the chunk-local address.
    pub fn to_chunk_local(self) -> (ChunkPos, SubChunkPos) {
        let chunk = ChunkPos {
            x: self.x.div_euclid(CHUNK_SIZE_X as i32),
            z: self.z.div_euclid(CHUNK_SIZE_Z as i32),
        };
        let sub = SubChunkPos {
            x: self.x.rem_euclid(CHUNK_SIZE_X as i32) as u8,
            y: self.y as u8,
            z: self.z.rem_euclid(CHUNK_SIZE_Z as i32) as u8,
        };
        (chunk, sub)
    }

    /// Inverse of [`BlockPos::to_chunk_local`].
    pub fn from_chunk_local(chunk: ChunkPos, sub: SubChunkPos) -> Self {
        Self {
            x: chunk.x * CHUNK_SIZE_X as i32 + sub.x as i32,
            y: sub.y as i8,
            z: chunk.z * CHUNK_SIZE_Z as i32 + sub.z as i32,
        }
    }

    /// Fixed-point position of the centre of this block's top face plane.
    ///
    /// X and Z are centred, Y sits on the block floor; pickup items spawn
    /// here when a block breaks.
    pub fn center_abs_int(self) -> AbsIntPos {
        AbsIntPos {
            x: self.x * PIXELS_PER_BLOCK + PIXELS_PER_BLOCK / 2,
            y: self.y as i32 * PIXELS_PER_BLOCK,
            z: self.z * PIXELS_PER_BLOCK + PIXELS_PER_BLOCK / 2,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk-local block address: `0 <= x < 16`, `0 <= y < 128`, `0 <= z < 16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubChunkPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl SubChunkPos {
    /// Build a chunk-local address, validating all three ranges.
    pub fn new(x: u8, y: u8, z: u8) -> Result<Self, OutOfBounds> {
        if x as usize >= CHUNK_SIZE_X || y as usize >= CHUNK_SIZE_Y || z as usize >= CHUNK_SIZE_Z {
            return Err(OutOfBounds(format!("sub-chunk ({x}, {y}, {z})")));
        }
        Ok(Self { x, y, z })
    }

    /// Linear index into the chunk's block array.
    ///
    /// Column-major Y-fastest order: `y + z*128 + x*128*16`, matching the
    /// persisted chunk layout.
    pub fn index(self) -> usize {
        self.y as usize
            + self.z as usize * CHUNK_SIZE_Y
            + self.x as usize * CHUNK_SIZE_Y * CHUNK_SIZE_Z
    }
}

/// Identifies a 16x128x16 column of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Shard owning this chunk.
    pub fn to_shard(self) -> ShardPos {
        ShardPos {
            x: self.x.div_euclid(SHARD_SIZE),
            z: self.z.div_euclid(SHARD_SIZE),
        }
    }

    /// Block address of the chunk's minimum corner.
    pub fn corner_block(self) -> BlockPos {
        BlockPos {
            x: self.x * CHUNK_SIZE_X as i32,
            y: 0,
            z: self.z * CHUNK_SIZE_Z as i32,
        }
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Identifies a shard: a square group of `SHARD_SIZE`-per-edge chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardPos {
    pub x: i32,
    pub z: i32,
}

impl ShardPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Whether the given chunk falls inside this shard.
    pub fn contains(self, chunk: ChunkPos) -> bool {
        chunk.to_shard() == self
    }
}

impl fmt::Display for ShardPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}
