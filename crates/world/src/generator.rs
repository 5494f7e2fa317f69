//! The interface the core consumes from the world generator.
//!
//! Generation algorithms live outside this core; shards only need a way
//! to produce block data for a chunk that has no persisted file. The
//! [`FlatGenerator`] is the reference implementation used as fallback
//! and in tests.

use crate::chunk::ChunkData;
use chunkwright_core::{BlockId, ChunkPos};

/// Produces the initial block data of chunks that are not in the store.
pub trait ChunkSource: Send + Sync {
    fn generate(&self, loc: ChunkPos) -> ChunkData;
}

/// Flat terrain: one block id up to a fixed surface level everywhere.
pub struct FlatGenerator {
    surface_block: BlockId,
    surface_level: u8,
}

impl FlatGenerator {
    pub fn new(surface_block: BlockId, surface_level: u8) -> Self {
        Self {
            surface_block,
            surface_level,
        }
    }
}

impl ChunkSource for FlatGenerator {
    fn generate(&self, _loc: ChunkPos) -> ChunkData {
        let mut data = ChunkData::new();
        data.fill_layers(0..self.surface_level, self.surface_block);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkwright_core::SubChunkPos;

    #[test]
    fn flat_generator_fills_to_surface_level() {
        let data = FlatGenerator::new(3, 64).generate(ChunkPos::new(0, 0));
        assert_eq!(data.block_id(SubChunkPos { x: 5, y: 63, z: 7 }), 3);
        assert_eq!(data.block_id(SubChunkPos { x: 5, y: 64, z: 7 }), 0);
        assert_eq!(data.height_at(5, 7), 64);
    }
}
