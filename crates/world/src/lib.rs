//! World data for the chunkwright server core.
//!
//! Chunk block arrays ([`chunk`]), the persisted chunk store ([`store`]),
//! data-driven block types and aspects ([`block`]), the generator
//! interface ([`generator`]), and the inventory/window model
//! ([`inventory`], [`window`]).

pub mod block;
pub mod chunk;
pub mod generator;
pub mod inventory;
pub mod store;
pub mod window;

pub use block::{
    BlockAspect, BlockAttrs, BlockDefError, BlockRegistry, BlockType, ContainerSpec,
    StandardAspect, VoidAspect,
};
pub use chunk::{ChunkData, NibbleArray, BLOCK_AIR};
pub use generator::{ChunkSource, FlatGenerator};
pub use inventory::{ClickPolicy, Inventory, SlotSubscriber};
pub use store::{ChunkReader, ChunkStore, StoreError};
pub use window::{Window, WindowIdSource, WindowViewer, PLAYER_INVENTORY_WINDOW};
