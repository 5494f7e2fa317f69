//! The chunkwright server runtime.
//!
//! Cooperative single-writer actors connected by message queues: one
//! task per shard ([`shard`]) owning its chunks ([`chunk_actor`]), one
//! task per player connection ([`session`]) with a bounded transmit
//! pump, and a small supervisor ([`game`]) that hands out shard
//! handles. Errors never cross an actor boundary: fatal ones end the
//! owning actor, recoverable ones are logged and dropped.

pub mod chunk_actor;
pub mod game;
pub mod messages;
pub mod session;
pub mod shard;

pub use chunk_actor::{ChunkActor, PickupItem};
pub use game::{serve, spawn_game, EntityIds, GameConnecter, GameRouter, Settings};
pub use messages::{DropReason, PlayerHandle, PlayerMessage, ShardRequest};
pub use session::run_session;
pub use shard::{spawn_shard, ShardContext, ShardHandle};

/// Render one packet into a fresh buffer. In-memory writes cannot fail.
pub(crate) fn packet(
    build: impl FnOnce(&mut Vec<u8>) -> Result<(), chunkwright_net::ProtocolError>,
) -> Vec<u8> {
    let mut buf = Vec::new();
    build(&mut buf).expect("writing to a Vec cannot fail");
    buf
}
