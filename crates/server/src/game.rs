//! The game service: shard lookup, entity id allocation, and the
//! accept loop.
//!
//! A small supervisor task owns the map of running shards. Sessions ask
//! it for shard handles ([`GameConnecter::connect`]); shards use the
//! fire-and-forget [`GameRouter`] to pass requests across shard
//! boundaries. Shared read-only state (block table, settings) travels
//! by `Arc`; nothing mutable is shared.

use crate::messages::ShardRequest;
use crate::session;
use crate::shard::{spawn_shard, ShardContext, ShardHandle};
use chunkwright_core::{AbsPos, EntityId, RandomSeed, ShardPos};
use chunkwright_world::{BlockRegistry, ChunkSource, ChunkStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Monotonic allocator of server-wide unique entity ids.
#[derive(Clone, Debug)]
pub struct EntityIds(Arc<AtomicI32>);

impl EntityIds {
    pub fn new() -> Self {
        Self(Arc::new(AtomicI32::new(1)))
    }

    pub fn next(&self) -> EntityId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for EntityIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime knobs shared by sessions and shards.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Frames the per-connection transmit queue holds before the
    /// connection is dropped as a slow client.
    pub transmit_queue_capacity: usize,
    /// How long an unobserved chunk lingers before retirement.
    pub chunk_idle_grace: Duration,
    /// Chunk radius each player stays subscribed to.
    pub view_radius: i32,
    /// Seed reported to clients at login.
    pub map_seed: RandomSeed,
    /// Where new players appear.
    pub spawn_position: AbsPos,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transmit_queue_capacity: 128,
            chunk_idle_grace: Duration::from_secs(30),
            view_radius: 2,
            map_seed: 0,
            spawn_position: AbsPos::new(8.0, 66.0, 8.0),
        }
    }
}

enum GameRequest {
    Connect {
        shard: ShardPos,
        reply: oneshot::Sender<ShardHandle>,
    },
    Route {
        shard: ShardPos,
        request: ShardRequest,
    },
}

/// Fire-and-forget routing of shard requests by shard position. Used
/// for shard-to-shard traffic (e.g. items crossing a shard boundary).
#[derive(Clone)]
pub struct GameRouter {
    tx: mpsc::UnboundedSender<GameRequest>,
}

impl GameRouter {
    pub fn route(&self, shard: ShardPos, request: ShardRequest) {
        let _ = self.tx.send(GameRequest::Route { shard, request });
    }
}

/// The session-facing face of the game service.
#[derive(Clone)]
pub struct GameConnecter {
    tx: mpsc::UnboundedSender<GameRequest>,
    pub entity_ids: EntityIds,
    pub blocks: Arc<BlockRegistry>,
    pub settings: Arc<Settings>,
}

impl GameConnecter {
    /// Look up (or lazily start) the shard at `shard`, returning its
    /// handle. `None` only when the game service itself has stopped.
    pub async fn connect(&self, shard: ShardPos) -> Option<ShardHandle> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(GameRequest::Connect { shard, reply }).ok()?;
        rx.await.ok()
    }

    pub fn router(&self) -> GameRouter {
        GameRouter {
            tx: self.tx.clone(),
        }
    }
}

/// Start the game supervisor and return the connecter sessions use.
pub fn spawn_game(
    store: Arc<ChunkStore>,
    source: Arc<dyn ChunkSource>,
    blocks: Arc<BlockRegistry>,
    settings: Settings,
) -> GameConnecter {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let entity_ids = EntityIds::new();
    let settings = Arc::new(settings);

    let ctx = ShardContext {
        store,
        source,
        blocks: Arc::clone(&blocks),
        entity_ids: entity_ids.clone(),
        idle_grace: settings.chunk_idle_grace,
        router: GameRouter { tx: tx.clone() },
    };

    tokio::spawn(async move {
        let mut shards: HashMap<ShardPos, ShardHandle> = HashMap::new();
        while let Some(request) = rx.recv().await {
            match request {
                GameRequest::Connect { shard, reply } => {
                    let handle = shards
                        .entry(shard)
                        .or_insert_with(|| spawn_shard(shard, ctx.clone()));
                    let _ = reply.send(handle.clone());
                }
                GameRequest::Route { shard, request } => {
                    shards
                        .entry(shard)
                        .or_insert_with(|| spawn_shard(shard, ctx.clone()))
                        .send(request);
                }
            }
        }
        debug!("game supervisor stopping");
    });

    GameConnecter {
        tx,
        entity_ids,
        blocks,
        settings,
    }
}

/// Accept connections forever, one session task per connection.
pub async fn serve(listener: TcpListener, game: GameConnecter) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "connection accepted");
        let game = game.clone();
        tokio::spawn(async move {
            if let Err(e) = session::run_session(stream, game).await {
                debug!(%peer, error = %e, "session ended with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_monotonic() {
        let ids = EntityIds::new();
        let a = ids.next();
        let b = ids.next();
        let c = ids.clone().next();
        assert!(a < b && b < c);
        assert_eq!(a, 1);
    }
}
