//! Shard actors.
//!
//! A shard is one tokio task owning a disjoint set of chunks. It
//! interleaves inbound requests from player sessions with a fixed 20 Hz
//! tick, and is the only execution context that ever touches its
//! chunks' data. Chunks come into being on first reference, loaded from
//! the store or generated, and are retired once unobserved past the
//! idle grace period.

use crate::chunk_actor::{ChunkActor, PickupItem};
use crate::game::{EntityIds, GameRouter};
use crate::messages::ShardRequest;
use chunkwright_core::{AbsPos, ChunkPos, ShardPos};
use chunkwright_world::{BlockRegistry, ChunkSource, ChunkStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Wall-clock tick cadence: 20 Hz.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Everything a shard needs besides its own chunks. Cloned per shard.
#[derive(Clone)]
pub struct ShardContext {
    pub store: Arc<ChunkStore>,
    pub source: Arc<dyn ChunkSource>,
    pub blocks: Arc<BlockRegistry>,
    pub entity_ids: EntityIds,
    pub idle_grace: Duration,
    pub router: GameRouter,
}

/// Cheap cloneable address of a running shard.
#[derive(Clone, Debug)]
pub struct ShardHandle {
    pos: ShardPos,
    tx: mpsc::UnboundedSender<ShardRequest>,
}

impl ShardHandle {
    pub fn pos(&self) -> ShardPos {
        self.pos
    }

    /// Post a request onto the shard's mailbox. Requests to a shard that
    /// has shut down are discarded.
    pub fn send(&self, request: ShardRequest) {
        let _ = self.tx.send(request);
    }
}

/// Start the actor task for a shard and return its handle.
pub fn spawn_shard(pos: ShardPos, ctx: ShardContext) -> ShardHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_shard(pos, ctx, rx));
    ShardHandle { pos, tx }
}

async fn run_shard(pos: ShardPos, ctx: ShardContext, mut rx: mpsc::UnboundedReceiver<ShardRequest>) {
    info!(shard = %pos, "shard starting");
    let mut shard = Shard {
        pos,
        ctx,
        chunks: HashMap::new(),
    };

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            request = rx.recv() => match request {
                Some(request) => shard.handle(request),
                None => break,
            },
            _ = ticker.tick() => shard.tick(),
        }
    }
    info!(shard = %pos, "shard stopping");
}

struct Shard {
    pos: ShardPos,
    ctx: ShardContext,
    chunks: HashMap<ChunkPos, ChunkActor>,
}

impl Shard {
    /// Dispatch one request to the chunk it concerns. Requests that name
    /// a chunk outside this shard are logged and dropped; a shard never
    /// reaches across its boundary.
    fn handle(&mut self, request: ShardRequest) {
        match request {
            ShardRequest::Subscribe { chunk, player } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.subscribe(player);
                }
            }
            ShardRequest::Unsubscribe {
                chunk,
                entity_id,
                send_unload,
            } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.unsubscribe(entity_id, send_unload);
                }
            }
            ShardRequest::Multicast {
                chunk,
                exclude,
                packet,
            } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.multicast(exclude, &packet);
                }
            }
            ShardRequest::AddPlayerData {
                chunk,
                entity_id,
                name,
                pos,
                look,
                held,
            } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.add_player_data(entity_id, name, pos, look, held);
                }
            }
            ShardRequest::RemovePlayerData { chunk, entity_id } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.remove_player_data(entity_id);
                }
            }
            ShardRequest::SetPlayerPositionLook {
                chunk,
                entity_id,
                pos,
                look,
            } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.set_player_position_look(entity_id, pos, look);
                }
            }
            ShardRequest::HitBlock {
                entity_id,
                held,
                target,
                status,
                face,
            } => {
                let (chunk, _) = target.to_chunk_local();
                if let Some(actor) = self.chunk(chunk) {
                    actor.hit_block(entity_id, held, target, status, face);
                }
            }
            ShardRequest::InteractBlock {
                entity_id,
                held,
                target,
                face,
            } => {
                let (chunk, _) = target.to_chunk_local();
                if let Some(actor) = self.chunk(chunk) {
                    actor.interact_block(entity_id, held, target, face);
                }
            }
            ShardRequest::PlaceItem {
                entity_id,
                target,
                slot,
            } => {
                let (chunk, _) = target.to_chunk_local();
                if let Some(actor) = self.chunk(chunk) {
                    actor.place_item(entity_id, target, slot);
                }
            }
            ShardRequest::TakeItem {
                entity_id,
                chunk,
                item_entity_id,
            } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.take_item(entity_id, item_entity_id);
                }
            }
            ShardRequest::DropItem {
                content,
                pos,
                velocity,
            } => {
                let chunk = pos.to_chunk();
                if let Some(actor) = self.chunk(chunk) {
                    actor.drop_item(content, pos, velocity);
                }
            }
            ShardRequest::TransferItem {
                chunk,
                item_entity_id,
                item,
                pos,
                velocity,
            } => {
                if let Some(actor) = self.chunk(chunk) {
                    actor.transfer_item(PickupItem::new(item_entity_id, item, pos, velocity));
                }
            }
            ShardRequest::InventoryClick {
                entity_id,
                block,
                cursor,
                right_click,
                shift_click,
                slot_id,
            } => {
                let (chunk, _) = block.to_chunk_local();
                if let Some(actor) = self.chunk(chunk) {
                    actor.inventory_click(entity_id, block, cursor, right_click, shift_click, slot_id);
                }
            }
            ShardRequest::InventoryUnsubscribed { entity_id, block } => {
                let (chunk, _) = block.to_chunk_local();
                if let Some(actor) = self.chunk(chunk) {
                    actor.inventory_unsubscribed(entity_id, block);
                }
            }
            ShardRequest::Disconnect { entity_id } => {
                for actor in self.chunks.values_mut() {
                    actor.disconnect(entity_id);
                }
            }
        }
    }

    /// Tick every chunk, re-home items that crossed chunk boundaries,
    /// and retire chunks that have idled out.
    fn tick(&mut self) {
        let mut moved: Vec<PickupItem> = Vec::new();
        for actor in self.chunks.values_mut() {
            moved.extend(actor.tick());
        }

        for item in moved {
            let chunk = AbsPos::to_chunk(item.pos.to_abs());
            if self.pos.contains(chunk) {
                if let Some(actor) = self.chunk(chunk) {
                    actor.transfer_item(item);
                }
            } else {
                // Crossing a shard boundary becomes a message; there is
                // no ordering guarantee with the destination.
                self.ctx.router.route(
                    chunk.to_shard(),
                    ShardRequest::TransferItem {
                        chunk,
                        item_entity_id: item.entity_id,
                        item: item.item,
                        pos: item.pos,
                        velocity: item.velocity,
                    },
                );
            }
        }

        let now = Instant::now();
        let grace = self.ctx.idle_grace;
        self.chunks.retain(|loc, actor| {
            let retire = actor.retirable(now, grace);
            if retire {
                debug!(chunk = %loc, "retiring idle chunk");
            }
            !retire
        });
    }

    /// The actor for a chunk, created on first reference. Outside-shard
    /// chunks yield `None`.
    fn chunk(&mut self, loc: ChunkPos) -> Option<&mut ChunkActor> {
        if !self.pos.contains(loc) {
            warn!(shard = %self.pos, chunk = %loc, "request for chunk outside shard ignored");
            return None;
        }
        if !self.chunks.contains_key(&loc) {
            let data = load_chunk_data(&self.ctx, loc);
            let actor = ChunkActor::new(
                loc,
                data,
                Arc::clone(&self.ctx.blocks),
                self.ctx.entity_ids.clone(),
            );
            self.chunks.insert(loc, actor);
        }
        self.chunks.get_mut(&loc)
    }
}

/// Initial chunk state: the store if a valid file exists, otherwise the
/// generator. A malformed file is logged and falls through.
fn load_chunk_data(ctx: &ShardContext, loc: ChunkPos) -> chunkwright_world::ChunkData {
    match ctx.store.load(loc) {
        Ok(Some(reader)) => match reader.chunk_data() {
            Ok(data) => return data,
            Err(e) => warn!(chunk = %loc, error = %e, "malformed chunk file, regenerating"),
        },
        Ok(None) => {}
        Err(e) => warn!(chunk = %loc, error = %e, "chunk load failed, regenerating"),
    }
    ctx.source.generate(loc)
}
