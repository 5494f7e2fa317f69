//! Shard-owned chunk state.
//!
//! A [`ChunkActor`] is the single-writer authority over one chunk's
//! block arrays, its pickup entities, its block inventories, and the set
//! of subscribed players. Every method here runs on the owning shard's
//! task; the only way out is packet bytes or control messages through a
//! [`PlayerHandle`].

use crate::game::EntityIds;
use crate::messages::{PlayerHandle, PlayerMessage};
use crate::packet;
use chunkwright_core::{
    AbsIntPos, AbsPos, BlockPos, ChunkLoadMode, ChunkPos, DigStatus, EntityId, Face, ItemTypeId,
    LookBytes, OrientationBytes, Slot, SlotId, SubChunkPos, Velocity, PIXELS_PER_BLOCK,
};
use chunkwright_net::codec;
use chunkwright_world::{BlockRegistry, ChunkData, Inventory, BLOCK_AIR};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc as sync_mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Downward acceleration of pickup items, in 1/32 blocks per tick².
const ITEM_GRAVITY: i16 = 2;
/// Terminal fall speed of pickup items.
const ITEM_TERMINAL_VELOCITY: i16 = 16;
/// Squared pickup-offer radius in 1/32 blocks (1.5 blocks).
const OFFER_RADIUS_SQ: i64 = 48 * 48;

/// A pickup item resident in a chunk.
#[derive(Debug, Clone)]
pub struct PickupItem {
    pub entity_id: EntityId,
    pub item: Slot,
    pub pos: AbsIntPos,
    pub velocity: Velocity,
    offered: HashSet<EntityId>,
}

impl PickupItem {
    pub fn new(entity_id: EntityId, item: Slot, pos: AbsIntPos, velocity: Velocity) -> Self {
        Self {
            entity_id,
            item,
            pos,
            velocity,
            offered: HashSet::new(),
        }
    }

    fn chunk(&self) -> ChunkPos {
        AbsPos::to_chunk(self.pos.to_abs())
    }
}

/// A player the chunk is aware of (position, name, held item).
struct PlayerData {
    name: String,
    pos: AbsPos,
    look: LookBytes,
    held: ItemTypeId,
}

/// A container block's inventory plus its current viewers.
struct BlockInventory {
    inventory: Inventory,
    updates: sync_mpsc::Receiver<(SlotId, Slot)>,
    viewers: HashSet<EntityId>,
}

impl BlockInventory {
    fn new(num_slots: usize) -> Self {
        let mut inventory = Inventory::new(num_slots);
        let (tx, updates) = sync_mpsc::channel();
        inventory.set_subscriber(Box::new(move |slot_id, slot| {
            let _ = tx.send((slot_id, slot));
        }));
        Self {
            inventory,
            updates,
            viewers: HashSet::new(),
        }
    }
}

/// Single-writer state of one chunk.
pub struct ChunkActor {
    loc: ChunkPos,
    data: ChunkData,
    blocks: Arc<BlockRegistry>,
    entity_ids: EntityIds,
    subscribers: HashMap<EntityId, PlayerHandle>,
    player_data: HashMap<EntityId, PlayerData>,
    items: HashMap<EntityId, PickupItem>,
    block_inventories: HashMap<SubChunkPos, BlockInventory>,
    rng: StdRng,
    idle_since: Option<Instant>,
}

impl ChunkActor {
    pub fn new(
        loc: ChunkPos,
        data: ChunkData,
        blocks: Arc<BlockRegistry>,
        entity_ids: EntityIds,
    ) -> Self {
        // Seed the tick rng from the chunk position so effects differ
        // between chunks but stay reproducible.
        let seed = ((loc.x as u64) << 32) ^ (loc.z as u64 & 0xffff_ffff) ^ 0x63_77_72_69;
        Self {
            loc,
            data,
            blocks,
            entity_ids,
            subscribers: HashMap::new(),
            player_data: HashMap::new(),
            items: HashMap::new(),
            block_inventories: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
            idle_since: Some(Instant::now()),
        }
    }

    pub fn loc(&self) -> ChunkPos {
        self.loc
    }

    pub fn data(&self) -> &ChunkData {
        &self.data
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether the chunk has been without subscribers beyond the grace
    /// period and may be dropped.
    pub fn retirable(&self, now: Instant, grace: Duration) -> bool {
        self.subscribers.is_empty()
            && self
                .idle_since
                .map(|since| now.duration_since(since) >= grace)
                .unwrap_or(false)
    }

    /// Register a subscriber, sending the full snapshot first: pre-chunk
    /// init, the compressed map-chunk, and a spawn per entity present.
    pub fn subscribe(&mut self, player: PlayerHandle) {
        player.transmit(packet(|buf| {
            codec::write_pre_chunk(buf, self.loc, ChunkLoadMode::Init)
        }));
        player.transmit(self.map_chunk_packet());

        for (&entity_id, data) in &self.player_data {
            if entity_id == player.entity_id() {
                continue;
            }
            player.transmit(packet(|buf| {
                codec::write_named_entity_spawn(
                    buf,
                    entity_id,
                    &data.name,
                    data.pos.to_abs_int(),
                    data.look,
                    data.held,
                )
            }));
        }
        for item in self.items.values() {
            player.transmit(pickup_spawn_packet(item));
        }

        self.subscribers.insert(player.entity_id(), player);
        self.idle_since = None;
    }

    /// Drop a subscriber. An unload packet is sent only when requested.
    pub fn unsubscribe(&mut self, entity_id: EntityId, send_unload: bool) {
        if let Some(player) = self.subscribers.remove(&entity_id) {
            if send_unload {
                player.transmit(packet(|buf| {
                    codec::write_pre_chunk(buf, self.loc, ChunkLoadMode::Unload)
                }));
            }
        }
        if self.subscribers.is_empty() {
            self.idle_since = Some(Instant::now());
        }
    }

    /// Release everything a disconnecting player holds here. No unload
    /// packets are sent.
    pub fn disconnect(&mut self, entity_id: EntityId) {
        self.unsubscribe(entity_id, false);
        self.remove_player_data(entity_id);
        for inventory in self.block_inventories.values_mut() {
            inventory.viewers.remove(&entity_id);
        }
    }

    /// Send packet bytes to every subscriber, except at most one.
    pub fn multicast(&self, exclude: Option<EntityId>, bytes: &[u8]) {
        for (&entity_id, player) in &self.subscribers {
            if Some(entity_id) == exclude {
                continue;
            }
            player.transmit(bytes.to_vec());
        }
    }

    pub fn add_player_data(
        &mut self,
        entity_id: EntityId,
        name: String,
        pos: AbsPos,
        look: LookBytes,
        held: ItemTypeId,
    ) {
        let spawn = packet(|buf| {
            codec::write_named_entity_spawn(buf, entity_id, &name, pos.to_abs_int(), look, held)
        });
        self.multicast(Some(entity_id), &spawn);
        self.player_data
            .insert(entity_id, PlayerData { name, pos, look, held });
    }

    pub fn remove_player_data(&mut self, entity_id: EntityId) {
        if self.player_data.remove(&entity_id).is_some() {
            let destroy = packet(|buf| codec::write_entity_destroy(buf, entity_id));
            self.multicast(Some(entity_id), &destroy);
        }
    }

    pub fn set_player_position_look(&mut self, entity_id: EntityId, pos: AbsPos, look: LookBytes) {
        let Some(data) = self.player_data.get_mut(&entity_id) else {
            return;
        };
        data.pos = pos;
        data.look = look;
        let teleport = packet(|buf| {
            codec::write_entity_teleport(buf, entity_id, pos.to_abs_int(), look)
        });
        self.multicast(Some(entity_id), &teleport);
    }

    /// Handle a dig request. Only a completed dig mutates the world: the
    /// block becomes air, every subscriber sees the change, and the
    /// block's aspect may leave a pickup behind. Dig timing is not yet
    /// enforced.
    pub fn hit_block(
        &mut self,
        entity_id: EntityId,
        _held: Slot,
        target: BlockPos,
        status: DigStatus,
        _face: Face,
    ) {
        if status != DigStatus::BlockBroke {
            return;
        }
        let Some(sub) = self.local(target) else {
            warn!(%target, chunk = %self.loc, entity_id, "dig outside chunk ignored");
            return;
        };
        let block_id = self.data.block_id(sub);
        if block_id == BLOCK_AIR || !self.blocks.is_destructable(block_id) {
            return;
        }

        self.data.set_block(sub, BLOCK_AIR, 0);
        let change = packet(|buf| codec::write_block_change(buf, target, BLOCK_AIR, 0));
        self.multicast(None, &change);

        if let Some(drop) = self.blocks.dropped_item(block_id) {
            let velocity = Velocity {
                x: self.rng.gen_range(-4..=4),
                y: 4,
                z: self.rng.gen_range(-4..=4),
            };
            self.spawn_item(drop, target.center_abs_int(), velocity);
        }
    }

    /// Interact with a block: container blocks open their inventory;
    /// otherwise a held item leads to a placement advisory back to the
    /// player, aimed at the neighbouring cell on the hit face.
    pub fn interact_block(
        &mut self,
        entity_id: EntityId,
        held: Slot,
        target: BlockPos,
        face: Face,
    ) {
        let Some(sub) = self.local(target) else {
            warn!(%target, chunk = %self.loc, "interact outside chunk ignored");
            return;
        };
        let block_id = self.data.block_id(sub);

        if let Some(spec) = self.blocks.container(block_id) {
            let entry = self
                .block_inventories
                .entry(sub)
                .or_insert_with(|| BlockInventory::new(spec.num_slots as usize));
            entry.viewers.insert(entity_id);
            let mut slots = Vec::with_capacity(spec.num_slots as usize);
            entry.inventory.write_slots(&mut slots);
            self.send_to(
                entity_id,
                PlayerMessage::InventorySubscribed {
                    block: target,
                    inv_type_id: spec.inv_type_id,
                    slots,
                },
            );
            return;
        }

        if held.is_empty() {
            return;
        }
        let Some(cell) = neighbour(target, face) else {
            debug!(%target, face, "placement face leaves the world");
            return;
        };
        self.send_to(
            entity_id,
            PlayerMessage::PlaceHeldItem {
                target: cell,
                was_held: held,
            },
        );
    }

    /// Place an item into a cell. Best effort: when the cell cannot take
    /// it, the item is handed back rather than destroyed.
    pub fn place_item(&mut self, entity_id: EntityId, target: BlockPos, slot: Slot) {
        let give_back = |actor: &Self| {
            actor.send_to(
                entity_id,
                PlayerMessage::GiveItem {
                    at: target.center_abs_int().to_abs(),
                    item: slot,
                },
            );
        };

        let Some(sub) = self.local(target) else {
            warn!(%target, chunk = %self.loc, "placement outside chunk returned");
            give_back(self);
            return;
        };
        let current = self.data.block_id(sub);
        let placeable = (0..=255).contains(&slot.item_type) && self.blocks.is_replaceable(current);
        if !placeable {
            give_back(self);
            return;
        }

        self.data.set_block(sub, slot.item_type as u8, 0);
        let change = packet(|buf| codec::write_block_change(buf, target, slot.item_type as u8, 0));
        self.multicast(None, &change);
    }

    /// Give a previously offered pickup to the player.
    pub fn take_item(&mut self, taker: EntityId, item_entity_id: EntityId) {
        if !self.subscribers.contains_key(&taker) {
            debug!(taker, item_entity_id, "take-item from non-subscriber ignored");
            return;
        }
        let Some(item) = self.items.remove(&item_entity_id) else {
            // The item may have been collected by someone else already.
            return;
        };
        let collect = packet(|buf| codec::write_item_collect(buf, item_entity_id, taker));
        self.multicast(None, &collect);
        let destroy = packet(|buf| codec::write_entity_destroy(buf, item_entity_id));
        self.multicast(None, &destroy);
        self.send_to(
            taker,
            PlayerMessage::GiveItem {
                at: item.pos.to_abs(),
                item: item.item,
            },
        );
    }

    /// Birth a pickup item at a position, broadcasting its spawn.
    pub fn drop_item(&mut self, content: Slot, pos: AbsPos, velocity: Velocity) {
        self.spawn_item(content, pos.to_abs_int(), velocity);
    }

    /// Adopt an item that crossed into this chunk. The entity keeps its
    /// id, so current subscribers need no new spawn packet.
    pub fn transfer_item(&mut self, item: PickupItem) {
        self.items.insert(item.entity_id, item);
    }

    /// Click a viewed block inventory with the player's cursor. Every
    /// viewer sees the slot updates; the clicker gets the new cursor.
    pub fn inventory_click(
        &mut self,
        entity_id: EntityId,
        block: BlockPos,
        mut cursor: Slot,
        right_click: bool,
        shift_click: bool,
        slot_id: SlotId,
    ) {
        let Some(sub) = self.local(block) else {
            return;
        };
        let Some(entry) = self.block_inventories.get_mut(&sub) else {
            debug!(%block, "inventory click on a block without inventory");
            return;
        };
        entry
            .inventory
            .standard_click(slot_id, &mut cursor, right_click, shift_click);

        let updates: Vec<(SlotId, Slot)> = entry.updates.try_iter().collect();
        let viewers: Vec<EntityId> = entry.viewers.iter().copied().collect();
        for (slot_id, slot) in updates {
            for &viewer in &viewers {
                self.send_to(
                    viewer,
                    PlayerMessage::InventorySlotUpdate {
                        block,
                        slot_id,
                        slot,
                    },
                );
            }
        }
        self.send_to(entity_id, PlayerMessage::InventoryCursorUpdate { block, cursor });
    }

    /// The player closed their view of a block inventory.
    pub fn inventory_unsubscribed(&mut self, entity_id: EntityId, block: BlockPos) {
        let Some(sub) = self.local(block) else {
            return;
        };
        if let Some(entry) = self.block_inventories.get_mut(&sub) {
            entry.viewers.remove(&entity_id);
        }
    }

    /// One 50 ms tick: integrate pickup item motion and offer items to
    /// players within reach. Items that left the chunk are returned for
    /// the shard to re-home.
    pub fn tick(&mut self) -> Vec<PickupItem> {
        let mut departed = Vec::new();
        let mut departed_ids = Vec::new();
        let loc = self.loc;

        for item in self.items.values_mut() {
            // Gravity, terminal velocity, and a rough ground check.
            item.velocity.y = (item.velocity.y - ITEM_GRAVITY).max(-ITEM_TERMINAL_VELOCITY);
            item.pos.x += item.velocity.x as i32;
            item.pos.y += item.velocity.y as i32;
            item.pos.z += item.velocity.z as i32;

            if let Some(cell) = item.pos.to_block().ok().and_then(|b| {
                let (chunk, sub) = b.to_chunk_local();
                (chunk == loc).then_some(sub)
            }) {
                if self.data.block_id(cell) != BLOCK_AIR {
                    item.pos.y = (cell.y as i32 + 1) * PIXELS_PER_BLOCK;
                    item.velocity = Velocity::default();
                }
            } else if item.pos.y < 0 {
                // Fell out of the world floor: rest at the bottom.
                item.pos.y = 0;
                item.velocity = Velocity::default();
            }

            if item.chunk() != loc {
                departed_ids.push(item.entity_id);
            }
        }

        for entity_id in departed_ids {
            if let Some(item) = self.items.remove(&entity_id) {
                departed.push(item);
            }
        }

        self.offer_items();
        departed
    }

    fn offer_items(&mut self) {
        let mut offers = Vec::new();
        for item in self.items.values_mut() {
            for (&player_id, data) in &self.player_data {
                if item.offered.contains(&player_id) {
                    continue;
                }
                let player_fixed = data.pos.to_abs_int();
                let dx = (item.pos.x - player_fixed.x) as i64;
                let dy = (item.pos.y - player_fixed.y) as i64;
                let dz = (item.pos.z - player_fixed.z) as i64;
                if dx * dx + dy * dy + dz * dz <= OFFER_RADIUS_SQ {
                    item.offered.insert(player_id);
                    offers.push((player_id, item.entity_id, item.item));
                }
            }
        }
        for (player_id, item_entity_id, item) in offers {
            self.send_to(
                player_id,
                PlayerMessage::OfferItem {
                    from_chunk: self.loc,
                    entity_id: item_entity_id,
                    item,
                },
            );
        }
    }

    fn spawn_item(&mut self, item: Slot, pos: AbsIntPos, velocity: Velocity) {
        let entity_id = self.entity_ids.next();
        let pickup = PickupItem::new(entity_id, item, pos, velocity);
        let spawn = pickup_spawn_packet(&pickup);
        self.multicast(None, &spawn);
        self.items.insert(entity_id, pickup);
    }

    /// Chunk-local address of a block, if it belongs to this chunk.
    fn local(&self, target: BlockPos) -> Option<SubChunkPos> {
        if !(0..128).contains(&(target.y as i32)) {
            return None;
        }
        let (chunk, sub) = target.to_chunk_local();
        (chunk == self.loc).then_some(sub)
    }

    fn send_to(&self, entity_id: EntityId, message: PlayerMessage) {
        if let Some(player) = self.subscribers.get(&entity_id) {
            player.send(message);
        }
    }

    fn map_chunk_packet(&self) -> Vec<u8> {
        packet(|buf| {
            codec::write_map_chunk(
                buf,
                self.loc,
                self.data.blocks(),
                self.data.block_data(),
                self.data.block_light_bytes(),
                self.data.sky_light_bytes(),
            )
        })
    }
}

fn pickup_spawn_packet(item: &PickupItem) -> Vec<u8> {
    packet(|buf| {
        codec::write_pickup_spawn(
            buf,
            item.entity_id,
            item.item,
            item.pos,
            OrientationBytes::default(),
        )
    })
}

/// The cell adjacent to `target` on the given face, if it stays inside
/// the world slab. Face order: -y, +y, -z, +z, -x, +x.
fn neighbour(target: BlockPos, face: Face) -> Option<BlockPos> {
    let (dx, dy, dz) = match face {
        0 => (0, -1, 0),
        1 => (0, 1, 0),
        2 => (0, 0, -1),
        3 => (0, 0, 1),
        4 => (-1, 0, 0),
        5 => (1, 0, 0),
        _ => return None,
    };
    BlockPos::new(target.x + dx, target.y as i32 + dy, target.z + dz).ok()
}

