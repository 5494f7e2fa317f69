//! Messages crossing the actor boundaries.
//!
//! Player sessions talk to shards with [`ShardRequest`]; shards talk
//! back through a [`PlayerHandle`], either by queueing ready-to-send
//! packet bytes onto the bounded transmit queue or by posting a
//! [`PlayerMessage`] for the session actor. No owning references cross
//! an actor boundary; handles carry only channel ends and ids.

use chunkwright_core::{
    AbsIntPos, AbsPos, BlockPos, ChunkPos, DigStatus, EntityId, Face, ItemTypeId, LookBytes, Slot,
    SlotId, Velocity,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Why a session is being closed from the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The transmit queue overflowed; the client cannot keep up.
    SlowClient,
}

/// Deliveries from a shard (or the runtime) to one player session.
#[derive(Debug)]
pub enum PlayerMessage {
    /// A block inventory was opened for this player.
    InventorySubscribed {
        block: BlockPos,
        inv_type_id: i8,
        slots: Vec<Slot>,
    },
    /// A slot changed in an inventory the player is viewing.
    InventorySlotUpdate {
        block: BlockPos,
        slot_id: SlotId,
        slot: Slot,
    },
    /// The player's cursor contents after a remote inventory click.
    InventoryCursorUpdate { block: BlockPos, cursor: Slot },
    /// The viewed block inventory was closed.
    InventoryUnsubscribed { block: BlockPos },
    /// Advisory: take one item off the held stack and request its
    /// placement at `target`. The session may refuse.
    PlaceHeldItem { target: BlockPos, was_held: Slot },
    /// A pickup item is within reach; reply with a take-item request if
    /// it fits the inventory.
    OfferItem {
        from_chunk: ChunkPos,
        entity_id: EntityId,
        item: Slot,
    },
    /// The item must be accepted, or dropped back at `at`.
    GiveItem { at: AbsPos, item: Slot },
    /// The runtime decided this connection has to go.
    Drop { reason: DropReason },
}

/// Requests from player sessions (or other shards) upon a shard's
/// chunks. Every request names the chunk it concerns; requests for
/// chunks outside the shard are ignored and logged.
#[derive(Debug)]
pub enum ShardRequest {
    /// Start receiving updates for a chunk. Triggers the full snapshot.
    Subscribe {
        chunk: ChunkPos,
        player: PlayerHandle,
    },
    /// Stop receiving updates. An unload packet is only sent on request.
    Unsubscribe {
        chunk: ChunkPos,
        entity_id: EntityId,
        send_unload: bool,
    },
    /// Broadcast packet bytes to every subscriber, except at most one.
    Multicast {
        chunk: ChunkPos,
        exclude: Option<EntityId>,
        packet: Vec<u8>,
    },
    /// Make the chunk aware of a player inside it.
    AddPlayerData {
        chunk: ChunkPos,
        entity_id: EntityId,
        name: String,
        pos: AbsPos,
        look: LookBytes,
        held: ItemTypeId,
    },
    RemovePlayerData {
        chunk: ChunkPos,
        entity_id: EntityId,
    },
    SetPlayerPositionLook {
        chunk: ChunkPos,
        entity_id: EntityId,
        pos: AbsPos,
        look: LookBytes,
    },
    /// Hit (dig) a block.
    HitBlock {
        entity_id: EntityId,
        held: Slot,
        target: BlockPos,
        status: DigStatus,
        face: Face,
    },
    /// Interact with a block: opens containers, or asks the player to
    /// place their held item against it.
    InteractBlock {
        entity_id: EntityId,
        held: Slot,
        target: BlockPos,
        face: Face,
    },
    /// Place the given item at the target cell. The shard must account
    /// for the item if it cannot: it hands it back with
    /// [`PlayerMessage::GiveItem`].
    PlaceItem {
        entity_id: EntityId,
        target: BlockPos,
        slot: Slot,
    },
    /// Claim a pickup item previously offered.
    TakeItem {
        entity_id: EntityId,
        chunk: ChunkPos,
        item_entity_id: EntityId,
    },
    /// Create a pickup item in the world.
    DropItem {
        content: Slot,
        pos: AbsPos,
        velocity: Velocity,
    },
    /// Move a pickup item into this shard from a neighbouring one.
    TransferItem {
        chunk: ChunkPos,
        item_entity_id: EntityId,
        item: Slot,
        pos: AbsIntPos,
        velocity: Velocity,
    },
    /// Click onto a block inventory with the given cursor.
    InventoryClick {
        entity_id: EntityId,
        block: BlockPos,
        cursor: Slot,
        right_click: bool,
        shift_click: bool,
        slot_id: SlotId,
    },
    /// The player stopped viewing a block inventory.
    InventoryUnsubscribed {
        entity_id: EntityId,
        block: BlockPos,
    },
    /// Release every subscription this player holds in the shard,
    /// without sending unload packets.
    Disconnect { entity_id: EntityId },
}

/// The shard-facing end of one player session.
///
/// Cloneable and cheap; carries the bounded frame queue for packet
/// bytes and the unbounded control queue for [`PlayerMessage`]s.
#[derive(Clone, Debug)]
pub struct PlayerHandle {
    entity_id: EntityId,
    frames: mpsc::Sender<Vec<u8>>,
    control: mpsc::UnboundedSender<PlayerMessage>,
}

impl PlayerHandle {
    pub fn new(
        entity_id: EntityId,
        frames: mpsc::Sender<Vec<u8>>,
        control: mpsc::UnboundedSender<PlayerMessage>,
    ) -> Self {
        Self {
            entity_id,
            frames,
            control,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Queue ready-to-send packet bytes for the transmit pump.
    ///
    /// A full queue means the client is not draining fast enough: the
    /// session is told to drop the connection. A closed queue means the
    /// session is already gone and the bytes are discarded.
    pub fn transmit(&self, packet: Vec<u8>) {
        match self.frames.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(entity_id = self.entity_id, "transmit queue overflow");
                let _ = self.control.send(PlayerMessage::Drop {
                    reason: DropReason::SlowClient,
                });
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Post a control message for the session actor.
    pub fn send(&self, message: PlayerMessage) {
        let _ = self.control.send(message);
    }
}

/// Windows transmit their packets straight onto the player's queue.
impl chunkwright_world::WindowViewer for PlayerHandle {
    fn transmit(&self, packet: Vec<u8>) {
        PlayerHandle::transmit(self, packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transmit_queue_overflow_requests_a_drop() {
        let (frames_tx, mut frames_rx) = mpsc::channel(2);
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let handle = PlayerHandle::new(1, frames_tx, control_tx);

        handle.transmit(vec![1]);
        handle.transmit(vec![2]);
        // The queue holds 2 frames; the third must trigger a drop.
        handle.transmit(vec![3]);

        assert_eq!(frames_rx.recv().await.unwrap(), vec![1]);
        assert!(matches!(
            control_rx.recv().await.unwrap(),
            PlayerMessage::Drop {
                reason: DropReason::SlowClient
            }
        ));
    }

    #[tokio::test]
    async fn transmit_to_closed_session_is_discarded() {
        let (frames_tx, frames_rx) = mpsc::channel(2);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        drop(frames_rx);
        drop(control_rx);

        let handle = PlayerHandle::new(1, frames_tx, control_tx);
        handle.transmit(vec![1]);
    }
}
