//! Player sessions.
//!
//! One session task per TCP connection. After the handshake/login
//! exchange (with the protocol version gate) the session runs two
//! pumps: the receive side decodes packets from the socket into the
//! session state, the transmit side drains the bounded frame queue back
//! to the socket. A full frame queue means a slow client and costs the
//! connection. Shard-bound work leaves as [`ShardRequest`] messages;
//! shard replies arrive on the control queue.

use crate::game::GameConnecter;
use crate::messages::{DropReason, PlayerHandle, PlayerMessage, ShardRequest};
use crate::packet;
use crate::shard::ShardHandle;
use anyhow::Result;
use chunkwright_core::{
    AbsPos, BlockPos, ChunkPos, DigStatus, EntityId, Face, ItemTypeId, LookDegrees, ShardPos, Slot,
    SlotId, TxId, Velocity, WindowId,
};
use chunkwright_net::codec;
use chunkwright_net::{CommonReceiver, ProtocolError, ServerReceiver, StreamDecoder};
use chunkwright_world::{ClickPolicy, Inventory, Window, WindowIdSource, PLAYER_INVENTORY_WINDOW};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Player eye height above the feet position.
const STANCE_OFFSET: f64 = 1.62;
/// Position updates further than this from the last known position are
/// discarded as implausible.
const MAX_MOVE_DISTANCE: f64 = 10.0;

/// Drive one connection from accept to close.
pub async fn run_session(stream: TcpStream, game: GameConnecter) -> Result<()> {
    let _ = stream.set_nodelay(true);
    let (mut rd, mut wr) = stream.into_split();
    let mut decoder = StreamDecoder::new();
    let mut readbuf = vec![0u8; 4096];

    // Handshake: username in, server id out ("-" means no auth).
    let username = loop {
        if let Some(username) = decoder.decode_handshake()? {
            break username;
        }
        let n = rd.read(&mut readbuf).await?;
        if n == 0 {
            anyhow::bail!("connection closed during handshake");
        }
        decoder.feed(&readbuf[..n]);
    };
    wr.write_all(&packet(|buf| codec::write_handshake_reply(buf, "-")))
        .await?;

    // Login, gated on the protocol version.
    let login = loop {
        match decoder.decode_login() {
            Ok(Some(login)) => break login,
            Ok(None) => {
                let n = rd.read(&mut readbuf).await?;
                if n == 0 {
                    anyhow::bail!("connection closed during login");
                }
                decoder.feed(&readbuf[..n]);
            }
            Err(ProtocolError::VersionMismatch { expected, got }) => {
                info!(%username, expected, got, "rejecting protocol version");
                let reply = packet(|buf| codec::write_disconnect(buf, "Protocol version mismatch"));
                wr.write_all(&reply).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    };

    let entity_id = game.entity_ids.next();
    info!(username = %login.username, entity_id, "player logging in");

    let (frames_tx, mut frames_rx) =
        mpsc::channel::<Vec<u8>>(game.settings.transmit_queue_capacity);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let handle = PlayerHandle::new(entity_id, frames_tx, control_tx);

    // Transmit pump. Ends when the queue closes or the peer goes away.
    let transmit = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            if wr.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(entity_id, login.username, handle, game);
    session.post_login().await;

    let result = session.run(&mut rd, decoder, control_rx).await;
    session.shutdown();

    // Give the pump a moment to flush any goodbye packet, then cut it.
    // Frames still queued for a dead player are discarded.
    tokio::time::sleep(Duration::from_millis(100)).await;
    transmit.abort();

    result
}

struct Session {
    entity_id: EntityId,
    name: String,
    handle: PlayerHandle,
    game: GameConnecter,

    pos: AbsPos,
    look: LookDegrees,
    on_ground: bool,
    current_chunk: ChunkPos,

    shards: HashMap<ShardPos, ShardHandle>,
    subscribed: HashSet<ChunkPos>,

    window: Window,
    window_ids: WindowIdSource,
    cursor: Slot,
    held_type: ItemTypeId,
    open_block: Option<(BlockPos, WindowId)>,

    moved: bool,
    view_dirty: bool,
    chunk_transition: Option<(ChunkPos, ChunkPos)>,
    closing: Option<String>,
}

impl Session {
    fn new(entity_id: EntityId, name: String, handle: PlayerHandle, game: GameConnecter) -> Self {
        let pos = game.settings.spawn_position;
        let window = Window::new(
            PLAYER_INVENTORY_WINDOW,
            -1,
            "inventory",
            Arc::new(handle.clone()),
            vec![
                (Inventory::new(36), ClickPolicy::Standard),
                (Inventory::new(4), ClickPolicy::Standard),
                (Inventory::new(5), ClickPolicy::TakeOnly),
            ],
        );
        Self {
            entity_id,
            name,
            handle,
            game,
            pos,
            look: LookDegrees::default(),
            on_ground: false,
            current_chunk: pos.to_chunk(),
            shards: HashMap::new(),
            subscribed: HashSet::new(),
            window,
            window_ids: WindowIdSource::default(),
            cursor: Slot::EMPTY,
            held_type: -1,
            open_block: None,
            moved: false,
            view_dirty: false,
            chunk_transition: None,
            closing: None,
        }
    }

    /// Everything the client needs right after login: the login reply,
    /// the world around the spawn point, and the initial player state.
    async fn post_login(&mut self) {
        let seed = self.game.settings.map_seed;
        self.handle.transmit(packet(|buf| {
            codec::write_login_response(buf, self.entity_id, "", "", seed, 0)
        }));

        self.update_view().await;

        if let Ok(spawn_block) = self.pos.to_block() {
            self.handle
                .transmit(packet(|buf| codec::write_spawn_position(buf, spawn_block)));
        }
        self.handle.transmit(packet(|buf| {
            codec::write_player_position_look_to_client(
                buf,
                self.pos,
                self.pos.y + STANCE_OFFSET,
                self.look,
                self.on_ground,
            )
        }));
        self.handle.transmit(self.window.window_items_packet());
        self.handle
            .transmit(packet(|buf| codec::write_time_update(buf, 0)));

        let announce = self.add_player_data_request();
        if let Some(shard) = self.shard(self.current_chunk.to_shard()).await {
            shard.send(announce);
        }
    }

    async fn run(
        &mut self,
        rd: &mut OwnedReadHalf,
        mut decoder: StreamDecoder,
        mut control_rx: mpsc::UnboundedReceiver<PlayerMessage>,
    ) -> Result<()> {
        let mut readbuf = vec![0u8; 4096];
        'outer: loop {
            if self.closing.is_some() {
                break;
            }
            tokio::select! {
                result = rd.read(&mut readbuf) => {
                    let n = result?;
                    if n == 0 {
                        break 'outer;
                    }
                    decoder.feed(&readbuf[..n]);
                    loop {
                        match decoder.decode_packet(&mut *self) {
                            Ok(true) => {
                                if self.closing.is_some() {
                                    break;
                                }
                            }
                            Ok(false) => break,
                            Err(e) => {
                                // Fatal to the connection: best-effort
                                // goodbye, then close.
                                warn!(entity_id = self.entity_id, error = %e, "protocol error");
                                self.handle.transmit(packet(|buf| {
                                    codec::write_disconnect(buf, "Protocol error")
                                }));
                                return Err(e.into());
                            }
                        }
                    }
                }
                message = control_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => break 'outer,
                    }
                }
            }
            self.flush_view().await;
        }
        if let Some(reason) = &self.closing {
            debug!(entity_id = self.entity_id, %reason, "session closing");
        }
        Ok(())
    }

    /// Release every shard-side resource. Subscriptions go synchronously
    /// from this actor's point of view: one disconnect per shard, no
    /// unload packets.
    fn shutdown(&mut self) {
        for shard in self.shards.values() {
            shard.send(ShardRequest::Disconnect {
                entity_id: self.entity_id,
            });
        }
        self.subscribed.clear();
        self.window.finalize(false);
    }

    async fn shard(&mut self, pos: ShardPos) -> Option<ShardHandle> {
        if let Some(handle) = self.shards.get(&pos) {
            return Some(handle.clone());
        }
        let handle = self.game.connect(pos).await?;
        self.shards.insert(pos, handle.clone());
        Some(handle)
    }

    fn shard_cached(&self, pos: ShardPos) -> Option<ShardHandle> {
        self.shards.get(&pos).cloned()
    }

    /// Send a request to the shard owning a block's chunk, if connected.
    fn send_for_block(&self, target: BlockPos, request: ShardRequest) {
        let (chunk, _) = target.to_chunk_local();
        match self.shard_cached(chunk.to_shard()) {
            Some(shard) => shard.send(request),
            None => debug!(%target, "request for unconnected shard dropped"),
        }
    }

    /// Apply deferred view work after a batch of packets or messages:
    /// chunk transitions, subscription diffs, and position broadcasts.
    async fn flush_view(&mut self) {
        if let Some((from, to)) = self.chunk_transition.take() {
            let entity_id = self.entity_id;
            if let Some(shard) = self.shard(from.to_shard()).await {
                shard.send(ShardRequest::RemovePlayerData {
                    chunk: from,
                    entity_id,
                });
            }
            let announce = self.add_player_data_request();
            if let Some(shard) = self.shard(to.to_shard()).await {
                shard.send(announce);
            }
        }
        if self.view_dirty {
            self.view_dirty = false;
            self.update_view().await;
        }
        if self.moved {
            self.moved = false;
            let request = ShardRequest::SetPlayerPositionLook {
                chunk: self.current_chunk,
                entity_id: self.entity_id,
                pos: self.pos,
                look: self.look.to_look_bytes(),
            };
            if let Some(shard) = self.shard(self.current_chunk.to_shard()).await {
                shard.send(request);
            }
        }
    }

    /// Keep the subscription set equal to the view square around the
    /// player's chunk.
    async fn update_view(&mut self) {
        let center = self.current_chunk;
        let radius = self.game.settings.view_radius;
        let mut desired = HashSet::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                desired.insert(ChunkPos::new(center.x + dx, center.z + dz));
            }
        }

        let additions: Vec<ChunkPos> = desired
            .iter()
            .filter(|chunk| !self.subscribed.contains(chunk))
            .copied()
            .collect();
        for chunk in additions {
            if let Some(shard) = self.shard(chunk.to_shard()).await {
                shard.send(ShardRequest::Subscribe {
                    chunk,
                    player: self.handle.clone(),
                });
                self.subscribed.insert(chunk);
            }
        }

        let removals: Vec<ChunkPos> = self
            .subscribed
            .iter()
            .filter(|chunk| !desired.contains(chunk))
            .copied()
            .collect();
        for chunk in removals {
            if let Some(shard) = self.shard_cached(chunk.to_shard()) {
                // Leaving the view radius is the explicit unload case.
                shard.send(ShardRequest::Unsubscribe {
                    chunk,
                    entity_id: self.entity_id,
                    send_unload: true,
                });
            }
            self.subscribed.remove(&chunk);
        }
    }

    fn add_player_data_request(&self) -> ShardRequest {
        ShardRequest::AddPlayerData {
            chunk: self.current_chunk,
            entity_id: self.entity_id,
            name: self.name.clone(),
            pos: self.pos,
            look: self.look.to_look_bytes(),
            held: self.held_type,
        }
    }

    /// Copy of the first held-item stack, or empty.
    fn held_slot(&self) -> Slot {
        self.window
            .inventory(0)
            .find_type(self.held_type)
            .and_then(|slot_id| self.window.inventory(0).slot(slot_id))
            .unwrap_or(Slot::EMPTY)
    }

    fn apply_position(&mut self, pos: AbsPos) {
        let dx = pos.x - self.pos.x;
        let dy = pos.y - self.pos.y;
        let dz = pos.z - self.pos.z;
        let distance = (dx * dx + dy * dy + dz * dz).sqrt();
        if distance > MAX_MOVE_DISTANCE {
            debug!(entity_id = self.entity_id, distance, "implausible move discarded");
            return;
        }
        self.pos = pos;
        self.moved = true;
        let chunk = pos.to_chunk();
        if chunk != self.current_chunk {
            self.chunk_transition = Some((self.current_chunk, chunk));
            self.current_chunk = chunk;
            self.view_dirty = true;
        }
    }

    async fn handle_message(&mut self, message: PlayerMessage) {
        match message {
            PlayerMessage::InventorySubscribed {
                block,
                inv_type_id,
                slots,
            } => {
                let window_id = self.window_ids.next();
                self.open_block = Some((block, window_id));
                self.handle.transmit(packet(|buf| {
                    codec::write_window_open(buf, window_id, inv_type_id, "Chest", slots.len() as u8)
                }));
                self.handle
                    .transmit(packet(|buf| codec::write_window_items(buf, window_id, &slots)));
            }
            PlayerMessage::InventorySlotUpdate {
                block,
                slot_id,
                slot,
            } => {
                if let Some((open_block, window_id)) = self.open_block {
                    if open_block == block {
                        self.handle.transmit(packet(|buf| {
                            codec::write_set_slot(buf, window_id, slot_id, slot)
                        }));
                    }
                }
            }
            PlayerMessage::InventoryCursorUpdate { block: _, cursor } => {
                self.cursor = cursor;
                // The cursor rides in the reserved window -1 / slot -1.
                self.handle
                    .transmit(packet(|buf| codec::write_set_slot(buf, -1, -1, cursor)));
            }
            PlayerMessage::InventoryUnsubscribed { block } => {
                if let Some((open_block, window_id)) = self.open_block {
                    if open_block == block {
                        self.open_block = None;
                        self.handle
                            .transmit(packet(|buf| codec::write_window_close(buf, window_id)));
                    }
                }
            }
            PlayerMessage::PlaceHeldItem { target, was_held } => {
                // Advisory only: verify the held stack still matches.
                if self.held_type != was_held.item_type {
                    return;
                }
                let main = self.window.inventory_mut(0);
                let Some(slot_id) = main.find_type(was_held.item_type) else {
                    return;
                };
                let Some(mut held) = main.slot(slot_id) else {
                    return;
                };
                let one = Slot::new(held.item_type, 1, held.uses);
                held.count -= 1;
                if held.count == 0 {
                    held = Slot::EMPTY;
                }
                main.set_slot(slot_id, held);
                self.send_for_block(
                    target,
                    ShardRequest::PlaceItem {
                        entity_id: self.entity_id,
                        target,
                        slot: one,
                    },
                );
            }
            PlayerMessage::OfferItem {
                from_chunk,
                entity_id,
                item,
            } => {
                if self.window.inventory(0).can_accept(&item) {
                    if let Some(shard) = self.shard(from_chunk.to_shard()).await {
                        shard.send(ShardRequest::TakeItem {
                            entity_id: self.entity_id,
                            chunk: from_chunk,
                            item_entity_id: entity_id,
                        });
                    }
                }
            }
            PlayerMessage::GiveItem { at, item } => {
                let mut item = item;
                if !self.window.inventory_mut(0).add(&mut item) {
                    // No room: the item must not vanish, drop it where
                    // the shard said.
                    if let Some(shard) = self.shard(at.to_chunk().to_shard()).await {
                        shard.send(ShardRequest::DropItem {
                            content: item,
                            pos: at,
                            velocity: Velocity::default(),
                        });
                    }
                }
            }
            PlayerMessage::Drop { reason } => {
                warn!(entity_id = self.entity_id, ?reason, "dropping connection");
                self.closing = Some(match reason {
                    DropReason::SlowClient => "Slow client".to_string(),
                });
            }
        }
    }
}

impl CommonReceiver for Session {
    fn keep_alive(&mut self) {}

    fn chat_message(&mut self, message: String) {
        let line = format!("<{}> {}", self.name, message);
        let bytes = packet(|buf| codec::write_chat_message(buf, &line));
        if let Some(shard) = self.shard_cached(self.current_chunk.to_shard()) {
            shard.send(ShardRequest::Multicast {
                chunk: self.current_chunk,
                exclude: None,
                packet: bytes,
            });
        }
    }

    fn on_ground(&mut self, on_ground: bool) {
        self.on_ground = on_ground;
    }

    fn player_position(&mut self, pos: AbsPos, _stance: f64, on_ground: bool) {
        self.on_ground = on_ground;
        self.apply_position(pos);
    }

    fn player_look(&mut self, look: LookDegrees, on_ground: bool) {
        self.on_ground = on_ground;
        self.look = look;
        self.moved = true;
    }

    fn player_digging(&mut self, status: DigStatus, loc: BlockPos, face: Face) {
        self.send_for_block(
            loc,
            ShardRequest::HitBlock {
                entity_id: self.entity_id,
                held: self.held_slot(),
                target: loc,
                status,
                face,
            },
        );
    }

    fn player_block_placement(
        &mut self,
        _item_type: ItemTypeId,
        loc: BlockPos,
        face: Face,
        _amount: i8,
        _uses: i16,
    ) {
        // A click into the air (all-ones position, no face) is an item
        // use, which nothing here consumes yet.
        if face < 0 {
            return;
        }
        self.send_for_block(
            loc,
            ShardRequest::InteractBlock {
                entity_id: self.entity_id,
                held: self.held_slot(),
                target: loc,
                face,
            },
        );
    }

    fn player_animation(&mut self, _entity_id: EntityId, animation: i8) {
        let bytes = packet(|buf| codec::write_player_animation(buf, self.entity_id, animation));
        if let Some(shard) = self.shard_cached(self.current_chunk.to_shard()) {
            shard.send(ShardRequest::Multicast {
                chunk: self.current_chunk,
                exclude: Some(self.entity_id),
                packet: bytes,
            });
        }
    }

    fn disconnect(&mut self, reason: String) {
        debug!(entity_id = self.entity_id, %reason, "client disconnecting");
        self.closing = Some(reason);
    }
}

impl ServerReceiver for Session {
    fn player_position_look(
        &mut self,
        pos: AbsPos,
        _stance: f64,
        look: LookDegrees,
        on_ground: bool,
    ) {
        self.on_ground = on_ground;
        self.look = look;
        self.apply_position(pos);
    }

    fn holding_change(&mut self, item_type: ItemTypeId) {
        self.held_type = item_type;
    }

    fn window_click(
        &mut self,
        window_id: WindowId,
        slot_id: SlotId,
        right_click: bool,
        _tx_id: TxId,
        _item: Slot,
    ) {
        if window_id == PLAYER_INVENTORY_WINDOW {
            self.window
                .click(slot_id, &mut self.cursor, right_click, false);
            return;
        }
        match self.open_block {
            Some((block, open_window_id)) if open_window_id == window_id => {
                self.send_for_block(
                    block,
                    ShardRequest::InventoryClick {
                        entity_id: self.entity_id,
                        block,
                        cursor: self.cursor,
                        right_click,
                        shift_click: false,
                        slot_id,
                    },
                );
            }
            _ => debug!(window_id, "click on unknown window ignored"),
        }
    }
}
