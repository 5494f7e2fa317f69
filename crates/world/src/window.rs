//! Windows: composite slot-indexed views over backing inventories.
//!
//! A window concatenates its inventories in declaration order; each one
//! covers the half-open global range `[start_slot, start_slot + n)`. The
//! window subscribes itself to every backing inventory on construction
//! and relays each slot update to its viewer as a set-slot packet; on
//! finalize the subscriptions are released and, when requested, a close
//! packet is flushed to the viewer.

use crate::inventory::{ClickPolicy, Inventory};
use chunkwright_core::{Slot, SlotId, WindowId};
use chunkwright_net::codec;
use std::sync::Arc;
use tracing::warn;

/// The destination of a window's outgoing packets. A player session
/// implements this over its transmit queue.
pub trait WindowViewer: Send + Sync {
    fn transmit(&self, packet: Vec<u8>);
}

/// Window id reserved for the player's persistent inventory.
pub const PLAYER_INVENTORY_WINDOW: WindowId = 0;

/// Per-player allocator of window ids. Skips the reserved id 0.
#[derive(Debug, Default)]
pub struct WindowIdSource {
    next: WindowId,
}

impl WindowIdSource {
    pub fn next(&mut self) -> WindowId {
        self.next = if self.next >= 127 { 1 } else { self.next + 1 };
        self.next
    }
}

struct InventoryView {
    inventory: Inventory,
    start_slot: SlotId,
    policy: ClickPolicy,
}

/// A numbered composite view of one or more inventories for one viewer.
pub struct Window {
    id: WindowId,
    inv_type_id: i8,
    title: String,
    viewer: Arc<dyn WindowViewer>,
    views: Vec<InventoryView>,
    num_slots: SlotId,
}

impl Window {
    /// Build a window over the given inventories, wiring this window up
    /// as the subscriber of each.
    pub fn new(
        id: WindowId,
        inv_type_id: i8,
        title: &str,
        viewer: Arc<dyn WindowViewer>,
        inventories: Vec<(Inventory, ClickPolicy)>,
    ) -> Self {
        let mut views = Vec::with_capacity(inventories.len());
        let mut start_slot: SlotId = 0;
        for (mut inventory, policy) in inventories {
            let view_viewer = Arc::clone(&viewer);
            let view_start = start_slot;
            inventory.set_subscriber(Box::new(move |local_slot_id, slot| {
                let mut packet = Vec::new();
                if codec::write_set_slot(&mut packet, id, view_start + local_slot_id, slot).is_ok()
                {
                    view_viewer.transmit(packet);
                }
            }));
            start_slot += inventory.num_slots();
            views.push(InventoryView {
                inventory,
                start_slot: view_start,
                policy,
            });
        }
        Self {
            id,
            inv_type_id,
            title: title.to_string(),
            viewer,
            views,
            num_slots: start_slot,
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn num_slots(&self) -> SlotId {
        self.num_slots
    }

    /// Borrow the backing inventory at `index` (declaration order).
    pub fn inventory(&self, index: usize) -> &Inventory {
        &self.views[index].inventory
    }

    pub fn inventory_mut(&mut self, index: usize) -> &mut Inventory {
        &mut self.views[index].inventory
    }

    /// Route a click on a global slot id to the owning inventory.
    pub fn click(
        &mut self,
        slot_id: SlotId,
        cursor: &mut Slot,
        right_click: bool,
        shift_click: bool,
    ) -> bool {
        let Some(view) = self
            .views
            .iter_mut()
            .find(|view| {
                slot_id >= view.start_slot && slot_id < view.start_slot + view.inventory.num_slots()
            })
        else {
            warn!(window_id = self.id, slot_id, "click outside window range");
            return false;
        };
        let local = slot_id - view.start_slot;
        match view.policy {
            ClickPolicy::Standard => view
                .inventory
                .standard_click(local, cursor, right_click, shift_click),
            ClickPolicy::TakeOnly => view
                .inventory
                .take_only_click(local, cursor, right_click, shift_click),
        }
    }

    /// The window-open packet describing this window.
    pub fn open_packet(&self) -> Vec<u8> {
        let mut packet = Vec::new();
        codec::write_window_open(
            &mut packet,
            self.id,
            self.inv_type_id,
            &self.title,
            self.num_slots as u8,
        )
        .expect("writing to a Vec cannot fail");
        packet
    }

    /// The full window-items snapshot of every backing inventory.
    pub fn window_items_packet(&self) -> Vec<u8> {
        let mut items = Vec::with_capacity(self.num_slots as usize);
        for view in &self.views {
            view.inventory.write_slots(&mut items);
        }
        let mut packet = Vec::new();
        codec::write_window_items(&mut packet, self.id, &items)
            .expect("writing to a Vec cannot fail");
        packet
    }

    /// Send the open packet followed by the item snapshot.
    pub fn open(&self) {
        self.viewer.transmit(self.open_packet());
        self.viewer.transmit(self.window_items_packet());
    }

    /// Release every subscription. With `send_close` the close packet is
    /// flushed to the viewer.
    pub fn finalize(&mut self, send_close: bool) {
        for view in &mut self.views {
            view.inventory.clear_subscriber();
        }
        if send_close {
            let mut packet = Vec::new();
            if codec::write_window_close(&mut packet, self.id).is_ok() {
                self.viewer.transmit(packet);
            }
        }
    }
}
