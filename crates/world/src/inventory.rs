//! Inventories: ordered slot arrays with single-subscriber change
//! propagation.
//!
//! An inventory owns its slots and emits `slot_update` through its one
//! subscriber on every mutation. Windows subscribe for their lifetime
//! and must release the subscription on finalize; chunk actors subscribe
//! on behalf of all viewers of a block inventory.

use chunkwright_core::{Slot, SlotId, MAX_STACK};

/// The at-most-one outbound edge of an inventory.
pub type SlotSubscriber = Box<dyn Fn(SlotId, Slot) + Send>;

/// How clicks on an inventory behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickPolicy {
    /// Pick up, place, merge and swap freely.
    Standard,
    /// Items may only be taken out whole (crafting output slots).
    TakeOnly,
}

/// An ordered array of slots with subscriber-based change propagation.
pub struct Inventory {
    slots: Vec<Slot>,
    subscriber: Option<SlotSubscriber>,
}

impl Inventory {
    pub fn new(num_slots: usize) -> Self {
        Self {
            slots: vec![Slot::EMPTY; num_slots],
            subscriber: None,
        }
    }

    pub fn num_slots(&self) -> SlotId {
        self.slots.len() as SlotId
    }

    pub fn slot(&self, slot_id: SlotId) -> Option<Slot> {
        self.slots.get(slot_id as usize).copied()
    }

    /// Replace a slot's contents, notifying the subscriber.
    pub fn set_slot(&mut self, slot_id: SlotId, slot: Slot) {
        if let Some(entry) = self.slots.get_mut(slot_id as usize) {
            *entry = slot;
            self.emit(slot_id);
        }
    }

    /// Register the single subscriber, replacing any previous one.
    pub fn set_subscriber(&mut self, subscriber: SlotSubscriber) {
        self.subscriber = Some(subscriber);
    }

    pub fn clear_subscriber(&mut self) {
        self.subscriber = None;
    }

    fn emit(&self, slot_id: SlotId) {
        if let Some(subscriber) = &self.subscriber {
            subscriber(slot_id, self.slots[slot_id as usize]);
        }
    }

    /// Append a copy of every slot, in order, to `out`.
    pub fn write_slots(&self, out: &mut Vec<Slot>) {
        out.extend_from_slice(&self.slots);
    }

    /// Total item count, for conservation checks.
    pub fn total_count(&self) -> i32 {
        self.slots.iter().map(|slot| slot.count as i32).sum()
    }

    /// Whether [`Inventory::add`] would take the whole stack.
    pub fn can_accept(&self, item: &Slot) -> bool {
        let mut remaining = item.count as i32;
        for slot in &self.slots {
            if slot.is_empty() {
                remaining -= MAX_STACK as i32;
            } else if slot.item_type == item.item_type && slot.uses == item.uses {
                remaining -= (MAX_STACK - slot.count) as i32;
            }
            if remaining <= 0 {
                return true;
            }
        }
        remaining <= 0
    }

    /// First slot holding the given item type, if any.
    pub fn find_type(&self, item_type: chunkwright_core::ItemTypeId) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|slot| !slot.is_empty() && slot.item_type == item_type)
            .map(|index| index as SlotId)
    }

    /// Merge a stack into the inventory: first onto matching stacks,
    /// then into empty slots. Returns true when everything was taken.
    pub fn add(&mut self, item: &mut Slot) -> bool {
        for pass_empties in [false, true] {
            for slot_id in 0..self.slots.len() {
                if item.is_empty() {
                    return true;
                }
                let slot = &mut self.slots[slot_id];
                if slot.is_empty() != pass_empties {
                    continue;
                }
                if slot.merge(item) {
                    self.emit(slot_id as SlotId);
                }
            }
        }
        item.is_empty()
    }

    /// A plain click: pick up, place, merge or swap between the slot and
    /// the cursor. Right click picks up half / places one.
    pub fn standard_click(
        &mut self,
        slot_id: SlotId,
        cursor: &mut Slot,
        right_click: bool,
        _shift_click: bool,
    ) -> bool {
        let Some(index) = self.check_slot(slot_id) else {
            return false;
        };
        let before = self.slots[index];
        let slot = &mut self.slots[index];

        if cursor.is_empty() {
            if slot.is_empty() {
                return true;
            }
            if right_click {
                *cursor = slot.split_half();
            } else {
                slot.swap(cursor);
            }
        } else if slot.accepts(cursor) {
            let moved = if right_click {
                slot.merge_one(cursor)
            } else {
                slot.merge(cursor)
            };
            if !moved && !slot.is_empty() {
                // Same item type but the slot is full: treat as a swap of
                // equals, which is a no-op.
                return true;
            }
        } else {
            slot.swap(cursor);
        }

        if self.slots[index] != before {
            self.emit(slot_id);
        }
        true
    }

    /// A click on a take-only slot: the stack may only leave whole, and
    /// nothing may be placed in.
    pub fn take_only_click(
        &mut self,
        slot_id: SlotId,
        cursor: &mut Slot,
        _right_click: bool,
        _shift_click: bool,
    ) -> bool {
        let Some(index) = self.check_slot(slot_id) else {
            return false;
        };
        let slot = &mut self.slots[index];
        if slot.is_empty() {
            return false;
        }
        if !cursor.accepts(slot) {
            return false;
        }
        let combined = cursor.count as i16 + slot.count as i16;
        if !cursor.is_empty() && combined > MAX_STACK as i16 {
            return false;
        }
        let taken = cursor.merge(slot);
        debug_assert!(taken);
        self.emit(slot_id);
        true
    }

    fn check_slot(&self, slot_id: SlotId) -> Option<usize> {
        if slot_id < 0 || slot_id as usize >= self.slots.len() {
            return None;
        }
        Some(slot_id as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn watched(num_slots: usize) -> (Inventory, mpsc::Receiver<(SlotId, Slot)>) {
        let mut inventory = Inventory::new(num_slots);
        let (tx, rx) = mpsc::channel();
        inventory.set_subscriber(Box::new(move |slot_id, slot| {
            let _ = tx.send((slot_id, slot));
        }));
        (inventory, rx)
    }

    #[test]
    fn set_slot_notifies_subscriber() {
        let (mut inventory, rx) = watched(9);
        inventory.set_slot(4, Slot::new(3, 10, 0));
        assert_eq!(rx.try_recv().unwrap(), (4, Slot::new(3, 10, 0)));
    }

    #[test]
    fn cleared_subscriber_receives_nothing() {
        let (mut inventory, rx) = watched(9);
        inventory.clear_subscriber();
        inventory.set_slot(0, Slot::new(3, 1, 0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn left_click_picks_up_whole_stack() {
        let (mut inventory, rx) = watched(9);
        inventory.set_slot(2, Slot::new(3, 20, 0));
        let _ = rx.try_recv();

        let mut cursor = Slot::EMPTY;
        assert!(inventory.standard_click(2, &mut cursor, false, false));
        assert_eq!(cursor, Slot::new(3, 20, 0));
        assert_eq!(inventory.slot(2).unwrap(), Slot::EMPTY);
        assert_eq!(rx.try_recv().unwrap(), (2, Slot::EMPTY));
    }

    #[test]
    fn right_click_picks_up_half() {
        let (mut inventory, _rx) = watched(9);
        inventory.set_slot(0, Slot::new(3, 21, 0));

        let mut cursor = Slot::EMPTY;
        inventory.standard_click(0, &mut cursor, true, false);
        assert_eq!(cursor.count, 11);
        assert_eq!(inventory.slot(0).unwrap().count, 10);
    }

    #[test]
    fn right_click_places_one() {
        let (mut inventory, _rx) = watched(9);
        let mut cursor = Slot::new(3, 5, 0);
        inventory.standard_click(7, &mut cursor, true, false);
        assert_eq!(inventory.slot(7).unwrap(), Slot::new(3, 1, 0));
        assert_eq!(cursor.count, 4);
    }

    #[test]
    fn mismatched_click_swaps() {
        let (mut inventory, _rx) = watched(9);
        inventory.set_slot(0, Slot::new(1, 4, 0));
        let mut cursor = Slot::new(3, 2, 0);
        inventory.standard_click(0, &mut cursor, false, false);
        assert_eq!(inventory.slot(0).unwrap(), Slot::new(3, 2, 0));
        assert_eq!(cursor, Slot::new(1, 4, 0));
    }

    #[test]
    fn clicks_conserve_items() {
        let (mut inventory, _rx) = watched(9);
        inventory.set_slot(0, Slot::new(3, 60, 0));
        inventory.set_slot(1, Slot::new(3, 10, 0));

        let mut cursor = Slot::EMPTY;
        let before = inventory.total_count() + cursor.count as i32;
        inventory.standard_click(1, &mut cursor, false, false);
        inventory.standard_click(0, &mut cursor, false, false);
        inventory.standard_click(2, &mut cursor, true, false);
        inventory.standard_click(0, &mut cursor, false, false);
        let after = inventory.total_count() + cursor.count as i32;
        assert_eq!(before, after);
    }

    #[test]
    fn out_of_range_click_is_rejected() {
        let (mut inventory, _rx) = watched(4);
        let mut cursor = Slot::EMPTY;
        assert!(!inventory.standard_click(4, &mut cursor, false, false));
        assert!(!inventory.standard_click(-1, &mut cursor, false, false));
    }

    #[test]
    fn take_only_takes_whole_stack_or_nothing() {
        let (mut inventory, _rx) = watched(1);
        inventory.set_slot(0, Slot::new(3, 4, 0));

        // Cursor with a different item: refused, nothing changes.
        let mut cursor = Slot::new(1, 1, 0);
        assert!(!inventory.take_only_click(0, &mut cursor, false, false));
        assert_eq!(inventory.slot(0).unwrap().count, 4);

        // Empty cursor takes everything.
        let mut cursor = Slot::EMPTY;
        assert!(inventory.take_only_click(0, &mut cursor, false, false));
        assert_eq!(cursor, Slot::new(3, 4, 0));
        assert_eq!(inventory.slot(0).unwrap(), Slot::EMPTY);
    }

    #[test]
    fn take_only_refuses_overflow() {
        let (mut inventory, _rx) = watched(1);
        inventory.set_slot(0, Slot::new(3, 10, 0));
        let mut cursor = Slot::new(3, 60, 0);
        assert!(!inventory.take_only_click(0, &mut cursor, false, false));
        assert_eq!(cursor.count, 60);
        assert_eq!(inventory.slot(0).unwrap().count, 10);
    }

    #[test]
    fn add_merges_then_fills_empties() {
        let (mut inventory, _rx) = watched(3);
        inventory.set_slot(1, Slot::new(3, 60, 0));

        let mut incoming = Slot::new(3, 10, 0);
        assert!(inventory.add(&mut incoming));
        assert!(incoming.is_empty());
        assert_eq!(inventory.slot(1).unwrap().count, 64);
        assert_eq!(inventory.slot(0).unwrap(), Slot::new(3, 6, 0));
    }

    #[test]
    fn add_reports_overflow() {
        let (mut inventory, _rx) = watched(1);
        inventory.set_slot(0, Slot::new(1, 64, 0));
        let mut incoming = Slot::new(3, 5, 0);
        assert!(!inventory.add(&mut incoming));
        assert_eq!(incoming.count, 5);
    }
}
