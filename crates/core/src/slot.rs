//! Item slots.
//!
//! A slot is the `(itemType, count, uses)` triple used by inventories,
//! windows, pickup entities and the wire codec. `itemType == -1` is the
//! empty sentinel; stacks of identical `(itemType, uses)` merge up to
//! [`MAX_STACK`].

use crate::types::ItemTypeId;
use serde::{Deserialize, Serialize};

/// Largest stack a single slot can hold.
pub const MAX_STACK: i8 = 64;

/// A single inventory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub item_type: ItemTypeId,
    pub count: i8,
    pub uses: i16,
}

impl Slot {
    /// The empty slot.
    pub const EMPTY: Slot = Slot {
        item_type: -1,
        count: 0,
        uses: 0,
    };

    pub const fn new(item_type: ItemTypeId, count: i8, uses: i16) -> Self {
        Self {
            item_type,
            count,
            uses,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item_type == -1 || self.count == 0
    }

    /// Whether `other` can stack onto this slot (empty slots accept anything).
    pub fn accepts(&self, other: &Slot) -> bool {
        self.is_empty() || (self.item_type == other.item_type && self.uses == other.uses)
    }

    fn normalize(&mut self) {
        if self.count == 0 {
            *self = Slot::EMPTY;
        }
    }

    /// Move as much of `src` as fits into `self`. Returns true if anything
    /// moved. Item count is conserved across the two slots.
    pub fn merge(&mut self, src: &mut Slot) -> bool {
        if src.is_empty() || !self.accepts(src) {
            return false;
        }
        let space = MAX_STACK - if self.is_empty() { 0 } else { self.count };
        let moved = src.count.min(space);
        if moved <= 0 {
            return false;
        }
        if self.is_empty() {
            self.item_type = src.item_type;
            self.uses = src.uses;
            self.count = 0;
        }
        self.count += moved;
        src.count -= moved;
        src.normalize();
        true
    }

    /// Move a single item of `src` into `self`. Returns true if it moved.
    pub fn merge_one(&mut self, src: &mut Slot) -> bool {
        if src.is_empty() || !self.accepts(src) {
            return false;
        }
        if !self.is_empty() && self.count >= MAX_STACK {
            return false;
        }
        if self.is_empty() {
            self.item_type = src.item_type;
            self.uses = src.uses;
            self.count = 0;
        }
        self.count += 1;
        src.count -= 1;
        src.normalize();
        true
    }

    /// Take the larger half of this stack into a new slot.
    pub fn split_half(&mut self) -> Slot {
        if self.is_empty() {
            return Slot::EMPTY;
        }
        let taken = (self.count + 1) / 2;
        let out = Slot::new(self.item_type, taken, self.uses);
        self.count -= taken;
        self.normalize();
        out
    }

    pub fn swap(&mut self, other: &mut Slot) {
        std::mem::swap(self, other);
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sentinel() {
        assert!(Slot::EMPTY.is_empty());
        assert_eq!(Slot::EMPTY.item_type, -1);
        assert!(Slot::new(3, 0, 0).is_empty());
    }

    #[test]
    fn merge_into_empty_takes_identity() {
        let mut dst = Slot::EMPTY;
        let mut src = Slot::new(3, 10, 0);
        assert!(dst.merge(&mut src));
        assert_eq!(dst, Slot::new(3, 10, 0));
        assert!(src.is_empty());
    }

    #[test]
    fn merge_respects_max_stack() {
        let mut dst = Slot::new(3, 60, 0);
        let mut src = Slot::new(3, 10, 0);
        assert!(dst.merge(&mut src));
        assert_eq!(dst.count, MAX_STACK);
        assert_eq!(src.count, 6);
    }

    #[test]
    fn merge_rejects_mismatched_uses() {
        let mut dst = Slot::new(277, 1, 3);
        let mut src = Slot::new(277, 1, 7);
        assert!(!dst.merge(&mut src));
        assert_eq!(src.count, 1);
    }

    #[test]
    fn merge_one_moves_single_item() {
        let mut dst = Slot::EMPTY;
        let mut src = Slot::new(3, 5, 0);
        assert!(dst.merge_one(&mut src));
        assert_eq!(dst, Slot::new(3, 1, 0));
        assert_eq!(src.count, 4);
    }

    #[test]
    fn split_half_rounds_up() {
        let mut slot = Slot::new(3, 5, 0);
        let taken = slot.split_half();
        assert_eq!(taken.count, 3);
        assert_eq!(slot.count, 2);

        let mut one = Slot::new(3, 1, 0);
        let taken = one.split_half();
        assert_eq!(taken.count, 1);
        assert!(one.is_empty());
    }

    #[test]
    fn conservation_across_merges() {
        let mut dst = Slot::new(3, 40, 0);
        let mut src = Slot::new(3, 40, 0);
        let before = dst.count + src.count;
        dst.merge(&mut src);
        assert_eq!(dst.count + src.count, before);
    }
}
