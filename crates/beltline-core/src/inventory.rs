//! Per-building item inventory.
//!
//! A flat bag of per-item counts with deterministic iteration order.
//! Capacity policy lives in the behaviors that own the inventory (a
//! furnace caps each input buffer, storage caps the total), so the bag
//! itself is uncapped.

use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Item counts keyed by type. Iteration is ordered by item id, which keeps
/// hashing and serialization deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    counts: BTreeMap<ItemTypeId, u32>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add items unconditionally.
    pub fn add(&mut self, item_type: ItemTypeId, quantity: u32) {
        if quantity > 0 {
            *self.counts.entry(item_type).or_insert(0) += quantity;
        }
    }

    /// Remove exactly `quantity` items, or nothing at all.
    #[must_use = "returns false when the inventory held fewer than requested"]
    pub fn try_remove(&mut self, item_type: ItemTypeId, quantity: u32) -> bool {
        match self.counts.get_mut(&item_type) {
            Some(count) if *count >= quantity => {
                *count -= quantity;
                if *count == 0 {
                    self.counts.remove(&item_type);
                }
                true
            }
            _ => false,
        }
    }

    /// Quantity of a specific item type.
    pub fn quantity(&self, item_type: ItemTypeId) -> u32 {
        self.counts.get(&item_type).copied().unwrap_or(0)
    }

    /// Total items across all types.
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The lowest-id item type currently held, with its count.
    pub fn first(&self) -> Option<(ItemTypeId, u32)> {
        self.counts.iter().next().map(|(id, count)| (*id, *count))
    }

    /// Iterate held types in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemTypeId, u32)> + '_ {
        self.counts.iter().map(|(id, count)| (*id, *count))
    }

    /// Remove and return every held stack (demolition spill).
    pub fn drain_all(&mut self) -> Vec<(ItemTypeId, u32)> {
        std::mem::take(&mut self.counts).into_iter().collect()
    }
}
