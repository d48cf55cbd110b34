//! Conveyor transport: lock-step items riding belt tiles.
//!
//! In-belt items advance a progress fraction along their current tile and
//! hand off to the next tile (or into a building) when they reach the end.
//! Belts are single-file FIFO queues: an item within the spacing window of
//! the item ahead freezes until the gap reopens.
//!
//! Free item entities are a separate system ([`crate::freeitem`]); they ride
//! belts by sampling the same flow field instead of holding a progress
//! fraction.

use crate::behavior::BuildingInstance;
use crate::events::{Event, EventBuffer};
use crate::fixed::{Fixed64, Frame, Seconds};
use crate::flow::tier_speed;
use crate::grid::{Direction, Grid, TilePos, TileStructure};
use crate::id::{BeltItemId, BuildingId, ItemTypeId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Minimum spacing between items on a belt, and the length of the entry
/// zone that must be clear before a new item may join a tile.
pub(crate) fn entry_spacing() -> Fixed64 {
    Fixed64::from_num(0.3)
}

/// An item locked to a belt tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltItem {
    pub item_type: ItemTypeId,
    /// Tile the item currently rides.
    pub tile: TilePos,
    /// Progress 0..=1 along the tile. Exactly 1 means queued at a blocked
    /// belt end.
    pub progress: Fixed64,
    /// The direction this item entered the tile from; distinguishes a
    /// straight run from a corner arc.
    pub from: Direction,
}

/// Arena of in-belt items plus a per-tile occupancy index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConveyorSystem {
    items: SlotMap<BeltItemId, BeltItem>,
    #[serde(skip)]
    by_tile: BTreeMap<TilePos, Vec<BeltItemId>>,
}

impl ConveyorSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: BeltItemId) -> Option<&BeltItem> {
        self.items.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BeltItemId, &BeltItem)> {
        self.items.iter()
    }

    /// Belt items currently on a tile.
    pub fn items_on(&self, pos: TilePos) -> &[BeltItemId] {
        self.by_tile.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add an item to a belt tile at progress 0, entering against the belt
    /// direction. Fails if the tile is not an active belt or another item
    /// occupies the entry zone.
    pub fn try_add_item(
        &mut self,
        grid: &Grid,
        pos: TilePos,
        item_type: ItemTypeId,
    ) -> Option<BeltItemId> {
        let tile = grid.tile(pos)?;
        if !tile.is_belt() {
            return None;
        }
        if self.entry_zone_occupied(pos) {
            return None;
        }
        let from = tile.direction.opposite();
        let id = self.items.insert(BeltItem {
            item_type,
            tile: pos,
            progress: Fixed64::ZERO,
            from,
        });
        self.by_tile.entry(pos).or_default().push(id);
        Some(id)
    }

    /// Remove an item from the belt. Returns it if it existed.
    pub fn remove_item(&mut self, id: BeltItemId) -> Option<BeltItem> {
        let item = self.items.remove(id)?;
        self.unindex(id, item.tile);
        Some(item)
    }

    /// Drop every item on a tile (belt removed mid-transit). The returned
    /// items are no longer tracked here; the caller decides whether they
    /// survive as free entities.
    pub fn clear_tile(&mut self, pos: TilePos) -> Vec<BeltItem> {
        let ids = self.by_tile.remove(&pos).unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.items.remove(id))
            .collect()
    }

    /// True if any item sits in the entry zone (progress < spacing) of a
    /// tile.
    pub fn entry_zone_occupied(&self, pos: TilePos) -> bool {
        let spacing = entry_spacing();
        self.items_on(pos)
            .iter()
            .any(|id| self.items[*id].progress < spacing)
    }

    /// Advance all belt items by `dt`.
    ///
    /// Items are processed in a deterministic order: row-major by tile, and
    /// within a tile the item furthest along moves first so gaps open ahead
    /// of followers. An item reaching the end of its tile is delivered into
    /// an accepting building, handed to the next belt with carried-over
    /// progress, or left queued at progress 1.
    pub fn update(
        &mut self,
        dt: Seconds,
        grid: &Grid,
        buildings: &mut SlotMap<BuildingId, BuildingInstance>,
        events: &mut EventBuffer,
        frame: Frame,
    ) {
        let mut order: Vec<(TilePos, Fixed64, BeltItemId)> = self
            .items
            .iter()
            .map(|(id, item)| (item.tile, item.progress, id))
            .collect();
        order.sort_by_key(|(tile, progress, id)| (tile.y, tile.x, Reverse(*progress), *id));

        let one = Fixed64::from_num(1);
        let spacing = entry_spacing();

        for (_, _, id) in order {
            let Some(item) = self.items.get(id).copied() else {
                continue;
            };
            let Some(tile) = grid.tile(item.tile) else {
                continue;
            };
            if !tile.is_belt() {
                // Belt vanished under the item; world cleanup owns it.
                continue;
            }

            // Single-file spacing against the nearest item ahead on this
            // tile. Inside the window: frozen. Otherwise the advance is
            // clamped so the window is never entered within one step.
            let ahead = self
                .items_on(item.tile)
                .iter()
                .filter(|other| **other != id)
                .map(|other| self.items[*other].progress)
                .filter(|p| *p > item.progress)
                .min();
            if let Some(leader) = ahead
                && leader - item.progress <= spacing
            {
                continue;
            }

            let mut new_progress = item.progress + tier_speed(tile.tier) * dt;
            if let Some(leader) = ahead {
                new_progress = new_progress.min(leader - spacing);
            }

            if new_progress < one {
                self.items[id].progress = new_progress;
                continue;
            }

            // Tile end: building delivery, belt hand-off, or queue.
            let next_pos = item.tile.neighbor(tile.direction);
            match grid.tile(next_pos).map(|t| t.structure) {
                Some(TileStructure::Building(building_id)) => {
                    if let Some(instance) = buildings.get_mut(building_id)
                        && instance.try_accept(item.item_type, 1)
                    {
                        self.items.remove(id);
                        self.unindex(id, item.tile);
                        events.push(Event::ItemConsumed {
                            pos: next_pos,
                            item_type: item.item_type,
                            count: 1,
                            frame,
                        });
                    } else {
                        self.items[id].progress = one;
                    }
                }
                Some(TileStructure::Belt) if !self.entry_zone_occupied(next_pos) => {
                    // Carried progress is clamped behind the rearmost item
                    // already on the next tile, so a large dt cannot leap a
                    // hand-off past the queue.
                    let mut carried = (new_progress - one).min(one);
                    if let Some(rear) = self
                        .items_on(next_pos)
                        .iter()
                        .map(|other| self.items[*other].progress)
                        .min()
                    {
                        carried = carried.min(rear - spacing);
                    }
                    let entry = self.items[id];
                    self.unindex(id, entry.tile);
                    let slot = &mut self.items[id];
                    slot.from = tile.direction.opposite();
                    slot.tile = next_pos;
                    slot.progress = carried;
                    self.by_tile.entry(next_pos).or_default().push(id);
                }
                _ => {
                    self.items[id].progress = one;
                }
            }
        }
    }

    /// Rebuild the per-tile index from the arena (after snapshot load).
    pub(crate) fn rebuild_index(&mut self) {
        self.by_tile.clear();
        for (id, item) in &self.items {
            self.by_tile.entry(item.tile).or_default().push(id);
        }
    }

    fn unindex(&mut self, id: BeltItemId, tile: TilePos) {
        if let Some(ids) = self.by_tile.get_mut(&tile) {
            if let Some(idx) = ids.iter().position(|i| *i == id) {
                ids.remove(idx);
            }
            if ids.is_empty() {
                self.by_tile.remove(&tile);
            }
        }
    }
}
