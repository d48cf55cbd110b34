//! Free item entities: off-belt items with ejection and suction physics.
//!
//! Unlike in-belt items, free items hold a continuous world position and
//! velocity. Producers eject them, belts carry them by flow-field sampling,
//! and buildings suck them back in. Collision between items is a radius
//! check with a directional cone: an item only blocks movement toward it,
//! which lets parallel and merging streams slide past each other ("zipper
//! merge") while still preventing head-on overlap.
//!
//! The only spatial index is the per-tile item list owned by the grid; each
//! entity re-registers itself when its position crosses a tile boundary.

use crate::behavior::BuildingInstance;
use crate::events::{Event, EventBuffer};
use crate::fixed::{Fixed64, Frame, Seconds};
use crate::flow::sample_flow;
use crate::grid::{tile_of, Grid, TilePos, TileStructure};
use crate::id::{BuildingId, FreeItemId, ItemTypeId};
use crate::registry::Registry;
use crate::vec2::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// Fraction of an item's size used as its collision distance.
fn collision_scale() -> Fixed64 {
    Fixed64::from_num(0.95)
}

/// Pull speed toward a building center, in units per second.
fn suction_speed() -> Fixed64 {
    Fixed64::from_num(2)
}

/// Radius around a building center at which the item is offered to it.
fn accept_radius() -> Fixed64 {
    Fixed64::from_num(0.1)
}

/// Exponential velocity damping rate on belt tiles, per second. Belt flow
/// dominates residual ejection velocity within a few frames.
fn belt_damping() -> Fixed64 {
    Fixed64::from_num(10)
}

/// Damping rate off belts; ejection coasts five times longer.
fn free_damping() -> Fixed64 {
    Fixed64::from_num(2)
}

/// A free-roaming item entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeItem {
    pub item_type: ItemTypeId,
    pub count: u32,
    /// World position, not tile-snapped.
    pub pos: Vec2,
    /// Residual ejection velocity; decays every frame.
    pub velocity: Vec2,
    /// Remaining ejection-immunity window: while positive the item is
    /// exempt from suction.
    pub immunity: Seconds,
    /// Tile this entity is registered on in the grid's spatial index.
    pub tile: TilePos,
}

/// Arena of free item entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreeItems {
    items: SlotMap<FreeItemId, FreeItem>,
}

impl FreeItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: FreeItemId) -> Option<&FreeItem> {
        self.items.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FreeItemId, &FreeItem)> {
        self.items.iter()
    }

    /// Insert an entity and register it on its tile.
    pub fn spawn(&mut self, grid: &mut Grid, mut item: FreeItem) -> FreeItemId {
        item.tile = tile_of(item.pos);
        let tile = item.tile;
        let id = self.items.insert(item);
        grid.register_free_item(tile, id);
        id
    }

    /// Remove an entity and unregister it from its tile.
    pub fn despawn(&mut self, grid: &mut Grid, id: FreeItemId) -> Option<FreeItem> {
        let item = self.items.remove(id)?;
        grid.unregister_free_item(item.tile, id);
        Some(item)
    }

    /// True if any entity lies within `radius` of a world-space point.
    /// Used by output arbitration for spawn and entry-zone clearance.
    pub fn any_within_radius(&self, grid: &Grid, point: Vec2, radius: Fixed64) -> bool {
        let center = tile_of(point);
        let r2 = radius * radius;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let tile = TilePos::new(center.x + dx, center.y + dy);
                for id in grid.items_at(tile) {
                    if self.items[*id].pos.distance_squared(point) < r2 {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Re-register every entity in the grid's per-tile index (after
    /// snapshot load).
    pub(crate) fn rebuild_index(&self, grid: &mut Grid) {
        grid.clear_free_item_index();
        for (id, item) in &self.items {
            grid.register_free_item(item.tile, id);
        }
    }

    /// Per-frame physics for every entity, in arena order.
    pub fn update(
        &mut self,
        dt: Seconds,
        grid: &mut Grid,
        buildings: &mut SlotMap<BuildingId, BuildingInstance>,
        registry: &Registry,
        events: &mut EventBuffer,
        frame: Frame,
    ) {
        let ids: Vec<FreeItemId> = self.items.keys().collect();
        for id in ids {
            let Some(mut item) = self.items.get(id).copied() else {
                continue;
            };

            if item.immunity > Fixed64::ZERO {
                item.immunity = (item.immunity - dt).max(Fixed64::ZERO);
            }

            let collision = registry.item_size(item.item_type) * collision_scale();

            // Ejection integration: commit the straight move or kill the
            // velocity on block.
            if item.velocity != Vec2::ZERO {
                let delta = item.velocity * dt;
                let target = item.pos + delta;
                if !grid.in_bounds(tile_of(target))
                    || self.blocked_by_items(grid, id, target, delta, collision)
                {
                    item.velocity = Vec2::ZERO;
                } else {
                    self.commit_move(grid, id, &mut item, target);
                }
            }

            // Belt-driven movement via the flow field. `sample_flow` is zero
            // off belts.
            let on_belt = grid.tile(item.tile).map(|t| t.is_belt()).unwrap_or(false);
            let origin = Vec2::new(
                Fixed64::from_num(item.tile.x),
                Fixed64::from_num(item.tile.y),
            );
            let flow = grid
                .tile(item.tile)
                .map(|tile| sample_flow(tile, item.pos - origin))
                .unwrap_or(Vec2::ZERO);
            if flow != Vec2::ZERO {
                let delta = flow * dt;
                let target = item.pos + delta;
                if grid.in_bounds(tile_of(target))
                    && !self.blocked_by_items(grid, id, target, delta, collision)
                {
                    self.commit_move(grid, id, &mut item, target);
                }
            }

            // Velocity damping.
            let rate = if on_belt { belt_damping() } else { free_damping() };
            let one = Fixed64::from_num(1);
            let factor = (one - rate * dt).max(Fixed64::ZERO);
            item.velocity = item.velocity * factor;

            // Suction into the building under the item.
            if item.immunity == Fixed64::ZERO
                && let Some(TileStructure::Building(building_id)) =
                    grid.tile(item.tile).map(|t| t.structure)
            {
                let center = item.tile.center();
                let offset = center - item.pos;
                let dist = offset.length();
                if dist <= accept_radius() {
                    if let Some(instance) = buildings.get_mut(building_id)
                        && instance.try_accept(item.item_type, item.count)
                    {
                        events.push(Event::ItemConsumed {
                            pos: item.tile,
                            item_type: item.item_type,
                            count: item.count,
                            frame,
                        });
                        self.items.remove(id);
                        grid.unregister_free_item(item.tile, id);
                        continue;
                    }
                } else {
                    let step = (suction_speed() * dt).min(dist);
                    let target = item.pos + offset.normalized() * step;
                    self.commit_move(grid, id, &mut item, target);
                }
            }

            self.items[id] = item;
        }
    }

    /// Move an entity, re-registering it when the move crosses a tile
    /// boundary.
    fn commit_move(&mut self, grid: &mut Grid, id: FreeItemId, item: &mut FreeItem, target: Vec2) {
        item.pos = target;
        let new_tile = tile_of(target);
        if new_tile != item.tile {
            grid.unregister_free_item(item.tile, id);
            grid.register_free_item(new_tile, id);
            item.tile = new_tile;
        }
        // Keep the arena in sync so later items this frame see the new
        // position.
        self.items[id] = *item;
    }

    /// Collision query for a proposed move to `target` along `move_vec`.
    ///
    /// Candidates come from the target's tile plus any neighbor whose shared
    /// edge lies within the collision distance of the target. A candidate
    /// inside half the collision distance always blocks; one inside the full
    /// distance blocks only when it lies within 60 degrees of the movement
    /// direction (`dot(to_other, move) > 0.5 * |to_other| * |move|`,
    /// compared in squared form).
    fn blocked_by_items(
        &self,
        grid: &Grid,
        self_id: FreeItemId,
        target: Vec2,
        move_vec: Vec2,
        collision: Fixed64,
    ) -> bool {
        let center = tile_of(target);
        let fx = target.x - Fixed64::from_num(center.x);
        let fy = target.y - Fixed64::from_num(center.y);
        let one = Fixed64::from_num(1);
        let west = fx < collision;
        let east = one - fx < collision;
        let south = fy < collision;
        let north = one - fy < collision;

        let hard = collision * Fixed64::from_num(0.5);
        let hard2 = hard * hard;
        let coll2 = collision * collision;
        let move2 = move_vec.length_squared();

        for dy in -1..=1 {
            for dx in -1..=1 {
                let x_near = match dx {
                    -1 => west,
                    1 => east,
                    _ => true,
                };
                let y_near = match dy {
                    -1 => south,
                    1 => north,
                    _ => true,
                };
                if !x_near || !y_near {
                    continue;
                }
                let tile = TilePos::new(center.x + dx, center.y + dy);
                for other_id in grid.items_at(tile) {
                    if *other_id == self_id {
                        continue;
                    }
                    let Some(other) = self.items.get(*other_id) else {
                        continue;
                    };
                    let to_other = other.pos - target;
                    let d2 = to_other.length_squared();
                    if d2 < hard2 {
                        return true;
                    }
                    if d2 < coll2 {
                        let dot = to_other.dot(move_vec);
                        if dot > Fixed64::ZERO
                            && (dot * dot) * Fixed64::from_num(4) > d2 * move2
                        {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}
