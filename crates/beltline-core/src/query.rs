//! Read-only query views for render and UI collaborators.
//!
//! Views are owned value snapshots, not borrows into the world, so a host
//! can hold them across its own frame without pinning the simulation.
//! Belt item views carry a resolved world-space position (including corner
//! arcs) so drawing needs no knowledge of path geometry.

use crate::flow::{path_position, to_world};
use crate::grid::{Direction, Ore, Terrain, TilePos};
use crate::id::{BeltItemId, BuildingId, BuildingTypeId, FreeItemId, ItemTypeId};
use crate::vec2::Vec2;
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileView {
    pub pos: TilePos,
    pub terrain: Terrain,
    pub ore: Option<Ore>,
    pub is_belt: bool,
    pub building: Option<BuildingId>,
    pub direction: Direction,
    pub tier: u8,
    pub bitmask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeltItemView {
    pub id: BeltItemId,
    pub item_type: ItemTypeId,
    pub tile: TilePos,
    pub progress: crate::fixed::Fixed64,
    /// World-space position along the tile's travel path.
    pub pos: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeItemView {
    pub id: FreeItemId,
    pub item_type: ItemTypeId,
    pub count: u32,
    pub pos: Vec2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingView {
    pub id: BuildingId,
    pub building_type: BuildingTypeId,
    pub pos: TilePos,
    pub facing: Direction,
    pub tier: u8,
    pub inventory: Vec<(ItemTypeId, u32)>,
}

impl World {
    pub fn tile_view(&self, pos: TilePos) -> Option<TileView> {
        let (grid, ..) = self.parts();
        let tile = grid.tile(pos)?;
        Some(TileView {
            pos,
            terrain: tile.terrain,
            ore: tile.ore,
            is_belt: tile.is_belt(),
            building: tile.building_id(),
            direction: tile.direction,
            tier: tile.tier,
            bitmask: tile.bitmask,
        })
    }

    /// Every in-belt item with its resolved draw position, in arena order.
    pub fn belt_item_views(&self) -> Vec<BeltItemView> {
        let (grid, _, conveyor, ..) = self.parts();
        conveyor
            .iter()
            .filter_map(|(id, item)| {
                let tile = grid.tile(item.tile)?;
                let local = path_position(tile.direction, item.from, item.progress);
                Some(BeltItemView {
                    id,
                    item_type: item.item_type,
                    tile: item.tile,
                    progress: item.progress,
                    pos: to_world(item.tile, local),
                })
            })
            .collect()
    }

    pub fn free_item_views(&self) -> Vec<FreeItemView> {
        let (_, _, _, free_items, ..) = self.parts();
        free_items
            .iter()
            .map(|(id, item)| FreeItemView {
                id,
                item_type: item.item_type,
                count: item.count,
                pos: item.pos,
            })
            .collect()
    }

    pub fn building_view(&self, id: BuildingId) -> Option<BuildingView> {
        let (_, buildings, ..) = self.parts();
        let instance = buildings.get(id)?;
        Some(BuildingView {
            id,
            building_type: instance.building_type,
            pos: instance.pos,
            facing: instance.facing,
            tier: instance.tier,
            inventory: instance.inventory.iter().collect(),
        })
    }

    pub fn building_at(&self, pos: TilePos) -> Option<BuildingId> {
        let (grid, ..) = self.parts();
        grid.tile(pos)?.building_id()
    }
}
