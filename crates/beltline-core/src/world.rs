//! The world: one self-contained simulation instance.
//!
//! A [`World`] owns the grid, the building arena, the conveyor system, the
//! free item arena, and the registry its definitions came from. Everything
//! the host does -- placement, stepping, queries, snapshots -- goes through
//! it, and two worlds never share state, so multiple simulations can run in
//! one process.
//!
//! Each step runs four phases in a fixed order: production, then belt
//! transport, then free item physics, then bookkeeping. Items produced in a
//! frame are therefore visible to transport in that same frame.

use crate::behavior::{run_production, BuildingInstance};
use crate::conveyor::ConveyorSystem;
use crate::events::{Event, EventBuffer};
use crate::fixed::{Fixed64, Seconds};
use crate::flow::{path_position, to_world};
use crate::freeitem::{FreeItem, FreeItems};
use crate::grid::{tile_of, Direction, Grid, Ore, Terrain, TilePos, TileStructure, TileUpdate};
use crate::id::{BeltItemId, BuildingId, BuildingTypeId, FreeItemId, ItemTypeId};
use crate::registry::Registry;
use crate::sim::{SimState, SimulationStrategy, StateHash};
use crate::vec2::Vec2;
use slotmap::{Key, SlotMap};
use thiserror::Error;

/// Placement and spawn failures. Frame-to-frame operations never error;
/// these cover host mistakes only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceError {
    #[error("position ({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
    #[error("terrain at ({x}, {y}) cannot host a structure")]
    Unbuildable { x: i32, y: i32 },
    #[error("unknown building type id {0}")]
    UnknownBuilding(u32),
}

/// One simulation instance.
pub struct World {
    registry: Registry,
    grid: Grid,
    buildings: SlotMap<BuildingId, BuildingInstance>,
    conveyor: ConveyorSystem,
    free_items: FreeItems,
    state: SimState,
    strategy: SimulationStrategy,
    events: EventBuffer,
}

impl World {
    pub fn new(
        width: u32,
        height: u32,
        registry: Registry,
        strategy: SimulationStrategy,
    ) -> Self {
        Self {
            registry,
            grid: Grid::new(width, height),
            buildings: SlotMap::with_key(),
            conveyor: ConveyorSystem::new(),
            free_items: FreeItems::new(),
            state: SimState::new(),
            strategy,
            events: EventBuffer::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn frame(&self) -> u64 {
        self.state.frame
    }

    pub fn time(&self) -> Seconds {
        self.state.time
    }

    pub fn strategy(&self) -> SimulationStrategy {
        self.strategy
    }

    // -----------------------------------------------------------------------
    // World generation seams
    // -----------------------------------------------------------------------

    pub fn set_ore(&mut self, pos: TilePos, ore: Option<Ore>) -> Result<(), PlaceError> {
        self.grid
            .set_ore(pos, ore)
            .map_err(|_| PlaceError::OutOfBounds { x: pos.x, y: pos.y })
    }

    pub fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) -> Result<(), PlaceError> {
        self.grid
            .set_terrain(pos, terrain)
            .map_err(|_| PlaceError::OutOfBounds { x: pos.x, y: pos.y })
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    fn check_buildable(&self, pos: TilePos) -> Result<(), PlaceError> {
        let tile = self
            .grid
            .tile(pos)
            .ok_or(PlaceError::OutOfBounds { x: pos.x, y: pos.y })?;
        if !tile.terrain.buildable() {
            return Err(PlaceError::Unbuildable { x: pos.x, y: pos.y });
        }
        Ok(())
    }

    /// Configure a tile as a conveyor belt. Whatever structure held the
    /// tile before is removed first (a tile hosts at most one structure).
    pub fn place_belt(
        &mut self,
        pos: TilePos,
        direction: Direction,
        tier: u8,
    ) -> Result<(), PlaceError> {
        self.check_buildable(pos)?;
        self.clear_structure(pos);
        self.grid
            .apply(pos, TileUpdate::belt(direction, tier))
            .map_err(|_| PlaceError::OutOfBounds { x: pos.x, y: pos.y })
    }

    /// Place a building from its registry template.
    pub fn place_building(
        &mut self,
        pos: TilePos,
        building_type: BuildingTypeId,
        facing: Direction,
    ) -> Result<BuildingId, PlaceError> {
        self.check_buildable(pos)?;
        let def = self
            .registry
            .get_building(building_type)
            .ok_or(PlaceError::UnknownBuilding(building_type.0))?;
        let mut instance = BuildingInstance::from_def(building_type, def, pos, facing);
        instance.reset_behaviors();
        let tier = instance.tier;

        self.clear_structure(pos);
        let id = self.buildings.insert(instance);
        self.grid
            .apply(pos, TileUpdate::building(id, facing, tier))
            .map_err(|_| PlaceError::OutOfBounds { x: pos.x, y: pos.y })?;
        self.events.push(Event::BuildingPlaced {
            id,
            building_type,
            pos,
            frame: self.state.frame,
        });
        Ok(id)
    }

    /// Remove whatever structure occupies a tile. Removing an empty tile is
    /// a no-op.
    pub fn remove_structure(&mut self, pos: TilePos) -> Result<(), PlaceError> {
        if !self.grid.in_bounds(pos) {
            return Err(PlaceError::OutOfBounds { x: pos.x, y: pos.y });
        }
        self.clear_structure(pos);
        self.grid
            .apply(pos, TileUpdate::clear())
            .map_err(|_| PlaceError::OutOfBounds { x: pos.x, y: pos.y })
    }

    /// Tear down the current occupant of a tile without touching the tile
    /// metadata itself. Belt items stranded by a removed belt become free
    /// items in place; a removed building's inventory spills onto its tile
    /// as free item stacks.
    fn clear_structure(&mut self, pos: TilePos) {
        let Some(tile) = self.grid.tile(pos) else {
            return;
        };
        let structure = tile.structure;
        let out = tile.direction;
        match structure {
            TileStructure::Empty => {}
            TileStructure::Belt => {
                for stranded in self.conveyor.clear_tile(pos) {
                    let local = path_position(out, stranded.from, stranded.progress);
                    let world_pos = to_world(pos, local);
                    self.spawn_free(stranded.item_type, 1, world_pos);
                }
            }
            TileStructure::Building(id) => {
                if let Some(mut instance) = self.buildings.remove(id) {
                    for (item_type, quantity) in instance.inventory.drain_all() {
                        self.spawn_free(item_type, quantity, pos.center());
                    }
                    self.events.push(Event::BuildingRemoved {
                        id,
                        pos,
                        frame: self.state.frame,
                    });
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Item entry points
    // -----------------------------------------------------------------------

    /// Insert an item into a belt's lock-step lane at the tile's entry.
    /// `None` if the tile is not an active belt or the entry zone is
    /// occupied.
    pub fn try_add_belt_item(
        &mut self,
        pos: TilePos,
        item_type: ItemTypeId,
    ) -> Option<BeltItemId> {
        self.conveyor.try_add_item(&self.grid, pos, item_type)
    }

    /// Drop a free item stack into the world at an arbitrary position.
    pub fn spawn_free_item(
        &mut self,
        item_type: ItemTypeId,
        count: u32,
        pos: Vec2,
    ) -> Result<FreeItemId, PlaceError> {
        let tile = tile_of(pos);
        if !self.grid.in_bounds(tile) {
            return Err(PlaceError::OutOfBounds {
                x: tile.x,
                y: tile.y,
            });
        }
        Ok(self.spawn_free(item_type, count, pos))
    }

    /// Offer items straight to a building's behaviors, bypassing belts and
    /// suction (host-driven delivery). False means no behavior wanted them.
    pub fn try_accept_into(
        &mut self,
        id: BuildingId,
        item_type: ItemTypeId,
        count: u32,
    ) -> bool {
        let Some(instance) = self.buildings.get_mut(id) else {
            return false;
        };
        if instance.try_accept(item_type, count) {
            self.events.push(Event::ItemConsumed {
                pos: instance.pos,
                item_type,
                count,
                frame: self.state.frame,
            });
            return true;
        }
        false
    }

    /// Remove a free item from the world (host pickup). Returns what was
    /// held.
    pub fn despawn_free_item(&mut self, id: FreeItemId) -> Option<(ItemTypeId, u32)> {
        let item = self.free_items.despawn(&mut self.grid, id)?;
        self.events.push(Event::ItemDespawned {
            id,
            item_type: item.item_type,
            frame: self.state.frame,
        });
        Some((item.item_type, item.count))
    }

    fn spawn_free(&mut self, item_type: ItemTypeId, count: u32, pos: Vec2) -> FreeItemId {
        let id = self.free_items.spawn(
            &mut self.grid,
            FreeItem {
                item_type,
                count,
                pos,
                velocity: Vec2::ZERO,
                immunity: Fixed64::ZERO,
                tile: tile_of(pos),
            },
        );
        self.events.push(Event::ItemSpawned {
            id,
            item_type,
            pos: tile_of(pos),
            frame: self.state.frame,
        });
        id
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Run exactly one simulation frame of `dt` seconds.
    pub fn step(&mut self, dt: Seconds) {
        let frame = self.state.frame;
        run_production(
            &mut self.buildings,
            &mut self.grid,
            &mut self.free_items,
            &self.registry,
            &mut self.events,
            dt,
            frame,
        );
        self.conveyor
            .update(dt, &self.grid, &mut self.buildings, &mut self.events, frame);
        self.free_items.update(
            dt,
            &mut self.grid,
            &mut self.buildings,
            &self.registry,
            &mut self.events,
            frame,
        );
        self.state.frame += 1;
        self.state.time += dt;
    }

    /// Advance simulated time by `dt` according to the world's strategy:
    /// one variable-length frame, or as many fixed steps as the
    /// accumulator covers.
    pub fn advance(&mut self, dt: Seconds) {
        match self.strategy {
            SimulationStrategy::Frame => self.step(dt),
            SimulationStrategy::FixedStep { timestep } => {
                if timestep <= Fixed64::ZERO {
                    self.step(dt);
                    return;
                }
                self.state.accumulator += dt;
                while self.state.accumulator >= timestep {
                    self.state.accumulator -= timestep;
                    self.step(timestep);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Observability
    // -----------------------------------------------------------------------

    /// Drain the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take()
    }

    /// Tiles whose structure or terrain changed since the last call, for
    /// render resync.
    pub fn take_dirty_tiles(&mut self) -> Vec<TilePos> {
        self.grid.take_dirty()
    }

    /// Hash of the complete mutable simulation state. Two worlds that ran
    /// the same operations from the same definitions hash identically.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.state.frame);
        hasher.write_fixed64(self.state.time);
        hasher.write_u32(self.grid.width());
        hasher.write_u32(self.grid.height());

        for y in 0..self.grid.height() as i32 {
            for x in 0..self.grid.width() as i32 {
                let Some(tile) = self.grid.tile(TilePos::new(x, y)) else {
                    continue;
                };
                hasher.write_u32(terrain_tag(tile.terrain));
                hasher.write_u32(ore_tag(tile.ore));
                match tile.structure {
                    TileStructure::Empty => hasher.write_u32(0),
                    TileStructure::Belt => hasher.write_u32(1),
                    TileStructure::Building(id) => {
                        hasher.write_u32(2);
                        hasher.write_u64(id.data().as_ffi());
                    }
                }
                hasher.write_u32(tile.direction.index() as u32);
                hasher.write_u32(tile.tier as u32);
            }
        }

        hasher.write_u32(self.conveyor.len() as u32);
        for (id, item) in self.conveyor.iter() {
            hasher.write_u64(id.data().as_ffi());
            hasher.write_u32(item.item_type.0);
            hasher.write_u32(item.tile.x as u32);
            hasher.write_u32(item.tile.y as u32);
            hasher.write_fixed64(item.progress);
            hasher.write_u32(item.from.index() as u32);
        }

        hasher.write_u32(self.buildings.len() as u32);
        for (id, instance) in self.buildings.iter() {
            hasher.write_u64(id.data().as_ffi());
            hasher.write_u32(instance.building_type.0);
            hasher.write_u32(instance.pos.x as u32);
            hasher.write_u32(instance.pos.y as u32);
            hasher.write_u32(instance.facing.index() as u32);
            hasher.write_u32(instance.tier as u32);
            hasher.write_u32(instance.output_cursor as u32);
            for (item_type, quantity) in instance.inventory.iter() {
                hasher.write_u32(item_type.0);
                hasher.write_u32(quantity);
            }
            for behavior in &instance.behaviors {
                behavior.write_hash(&mut hasher);
            }
        }

        hasher.write_u32(self.free_items.len() as u32);
        for (id, item) in self.free_items.iter() {
            hasher.write_u64(id.data().as_ffi());
            hasher.write_u32(item.item_type.0);
            hasher.write_u32(item.count);
            hasher.write_fixed64(item.pos.x);
            hasher.write_fixed64(item.pos.y);
            hasher.write_fixed64(item.velocity.x);
            hasher.write_fixed64(item.velocity.y);
            hasher.write_fixed64(item.immunity);
        }

        hasher.finish()
    }

    // -----------------------------------------------------------------------
    // Internal accessors for queries and snapshots
    // -----------------------------------------------------------------------

    pub(crate) fn parts(
        &self,
    ) -> (
        &Grid,
        &SlotMap<BuildingId, BuildingInstance>,
        &ConveyorSystem,
        &FreeItems,
        &SimState,
        SimulationStrategy,
    ) {
        (
            &self.grid,
            &self.buildings,
            &self.conveyor,
            &self.free_items,
            &self.state,
            self.strategy,
        )
    }

    pub(crate) fn from_parts(
        registry: Registry,
        mut grid: Grid,
        buildings: SlotMap<BuildingId, BuildingInstance>,
        mut conveyor: ConveyorSystem,
        free_items: FreeItems,
        state: SimState,
        strategy: SimulationStrategy,
    ) -> Self {
        conveyor.rebuild_index();
        free_items.rebuild_index(&mut grid);
        Self {
            registry,
            grid,
            buildings,
            conveyor,
            free_items,
            state,
            strategy,
            events: EventBuffer::new(),
        }
    }
}

fn terrain_tag(terrain: Terrain) -> u32 {
    match terrain {
        Terrain::Grass => 0,
        Terrain::Sand => 1,
        Terrain::Water => 2,
    }
}

fn ore_tag(ore: Option<Ore>) -> u32 {
    match ore {
        None => 0,
        Some(Ore::Iron) => 1,
        Some(Ore::Copper) => 2,
        Some(Ore::Coal) => 3,
        Some(Ore::Gold) => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::fixed::f64_to_fixed64;
    use crate::test_utils::{basic_registry, items};

    fn world() -> World {
        World::new(8, 8, basic_registry(), SimulationStrategy::Frame)
    }

    #[test]
    fn tile_hosts_at_most_one_structure() {
        let mut w = world();
        let pos = TilePos::new(2, 2);
        let storage = w.registry().building_id("storage_crate").unwrap();
        let id = w.place_building(pos, storage, Direction::North).unwrap();
        assert_eq!(w.grid().tile(pos).unwrap().building_id(), Some(id));

        w.place_belt(pos, Direction::East, 1).unwrap();
        let tile = w.grid().tile(pos).unwrap();
        assert!(tile.is_belt());
        assert_eq!(tile.building_id(), None);
        // The displaced building is gone from the arena too.
        assert!(w.buildings.get(id).is_none());
    }

    #[test]
    fn place_belt_rejects_water_and_out_of_bounds() {
        let mut w = world();
        w.set_terrain(TilePos::new(1, 1), Terrain::Water).unwrap();
        assert_eq!(
            w.place_belt(TilePos::new(1, 1), Direction::East, 1),
            Err(PlaceError::Unbuildable { x: 1, y: 1 })
        );
        assert_eq!(
            w.place_belt(TilePos::new(-1, 0), Direction::East, 1),
            Err(PlaceError::OutOfBounds { x: -1, y: 0 })
        );
    }

    #[test]
    fn removing_a_belt_strands_its_items_as_free_items() {
        let mut w = world();
        let pos = TilePos::new(3, 3);
        w.place_belt(pos, Direction::East, 1).unwrap();
        w.try_add_belt_item(pos, items::COAL).unwrap();
        w.step(f64_to_fixed64(0.25));
        assert_eq!(w.conveyor.len(), 1);

        w.remove_structure(pos).unwrap();
        assert_eq!(w.conveyor.len(), 0);
        assert_eq!(w.free_items.len(), 1);
        let (_, stranded) = w.free_items.iter().next().unwrap();
        assert_eq!(stranded.item_type, items::COAL);
        // Dropped where it stood: a quarter of the way across the tile.
        assert!((stranded.pos.x - f64_to_fixed64(3.25)).abs() < f64_to_fixed64(1e-6));
        assert_eq!(stranded.pos.y, f64_to_fixed64(3.5));
    }

    #[test]
    fn removing_a_building_spills_its_inventory() {
        let mut w = world();
        let pos = TilePos::new(4, 4);
        let storage = w.registry().building_id("storage_crate").unwrap();
        let id = w.place_building(pos, storage, Direction::North).unwrap();
        assert!(w.buildings[id].try_accept(items::COAL, 7));

        w.remove_structure(pos).unwrap();
        assert_eq!(w.free_items.len(), 1);
        let (_, spilled) = w.free_items.iter().next().unwrap();
        assert_eq!(spilled.item_type, items::COAL);
        assert_eq!(spilled.count, 7);
        assert_eq!(spilled.pos, pos.center());
        assert!(
            w.take_events()
                .iter()
                .any(|e| e.kind() == EventKind::BuildingRemoved)
        );
    }

    #[test]
    fn unknown_building_type_is_rejected() {
        let mut w = world();
        assert_eq!(
            w.place_building(TilePos::new(1, 1), BuildingTypeId(999), Direction::North),
            Err(PlaceError::UnknownBuilding(999))
        );
    }

    #[test]
    fn step_advances_frame_and_time() {
        let mut w = world();
        w.step(f64_to_fixed64(0.25));
        w.step(f64_to_fixed64(0.25));
        assert_eq!(w.frame(), 2);
        assert_eq!(w.time(), f64_to_fixed64(0.5));
    }

    #[test]
    fn fixed_step_strategy_accumulates() {
        let timestep = f64_to_fixed64(0.25);
        let mut w = World::new(
            4,
            4,
            basic_registry(),
            SimulationStrategy::FixedStep { timestep },
        );
        w.advance(f64_to_fixed64(0.6));
        assert_eq!(w.frame(), 2);
        w.advance(f64_to_fixed64(0.15));
        assert_eq!(w.frame(), 3);
        assert_eq!(w.time(), f64_to_fixed64(0.75));
    }

    #[test]
    fn state_hash_tracks_mutations() {
        let mut w = world();
        let empty = w.state_hash();
        w.place_belt(TilePos::new(1, 1), Direction::East, 1).unwrap();
        let with_belt = w.state_hash();
        assert_ne!(empty, with_belt);
        assert_eq!(with_belt, w.state_hash());
    }

    #[test]
    fn identical_runs_hash_identically() {
        let build = || {
            let mut w = world();
            w.set_ore(TilePos::new(1, 1), Some(Ore::Iron)).unwrap();
            let miner = w.registry().building_id("iron_miner").unwrap();
            w.place_building(TilePos::new(1, 1), miner, Direction::East)
                .unwrap();
            for x in 2..6 {
                w.place_belt(TilePos::new(x, 1), Direction::East, 1).unwrap();
            }
            for _ in 0..120 {
                w.step(f64_to_fixed64(1.0 / 64.0));
            }
            w.state_hash()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn spawn_and_pickup_round_trip() {
        let mut w = world();
        let id = w
            .spawn_free_item(items::COAL, 5, Vec2::new(f64_to_fixed64(2.5), f64_to_fixed64(2.5)))
            .unwrap();
        assert_eq!(w.despawn_free_item(id), Some((items::COAL, 5)));
        assert_eq!(w.despawn_free_item(id), None);
        let kinds: Vec<EventKind> = w.take_events().iter().map(Event::kind).collect();
        assert!(kinds.contains(&EventKind::ItemSpawned));
        assert!(kinds.contains(&EventKind::ItemDespawned));
    }

    #[test]
    fn dirty_tiles_drain_once() {
        let mut w = world();
        w.place_belt(TilePos::new(1, 1), Direction::East, 1).unwrap();
        let dirty = w.take_dirty_tiles();
        assert!(dirty.contains(&TilePos::new(1, 1)));
        assert!(w.take_dirty_tiles().is_empty());
    }
}
