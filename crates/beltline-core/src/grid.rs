//! Tile grid: terrain, ore deposits, structures, belt connectivity, and the
//! per-tile free-item index.
//!
//! The grid is the substrate every other system reads and writes. Structural
//! mutation goes through a single entry point ([`Grid::apply`]) so the
//! connectivity bitmasks of a cell and its neighbors can never go stale, and
//! so a tile can never hold both a belt and a building -- the structure is
//! one enum, not two flags.
//!
//! Axis convention: +x is east, +y is north. Out-of-bounds is an implicit
//! wall, not a wrap.

use crate::id::{BuildingId, FreeItemId};
use crate::vec2::Vec2;
use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Positions and directions
// ---------------------------------------------------------------------------

/// A position on the 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent position one step in `dir`.
    pub fn neighbor(&self, dir: Direction) -> TilePos {
        let (dx, dy) = dir.offset();
        TilePos::new(self.x + dx, self.y + dy)
    }

    /// World-space center of this tile.
    pub fn center(&self) -> Vec2 {
        let half = Fixed64::from_num(0.5);
        Vec2::new(Fixed64::from_num(self.x) + half, Fixed64::from_num(self.y) + half)
    }
}

/// The tile a world-space position falls in.
pub fn tile_of(pos: Vec2) -> TilePos {
    TilePos::new(pos.x.floor().to_num::<i32>(), pos.y.floor().to_num::<i32>())
}

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions, in bitmask bit order.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Grid offset for this direction (+y is north).
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    /// World-space unit vector for this direction.
    pub fn unit(&self) -> Vec2 {
        let one = Fixed64::from_num(1);
        match self {
            Direction::North => Vec2::new(Fixed64::ZERO, one),
            Direction::East => Vec2::new(one, Fixed64::ZERO),
            Direction::South => Vec2::new(Fixed64::ZERO, -one),
            Direction::West => Vec2::new(-one, Fixed64::ZERO),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Rotate 90 degrees counterclockwise (viewed from above, +y north).
    pub fn rotate_left(&self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_right(&self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Stable index 0..4, used for bitmask bits and round-robin cursors.
    pub fn index(&self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// Direction for a cursor index (wraps modulo 4).
    pub fn from_index(idx: u8) -> Direction {
        match idx % 4 {
            0 => Direction::North,
            1 => Direction::East,
            2 => Direction::South,
            _ => Direction::West,
        }
    }

    /// Bitmask bit for this direction.
    pub fn bit(&self) -> u8 {
        1 << self.index()
    }
}

// ---------------------------------------------------------------------------
// Tile contents
// ---------------------------------------------------------------------------

/// Ground cover. Water refuses structures; everything else is buildable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Grass,
    Sand,
    Water,
}

impl Terrain {
    pub fn buildable(&self) -> bool {
        !matches!(self, Terrain::Water)
    }
}

/// An ore deposit under a tile. Miners map these to output item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ore {
    Iron,
    Copper,
    Coal,
    Gold,
}

/// What occupies a tile. A tile hosts at most one structure; replacing it
/// always clears the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileStructure {
    #[default]
    Empty,
    Belt,
    Building(BuildingId),
}

/// One grid cell.
///
/// `bitmask` caches which neighbors are active belts feeding into this tile
/// (bit per [`Direction::index`]); it is recomputed by [`Grid::apply`] for
/// the mutated cell and its four neighbors. `items` is the spatial index of
/// free item entities currently registered on this tile; it is rebuilt from
/// the item arena after snapshot load rather than serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub ore: Option<Ore>,
    pub structure: TileStructure,
    pub direction: Direction,
    pub tier: u8,
    pub bitmask: u8,
    #[serde(skip)]
    pub(crate) items: Vec<FreeItemId>,
}

impl Tile {
    pub fn is_belt(&self) -> bool {
        matches!(self.structure, TileStructure::Belt)
    }

    pub fn building_id(&self) -> Option<BuildingId> {
        match self.structure {
            TileStructure::Building(id) => Some(id),
            _ => None,
        }
    }

    /// Free items registered on this tile.
    pub fn items(&self) -> &[FreeItemId] {
        &self.items
    }

    /// The input direction that makes this belt a corner: the first neighbor
    /// bit (N, E, S, W order) that is neither the output direction nor its
    /// opposite. Head-on and behind feeds keep the tile straight.
    pub fn turn_input(&self) -> Option<Direction> {
        if !self.is_belt() {
            return None;
        }
        Direction::all().into_iter().find(|d| {
            self.bitmask & d.bit() != 0 && *d != self.direction && *d != self.direction.opposite()
        })
    }
}

/// Structural change applied through [`Grid::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileUpdate {
    pub structure: TileStructure,
    pub direction: Direction,
    pub tier: u8,
}

impl TileUpdate {
    pub fn clear() -> Self {
        Self {
            structure: TileStructure::Empty,
            direction: Direction::North,
            tier: 1,
        }
    }

    pub fn belt(direction: Direction, tier: u8) -> Self {
        Self {
            structure: TileStructure::Belt,
            direction,
            tier,
        }
    }

    pub fn building(id: BuildingId, facing: Direction, tier: u8) -> Self {
        Self {
            structure: TileStructure::Building(id),
            direction: facing,
            tier,
        }
    }
}

/// Errors from grid operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GridError {
    #[error("position ({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A fixed-size, row-major tile grid with a render dirty set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    #[serde(skip)]
    dirty: BTreeSet<TilePos>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        for _ in 0..(width as usize) * (height as usize) {
            tiles.push(Tile {
                tier: 1,
                ..Tile::default()
            });
        }
        Self {
            width,
            height,
            tiles,
            dirty: BTreeSet::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: TilePos) -> usize {
        (pos.y as usize) * (self.width as usize) + (pos.x as usize)
    }

    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            Some(&self.tiles[idx])
        } else {
            None
        }
    }

    fn tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            Some(&mut self.tiles[idx])
        } else {
            None
        }
    }

    // -- Structural mutation --

    /// Apply a structural change to a cell, then recompute the connectivity
    /// bitmask for the cell and its four neighbors and mark them dirty.
    ///
    /// Tier is clamped to 1..=3.
    pub fn apply(&mut self, pos: TilePos, update: TileUpdate) -> Result<(), GridError> {
        let tile = self
            .tile_mut(pos)
            .ok_or(GridError::OutOfBounds { x: pos.x, y: pos.y })?;
        tile.structure = update.structure;
        tile.direction = update.direction;
        tile.tier = update.tier.clamp(1, 3);

        self.recompute_bitmask(pos);
        self.mark_dirty(pos);
        for dir in Direction::all() {
            let n = pos.neighbor(dir);
            if self.in_bounds(n) {
                self.recompute_bitmask(n);
                self.mark_dirty(n);
            }
        }
        Ok(())
    }

    /// Set the ore deposit under a tile (world setup; not used by the
    /// simulation loop).
    pub fn set_ore(&mut self, pos: TilePos, ore: Option<Ore>) -> Result<(), GridError> {
        let tile = self
            .tile_mut(pos)
            .ok_or(GridError::OutOfBounds { x: pos.x, y: pos.y })?;
        tile.ore = ore;
        self.mark_dirty(pos);
        Ok(())
    }

    /// Set the terrain of a tile (world setup; not used by the simulation
    /// loop).
    pub fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) -> Result<(), GridError> {
        let tile = self
            .tile_mut(pos)
            .ok_or(GridError::OutOfBounds { x: pos.x, y: pos.y })?;
        tile.terrain = terrain;
        self.mark_dirty(pos);
        Ok(())
    }

    /// Recompute one cell's bitmask: a neighbor's bit is set iff that
    /// neighbor is an active belt whose own direction points into this cell.
    fn recompute_bitmask(&mut self, pos: TilePos) {
        let mut mask = 0u8;
        for dir in Direction::all() {
            let n = pos.neighbor(dir);
            if let Some(neighbor) = self.tile(n)
                && neighbor.is_belt()
                && neighbor.direction == dir.opposite()
            {
                mask |= dir.bit();
            }
        }
        if let Some(tile) = self.tile_mut(pos) {
            tile.bitmask = mask;
        }
    }

    // -- Free item spatial index --

    /// Register a free item on a tile's item list. No-op out of bounds.
    pub(crate) fn register_free_item(&mut self, pos: TilePos, id: FreeItemId) {
        if let Some(tile) = self.tile_mut(pos) {
            tile.items.push(id);
        }
    }

    /// Remove a free item from a tile's item list, preserving the order of
    /// the remaining entries (collision scans iterate this list).
    pub(crate) fn unregister_free_item(&mut self, pos: TilePos, id: FreeItemId) {
        if let Some(tile) = self.tile_mut(pos)
            && let Some(idx) = tile.items.iter().position(|i| *i == id)
        {
            tile.items.remove(idx);
        }
    }

    /// Free items registered on a tile. Empty for out-of-bounds positions.
    pub fn items_at(&self, pos: TilePos) -> &[FreeItemId] {
        self.tile(pos).map(|t| t.items.as_slice()).unwrap_or(&[])
    }

    /// Drop every per-tile item registration (used before an index rebuild
    /// after snapshot load).
    pub(crate) fn clear_free_item_index(&mut self) {
        for tile in &mut self.tiles {
            tile.items.clear();
        }
    }

    // -- Dirty tracking --

    pub fn mark_dirty(&mut self, pos: TilePos) {
        if self.in_bounds(pos) {
            self.dirty.insert(pos);
        }
    }

    /// Drain the dirty set in sorted order for render resync.
    pub fn take_dirty(&mut self) -> Vec<TilePos> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::{Key, KeyData};

    fn building_key(n: u64) -> BuildingId {
        // Synthesize a stable key without an arena; tests only compare it.
        BuildingId::from(KeyData::from_ffi((1 << 32) | n))
    }

    #[test]
    fn bounds_checks() {
        let grid = Grid::new(4, 3);
        assert!(grid.in_bounds(TilePos::new(0, 0)));
        assert!(grid.in_bounds(TilePos::new(3, 2)));
        assert!(!grid.in_bounds(TilePos::new(4, 0)));
        assert!(!grid.in_bounds(TilePos::new(0, 3)));
        assert!(!grid.in_bounds(TilePos::new(-1, 0)));
        assert!(grid.tile(TilePos::new(-1, 0)).is_none());
    }

    #[test]
    fn apply_out_of_bounds_errors() {
        let mut grid = Grid::new(2, 2);
        let err = grid
            .apply(TilePos::new(5, 5), TileUpdate::belt(Direction::East, 1))
            .unwrap_err();
        assert_eq!(err, GridError::OutOfBounds { x: 5, y: 5 });
    }

    #[test]
    fn structure_is_exclusive() {
        let mut grid = Grid::new(3, 3);
        let pos = TilePos::new(1, 1);
        grid.apply(pos, TileUpdate::belt(Direction::East, 1)).unwrap();
        assert!(grid.tile(pos).unwrap().is_belt());
        assert!(grid.tile(pos).unwrap().building_id().is_none());

        let id = building_key(7);
        grid.apply(pos, TileUpdate::building(id, Direction::North, 1))
            .unwrap();
        let tile = grid.tile(pos).unwrap();
        assert!(!tile.is_belt());
        assert_eq!(tile.building_id(), Some(id));
    }

    #[test]
    fn tier_is_clamped() {
        let mut grid = Grid::new(2, 2);
        let pos = TilePos::new(0, 0);
        grid.apply(pos, TileUpdate::belt(Direction::East, 0)).unwrap();
        assert_eq!(grid.tile(pos).unwrap().tier, 1);
        grid.apply(pos, TileUpdate::belt(Direction::East, 9)).unwrap();
        assert_eq!(grid.tile(pos).unwrap().tier, 3);
    }

    #[test]
    fn bitmask_tracks_feeding_neighbors() {
        let mut grid = Grid::new(3, 3);
        let center = TilePos::new(1, 1);
        grid.apply(center, TileUpdate::belt(Direction::North, 1))
            .unwrap();
        assert_eq!(grid.tile(center).unwrap().bitmask, 0);

        // West neighbor pointing east feeds the center.
        grid.apply(TilePos::new(0, 1), TileUpdate::belt(Direction::East, 1))
            .unwrap();
        assert_eq!(
            grid.tile(center).unwrap().bitmask,
            Direction::West.bit(),
        );

        // South neighbor pointing north also feeds it.
        grid.apply(TilePos::new(1, 0), TileUpdate::belt(Direction::North, 1))
            .unwrap();
        assert_eq!(
            grid.tile(center).unwrap().bitmask,
            Direction::West.bit() | Direction::South.bit(),
        );

        // A neighbor pointing away does not.
        grid.apply(TilePos::new(2, 1), TileUpdate::belt(Direction::East, 1))
            .unwrap();
        assert_eq!(
            grid.tile(center).unwrap().bitmask,
            Direction::West.bit() | Direction::South.bit(),
        );
    }

    #[test]
    fn bitmask_clears_on_removal() {
        let mut grid = Grid::new(3, 1);
        grid.apply(TilePos::new(0, 0), TileUpdate::belt(Direction::East, 1))
            .unwrap();
        grid.apply(TilePos::new(1, 0), TileUpdate::belt(Direction::East, 1))
            .unwrap();
        assert_eq!(
            grid.tile(TilePos::new(1, 0)).unwrap().bitmask,
            Direction::West.bit(),
        );
        grid.apply(TilePos::new(0, 0), TileUpdate::clear()).unwrap();
        assert_eq!(grid.tile(TilePos::new(1, 0)).unwrap().bitmask, 0);
    }

    #[test]
    fn turn_input_ignores_straight_and_head_on_feeds() {
        let mut grid = Grid::new(3, 3);
        let center = TilePos::new(1, 1);
        grid.apply(center, TileUpdate::belt(Direction::North, 1))
            .unwrap();

        // Fed from the south (straight-through): no turn.
        grid.apply(TilePos::new(1, 0), TileUpdate::belt(Direction::North, 1))
            .unwrap();
        assert_eq!(grid.tile(center).unwrap().turn_input(), None);

        // Fed head-on from the north: still no turn.
        grid.apply(TilePos::new(1, 2), TileUpdate::belt(Direction::South, 1))
            .unwrap();
        assert_eq!(grid.tile(center).unwrap().turn_input(), None);

        // Fed from the west: corner.
        grid.apply(TilePos::new(0, 1), TileUpdate::belt(Direction::East, 1))
            .unwrap();
        assert_eq!(
            grid.tile(center).unwrap().turn_input(),
            Some(Direction::West),
        );
    }

    #[test]
    fn turn_input_tie_break_is_nesw() {
        let mut grid = Grid::new(3, 3);
        let center = TilePos::new(1, 1);
        grid.apply(center, TileUpdate::belt(Direction::North, 1))
            .unwrap();
        // Both perpendicular sides feed the center.
        grid.apply(TilePos::new(0, 1), TileUpdate::belt(Direction::East, 1))
            .unwrap();
        grid.apply(TilePos::new(2, 1), TileUpdate::belt(Direction::West, 1))
            .unwrap();
        // East comes before west in bit order.
        assert_eq!(
            grid.tile(center).unwrap().turn_input(),
            Some(Direction::East),
        );
    }

    #[test]
    fn free_item_index_preserves_order() {
        let mut grid = Grid::new(2, 2);
        let pos = TilePos::new(0, 0);
        let a = FreeItemId::from(KeyData::from_ffi((1 << 32) | 1));
        let b = FreeItemId::from(KeyData::from_ffi((1 << 32) | 2));
        let c = FreeItemId::from(KeyData::from_ffi((1 << 32) | 3));
        grid.register_free_item(pos, a);
        grid.register_free_item(pos, b);
        grid.register_free_item(pos, c);
        grid.unregister_free_item(pos, b);
        assert_eq!(grid.items_at(pos), &[a, c]);
        assert!(!a.is_null());
    }

    #[test]
    fn dirty_set_covers_neighbors_and_drains_sorted() {
        let mut grid = Grid::new(3, 3);
        grid.apply(TilePos::new(1, 1), TileUpdate::belt(Direction::East, 1))
            .unwrap();
        let dirty = grid.take_dirty();
        assert_eq!(dirty.len(), 5);
        let mut sorted = dirty.clone();
        sorted.sort();
        assert_eq!(dirty, sorted);
        assert!(dirty.contains(&TilePos::new(1, 1)));
        assert!(dirty.contains(&TilePos::new(0, 1)));
        assert_eq!(grid.dirty_count(), 0);
    }

    #[test]
    fn direction_rotations() {
        assert_eq!(Direction::North.rotate_left(), Direction::West);
        assert_eq!(Direction::North.rotate_right(), Direction::East);
        assert_eq!(Direction::West.opposite(), Direction::East);
        for dir in Direction::all() {
            assert_eq!(dir.rotate_left().rotate_right(), dir);
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(Direction::from_index(dir.index()), dir);
        }
    }

    #[test]
    fn tile_of_world_positions() {
        use crate::fixed::f64_to_fixed64;
        let p = Vec2::new(f64_to_fixed64(1.7), f64_to_fixed64(2.1));
        assert_eq!(tile_of(p), TilePos::new(1, 2));
        let origin = Vec2::new(f64_to_fixed64(0.0), f64_to_fixed64(0.0));
        assert_eq!(tile_of(origin), TilePos::new(0, 0));
    }

    #[test]
    fn tile_center() {
        use crate::fixed::fixed64_to_f64;
        let c = TilePos::new(2, 3).center();
        assert_eq!(fixed64_to_f64(c.x), 2.5);
        assert_eq!(fixed64_to_f64(c.y), 3.5);
    }
}
