//! Local belt flow field: straight lanes and quarter-circle corners.
//!
//! Every belt tile defines a velocity field over its own unit square. The
//! same field serves two consumers: the conveyor system parameterizes in-belt
//! item positions along its integral curves, and free item entities standing
//! on a belt sample it directly each frame.
//!
//! Local coordinates run 0..1 in x (west to east) and y (south to north);
//! they coincide with world-space directions, so vectors returned here can
//! be used in world space without conversion.

use crate::fixed::Fixed64;
use crate::grid::{Direction, Tile, TilePos};
use crate::vec2::Vec2;

/// Handedness of a corner's quarter-circle arc, viewed from above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRotation {
    Clockwise,
    Counterclockwise,
}

/// Belt speed for a tier: 1, 2, and 4 tiles per second for tiers 1-3.
pub fn tier_speed(tier: u8) -> Fixed64 {
    match tier {
        2 => Fixed64::from_num(2),
        3 => Fixed64::from_num(4),
        _ => Fixed64::from_num(1),
    }
}

/// Strength of the centering springs that pull flow toward the lane center
/// (straight tiles) or toward the arc radius (corners).
fn centering_strength() -> Fixed64 {
    Fixed64::from_num(2)
}

/// Pivot corner and rotation for a `(output, input)` direction pair.
///
/// The pivot is the tile corner shared by the input edge and the output
/// edge; left turns run counterclockwise. Returns `None` unless the two
/// directions are perpendicular -- straight and head-on feeds have no arc.
pub fn turn_geometry(out: Direction, input: Direction) -> Option<(Vec2, TurnRotation)> {
    use Direction::*;
    use TurnRotation::*;
    let one = Fixed64::from_num(1);
    let zero = Fixed64::ZERO;
    let (px, py, rotation) = match (out, input) {
        (North, West) => (zero, one, Counterclockwise),
        (North, East) => (one, one, Clockwise),
        (East, North) => (one, one, Counterclockwise),
        (East, South) => (one, zero, Clockwise),
        (South, East) => (one, zero, Counterclockwise),
        (South, West) => (zero, zero, Clockwise),
        (West, South) => (zero, zero, Counterclockwise),
        (West, North) => (zero, one, Clockwise),
        _ => return None,
    };
    Some((Vec2::new(px, py), rotation))
}

/// Midpoint of a tile edge in local coordinates.
pub fn edge_midpoint(dir: Direction) -> Vec2 {
    let one = Fixed64::from_num(1);
    let half = Fixed64::from_num(0.5);
    match dir {
        Direction::North => Vec2::new(half, one),
        Direction::East => Vec2::new(one, half),
        Direction::South => Vec2::new(half, Fixed64::ZERO),
        Direction::West => Vec2::new(Fixed64::ZERO, half),
    }
}

/// Convert tile-local coordinates to world space.
pub fn to_world(tile: TilePos, local: Vec2) -> Vec2 {
    Vec2::new(
        Fixed64::from_num(tile.x) + local.x,
        Fixed64::from_num(tile.y) + local.y,
    )
}

/// Sample the belt flow field at a local position within a belt tile.
///
/// Straight tiles: unit flow along the output direction plus a spring
/// pulling the off-axis coordinate toward the lane center (0.5). Corner
/// tiles: unit tangent of the circle of radius 0.5 around the pivot corner
/// plus a radial spring pulling the local radius toward 0.5, which bends
/// any entry offset onto the quarter-circle arc.
///
/// The result is scaled by tier speed. Returns zero for non-belt tiles.
pub fn sample_flow(tile: &Tile, local: Vec2) -> Vec2 {
    if !tile.is_belt() {
        return Vec2::ZERO;
    }
    let half = Fixed64::from_num(0.5);
    let out = tile.direction;

    let field = match tile.turn_input().and_then(|input| turn_geometry(out, input)) {
        None => {
            let mut v = out.unit();
            let k = centering_strength();
            match out {
                Direction::East | Direction::West => v.y += (half - local.y) * k,
                Direction::North | Direction::South => v.x += (half - local.x) * k,
            }
            v
        }
        Some((pivot, rotation)) => {
            let radial = local - pivot;
            let tangent = match rotation {
                TurnRotation::Counterclockwise => radial.perp_ccw(),
                TurnRotation::Clockwise => radial.perp_cw(),
            }
            .normalized();
            let outward = radial.normalized();
            tangent + outward * ((half - radial.length()) * centering_strength())
        }
    };

    field * tier_speed(tile.tier)
}

/// Position of an in-belt item in local coordinates, given the tile's output
/// direction, the direction the item entered from, and its progress 0..1.
///
/// Straight runs interpolate between the entry-edge and exit-edge midpoints.
/// Corners interpolate angularly around the pivot: the radial offset is the
/// normalized blend of the entry and exit offsets held at length 0.5, so the
/// path is exactly the quarter-circle arc.
pub fn path_position(out: Direction, from: Direction, progress: Fixed64) -> Vec2 {
    let half = Fixed64::from_num(0.5);
    match turn_geometry(out, from) {
        None => {
            let entry = edge_midpoint(out.opposite());
            let exit = edge_midpoint(out);
            entry.lerp(exit, progress)
        }
        Some((pivot, _)) => {
            let entry = edge_midpoint(from) - pivot;
            let exit = edge_midpoint(out) - pivot;
            let radial = entry.lerp(exit, progress).normalized() * half;
            pivot + radial
        }
    }
}
