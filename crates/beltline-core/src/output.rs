//! Output arbitration: placing produced items onto adjacent conveyors.
//!
//! Every producing behavior routes through [`try_output_to_conveyor`]. The
//! candidate directions are scanned round-robin from the instance's output
//! cursor so a building ringed by belts spreads its yield instead of
//! favoring one side. Outputs enter the world as free item entities ejected
//! from the building center; they are never inserted into a belt's
//! lock-step lane directly.

use crate::behavior::{Host, ProductionCtx};
use crate::events::Event;
use crate::fixed::Fixed64;
use crate::freeitem::FreeItem;
use crate::grid::Direction;
#[cfg(test)]
use crate::grid::TilePos;
use crate::id::ItemTypeId;
#[cfg(any(test, feature = "test-utils"))]
use crate::vec2::Vec2;

/// No spawn happens with another free item inside this radius of the spawn
/// point or of the chosen entry point.
fn clearance_radius() -> Fixed64 {
    Fixed64::from_num(0.4)
}

/// Launch speed of an ejected item, in units per second.
fn eject_speed() -> Fixed64 {
    Fixed64::from_num(4)
}

/// Suction exemption granted to a fresh ejection, in seconds.
fn immunity_window() -> Fixed64 {
    Fixed64::from_num(0.5)
}

/// How far the receiving tile's entry point sits from its center, toward
/// the edge facing the source.
fn entry_offset() -> Fixed64 {
    Fixed64::from_num(0.3)
}

/// Try to emit one `item_type` from the hosting building onto an adjacent
/// conveyor. Directions are scanned starting one past the output cursor;
/// on success the cursor records the direction used and a free item is
/// ejected from the building center. Returns false when no direction has a
/// receiving belt with a clear entry, or the spawn point itself is
/// occupied.
pub(crate) fn try_output_to_conveyor(
    host: &mut Host<'_>,
    ctx: &mut ProductionCtx<'_>,
    item_type: ItemTypeId,
) -> bool {
    let spawn_point = host.pos.center();
    if ctx
        .items
        .any_within_radius(ctx.grid, spawn_point, clearance_radius())
    {
        return false;
    }

    for step in 1..=4u8 {
        let dir = Direction::from_index(*host.output_cursor + step);
        let neighbor = host.pos.neighbor(dir);
        let Some(tile) = ctx.grid.tile(neighbor) else {
            continue;
        };
        if !tile.is_belt() {
            continue;
        }
        // A belt pointing straight back would return the item next frame.
        if tile.direction == dir.opposite() {
            continue;
        }
        let entry_point = neighbor.center() - dir.unit() * entry_offset();
        if ctx
            .items
            .any_within_radius(ctx.grid, entry_point, clearance_radius())
        {
            continue;
        }

        let item = FreeItem {
            item_type,
            count: 1,
            pos: spawn_point,
            velocity: dir.unit() * eject_speed(),
            immunity: immunity_window(),
            tile: host.pos,
        };
        let id = ctx.items.spawn(ctx.grid, item);
        ctx.events.push(Event::ItemSpawned {
            id,
            item_type,
            pos: host.pos,
            frame: ctx.frame,
        });
        *host.output_cursor = dir.index();
        return true;
    }
    false
}

/// World-space direction an ejected item was launched in, recovered from
/// its velocity. Test helper shape kept here next to the spawn site.
#[cfg(any(test, feature = "test-utils"))]
pub(crate) fn launch_direction(velocity: Vec2) -> Option<Direction> {
    for dir in Direction::all() {
        if dir.unit() * eject_speed() == velocity {
            return Some(dir);
        }
    }
    None
}
