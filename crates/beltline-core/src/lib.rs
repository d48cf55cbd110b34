//! Beltline Core -- the production and transport simulation for a
//! factory-automation game.
//!
//! This crate provides the tile grid, conveyor transport with its local
//! flow-field, data-driven production behaviors, free item physics, output
//! arbitration, events, queries, snapshots, and the deterministic
//! fixed-point arithmetic underneath all of it.
//!
//! # Four-Phase Step Pipeline
//!
//! Each call to [`world::World::step`] advances the simulation by one frame
//! through the following phases:
//!
//! 1. **Production** -- Building behaviors run their timers; yields are
//!    routed through round-robin output arbitration onto adjacent belts.
//! 2. **Transport** -- In-belt items advance tile by tile in lock-step,
//!    queueing single-file and handing off to buildings or the next belt.
//! 3. **Free items** -- Free entities integrate ejection velocity, ride the
//!    belt flow-field, collide with the zipper-merge cone, and get
//!    suctioned into buildings.
//! 4. **Bookkeeping** -- Frame counter and simulated clock advance; events
//!    and dirty tiles buffer for the host to drain.
//!
//! # Key Types
//!
//! - [`world::World`] -- One self-contained simulation instance: placement,
//!   stepping, queries, snapshots.
//! - [`grid::Grid`] -- Row-major tile grid with connectivity bitmasks and
//!   the per-tile free item index.
//! - [`conveyor::ConveyorSystem`] -- Lock-step belt items in an arena with
//!   a by-tile index.
//! - [`flow`] -- The belt flow-field: straight lanes, quarter-circle corner
//!   arcs from a (output, input) pivot table, lane-centering springs.
//! - [`behavior::Behavior`] -- Enum-dispatched production behaviors:
//!   Miner, Furnace, Farm, Generator, Storage.
//! - [`freeitem::FreeItems`] -- Free item entities with ejection, suction,
//!   and directional collision.
//! - [`registry::Registry`] -- Immutable item and building definitions,
//!   frozen at world creation.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`snapshot`] -- Versioned binary snapshots via bitcode.

pub mod behavior;
pub mod conveyor;
pub mod events;
pub mod fixed;
pub mod flow;
pub mod freeitem;
pub mod grid;
pub mod id;
pub mod inventory;
mod output;
pub mod query;
pub mod registry;
pub mod sim;
pub mod snapshot;
pub mod vec2;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
