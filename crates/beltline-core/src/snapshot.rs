//! World snapshots: compact binary save/load.
//!
//! A snapshot is an 8-byte header (magic, version, both little-endian)
//! followed by a bitcode body holding the full mutable state and the
//! fingerprint of the registry it was taken under. Loading requires a
//! registry with the same fingerprint; definitions themselves are not
//! stored, they are data files the host already has.
//!
//! Derived state (per-tile item lists, the conveyor's tile index, dirty
//! flags) is not serialized; indices are rebuilt on load and the dirty set
//! starts empty, so a render collaborator must fully resync after a load.

use crate::behavior::BuildingInstance;
use crate::conveyor::ConveyorSystem;
use crate::freeitem::FreeItems;
use crate::grid::Grid;
use crate::id::BuildingId;
use crate::registry::Registry;
use crate::sim::{SimState, SimulationStrategy};
use crate::world::World;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;

const SNAPSHOT_MAGIC: u32 = 0xBE17_0001;
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot encoding failed: {0}")]
    Encode(bitcode::Error),
    #[error("snapshot decoding failed: {0}")]
    Decode(bitcode::Error),
    #[error("not a world snapshot (bad magic)")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot was taken under different definitions (registry fingerprint mismatch)")]
    RegistryMismatch,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    registry_fingerprint: u64,
    grid: &'a Grid,
    buildings: &'a SlotMap<BuildingId, BuildingInstance>,
    conveyor: &'a ConveyorSystem,
    free_items: &'a FreeItems,
    state: &'a SimState,
    strategy: SimulationStrategy,
}

#[derive(Deserialize)]
struct Envelope {
    registry_fingerprint: u64,
    grid: Grid,
    buildings: SlotMap<BuildingId, BuildingInstance>,
    conveyor: ConveyorSystem,
    free_items: FreeItems,
    state: SimState,
    strategy: SimulationStrategy,
}

impl World {
    /// Serialize the complete mutable state.
    pub fn save_snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        let (grid, buildings, conveyor, free_items, state, strategy) = self.parts();
        let envelope = EnvelopeRef {
            registry_fingerprint: self.registry().fingerprint(),
            grid,
            buildings,
            conveyor,
            free_items,
            state,
            strategy,
        };
        let body = bitcode::serialize(&envelope).map_err(SnapshotError::Encode)?;
        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&SNAPSHOT_MAGIC.to_le_bytes());
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Restore a world from snapshot bytes, with the registry that produced
    /// the definitions the snapshot was taken under.
    pub fn load_snapshot(bytes: &[u8], registry: Registry) -> Result<World, SnapshotError> {
        if bytes.len() < 8 {
            return Err(SnapshotError::BadMagic);
        }
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let envelope: Envelope =
            bitcode::deserialize(&bytes[8..]).map_err(SnapshotError::Decode)?;
        if envelope.registry_fingerprint != registry.fingerprint() {
            return Err(SnapshotError::RegistryMismatch);
        }

        Ok(World::from_parts(
            registry,
            envelope.grid,
            envelope.buildings,
            envelope.conveyor,
            envelope.free_items,
            envelope.state,
            envelope.strategy,
        ))
    }
}
