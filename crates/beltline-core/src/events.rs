//! Simulation events for UI, audio, and analytics collaborators.
//!
//! Events are recorded into a bounded buffer during the production,
//! transport, and free-item phases and drained by the host once per frame.
//! When the buffer is full, further events are counted but not stored --
//! the simulation never allocates unboundedly on behalf of a slow consumer.

use crate::fixed::Frame;
use crate::grid::TilePos;
use crate::id::{BuildingId, BuildingTypeId, FreeItemId, ItemTypeId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the frame at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Production --
    ItemProduced {
        pos: TilePos,
        item_type: ItemTypeId,
        frame: Frame,
    },
    ItemConsumed {
        pos: TilePos,
        item_type: ItemTypeId,
        count: u32,
        frame: Frame,
    },
    /// A producer's yield was lost because no output route accepted it.
    ProductionDiscarded {
        pos: TilePos,
        item_type: ItemTypeId,
        frame: Frame,
    },

    // -- Free item entities --
    ItemSpawned {
        id: FreeItemId,
        item_type: ItemTypeId,
        pos: TilePos,
        frame: Frame,
    },
    ItemDespawned {
        id: FreeItemId,
        item_type: ItemTypeId,
        frame: Frame,
    },

    // -- Structures --
    BuildingPlaced {
        id: BuildingId,
        building_type: BuildingTypeId,
        pos: TilePos,
        frame: Frame,
    },
    BuildingRemoved {
        id: BuildingId,
        pos: TilePos,
        frame: Frame,
    },
}

/// Discriminant tag for event types, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ItemProduced,
    ItemConsumed,
    ProductionDiscarded,
    ItemSpawned,
    ItemDespawned,
    BuildingPlaced,
    BuildingRemoved,
}

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ItemProduced { .. } => EventKind::ItemProduced,
            Event::ItemConsumed { .. } => EventKind::ItemConsumed,
            Event::ProductionDiscarded { .. } => EventKind::ProductionDiscarded,
            Event::ItemSpawned { .. } => EventKind::ItemSpawned,
            Event::ItemDespawned { .. } => EventKind::ItemDespawned,
            Event::BuildingPlaced { .. } => EventKind::BuildingPlaced,
            Event::BuildingRemoved { .. } => EventKind::BuildingRemoved,
        }
    }

    /// The frame this event occurred on.
    pub fn frame(&self) -> Frame {
        match self {
            Event::ItemProduced { frame, .. }
            | Event::ItemConsumed { frame, .. }
            | Event::ProductionDiscarded { frame, .. }
            | Event::ItemSpawned { frame, .. }
            | Event::ItemDespawned { frame, .. }
            | Event::BuildingPlaced { frame, .. }
            | Event::BuildingRemoved { frame, .. } => *frame,
        }
    }
}

// ---------------------------------------------------------------------------
// Event buffer
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 4096;

/// Bounded event sink drained once per frame by the host.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: Vec<Event>,
    capacity: usize,
    dropped: u64,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Record an event. Counted but not stored when the buffer is full.
    pub fn push(&mut self, event: Event) {
        if self.events.len() < self.capacity {
            self.events.push(event);
        } else {
            self.dropped += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drain all recorded events in emission order.
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Total events lost to a full buffer since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}
