//! Definition registry: item types, building templates, and behavior specs.
//!
//! Definitions are data-driven (loaded from files by the data crate) and
//! frozen before a world is created. The registry is an explicit, owned
//! object passed through context -- there are no global statics, so multiple
//! worlds with different data sets can coexist in one process.
//!
//! Three-phase lifecycle: registration -> mutation -> finalization. After
//! [`RegistryBuilder::build`] the registry is immutable; `&Registry` is safe
//! to share.

use crate::fixed::{Fixed64, Seconds};
use crate::grid::Ore;
use crate::id::{BuildingTypeId, ItemTypeId};
use crate::sim::StateHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An item type definition.
#[derive(Debug, Clone)]
pub struct ItemTypeDef {
    pub name: String,
    /// Maximum stack count for storage/free-item stacks.
    pub max_stack: u32,
    /// Physical size in world units; collision distance is 0.95 x size.
    pub size: Fixed64,
    /// Icon reference for render collaborators. Unused by the simulation.
    pub icon: String,
}

/// One entry of a building's construction cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEntry {
    pub item: ItemTypeId,
    pub quantity: u32,
}

/// A single ore -> ingot conversion a furnace knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmeltRecipe {
    pub input: ItemTypeId,
    pub output: ItemTypeId,
}

/// Configuration for one production behavior on a building template.
///
/// Runtime state lives in [`crate::behavior::Behavior`]; these are the
/// frozen, data-loaded parameters.
#[derive(Debug, Clone)]
pub enum BehaviorSpec {
    /// Periodic ore extraction: one attempt every `1 / speed` seconds at
    /// tier 1, scaled by the building's tier.
    Miner { speed: Fixed64 },
    /// Fuel-driven smelting with capped input buffers.
    Furnace {
        recipes: Vec<SmeltRecipe>,
        fuel: ItemTypeId,
        process_time: Seconds,
        input_cap: u32,
    },
    /// Fixed-interval crop output.
    Farm { item: ItemTypeId, interval: Seconds },
    /// Fixed-interval output of a configured item.
    Generator { item: ItemTypeId, interval: Seconds },
    /// Single-item-type buffer with a slow drain.
    Storage {
        capacity: u32,
        drain_interval: Seconds,
    },
}

/// A building template definition.
#[derive(Debug, Clone)]
pub struct BuildingDef {
    pub name: String,
    pub category: String,
    /// Tier 1..=3; scales miner speed the way belt tier scales belt speed.
    pub tier: u8,
    pub cost: Vec<CostEntry>,
    pub behaviors: Vec<BehaviorSpec>,
}

/// Canonical item names miners map ore deposits to.
const ORE_ITEM_NAMES: [(Ore, &str); 4] = [
    (Ore::Iron, "iron_ore"),
    (Ore::Copper, "copper_ore"),
    (Ore::Coal, "coal"),
    (Ore::Gold, "gold_ore"),
];

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    buildings: Vec<BuildingDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register an item type. Returns its ID.
    pub fn register_item(&mut self, name: &str, max_stack: u32, size: Fixed64) -> ItemTypeId {
        let id = ItemTypeId(self.items.len() as u32);
        self.items.push(ItemTypeDef {
            name: name.to_string(),
            max_stack,
            size,
            icon: String::new(),
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Phase 1: Register a building template. Returns its ID.
    pub fn register_building(
        &mut self,
        name: &str,
        tier: u8,
        behaviors: Vec<BehaviorSpec>,
    ) -> BuildingTypeId {
        let id = BuildingTypeId(self.buildings.len() as u32);
        self.buildings.push(BuildingDef {
            name: name.to_string(),
            category: String::new(),
            tier,
            cost: Vec::new(),
            behaviors,
        });
        self.building_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Phase 2: Mutate an existing item definition by name.
    pub fn mutate_item<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ItemTypeDef),
    {
        let id = self
            .item_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.items[id.0 as usize]);
        Ok(())
    }

    /// Phase 2: Mutate an existing building template by name.
    pub fn mutate_building<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut BuildingDef),
    {
        let id = self
            .building_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.buildings[id.0 as usize]);
        Ok(())
    }

    /// Lookup item type ID by name.
    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Lookup building type ID by name.
    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let check_item = |item: ItemTypeId| -> Result<(), RegistryError> {
            if item.0 as usize >= self.items.len() {
                Err(RegistryError::InvalidItemRef(item))
            } else {
                Ok(())
            }
        };

        // Validate: every item reference in building data must exist.
        for building in &self.buildings {
            for entry in &building.cost {
                check_item(entry.item)?;
            }
            for behavior in &building.behaviors {
                match behavior {
                    BehaviorSpec::Miner { .. } | BehaviorSpec::Storage { .. } => {}
                    BehaviorSpec::Furnace { recipes, fuel, .. } => {
                        check_item(*fuel)?;
                        for recipe in recipes {
                            check_item(recipe.input)?;
                            check_item(recipe.output)?;
                        }
                    }
                    BehaviorSpec::Farm { item, .. } | BehaviorSpec::Generator { item, .. } => {
                        check_item(*item)?;
                    }
                }
            }
        }

        // Resolve the ore -> item table from canonical names. Missing names
        // leave the slot empty; miners on that ore simply never yield.
        let mut ore_items = [None; 4];
        for (ore, name) in ORE_ITEM_NAMES {
            ore_items[ore as usize] = self.item_name_to_id.get(name).copied();
        }

        Ok(Registry {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            buildings: self.buildings,
            building_name_to_id: self.building_name_to_id,
            ore_items,
        })
    }
}

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    items: Vec<ItemTypeDef>,
    item_name_to_id: HashMap<String, ItemTypeId>,
    buildings: Vec<BuildingDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
    ore_items: [Option<ItemTypeId>; 4],
}

impl Registry {
    pub fn get_item(&self, id: ItemTypeId) -> Option<&ItemTypeDef> {
        self.items.get(id.0 as usize)
    }

    pub fn get_building(&self, id: BuildingTypeId) -> Option<&BuildingDef> {
        self.buildings.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemTypeId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_name_to_id.get(name).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// The item a miner yields from an ore deposit, if the data set defines
    /// the canonical item name for it.
    pub fn ore_item(&self, ore: Ore) -> Option<ItemTypeId> {
        self.ore_items[ore as usize]
    }

    /// Item size, falling back to the standard 0.5 units for unknown ids.
    pub fn item_size(&self, id: ItemTypeId) -> Fixed64 {
        self.get_item(id)
            .map(|def| def.size)
            .unwrap_or_else(|| Fixed64::from_num(0.5))
    }

    /// Content fingerprint, stored in snapshots so a save cannot be loaded
    /// against a different data set. Covers names, stack sizes, item sizes,
    /// tiers, and behavior parameters in definition order.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u32(self.items.len() as u32);
        for item in &self.items {
            hasher.write(item.name.as_bytes());
            hasher.write_u32(item.max_stack);
            hasher.write_fixed64(item.size);
        }
        hasher.write_u32(self.buildings.len() as u32);
        for building in &self.buildings {
            hasher.write(building.name.as_bytes());
            hasher.write_u32(building.tier as u32);
            hasher.write_u32(building.behaviors.len() as u32);
            for behavior in &building.behaviors {
                match behavior {
                    BehaviorSpec::Miner { speed } => {
                        hasher.write_u32(0);
                        hasher.write_fixed64(*speed);
                    }
                    BehaviorSpec::Furnace {
                        recipes,
                        fuel,
                        process_time,
                        input_cap,
                    } => {
                        hasher.write_u32(1);
                        hasher.write_u32(fuel.0);
                        hasher.write_fixed64(*process_time);
                        hasher.write_u32(*input_cap);
                        for recipe in recipes {
                            hasher.write_u32(recipe.input.0);
                            hasher.write_u32(recipe.output.0);
                        }
                    }
                    BehaviorSpec::Farm { item, interval } => {
                        hasher.write_u32(2);
                        hasher.write_u32(item.0);
                        hasher.write_fixed64(*interval);
                    }
                    BehaviorSpec::Generator { item, interval } => {
                        hasher.write_u32(3);
                        hasher.write_u32(item.0);
                        hasher.write_fixed64(*interval);
                    }
                    BehaviorSpec::Storage {
                        capacity,
                        drain_interval,
                    } => {
                        hasher.write_u32(4);
                        hasher.write_u32(*capacity);
                        hasher.write_fixed64(*drain_interval);
                    }
                }
            }
        }
        hasher.finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemTypeId),
}
