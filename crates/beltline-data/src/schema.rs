//! Serde data file structs for simulation content definitions.
//!
//! These structs define the on-disk format for item types and building
//! templates. They are deserialized from RON, JSON, or TOML data files and
//! then resolved into registry definitions by the loader.

use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    /// Physical size in world units.
    #[serde(default = "default_item_size")]
    pub size: f64,
    #[serde(default)]
    pub icon: String,
}

fn default_max_stack() -> u32 {
    99
}

fn default_item_size() -> f64 {
    0.5
}

// ===========================================================================
// Buildings
// ===========================================================================

/// A building template definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingData {
    pub name: String,
    #[serde(default = "default_tier")]
    pub tier: u8,
    #[serde(default)]
    pub category: String,
    /// Construction cost as (item name, quantity) pairs.
    #[serde(default)]
    pub cost: Vec<(String, u32)>,
    #[serde(default)]
    pub behaviors: Vec<BehaviorData>,
}

fn default_tier() -> u8 {
    1
}

/// A production behavior on a building template.
///
/// Item references are names, resolved to ids by the loader. Omitted scalar
/// fields take the same values the engine substitutes for invalid ones, so a
/// data file only has to spell out what it changes.
#[derive(Debug, Clone, Deserialize)]
pub enum BehaviorData {
    Miner {
        #[serde(default = "default_miner_speed")]
        speed: f64,
    },
    Furnace {
        recipes: Vec<RecipeData>,
        fuel: String,
        #[serde(default = "default_process_time")]
        process_time: f64,
        #[serde(default = "default_input_cap")]
        input_cap: u32,
    },
    Farm {
        item: String,
        #[serde(default = "default_farm_interval")]
        interval: f64,
    },
    Generator {
        item: String,
        #[serde(default = "default_generator_interval")]
        interval: f64,
    },
    Storage {
        #[serde(default = "default_storage_capacity")]
        capacity: u32,
        #[serde(default = "default_drain_interval")]
        drain_interval: f64,
    },
}

fn default_miner_speed() -> f64 {
    0.5
}

fn default_process_time() -> f64 {
    2.0
}

fn default_input_cap() -> u32 {
    20
}

fn default_farm_interval() -> f64 {
    5.0
}

fn default_generator_interval() -> f64 {
    3.0
}

fn default_storage_capacity() -> u32 {
    100
}

fn default_drain_interval() -> f64 {
    1.0
}

/// A smelt recipe entry, supporting both short tuple form and full form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecipeData {
    /// Short form: `("ore_name", "ingot_name")`.
    Short(String, String),
    /// Full form with explicit fields.
    Full { input: String, output: String },
}

impl RecipeData {
    /// The (input, output) item names regardless of form.
    pub fn parts(&self) -> (&str, &str) {
        match self {
            RecipeData::Short(input, output) => (input, output),
            RecipeData::Full { input, output } => (input, output),
        }
    }
}

// ===========================================================================
// TOML wrappers (TOML does not support top-level arrays)
// ===========================================================================

/// Wrapper for a list of items in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

/// Wrapper for a list of buildings in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlBuildings {
    pub buildings: Vec<BuildingData>,
}

// ===========================================================================
// Tests
// ===========================================================================
