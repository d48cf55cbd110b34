//! Resolution pipeline: reads data files, resolves name references, builds
//! the registry.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus the [`load_registry`] entry point that turns
//! a data directory into an immutable [`Registry`].

use crate::schema::{BehaviorData, BuildingData, ItemData};
use beltline_core::fixed::f64_to_fixed64;
use beltline_core::id::{BuildingTypeId, ItemTypeId};
use beltline_core::registry::{
    BehaviorSpec, CostEntry, Registry, RegistryBuilder, RegistryError, SmeltRecipe,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// Registry finalization rejected the resolved definitions.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Json => serde_json::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Toml => toml::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Json => serde_json::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Toml => {
            let table: toml::Value =
                toml::from_str(&content).map_err(|e| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: format!("missing key '{toml_key}' in TOML file"),
                })?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: e.to_string(),
                })
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Registry assembly
// ===========================================================================

/// Resolve a behavior's item-name references against the item table.
fn resolve_behavior(
    data: &BehaviorData,
    item_names: &HashMap<String, ItemTypeId>,
    file: &Path,
) -> Result<BehaviorSpec, DataLoadError> {
    match data {
        BehaviorData::Miner { speed } => Ok(BehaviorSpec::Miner {
            speed: f64_to_fixed64(*speed),
        }),
        BehaviorData::Furnace {
            recipes,
            fuel,
            process_time,
            input_cap,
        } => {
            let fuel = *resolve_name(item_names, fuel, file, "item")?;
            let recipes = recipes
                .iter()
                .map(|recipe| {
                    let (input, output) = recipe.parts();
                    Ok(SmeltRecipe {
                        input: *resolve_name(item_names, input, file, "item")?,
                        output: *resolve_name(item_names, output, file, "item")?,
                    })
                })
                .collect::<Result<Vec<_>, DataLoadError>>()?;
            Ok(BehaviorSpec::Furnace {
                recipes,
                fuel,
                process_time: f64_to_fixed64(*process_time),
                input_cap: *input_cap,
            })
        }
        BehaviorData::Farm { item, interval } => Ok(BehaviorSpec::Farm {
            item: *resolve_name(item_names, item, file, "item")?,
            interval: f64_to_fixed64(*interval),
        }),
        BehaviorData::Generator { item, interval } => Ok(BehaviorSpec::Generator {
            item: *resolve_name(item_names, item, file, "item")?,
            interval: f64_to_fixed64(*interval),
        }),
        BehaviorData::Storage {
            capacity,
            drain_interval,
        } => Ok(BehaviorSpec::Storage {
            capacity: *capacity,
            drain_interval: f64_to_fixed64(*drain_interval),
        }),
    }
}

/// Resolve parsed item and building lists into an immutable registry.
///
/// Items are registered first so behavior and cost references resolve against
/// the full item table regardless of declaration order. The file paths are
/// only used for error attribution.
pub fn resolve_registry(
    items: &[ItemData],
    items_file: &Path,
    buildings: &[BuildingData],
    buildings_file: &Path,
) -> Result<Registry, DataLoadError> {
    let mut builder = RegistryBuilder::new();
    let mut item_names: HashMap<String, ItemTypeId> = HashMap::new();

    for item in items {
        check_duplicate(&item_names, &item.name, items_file)?;
        let id = builder.register_item(&item.name, item.max_stack, f64_to_fixed64(item.size));
        item_names.insert(item.name.clone(), id);
        if !item.icon.is_empty() {
            builder.mutate_item(&item.name, |def| def.icon = item.icon.clone())?;
        }
    }

    let mut building_names: HashMap<String, BuildingTypeId> = HashMap::new();
    for building in buildings {
        check_duplicate(&building_names, &building.name, buildings_file)?;
        let behaviors = building
            .behaviors
            .iter()
            .map(|b| resolve_behavior(b, &item_names, buildings_file))
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        let cost = building
            .cost
            .iter()
            .map(|(name, quantity)| {
                let item = *resolve_name(&item_names, name, buildings_file, "item")?;
                Ok(CostEntry {
                    item,
                    quantity: *quantity,
                })
            })
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        let id = builder.register_building(&building.name, building.tier, behaviors);
        building_names.insert(building.name.clone(), id);
        builder.mutate_building(&building.name, |def| {
            def.category = building.category.clone();
            def.cost = cost;
        })?;
    }

    Ok(builder.build()?)
}

/// Load a complete registry from a data directory.
///
/// The directory must contain an `items` and a `buildings` file in any
/// supported format (the two may differ). TOML files wrap their lists under
/// an `items` / `buildings` key.
pub fn load_registry(dir: &Path) -> Result<Registry, DataLoadError> {
    let items_path = require_data_file(dir, "items")?;
    let buildings_path = require_data_file(dir, "buildings")?;
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    let buildings: Vec<BuildingData> = deserialize_list(&buildings_path, "buildings")?;
    resolve_registry(&items, &items_path, &buildings, &buildings_path)
}

// ===========================================================================
// Tests
// ===========================================================================
