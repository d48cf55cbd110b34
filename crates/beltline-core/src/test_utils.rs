//! Shared fixtures for unit and integration tests.
//!
//! Compiled only for tests or under the `test-utils` feature, which the
//! dev-dependency on this crate enables for integration tests and benches.

use crate::fixed::Fixed64;
use crate::freeitem::FreeItem;
use crate::grid::tile_of;
use crate::id::ItemTypeId;
use crate::registry::{BehaviorSpec, Registry, RegistryBuilder, SmeltRecipe};
use crate::vec2::Vec2;

/// Item ids in [`basic_registry`], fixed by registration order.
pub mod items {
    use crate::id::ItemTypeId;

    pub const IRON_ORE: ItemTypeId = ItemTypeId(0);
    pub const COPPER_ORE: ItemTypeId = ItemTypeId(1);
    pub const COAL: ItemTypeId = ItemTypeId(2);
    pub const GOLD_ORE: ItemTypeId = ItemTypeId(3);
    pub const IRON_INGOT: ItemTypeId = ItemTypeId(4);
    pub const COPPER_INGOT: ItemTypeId = ItemTypeId(5);
    pub const VEGETABLE: ItemTypeId = ItemTypeId(6);
}

/// A small but complete definition set: the four ore items, two ingots, a
/// crop, and one building per behavior.
pub fn basic_registry() -> Registry {
    let half = Fixed64::from_num(0.5);
    let mut builder = RegistryBuilder::new();
    builder.register_item("iron_ore", 99, half);
    builder.register_item("copper_ore", 99, half);
    builder.register_item("coal", 99, half);
    builder.register_item("gold_ore", 99, half);
    builder.register_item("iron_ingot", 99, half);
    builder.register_item("copper_ingot", 99, half);
    builder.register_item("vegetable", 50, half);

    builder.register_building(
        "iron_miner",
        1,
        vec![BehaviorSpec::Miner {
            speed: Fixed64::from_num(1),
        }],
    );
    builder.register_building(
        "furnace",
        1,
        vec![BehaviorSpec::Furnace {
            recipes: vec![
                SmeltRecipe {
                    input: items::IRON_ORE,
                    output: items::IRON_INGOT,
                },
                SmeltRecipe {
                    input: items::COPPER_ORE,
                    output: items::COPPER_INGOT,
                },
            ],
            fuel: items::COAL,
            process_time: Fixed64::from_num(2),
            input_cap: 20,
        }],
    );
    builder.register_building(
        "farm",
        1,
        vec![BehaviorSpec::Farm {
            item: items::VEGETABLE,
            interval: Fixed64::from_num(5),
        }],
    );
    builder.register_building(
        "coal_generator",
        1,
        vec![BehaviorSpec::Generator {
            item: items::COAL,
            interval: Fixed64::from_num(3),
        }],
    );
    builder.register_building(
        "storage_crate",
        1,
        vec![BehaviorSpec::Storage {
            capacity: 100,
            drain_interval: Fixed64::from_num(1),
        }],
    );

    builder.build().expect("fixture registry is valid")
}

/// A resting free item at a world position: no velocity, no immunity.
pub fn free_item_at(item_type: ItemTypeId, pos: Vec2) -> FreeItem {
    FreeItem {
        item_type,
        count: 1,
        pos,
        velocity: Vec2::ZERO,
        immunity: Fixed64::ZERO,
        tile: tile_of(pos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_constants_match_registration_order() {
        let registry = basic_registry();
        assert_eq!(registry.item_id("iron_ore"), Some(items::IRON_ORE));
        assert_eq!(registry.item_id("coal"), Some(items::COAL));
        assert_eq!(registry.item_id("iron_ingot"), Some(items::IRON_INGOT));
        assert_eq!(registry.item_id("vegetable"), Some(items::VEGETABLE));
        assert!(registry.building_id("iron_miner").is_some());
        assert!(registry.building_id("storage_crate").is_some());
    }
}
