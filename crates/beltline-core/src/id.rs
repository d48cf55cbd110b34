use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed building instance in the world.
    pub struct BuildingId;

    /// Identifies an item riding a conveyor belt.
    pub struct BeltItemId;

    /// Identifies a free item entity (off-belt, physics-driven).
    pub struct FreeItemId;
}

/// Identifies an item type in the registry. Cheap to copy and compare.
/// Ordered so it can key deterministic maps (inventories, hashing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a building template in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_id_equality() {
        let a = ItemTypeId(0);
        let b = ItemTypeId(0);
        let c = ItemTypeId(1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn building_type_id_copy() {
        let a = BuildingTypeId(5);
        let b = a; // Copy
        assert_eq!(a, b);
    }

    #[test]
    fn item_type_ids_order_deterministically() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert(ItemTypeId(2), 5u32);
        map.insert(ItemTypeId(0), 1u32);
        map.insert(ItemTypeId(1), 3u32);
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, vec![ItemTypeId(0), ItemTypeId(1), ItemTypeId(2)]);
    }
}
