//! Building behaviors and placed building instances.
//!
//! A building template carries a list of [`BehaviorSpec`]s; placing it
//! instantiates one [`Behavior`] per spec, each combining its frozen
//! parameters with its running state (timers). Behaviors on one instance
//! share the instance's inventory and output cursor. Dispatch is a plain
//! enum match, no trait objects.
//!
//! The production phase runs every behavior of every building once per
//! frame, before belt transport and free-item physics.

use crate::events::{Event, EventBuffer};
use crate::fixed::{checked_div_64, Fixed64, Frame, Seconds};
use crate::flow::tier_speed;
use crate::freeitem::FreeItems;
use crate::grid::{Direction, Grid, TilePos};
use crate::id::{BuildingId, BuildingTypeId, ItemTypeId};
use crate::inventory::Inventory;
use crate::output::try_output_to_conveyor;
use crate::registry::{BehaviorSpec, BuildingDef, Registry, SmeltRecipe};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Behavior state
// ---------------------------------------------------------------------------

/// Replaces a non-positive data value with a sane default.
fn positive_or(value: Fixed64, default: f64) -> Fixed64 {
    if value > Fixed64::ZERO {
        value
    } else {
        Fixed64::from_num(default)
    }
}

/// Periodic ore extraction from the deposit under the building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerBehavior {
    /// Extraction attempts per second at tier 1.
    pub speed: Fixed64,
    timer: Seconds,
}

/// Fuel-driven smelting. Inputs buffer up to `input_cap` per item type;
/// finished output buffers in the shared inventory until a conveyor
/// accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FurnaceBehavior {
    pub recipes: Vec<SmeltRecipe>,
    pub fuel: ItemTypeId,
    pub process_time: Seconds,
    pub input_cap: u32,
    timer: Seconds,
}

/// Fixed-interval crop output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmBehavior {
    pub item: ItemTypeId,
    pub interval: Seconds,
    timer: Seconds,
}

/// Fixed-interval output of a configured item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorBehavior {
    pub item: ItemTypeId,
    pub interval: Seconds,
    timer: Seconds,
}

/// Single-item-type buffer that slowly drains back onto conveyors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBehavior {
    pub capacity: u32,
    pub drain_interval: Seconds,
    timer: Seconds,
}

/// Runtime behavior state. One per [`BehaviorSpec`] on the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    Miner(MinerBehavior),
    Furnace(FurnaceBehavior),
    Farm(FarmBehavior),
    Generator(GeneratorBehavior),
    Storage(StorageBehavior),
}

impl Behavior {
    /// Instantiate runtime state from a frozen spec. Non-positive rates and
    /// zero caps fall back to defaults rather than producing inert or
    /// divide-by-zero behaviors.
    pub fn from_spec(spec: &BehaviorSpec) -> Self {
        match spec {
            BehaviorSpec::Miner { speed } => Behavior::Miner(MinerBehavior {
                speed: positive_or(*speed, 0.5),
                timer: Fixed64::ZERO,
            }),
            BehaviorSpec::Furnace {
                recipes,
                fuel,
                process_time,
                input_cap,
            } => Behavior::Furnace(FurnaceBehavior {
                recipes: recipes.clone(),
                fuel: *fuel,
                process_time: positive_or(*process_time, 2.0),
                input_cap: if *input_cap == 0 { 20 } else { *input_cap },
                timer: Fixed64::ZERO,
            }),
            BehaviorSpec::Farm { item, interval } => Behavior::Farm(FarmBehavior {
                item: *item,
                interval: positive_or(*interval, 5.0),
                timer: Fixed64::ZERO,
            }),
            BehaviorSpec::Generator { item, interval } => Behavior::Generator(GeneratorBehavior {
                item: *item,
                interval: positive_or(*interval, 3.0),
                timer: Fixed64::ZERO,
            }),
            BehaviorSpec::Storage {
                capacity,
                drain_interval,
            } => Behavior::Storage(StorageBehavior {
                capacity: if *capacity == 0 { 100 } else { *capacity },
                drain_interval: positive_or(*drain_interval, 1.0),
                timer: Fixed64::ZERO,
            }),
        }
    }

    /// Zero all running timers (placement and removal).
    pub fn reset(&mut self) {
        match self {
            Behavior::Miner(b) => b.timer = Fixed64::ZERO,
            Behavior::Furnace(b) => b.timer = Fixed64::ZERO,
            Behavior::Farm(b) => b.timer = Fixed64::ZERO,
            Behavior::Generator(b) => b.timer = Fixed64::ZERO,
            Behavior::Storage(b) => b.timer = Fixed64::ZERO,
        }
    }

    /// Offer `count` of `item_type` to this behavior. On acceptance the
    /// items are added to the shared inventory. Producers accept nothing.
    pub fn try_accept(
        &self,
        inventory: &mut Inventory,
        item_type: ItemTypeId,
        count: u32,
    ) -> bool {
        match self {
            Behavior::Miner(_) | Behavior::Farm(_) | Behavior::Generator(_) => false,
            Behavior::Furnace(furnace) => {
                let wanted = item_type == furnace.fuel
                    || furnace.recipes.iter().any(|r| r.input == item_type);
                if wanted
                    && inventory.quantity(item_type).saturating_add(count) <= furnace.input_cap
                {
                    inventory.add(item_type, count);
                    return true;
                }
                false
            }
            Behavior::Storage(storage) => {
                let total = inventory.total();
                if total == 0 {
                    if count <= storage.capacity {
                        inventory.add(item_type, count);
                        return true;
                    }
                    return false;
                }
                match inventory.first() {
                    Some((held, _))
                        if held == item_type
                            && total.saturating_add(count) <= storage.capacity =>
                    {
                        inventory.add(item_type, count);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    fn update(&mut self, host: &mut Host<'_>, ctx: &mut ProductionCtx<'_>) {
        match self {
            Behavior::Miner(miner) => miner.update(host, ctx),
            Behavior::Furnace(furnace) => furnace.update(host, ctx),
            Behavior::Farm(farm) => farm.update(host, ctx),
            Behavior::Generator(generator) => generator.update(host, ctx),
            Behavior::Storage(storage) => storage.update(host, ctx),
        }
    }

    /// Feed this behavior's full runtime state into a determinism hash.
    pub(crate) fn write_hash(&self, hasher: &mut crate::sim::StateHash) {
        match self {
            Behavior::Miner(b) => {
                hasher.write_u32(0);
                hasher.write_fixed64(b.speed);
                hasher.write_fixed64(b.timer);
            }
            Behavior::Furnace(b) => {
                hasher.write_u32(1);
                for recipe in &b.recipes {
                    hasher.write_u32(recipe.input.0);
                    hasher.write_u32(recipe.output.0);
                }
                hasher.write_u32(b.fuel.0);
                hasher.write_fixed64(b.process_time);
                hasher.write_u32(b.input_cap);
                hasher.write_fixed64(b.timer);
            }
            Behavior::Farm(b) => {
                hasher.write_u32(2);
                hasher.write_u32(b.item.0);
                hasher.write_fixed64(b.interval);
                hasher.write_fixed64(b.timer);
            }
            Behavior::Generator(b) => {
                hasher.write_u32(3);
                hasher.write_u32(b.item.0);
                hasher.write_fixed64(b.interval);
                hasher.write_fixed64(b.timer);
            }
            Behavior::Storage(b) => {
                hasher.write_u32(4);
                hasher.write_u32(b.capacity);
                hasher.write_fixed64(b.drain_interval);
                hasher.write_fixed64(b.timer);
            }
        }
    }
}

impl MinerBehavior {
    fn update(&mut self, host: &mut Host<'_>, ctx: &mut ProductionCtx<'_>) {
        let rate = self.speed * tier_speed(host.tier);
        let Some(period) = checked_div_64(Fixed64::from_num(1), rate) else {
            return;
        };
        self.timer += ctx.dt;
        while self.timer >= period {
            self.timer -= period;
            // A tick over a depleted or ore-less tile yields nothing; the
            // tick itself is still spent.
            let Some(ore) = ctx.grid.tile(host.pos).and_then(|t| t.ore) else {
                continue;
            };
            let Some(item_type) = ctx.registry.ore_item(ore) else {
                continue;
            };
            if try_output_to_conveyor(host, ctx, item_type) {
                ctx.events.push(Event::ItemProduced {
                    pos: host.pos,
                    item_type,
                    frame: ctx.frame,
                });
            } else {
                ctx.events.push(Event::ProductionDiscarded {
                    pos: host.pos,
                    item_type,
                    frame: ctx.frame,
                });
            }
        }
    }
}

impl FurnaceBehavior {
    fn update(&mut self, host: &mut Host<'_>, ctx: &mut ProductionCtx<'_>) {
        // Finished output leaves before any new smelting: never both in one
        // frame.
        let buffered = self
            .recipes
            .iter()
            .map(|r| r.output)
            .find(|out| host.inventory.quantity(*out) > 0);
        if let Some(output) = buffered {
            if host.inventory.try_remove(output, 1) && !try_output_to_conveyor(host, ctx, output) {
                host.inventory.add(output, 1);
            }
            return;
        }

        if host.inventory.quantity(self.fuel) == 0 {
            return;
        }
        let Some(recipe) = self
            .recipes
            .iter()
            .find(|r| host.inventory.quantity(r.input) > 0)
            .copied()
        else {
            return;
        };

        // The smelt timer only runs while fuel and an input are present;
        // partial progress is kept across starved frames.
        self.timer += ctx.dt;
        if self.timer >= self.process_time {
            self.timer = Fixed64::ZERO;
            if host.inventory.try_remove(self.fuel, 1)
                && host.inventory.try_remove(recipe.input, 1)
            {
                host.inventory.add(recipe.output, 1);
                ctx.events.push(Event::ItemProduced {
                    pos: host.pos,
                    item_type: recipe.output,
                    frame: ctx.frame,
                });
            }
        }
    }
}

impl FarmBehavior {
    fn update(&mut self, host: &mut Host<'_>, ctx: &mut ProductionCtx<'_>) {
        self.timer += ctx.dt;
        while self.timer >= self.interval {
            // The interval elapses whether or not the yield found a route.
            self.timer -= self.interval;
            emit_or_discard(host, ctx, self.item);
        }
    }
}

impl GeneratorBehavior {
    fn update(&mut self, host: &mut Host<'_>, ctx: &mut ProductionCtx<'_>) {
        self.timer += ctx.dt;
        while self.timer >= self.interval {
            self.timer -= self.interval;
            emit_or_discard(host, ctx, self.item);
        }
    }
}

impl StorageBehavior {
    fn update(&mut self, host: &mut Host<'_>, ctx: &mut ProductionCtx<'_>) {
        self.timer += ctx.dt;
        while self.timer >= self.drain_interval {
            self.timer -= self.drain_interval;
            let Some((item_type, _)) = host.inventory.first() else {
                continue;
            };
            // Drain moves an existing item, it does not produce one: on a
            // failed route the item stays put, with no discard.
            if host.inventory.try_remove(item_type, 1)
                && !try_output_to_conveyor(host, ctx, item_type)
            {
                host.inventory.add(item_type, 1);
            }
        }
    }
}

/// Produce one item onto a conveyor, or record the loss.
fn emit_or_discard(host: &mut Host<'_>, ctx: &mut ProductionCtx<'_>, item_type: ItemTypeId) {
    if try_output_to_conveyor(host, ctx, item_type) {
        ctx.events.push(Event::ItemProduced {
            pos: host.pos,
            item_type,
            frame: ctx.frame,
        });
    } else {
        ctx.events.push(Event::ProductionDiscarded {
            pos: host.pos,
            item_type,
            frame: ctx.frame,
        });
    }
}

// ---------------------------------------------------------------------------
// Building instances
// ---------------------------------------------------------------------------

/// A placed building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingInstance {
    pub building_type: BuildingTypeId,
    pub pos: TilePos,
    pub facing: Direction,
    pub tier: u8,
    /// Shared across all behaviors on this instance.
    pub inventory: Inventory,
    /// Last direction index an output left through; arbitration resumes
    /// one past it.
    pub output_cursor: u8,
    pub behaviors: Vec<Behavior>,
}

impl BuildingInstance {
    pub fn from_def(
        building_type: BuildingTypeId,
        def: &BuildingDef,
        pos: TilePos,
        facing: Direction,
    ) -> Self {
        Self {
            building_type,
            pos,
            facing,
            tier: def.tier.clamp(1, 3),
            inventory: Inventory::new(),
            // West, so the first arbitration pass scans N, E, S, W.
            output_cursor: Direction::West.index(),
            behaviors: def.behaviors.iter().map(Behavior::from_spec).collect(),
        }
    }

    /// Bare instance from behavior specs, bypassing the registry.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_tests(
        pos: TilePos,
        facing: Direction,
        tier: u8,
        specs: Vec<BehaviorSpec>,
    ) -> Self {
        Self {
            building_type: BuildingTypeId(0),
            pos,
            facing,
            tier: tier.clamp(1, 3),
            inventory: Inventory::new(),
            output_cursor: Direction::West.index(),
            behaviors: specs.iter().map(Behavior::from_spec).collect(),
        }
    }

    /// Offer items to this building; the first behavior that wants them
    /// takes them into the shared inventory.
    pub fn try_accept(&mut self, item_type: ItemTypeId, count: u32) -> bool {
        let inventory = &mut self.inventory;
        self.behaviors
            .iter()
            .any(|b| b.try_accept(inventory, item_type, count))
    }

    pub fn reset_behaviors(&mut self) {
        for behavior in &mut self.behaviors {
            behavior.reset();
        }
    }

    fn update(&mut self, ctx: &mut ProductionCtx<'_>) {
        // Behaviors move out so the host can borrow the remaining fields.
        let mut behaviors = std::mem::take(&mut self.behaviors);
        {
            let mut host = Host {
                pos: self.pos,
                tier: self.tier,
                inventory: &mut self.inventory,
                output_cursor: &mut self.output_cursor,
            };
            for behavior in &mut behaviors {
                behavior.update(&mut host, ctx);
            }
        }
        self.behaviors = behaviors;
    }
}

// ---------------------------------------------------------------------------
// Production phase
// ---------------------------------------------------------------------------

/// The instance-side view a behavior updates against.
pub(crate) struct Host<'a> {
    pub pos: TilePos,
    pub tier: u8,
    pub inventory: &'a mut Inventory,
    pub output_cursor: &'a mut u8,
}

/// World-side context for the production phase. Holds everything except
/// the building arena, which is being iterated.
pub(crate) struct ProductionCtx<'a> {
    pub grid: &'a mut Grid,
    pub items: &'a mut FreeItems,
    pub registry: &'a Registry,
    pub events: &'a mut EventBuffer,
    pub dt: Seconds,
    pub frame: Frame,
}

/// Run every behavior of every building for one frame, in arena order.
pub(crate) fn run_production(
    buildings: &mut SlotMap<BuildingId, BuildingInstance>,
    grid: &mut Grid,
    items: &mut FreeItems,
    registry: &Registry,
    events: &mut EventBuffer,
    dt: Seconds,
    frame: Frame,
) {
    let mut ctx = ProductionCtx {
        grid,
        items,
        registry,
        events,
        dt,
        frame,
    };
    for (_, instance) in buildings.iter_mut() {
        instance.update(&mut ctx);
    }
}
