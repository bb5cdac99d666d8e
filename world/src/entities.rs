//! Entity wrappers stored in the game collections.

use crate::collection::{Collection, GameObject};
use crate::records::{BuildingState, FlagState, InventoryState, PlayerState, SerfState};
use crate::state::Record;

/// Entity stored under a fixed index, owning one state record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object<S> {
    index: u32,
    state: S,
}

impl<S: Record> Object<S> {
    /// Creates an entity with a default record at `index`.
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self {
            index,
            state: S::default(),
        }
    }

    /// Record of the entity.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Mutable record of the entity.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }
}

impl<S: Record> GameObject for Object<S> {
    fn index(&self) -> u32 {
        self.index
    }
}

/// A player.
pub type Player = Object<PlayerState>;
/// Storage of a castle or stock.
pub type Inventory = Object<InventoryState>;
/// A building.
pub type Building = Object<BuildingState>;
/// A road flag.
pub type Flag = Object<FlagState>;
/// A serf.
pub type Serf = Object<SerfState>;

/// Live indices of the collections restored before an entity.
///
/// Collections are restored in a fixed order (players, inventories,
/// buildings, flags, serfs), so an entity may only verify references to
/// collections that precede it.
#[derive(Clone, Copy, Debug)]
pub struct Restored<'a> {
    /// Players.
    pub players: &'a Collection<Player>,
    /// Inventories.
    pub inventories: &'a Collection<Inventory>,
    /// Buildings.
    pub buildings: &'a Collection<Building>,
    /// Flags.
    pub flags: &'a Collection<Flag>,
}

/// Reference of one entity to another that no longer exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DanglingRef {
    /// Field that was cleared.
    pub field: &'static str,
    /// Index the field pointed to.
    pub target: u32,
}

/// Fix-up run on an entity once its record has been restored.
pub trait PostDeserialize {
    /// Clears references to missing entities, returning what was cleared.
    fn post_deserialize(&mut self, restored: Restored<'_>) -> Vec<DanglingRef>;
}

fn check<T: GameObject>(
    collection: &Collection<T>,
    field: &'static str,
    target: Option<u32>,
    dangling: &mut Vec<DanglingRef>,
) -> Option<u32> {
    match target {
        Some(index) if !collection.contains(index) => {
            dangling.push(DanglingRef {
                field,
                target: index,
            });
            None
        }
        other => other,
    }
}

impl PostDeserialize for Player {
    fn post_deserialize(&mut self, _restored: Restored<'_>) -> Vec<DanglingRef> {
        Vec::new()
    }
}

impl PostDeserialize for Inventory {
    fn post_deserialize(&mut self, restored: Restored<'_>) -> Vec<DanglingRef> {
        let mut dangling = Vec::new();
        let _ = check(
            restored.players,
            "owner",
            Some(self.state.owner()),
            &mut dangling,
        );
        dangling
    }
}

impl PostDeserialize for Building {
    fn post_deserialize(&mut self, restored: Restored<'_>) -> Vec<DanglingRef> {
        let mut dangling = Vec::new();
        let _ = check(
            restored.players,
            "owner",
            Some(self.state.owner()),
            &mut dangling,
        );
        let inventory = check(
            restored.inventories,
            "inventory",
            self.state.inventory(),
            &mut dangling,
        );
        self.state.set_inventory(inventory);
        dangling
    }
}

impl PostDeserialize for Flag {
    fn post_deserialize(&mut self, restored: Restored<'_>) -> Vec<DanglingRef> {
        let mut dangling = Vec::new();
        let _ = check(
            restored.players,
            "owner",
            Some(self.state.owner()),
            &mut dangling,
        );
        let building = check(
            restored.buildings,
            "building",
            self.state.building(),
            &mut dangling,
        );
        self.state.set_building(building);
        dangling
    }
}

impl PostDeserialize for Serf {
    fn post_deserialize(&mut self, restored: Restored<'_>) -> Vec<DanglingRef> {
        let mut dangling = Vec::new();
        let _ = check(
            restored.players,
            "owner",
            Some(self.state.owner()),
            &mut dangling,
        );
        let building = check(
            restored.buildings,
            "building",
            self.state.building(),
            &mut dangling,
        );
        self.state.set_building(building);
        let inventory = check(
            restored.inventories,
            "inventory",
            self.state.inventory(),
            &mut dangling,
        );
        self.state.set_inventory(inventory);
        dangling
    }
}
