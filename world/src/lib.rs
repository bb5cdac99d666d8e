#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative game state for the Freeserf simulation.
//!
//! The [`Game`] context owns the terrain [`Map`], the global [`GameState`]
//! record and one [`Collection`] per entity kind. Every record tracks which of
//! its fields changed so the sync system can ship deltas; the byte codec those
//! deltas use lives in [`codec`].

pub mod codec;
mod collection;
mod entities;
mod game;
mod map;
mod state;
mod records;

pub use collection::{Collection, CollectionError, GameObject, Handle, MAX_INDEX};
pub use entities::{
    Building, DanglingRef, Flag, Inventory, Object, Player, PostDeserialize, Restored, Serf,
};
pub use game::{read_state, Game, GameError};
pub use map::{Map, MapError, Tile};
pub use records::{
    BuildingField, BuildingState, BuildingType, FlagField, FlagState, GameField, GameState,
    InventoryField, InventoryState, PlayerField, PlayerState, Resource, SerfActivity, SerfField,
    SerfState, SerfType, DEFAULT_KNIGHT_MORALE, FLAG_SLOTS,
};
pub use state::{DirtyFields, Record, StateError, StateValue};

/// Read-only views over a game used by adapters.
pub mod query {
    use super::{Collection, Game, GameObject, Object, Record};

    /// Number of live entities per collection.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CollectionCounts {
        /// Players.
        pub players: usize,
        /// Inventories.
        pub inventories: usize,
        /// Buildings.
        pub buildings: usize,
        /// Flags.
        pub flags: usize,
        /// Serfs.
        pub serfs: usize,
    }

    /// Counts the live entities of every collection.
    #[must_use]
    pub fn collection_counts(game: &Game) -> CollectionCounts {
        CollectionCounts {
            players: game.players().len(),
            inventories: game.inventories().len(),
            buildings: game.buildings().len(),
            flags: game.flags().len(),
            serfs: game.serfs().len(),
        }
    }

    /// Indices of the entities whose records changed since the last reset.
    #[must_use]
    pub fn dirty_indices<S: Record>(collection: &Collection<Object<S>>) -> Vec<u32> {
        collection
            .to_list()
            .iter()
            .filter_map(|handle| {
                let object = handle.read();
                object.state().is_dirty().then(|| object.index())
            })
            .collect()
    }

    /// Number of dirty records across the game, the global record included.
    #[must_use]
    pub fn dirty_record_count(game: &Game) -> usize {
        usize::from(game.state().is_dirty())
            + dirty_indices(game.players()).len()
            + dirty_indices(game.inventories()).len()
            + dirty_indices(game.buildings()).len()
            + dirty_indices(game.flags()).len()
            + dirty_indices(game.serfs()).len()
    }
}
