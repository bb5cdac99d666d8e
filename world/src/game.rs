//! The game context owning terrain, global state and entity collections.

use freeserf_core::{Direction, MapGeometry, MapObject, MapPos, TerrainView};

use crate::collection::{Collection, CollectionError, GameObject, Handle};
use crate::entities::{Building, Flag, Inventory, Object, Player, Serf};
use crate::map::{Map, MapError};
use crate::records::{BuildingType, GameState, SerfType};
use crate::state::Record;

/// Errors raised while editing a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Terrain edit failed.
    #[error(transparent)]
    Map(#[from] MapError),
    /// A referenced entity does not exist.
    #[error(transparent)]
    Collection(#[from] CollectionError),
    /// The tile already holds an object.
    #[error("tile {pos} is occupied")]
    Occupied {
        /// Requested tile.
        pos: MapPos,
    },
}

/// Complete simulation state.
///
/// Replaces process-wide game managers: every operation that needs the game
/// receives it explicitly.
#[derive(Debug)]
pub struct Game {
    map: Map,
    state: GameState,
    players: Collection<Player>,
    inventories: Collection<Inventory>,
    buildings: Collection<Building>,
    flags: Collection<Flag>,
    serfs: Collection<Serf>,
    next_game_time: u32,
}

impl Game {
    /// Creates an empty game on a flat map of the given size.
    pub fn new(map_size: u32) -> Result<Self, GameError> {
        Ok(Self::with_map(Map::new(map_size)?))
    }

    /// Creates an empty game on an existing map.
    #[must_use]
    pub fn with_map(map: Map) -> Self {
        let mut state = GameState::default();
        state.set_map_size(map.geometry().size());
        state.reset_dirty();
        Self {
            map,
            state,
            players: Collection::new("player", Object::new),
            inventories: Collection::new("inventory", Object::new),
            buildings: Collection::new("building", Object::new),
            flags: Collection::new("flag", Object::new),
            serfs: Collection::new("serf", Object::new),
            next_game_time: 0,
        }
    }

    /// Terrain.
    #[must_use]
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// Mutable terrain.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// Geometry of the terrain.
    #[must_use]
    pub fn geometry(&self) -> &MapGeometry {
        self.map.geometry()
    }

    /// Global state record.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable global state record.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Players.
    #[must_use]
    pub fn players(&self) -> &Collection<Player> {
        &self.players
    }

    /// Inventories.
    #[must_use]
    pub fn inventories(&self) -> &Collection<Inventory> {
        &self.inventories
    }

    /// Buildings.
    #[must_use]
    pub fn buildings(&self) -> &Collection<Building> {
        &self.buildings
    }

    /// Flags.
    #[must_use]
    pub fn flags(&self) -> &Collection<Flag> {
        &self.flags
    }

    /// Serfs.
    #[must_use]
    pub fn serfs(&self) -> &Collection<Serf> {
        &self.serfs
    }

    /// Adds a player and returns its index.
    pub fn add_player(&mut self, face: u8, color: [u8; 3]) -> u32 {
        let handle = self.players.allocate();
        let mut player = handle.write();
        let state = player.state_mut();
        state.set_face(face);
        state.set_color(color);
        state.set_flags(1);
        state.mark_all_dirty();
        player.index()
    }

    /// Adds an empty inventory owned by `owner`.
    pub fn add_inventory(&mut self, owner: u32) -> Result<u32, GameError> {
        let _ = self.players.require(owner)?;
        let handle = self.inventories.allocate();
        let mut inventory = handle.write();
        inventory.state_mut().set_owner(owner);
        inventory.state_mut().mark_all_dirty();
        Ok(inventory.index())
    }

    /// Index of the flag standing at `pos`.
    #[must_use]
    pub fn flag_at(&self, pos: MapPos) -> Option<u32> {
        self.flags
            .to_list()
            .into_iter()
            .map(|handle| {
                let flag = handle.read();
                (flag.index(), flag.state().position())
            })
            .find_map(|(index, position)| (position == pos).then_some(index))
    }

    /// Plants a flag for `owner` at `pos`.
    pub fn build_flag(&mut self, owner: u32, pos: MapPos) -> Result<u32, GameError> {
        let _ = self.players.require(owner)?;
        if self.map.object(pos) != MapObject::None {
            return Err(GameError::Occupied { pos });
        }
        self.map.set_object(pos, MapObject::Flag);
        let handle = self.flags.allocate();
        let mut flag = handle.write();
        let state = flag.state_mut();
        state.set_position(pos);
        state.set_owner(owner);
        state.mark_all_dirty();
        Ok(flag.index())
    }

    /// Places a building for `owner` at `pos`, planting its flag down-right of
    /// the site when none stands there yet.
    ///
    /// Castles and stocks receive an inventory; a castle also becomes the
    /// owner's main inventory.
    pub fn build_building(
        &mut self,
        owner: u32,
        building_type: BuildingType,
        pos: MapPos,
    ) -> Result<u32, GameError> {
        let player = self.players.require(owner)?;
        if self.map.object(pos) != MapObject::None {
            return Err(GameError::Occupied { pos });
        }
        let flag_pos = self.geometry().move_down_right(pos);
        let flag_index = match self.flag_at(flag_pos) {
            Some(index) => index,
            None => self.build_flag(owner, flag_pos)?,
        };

        let object = match building_type {
            BuildingType::Castle => MapObject::Castle,
            kind if kind.is_large() => MapObject::LargeBuilding,
            _ => MapObject::SmallBuilding,
        };
        self.map.set_object(pos, object);
        self.map.add_path(pos, Direction::DownRight);

        let building_handle = self.buildings.allocate();
        let building_index = building_handle.read().index();
        let inventory_index = if building_type.has_inventory() {
            let index = self.add_inventory(owner)?;
            let inventory = self.inventories.require(index)?;
            let mut inventory = inventory.write();
            inventory.state_mut().set_flag(Some(flag_index));
            inventory.state_mut().set_building(Some(building_index));
            Some(index)
        } else {
            None
        };

        {
            let mut building = building_handle.write();
            let state = building.state_mut();
            state.set_building_type(building_type);
            state.set_position(pos);
            state.set_owner(owner);
            state.set_flag(Some(flag_index));
            state.set_inventory(inventory_index);
            state.mark_all_dirty();
        }

        self.flags
            .require(flag_index)?
            .write()
            .state_mut()
            .set_building(Some(building_index));

        if building_type == BuildingType::Castle {
            let mut player = player.write();
            let state = player.state_mut();
            state.set_castle_position(Some(pos));
            state.set_castle_inventory(inventory_index);
        }
        Ok(building_index)
    }

    /// Spawns a serf for `owner` standing at `pos`.
    pub fn spawn_serf(
        &mut self,
        owner: u32,
        serf_type: SerfType,
        pos: MapPos,
    ) -> Result<u32, GameError> {
        let player = self.players.require(owner)?;
        player.write().state_mut().adjust_serf_count(serf_type, 1);
        let handle = self.serfs.allocate();
        let mut serf = handle.write();
        let state = serf.state_mut();
        state.set_serf_type(serf_type);
        state.set_owner(owner);
        state.set_position(pos);
        state.set_tick(self.state.tick());
        state.mark_all_dirty();
        Ok(serf.index())
    }

    /// Removes a serf, returning whether it existed.
    pub fn remove_serf(&mut self, index: u32) -> bool {
        let Some(handle) = self.serfs.get(index) else {
            return false;
        };
        let (owner, serf_type) = {
            let serf = handle.read();
            (serf.state().owner(), serf.state().serf_type())
        };
        if let Some(player) = self.players.get(owner) {
            player.write().state_mut().adjust_serf_count(serf_type, -1);
        }
        self.serfs.erase(index)
    }

    /// Removes a flag and clears its tile.
    pub fn remove_flag(&mut self, index: u32) -> bool {
        let Some(handle) = self.flags.get(index) else {
            return false;
        };
        let pos = handle.read().state().position();
        self.map.set_object(pos, MapObject::None);
        self.map.set_paths(pos, 0);
        self.flags.erase(index)
    }

    /// Removes a building together with its inventory.
    pub fn remove_building(&mut self, index: u32) -> bool {
        let Some(handle) = self.buildings.get(index) else {
            return false;
        };
        let (pos, flag, inventory) = {
            let building = handle.read();
            let state = building.state();
            (state.position(), state.flag(), state.inventory())
        };
        self.map.set_object(pos, MapObject::None);
        self.map.set_paths(pos, 0);
        if let Some(flag) = flag.and_then(|flag| self.flags.get(flag)) {
            flag.write().state_mut().set_building(None);
        }
        if let Some(inventory) = inventory {
            let _ = self.remove_inventory(inventory);
        }
        self.buildings.erase(index)
    }

    /// Removes an inventory, detaching it from its owner's castle.
    pub fn remove_inventory(&mut self, index: u32) -> bool {
        let Some(handle) = self.inventories.get(index) else {
            return false;
        };
        let owner = handle.read().state().owner();
        if let Some(player) = self.players.get(owner) {
            let mut player = player.write();
            if player.state().castle_inventory() == Some(index) {
                player.state_mut().set_castle_inventory(None);
            }
        }
        self.inventories.erase(index)
    }

    /// Game time the simulation is advancing towards.
    #[must_use]
    pub fn next_game_time(&self) -> u32 {
        self.next_game_time
    }

    /// Schedules `ticks` more ticks of game time.
    pub fn schedule(&mut self, ticks: u32) {
        let speed = self.state.game_speed();
        self.next_game_time = self
            .state
            .game_time()
            .saturating_add(ticks.saturating_mul(speed));
    }

    /// Advances one tick towards the scheduled game time.
    ///
    /// Returns `false` once the scheduled time is reached.
    pub fn step(&mut self) -> bool {
        let game_time = self.state.game_time();
        if game_time >= self.next_game_time {
            return false;
        }
        let speed = self.state.game_speed().max(1);
        let next = game_time.saturating_add(speed).min(self.next_game_time);
        self.state.set_game_time(next);
        self.state.set_tick(self.state.tick().wrapping_add(1));
        self.state
            .set_const_tick(self.state.const_tick().wrapping_add(1));
        true
    }

    /// Schedules and runs `ticks` ticks.
    pub fn advance(&mut self, ticks: u32) {
        self.schedule(ticks);
        while self.step() {}
    }

    /// Draws the next value of the deterministic game random generator.
    pub fn random_int(&mut self) -> u16 {
        let [a, b, c] = self.state.random_state();
        let value = a.wrapping_add(b) ^ c;
        let c = c.wrapping_add(b);
        let b = (b ^ c).rotate_right(1);
        let c = c.rotate_right(1);
        self.state.set_random_state([value, b, c]);
        value
    }

    /// Reports whether the global record or any entity changed since the
    /// last reset.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
            || any_dirty(&self.players)
            || any_dirty(&self.inventories)
            || any_dirty(&self.buildings)
            || any_dirty(&self.flags)
            || any_dirty(&self.serfs)
    }

    /// Clears every dirty mark, typically once a delta was acknowledged.
    pub fn reset_dirty(&mut self) {
        self.state.reset_dirty();
        for_each_state(&self.players, Record::reset_dirty);
        for_each_state(&self.inventories, Record::reset_dirty);
        for_each_state(&self.buildings, Record::reset_dirty);
        for_each_state(&self.flags, Record::reset_dirty);
        for_each_state(&self.serfs, Record::reset_dirty);
    }

    /// Marks every field of every record dirty.
    pub fn mark_all_dirty(&mut self) {
        self.state.mark_all_dirty();
        for_each_state(&self.players, Record::mark_all_dirty);
        for_each_state(&self.inventories, Record::mark_all_dirty);
        for_each_state(&self.buildings, Record::mark_all_dirty);
        for_each_state(&self.flags, Record::mark_all_dirty);
        for_each_state(&self.serfs, Record::mark_all_dirty);
    }
}

fn any_dirty<S: Record>(collection: &Collection<Object<S>>) -> bool {
    collection
        .to_list()
        .iter()
        .any(|handle| handle.read().state().is_dirty())
}

fn for_each_state<S: Record>(collection: &Collection<Object<S>>, mut apply: impl FnMut(&mut S)) {
    for handle in collection.to_list() {
        apply(handle.write().state_mut());
    }
}

/// Reads the record behind a handle.
pub fn read_state<S: Record>(handle: &Handle<Object<S>>) -> S {
    handle.read().state().clone()
}
