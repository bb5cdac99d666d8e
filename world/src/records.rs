//! State records of the game and of every entity kind.

use freeserf_core::{Direction, MapPos, DEFAULT_GAME_SPEED};

use crate::codec::{CodecError, Decoder, Encoder};
use crate::state::{state_record, StateError, StateValue};

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            #[default]
            $( $(#[$variant_meta])* $variant, )+
        }

        impl $name {
            /// Every variant in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Number of variants.
            pub const COUNT: usize = [$(stringify!($variant)),+].len();

            /// Stable numeric code.
            #[must_use]
            pub const fn code(self) -> u8 {
                self as u8
            }

            /// Resolves a code written by `code`.
            #[must_use]
            pub fn from_code(code: u8) -> Option<Self> {
                Self::ALL.get(usize::from(code)).copied()
            }

            /// Position of the variant in per-kind arrays.
            #[must_use]
            pub const fn index(self) -> usize {
                self as usize
            }
        }

        impl StateValue for $name {
            fn encode(&self, out: &mut Encoder) -> Result<(), CodecError> {
                out.write(&self.code())
            }

            fn decode(input: &mut Decoder<'_>) -> Result<Self, CodecError> {
                let code: u8 = input.read()?;
                Self::from_code(code).ok_or(CodecError::UnknownCode {
                    kind: stringify!($name),
                    code,
                })
            }

            fn to_text(&self) -> String {
                self.code().to_string()
            }

            fn from_text(text: &str) -> Result<Self, StateError> {
                u8::from_text(text)
                    .ok()
                    .and_then(Self::from_code)
                    .ok_or_else(|| StateError::InvalidValue(text.to_owned()))
            }
        }
    };
}

coded_enum! {
    /// Profession of a serf.
    pub enum SerfType {
        /// Carries resources between flags.
        Transporter,
        /// Rows boats across water.
        Sailor,
        /// Levels building sites.
        Digger,
        /// Raises buildings.
        Builder,
        /// Fells trees.
        Lumberjack,
        /// Cuts planks.
        Sawmiller,
        /// Quarries stone.
        Stonecutter,
        /// Plants trees.
        Forester,
        /// Catches fish.
        Fisher,
        /// Grows wheat.
        Farmer,
        /// Digs ore and coal.
        Miner,
        /// Defends and attacks military buildings.
        Knight,
    }
}

coded_enum! {
    /// Resource carried between flags and stored in inventories.
    pub enum Resource {
        /// Fish.
        Fish,
        /// Meat.
        Meat,
        /// Wheat.
        Wheat,
        /// Flour.
        Flour,
        /// Bread.
        Bread,
        /// Unworked logs.
        Lumber,
        /// Sawn planks.
        Plank,
        /// Stone blocks.
        Stone,
        /// Coal.
        Coal,
        /// Iron ore.
        IronOre,
        /// Steel bars.
        Steel,
        /// Gold bars.
        Gold,
    }
}

coded_enum! {
    /// Kind of building.
    pub enum BuildingType {
        /// Small military hut.
        Hut,
        /// A player's castle, holding the main inventory.
        Castle,
        /// Secondary warehouse.
        Stock,
        /// Lumberjack's hut.
        Lumberjack,
        /// Sawmill.
        Sawmill,
        /// Stonecutter's hut.
        Stonecutter,
        /// Farm.
        Farm,
        /// Mill.
        Mill,
        /// Bakery.
        Baker,
        /// Large military fortress.
        Fortress,
    }
}

impl BuildingType {
    /// Reports whether the building keeps an inventory.
    #[must_use]
    pub const fn has_inventory(self) -> bool {
        matches!(self, Self::Castle | Self::Stock)
    }

    /// Reports whether the building occupies a large site.
    #[must_use]
    pub const fn is_large(self) -> bool {
        matches!(
            self,
            Self::Castle | Self::Stock | Self::Farm | Self::Sawmill | Self::Fortress
        )
    }
}

coded_enum! {
    /// Coarse activity of a serf.
    pub enum SerfActivity {
        /// Waiting for work.
        Idle,
        /// Idle inside an inventory.
        InInventory,
        /// Walking towards a destination.
        Walking,
        /// Carrying a resource along a road.
        Transporting,
        /// Constructing a building.
        Building,
        /// Working inside a building.
        Working,
        /// Fighting.
        Fighting,
    }
}

/// Number of resource slots on a flag.
pub const FLAG_SLOTS: usize = 8;

/// Initial knight morale of a player.
pub const DEFAULT_KNIGHT_MORALE: u32 = 0x1000;

fn adjust(value: u32, delta: i32) -> u32 {
    if delta.is_negative() {
        value.saturating_sub(delta.unsigned_abs())
    } else {
        value.saturating_add(delta.unsigned_abs())
    }
}

state_record! {
    /// Global simulation state.
    pub struct GameState in "game";
    pub enum GameField {
        /// Scenario kind (0 for a free game, 1 for a mission).
        GameType => game_type, set_game_type: u8 = 0;
        /// Size parameter of the map.
        MapSize => map_size, set_map_size: u32 = 3;
        /// Game time units advanced per tick.
        GameSpeed => game_speed, set_game_speed: u32 = DEFAULT_GAME_SPEED;
        /// Elapsed game time.
        GameTime => game_time, set_game_time: u32 = 0;
        /// Number of ticks processed.
        Tick => tick, set_tick: u32 = 0;
        /// Ticks processed regardless of pauses.
        ConstTick => const_tick, set_const_tick: u32 = 0;
        /// State of the deterministic random generator.
        RandomState => random_state, set_random_state: [u16; 3] = [0x5a5a, 0xa5a5, 0xc3c3];
        /// Gold held by all players together.
        GoldTotal => gold_total, set_gold_total: u32 = 0;
        /// Morale factor derived from gold holdings.
        GoldMoraleFactor => gold_morale_factor, set_gold_morale_factor: u32 = 0;
        /// Counter used to stamp flag searches.
        FlagSearchCounter => flag_search_counter, set_flag_search_counter: u32 = 0;
        /// Write cursors of the per-player statistics history.
        PlayerHistoryIndex => player_history_index, set_player_history_index: [u16; 4] = [0; 4];
    }
}

state_record! {
    /// Per-player state.
    pub struct PlayerState in "player";
    pub enum PlayerField {
        /// Portrait shown for the player.
        Face => face, set_face: u8 = 0;
        /// Player colour as RGB.
        Color => color, set_color: [u8; 3] = [0, 0, 0];
        /// Behaviour flags (bit 0 active, bit 1 computer controlled).
        Flags => flags, set_flags: u8 = 0;
        /// Position of the castle once built.
        CastlePosition => castle_position, set_castle_position: Option<MapPos> = None;
        /// Inventory held by the castle.
        CastleInventory => castle_inventory, set_castle_inventory: Option<u32> = None;
        /// Number of serfs per profession.
        SerfCounts => serf_counts, set_serf_counts: [u32; SerfType::COUNT] = [0; SerfType::COUNT];
        /// Number of resources per kind across all inventories.
        ResourceCounts => resource_counts, set_resource_counts: [u32; Resource::COUNT] = [0; Resource::COUNT];
        /// Gold delivered to military buildings.
        GoldDeposited => gold_deposited, set_gold_deposited: u32 = 0;
        /// Morale of the player's knights.
        KnightMorale => knight_morale, set_knight_morale: u32 = DEFAULT_KNIGHT_MORALE;
        /// Military strength score.
        TotalMilitaryScore => total_military_score, set_total_military_score: u32 = 0;
        /// Building score.
        BuildingScore => building_score, set_building_score: u32 = 0;
    }
}

impl PlayerState {
    /// Changes the number of serfs of one profession.
    pub fn adjust_serf_count(&mut self, serf_type: SerfType, delta: i32) {
        let slot = &mut self.serf_counts[serf_type.index()];
        let updated = adjust(*slot, delta);
        if *slot != updated {
            *slot = updated;
            self.mark_dirty(PlayerField::SerfCounts);
        }
    }

    /// Changes the number of resources of one kind.
    pub fn adjust_resource_count(&mut self, resource: Resource, delta: i32) {
        let slot = &mut self.resource_counts[resource.index()];
        let updated = adjust(*slot, delta);
        if *slot != updated {
            *slot = updated;
            self.mark_dirty(PlayerField::ResourceCounts);
        }
    }

    /// Number of serfs of one profession.
    #[must_use]
    pub fn serf_count(&self, serf_type: SerfType) -> u32 {
        self.serf_counts[serf_type.index()]
    }
}

state_record! {
    /// Resource and serf storage of a castle or stock.
    pub struct InventoryState in "inventory";
    pub enum InventoryField {
        /// Owning player.
        Owner => owner, set_owner: u32 = 0;
        /// Flag in front of the building.
        Flag => flag, set_flag: Option<u32> = None;
        /// Building holding the inventory.
        Building => building, set_building: Option<u32> = None;
        /// Stored resources per kind.
        Resources => resources, set_resources: [u32; Resource::COUNT] = [0; Resource::COUNT];
        /// Idle serfs per profession.
        Serfs => serfs, set_serfs: [u32; SerfType::COUNT] = [0; SerfType::COUNT];
        /// In/out mode bits for resources and serfs.
        ResourceDirection => res_dir, set_res_dir: u8 = 0;
        /// Generic serfs waiting for a profession.
        GenericCount => generic_count, set_generic_count: u32 = 0;
    }
}

impl InventoryState {
    /// Stores `amount` resources of one kind.
    pub fn push_resource(&mut self, resource: Resource, amount: u32) {
        if amount == 0 {
            return;
        }
        let slot = &mut self.resources[resource.index()];
        *slot = slot.saturating_add(amount);
        self.mark_dirty(InventoryField::Resources);
    }

    /// Removes one resource of a kind, failing when none is stored.
    pub fn pop_resource(&mut self, resource: Resource) -> bool {
        let slot = &mut self.resources[resource.index()];
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        self.mark_dirty(InventoryField::Resources);
        true
    }

    /// Registers an idle serf of one profession.
    pub fn add_serf(&mut self, serf_type: SerfType) {
        self.serfs[serf_type.index()] += 1;
        self.mark_dirty(InventoryField::Serfs);
    }

    /// Amount of one resource kind in storage.
    #[must_use]
    pub fn resource(&self, resource: Resource) -> u32 {
        self.resources[resource.index()]
    }
}

state_record! {
    /// State of a building.
    pub struct BuildingState in "building";
    pub enum BuildingField {
        /// Kind of building.
        Kind => building_type, set_building_type: BuildingType = BuildingType::Hut;
        /// Tile the building stands on.
        Position => position, set_position: MapPos = MapPos::from_raw(0);
        /// Owning player.
        Owner => owner, set_owner: u32 = 0;
        /// Flag in front of the building.
        Flag => flag, set_flag: Option<u32> = None;
        /// Inventory kept by castles and stocks.
        Inventory => inventory, set_inventory: Option<u32> = None;
        /// Serf occupying the building.
        Holder => holder, set_holder: Option<u32> = None;
        /// Construction progress.
        Progress => progress, set_progress: u32 = 0;
        /// Construction materials waiting on site (planks, stone).
        Stock => stock, set_stock: [u32; 2] = [0; 2];
        /// Whether the building is on fire.
        Burning => burning, set_burning: bool = false;
        /// Whether the building is finished and working.
        Active => active, set_active: bool = false;
    }
}

impl BuildingState {
    /// Adds construction material to one stock slot.
    pub fn add_stock(&mut self, slot: usize, amount: u32) {
        if let Some(stock) = self.stock.get_mut(slot) {
            *stock = stock.saturating_add(amount);
            self.mark_dirty(BuildingField::Stock);
        }
    }
}

state_record! {
    /// State of a flag.
    pub struct FlagState in "flag";
    pub enum FlagField {
        /// Tile the flag stands on.
        Position => position, set_position: MapPos = MapPos::from_raw(0);
        /// Owning player.
        Owner => owner, set_owner: u32 = 0;
        /// Directions with a road attached, one bit each.
        PathConnections => path_con, set_path_con: u8 = 0;
        /// Directions whose road ends at another flag or building.
        Endpoints => endpoints, set_endpoints: u8 = 0;
        /// Directions with a transporter assigned.
        Transporters => transporters, set_transporters: u8 = 0;
        /// Building attached up-left of the flag.
        Building => building, set_building: Option<u32> = None;
        /// Flag reached along the road in each direction.
        OtherEndpoints => other_endpoints, set_other_endpoints: [Option<u32>; 6] = [None; 6];
        /// Resources waiting for pickup.
        Slots => slots, set_slots: [Option<Resource>; FLAG_SLOTS] = [None; FLAG_SLOTS];
        /// Stamp of the last flag search that visited the flag.
        SearchNum => search_num, set_search_num: u32 = 0;
    }
}

impl FlagState {
    /// Connects the road leaving towards `dir` to another flag.
    pub fn link(&mut self, dir: Direction, other: Option<u32>) {
        let index = dir.index();
        if self.other_endpoints[index] != other {
            self.other_endpoints[index] = other;
            self.mark_dirty(FlagField::OtherEndpoints);
        }
        let path_con = if other.is_some() {
            self.path_con | dir.bit()
        } else {
            self.path_con & !dir.bit()
        };
        self.set_path_con(path_con);
    }

    /// Places a resource in the first free slot.
    pub fn place_resource(&mut self, resource: Resource) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) else {
            return false;
        };
        *slot = Some(resource);
        self.mark_dirty(FlagField::Slots);
        true
    }

    /// Takes the resource waiting in `slot`.
    pub fn take_resource(&mut self, slot: usize) -> Option<Resource> {
        let taken = self.slots.get_mut(slot)?.take();
        if taken.is_some() {
            self.mark_dirty(FlagField::Slots);
        }
        taken
    }

    /// Number of resources waiting.
    #[must_use]
    pub fn waiting_resources(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

state_record! {
    /// State of a serf.
    pub struct SerfState in "serf";
    pub enum SerfField {
        /// Profession.
        Kind => serf_type, set_serf_type: SerfType = SerfType::Transporter;
        /// Owning player.
        Owner => owner, set_owner: u32 = 0;
        /// Current activity.
        Activity => activity, set_activity: SerfActivity = SerfActivity::Idle;
        /// Tile the serf stands on.
        Position => position, set_position: MapPos = MapPos::from_raw(0);
        /// Tile the serf walks towards.
        Destination => destination, set_destination: Option<MapPos> = None;
        /// Building the serf works in.
        Building => building, set_building: Option<u32> = None;
        /// Inventory the serf belongs to.
        Inventory => inventory, set_inventory: Option<u32> = None;
        /// Tick of the last state update.
        Tick => tick, set_tick: u32 = 0;
        /// Countdown of the current activity.
        Counter => counter, set_counter: i32 = 0;
        /// Animation frame.
        Animation => animation, set_animation: u32 = 0;
        /// Resource being carried.
        Carrying => carrying, set_carrying: Option<Resource> = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Record;

    #[test]
    fn setters_only_mark_changed_fields() {
        let mut state = GameState::default();
        state.set_game_speed(DEFAULT_GAME_SPEED);
        assert!(!state.is_dirty());

        state.set_game_time(40);
        assert!(state.is_field_dirty(GameField::GameTime));
        assert!(!state.is_field_dirty(GameField::Tick));
        assert_eq!(state.dirty_fields().len(), 1);

        state.reset_dirty();
        assert!(!state.is_dirty());
        assert_eq!(state.game_time(), 40);
    }

    #[test]
    fn composite_mutators_mark_their_field() {
        let mut player = PlayerState::default();
        player.adjust_serf_count(SerfType::Knight, 3);
        player.adjust_serf_count(SerfType::Knight, -1);
        assert_eq!(player.serf_count(SerfType::Knight), 2);
        assert!(player.is_field_dirty(PlayerField::SerfCounts));
        assert!(!player.is_field_dirty(PlayerField::ResourceCounts));

        player.reset_dirty();
        player.adjust_resource_count(Resource::Gold, -5);
        assert!(!player.is_dirty(), "clamped no-op change must stay clean");
    }

    #[test]
    fn flag_links_update_path_connections() {
        let mut flag = FlagState::default();
        flag.link(Direction::Left, Some(4));
        assert_eq!(flag.path_con(), Direction::Left.bit());
        assert_eq!(flag.other_endpoints()[Direction::Left.index()], Some(4));
        flag.link(Direction::Left, None);
        assert_eq!(flag.path_con(), 0);
    }

    #[test]
    fn flag_slots_fill_in_order() {
        let mut flag = FlagState::default();
        assert!(flag.place_resource(Resource::Plank));
        assert!(flag.place_resource(Resource::Stone));
        assert_eq!(flag.waiting_resources(), 2);
        assert_eq!(flag.take_resource(0), Some(Resource::Plank));
        assert_eq!(flag.take_resource(0), None);
        assert!(flag.place_resource(Resource::Coal));
        assert_eq!(flag.slots()[0], Some(Resource::Coal));
    }

    #[test]
    fn inventory_refuses_to_pop_missing_resources() {
        let mut inventory = InventoryState::default();
        assert!(!inventory.pop_resource(Resource::Fish));
        assert!(!inventory.is_dirty());
        inventory.push_resource(Resource::Fish, 2);
        assert!(inventory.pop_resource(Resource::Fish));
        assert_eq!(inventory.resource(Resource::Fish), 1);
    }

    #[test]
    fn dirty_encode_is_smaller_than_full_encode() {
        let mut serf = SerfState::default();
        serf.set_counter(-3);

        let mut partial = Encoder::new();
        serf.encode(&mut partial, false).expect("encode");
        let mut full = Encoder::new();
        serf.encode(&mut full, true).expect("encode");
        assert!(partial.len() < full.len());

        let bytes = partial.into_bytes();
        let mut target = SerfState::default();
        target
            .decode(&mut Decoder::new(&bytes))
            .expect("decode");
        assert_eq!(target.counter(), -3);
        assert!(!target.is_dirty(), "decoding must not mark fields dirty");
    }

    #[test]
    fn unknown_field_bits_are_rejected() {
        let mut encoder = Encoder::new();
        encoder.write(&(1u64 << 40)).expect("encode");
        let bytes = encoder.into_bytes();
        let mut state = FlagState::default();
        assert!(matches!(
            state.decode(&mut Decoder::new(&bytes)),
            Err(CodecError::UnknownFields { record: "FlagState", .. })
        ));
    }

    #[test]
    fn text_fields_round_trip() {
        let mut building = BuildingState::default();
        building.set_building_type(BuildingType::Castle);
        building.set_inventory(Some(2));
        building.add_stock(1, 7);

        let mut restored = BuildingState::default();
        for (key, value) in building.text_fields() {
            restored
                .apply_text_field(key, &value)
                .expect("known field");
        }
        assert_eq!(restored, building);
        assert!(matches!(
            restored.apply_text_field("colour", "1"),
            Err(StateError::UnknownKey { .. })
        ));
    }
}
