#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Freeserf simulation crates.
//!
//! This crate owns the toroidal hex-grid geometry every other crate speaks:
//! packed [`MapPos`] values, the six [`Direction`]s and their rotational
//! cycles, [`Road`]s, and the [`TerrainView`] contract through which systems
//! such as the pathfinder read the authoritative terrain without depending on
//! the world crate.

mod direction;
mod geometry;
mod road;

pub use direction::{try_turn, Direction, DirectionCycle, DirectionCycleIter, Rotation};
pub use geometry::{spiral_len, step_distance, MapGeometry, MapPos, Spiral, MAX_MAP_SIZE};
pub use road::{Road, MAX_ROAD_LENGTH};

/// Length of one simulation tick in milliseconds.
pub const TICK_LENGTH: u32 = 20;

/// Game time units advanced per tick at normal speed.
pub const DEFAULT_GAME_SPEED: u32 = 2;

/// Highest terrain height a tile may carry.
pub const MAX_HEIGHT: u32 = 31;

/// Configuration errors raised by geometry primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// Map sizes above [`MAX_MAP_SIZE`] overflow a packed position.
    #[error("map size {size} exceeds the maximum of {MAX_MAP_SIZE}")]
    MapTooLarge {
        /// Requested size.
        size: u32,
    },
    /// A rotation was requested on an unset direction.
    #[error("cannot rotate an unset direction")]
    NoDirection,
}

/// Static object occupying a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MapObject {
    /// Nothing on the tile.
    #[default]
    None,
    /// Road junction flag.
    Flag,
    /// Small building such as a hut or mill.
    SmallBuilding,
    /// Large building such as a farm or fortress.
    LargeBuilding,
    /// A player's castle.
    Castle,
    /// Tree.
    Tree,
    /// Stone deposit.
    Stone,
    /// Planted field.
    Field,
}

impl MapObject {
    const ALL: [MapObject; 8] = [
        MapObject::None,
        MapObject::Flag,
        MapObject::SmallBuilding,
        MapObject::LargeBuilding,
        MapObject::Castle,
        MapObject::Tree,
        MapObject::Stone,
        MapObject::Field,
    ];

    /// Stable numeric code used by save formats.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Resolves a numeric code written by [`MapObject::code`].
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Reports whether roads may be routed across the tile.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(self, Self::None | Self::Flag)
    }
}

/// Read-only terrain queries consumed by systems.
pub trait TerrainView {
    /// Geometry of the map.
    fn geometry(&self) -> &MapGeometry;

    /// Terrain height at `pos`.
    fn height(&self, pos: MapPos) -> u32;

    /// Object occupying `pos`.
    fn object(&self, pos: MapPos) -> MapObject;

    /// Reports whether a flag stands at `pos`.
    fn has_flag(&self, pos: MapPos) -> bool {
        self.object(pos) == MapObject::Flag
    }

    /// Reports whether a road may step from `pos` towards `dir`.
    fn is_road_segment_valid(&self, pos: MapPos, dir: Direction) -> bool;
}

#[cfg(test)]
mod tests {
    use super::MapObject;

    #[test]
    fn map_object_codes_round_trip() {
        for code in 0..8 {
            let object = MapObject::from_code(code).expect("known code");
            assert_eq!(object.code(), code);
        }
        assert_eq!(MapObject::from_code(8), None);
    }

    #[test]
    fn only_flags_and_empty_tiles_are_passable() {
        assert!(MapObject::None.is_passable());
        assert!(MapObject::Flag.is_passable());
        assert!(!MapObject::Tree.is_passable());
        assert!(!MapObject::Castle.is_passable());
    }
}
