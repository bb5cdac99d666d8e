//! Terrain tiles of the toroidal map.

use freeserf_core::{
    Direction, GeometryError, MapGeometry, MapObject, MapPos, Road, TerrainView, MAX_HEIGHT,
};

/// Errors raised while editing the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    /// The map size was rejected by the geometry.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// A height above [`MAX_HEIGHT`] was requested.
    #[error("height {height} at {pos} exceeds {MAX_HEIGHT}")]
    HeightOutOfRange {
        /// Tile being edited.
        pos: MapPos,
        /// Rejected height.
        height: u32,
    },
    /// A road without a source cannot be laid.
    #[error("road has no source position")]
    RoadWithoutSource,
}

/// Contents of one tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tile {
    /// Terrain height in `0..=MAX_HEIGHT`.
    pub height: u8,
    /// Object standing on the tile.
    pub object: MapObject,
    /// Road segments leaving the tile, one bit per direction.
    pub paths: u8,
    /// Player owning the tile.
    pub owner: Option<u8>,
    /// Whether the tile is water.
    pub water: bool,
}

/// Terrain of the whole map.
#[derive(Clone, Debug)]
pub struct Map {
    geometry: MapGeometry,
    tiles: Vec<Tile>,
}

impl Map {
    /// Creates a flat, empty map of the given size.
    pub fn new(size: u32) -> Result<Self, MapError> {
        Ok(Self::with_geometry(MapGeometry::new(size)?))
    }

    /// Creates a flat, empty map over an existing geometry.
    #[must_use]
    pub fn with_geometry(geometry: MapGeometry) -> Self {
        Self {
            tiles: vec![Tile::default(); geometry.tile_count()],
            geometry,
        }
    }

    /// Tile at `pos`.
    #[must_use]
    pub fn tile(&self, pos: MapPos) -> &Tile {
        &self.tiles[self.geometry.index(pos)]
    }

    fn tile_mut(&mut self, pos: MapPos) -> &mut Tile {
        let index = self.geometry.index(pos);
        &mut self.tiles[index]
    }

    /// Sets the terrain height at `pos`.
    pub fn set_height(&mut self, pos: MapPos, height: u32) -> Result<(), MapError> {
        let height = u8::try_from(height)
            .ok()
            .filter(|height| u32::from(*height) <= MAX_HEIGHT)
            .ok_or(MapError::HeightOutOfRange { pos, height })?;
        self.tile_mut(pos).height = height;
        Ok(())
    }

    /// Places `object` at `pos`.
    pub fn set_object(&mut self, pos: MapPos, object: MapObject) {
        self.tile_mut(pos).object = object;
    }

    /// Assigns `pos` to a player, or clears ownership.
    pub fn set_owner(&mut self, pos: MapPos, owner: Option<u8>) {
        self.tile_mut(pos).owner = owner;
    }

    /// Marks `pos` as water or land.
    pub fn set_water(&mut self, pos: MapPos, water: bool) {
        self.tile_mut(pos).water = water;
    }

    /// Path bits leaving `pos`.
    #[must_use]
    pub fn paths(&self, pos: MapPos) -> u8 {
        self.tile(pos).paths
    }

    /// Overwrites the path bits of `pos`.
    pub fn set_paths(&mut self, pos: MapPos, paths: u8) {
        self.tile_mut(pos).paths = paths & 0x3f;
    }

    /// Connects `pos` with its neighbour towards `dir` on both ends.
    pub fn add_path(&mut self, pos: MapPos, dir: Direction) {
        let other = self.geometry.move_dir(pos, dir);
        self.tile_mut(pos).paths |= dir.bit();
        self.tile_mut(other).paths |= dir.reverse().bit();
    }

    /// Marks every segment of `road` as a path.
    pub fn build_road(&mut self, road: &Road) -> Result<(), MapError> {
        let mut pos = road.source().ok_or(MapError::RoadWithoutSource)?;
        for &dir in road.dirs() {
            self.add_path(pos, dir);
            pos = self.geometry.move_dir(pos, dir);
        }
        Ok(())
    }
}

impl TerrainView for Map {
    fn geometry(&self) -> &MapGeometry {
        &self.geometry
    }

    fn height(&self, pos: MapPos) -> u32 {
        u32::from(self.tile(pos).height)
    }

    fn object(&self, pos: MapPos) -> MapObject {
        self.tile(pos).object
    }

    fn is_road_segment_valid(&self, pos: MapPos, dir: Direction) -> bool {
        let other = self.geometry.move_dir(pos, dir);
        let from = self.tile(pos);
        let to = self.tile(other);

        if to.paths != 0 && to.object != MapObject::Flag {
            return false;
        }
        if !to.object.is_passable() {
            return false;
        }
        if from.owner != to.owner {
            return false;
        }
        if from.water != to.water
            && from.object != MapObject::Flag
            && to.object != MapObject::Flag
        {
            return false;
        }
        true
    }
}
