//! Reader for the fixed-width big-endian binary saves.
//!
//! Layout, all integers big-endian:
//!
//! | part       | contents                                                        |
//! |------------|-----------------------------------------------------------------|
//! | header     | `"FSBN"`, version `u16`, map size `u8`                          |
//! | game       | game time, tick, const tick `u32`; random state `3 x u16`; gold total `u32`; game speed `u16` |
//! | tiles      | per tile in row order: height, object, paths, owner, water `u8` |
//! | players    | count `u16`, then index, face, color `3 x u8`, flags `u8`; castle position `u32`; castle inventory `u16`; knight morale, gold deposited `u32` |
//! | flags      | count `u16`, then index `u16`, position `u32`, owner, path connections, endpoints `u8`, building `u16`, slots `8 x u8` |
//! | buildings  | count `u16`, then index `u16`, type `u8`, position `u32`, owner `u8`, flag, inventory `u16`, progress `u32`, bits `u8` |
//! | inventories| count `u16`, then index `u16`, owner `u8`, flag, building `u16`, resources and serfs `u16` each |
//! | serfs      | count `u16`, then index `u16`, type, owner, activity `u8`, position `u32`, building, inventory `u16`, counter `i32` |
//!
//! Unset references are all-ones in their width.

use freeserf_core::{MapObject, MapPos, TerrainView, MAX_HEIGHT};
use freeserf_world::{
    BuildingType, Game, Map, Resource, SerfActivity, SerfType, FLAG_SLOTS,
};

use crate::SaveError;

/// Magic bytes opening a binary save.
pub const LEGACY_MAGIC: &[u8; 4] = b"FSBN";

/// Only layout version understood by [`read_legacy`].
pub const LEGACY_VERSION: u16 = 1;

const NONE_8: u8 = 0xff;
const NONE_16: u16 = 0xffff;
const NONE_32: u32 = 0xffff_ffff;

const BUILDING_BURNING: u8 = 1 << 0;
const BUILDING_ACTIVE: u8 = 1 << 1;

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> SaveError {
        SaveError::DataParse {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], SaveError> {
        let end = self.offset + N;
        let chunk = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| self.error(format!("need {N} more bytes")))?;
        let mut out = [0; N];
        out.copy_from_slice(chunk);
        self.offset = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, SaveError> {
        self.take::<1>().map(|[byte]| byte)
    }

    fn u16(&mut self) -> Result<u16, SaveError> {
        self.take().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, SaveError> {
        self.take().map(u32::from_be_bytes)
    }

    fn i32(&mut self) -> Result<i32, SaveError> {
        self.take().map(i32::from_be_bytes)
    }

    fn opt_u8(&mut self) -> Result<Option<u8>, SaveError> {
        self.u8().map(|value| (value != NONE_8).then_some(value))
    }

    fn opt_u16(&mut self) -> Result<Option<u32>, SaveError> {
        self.u16()
            .map(|value| (value != NONE_16).then_some(u32::from(value)))
    }

    fn opt_u32(&mut self) -> Result<Option<u32>, SaveError> {
        self.u32().map(|value| (value != NONE_32).then_some(value))
    }

    fn coded<T>(&mut self, kind: &str, decode: fn(u8) -> Option<T>) -> Result<T, SaveError> {
        let code = self.u8()?;
        decode(code).ok_or_else(|| self.error(format!("unknown {kind} code {code}")))
    }

    fn position(&mut self, map: &Map) -> Result<MapPos, SaveError> {
        let raw = self.u32()?;
        let geometry = map.geometry();
        let pos = MapPos::from_raw(raw);
        if geometry.pos(geometry.pos_column(pos), geometry.pos_row(pos)) != pos {
            return Err(self.error(format!("position {raw:#x} lies outside the map")));
        }
        Ok(pos)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}

/// Reports whether `bytes` start like a binary save.
#[must_use]
pub fn is_legacy(bytes: &[u8]) -> bool {
    bytes.starts_with(LEGACY_MAGIC)
}

/// Reads a binary save into a fresh game with no dirty marks.
pub fn read_legacy(bytes: &[u8]) -> Result<Game, SaveError> {
    let mut reader = ByteReader::new(bytes);
    if reader.take::<4>()? != *LEGACY_MAGIC {
        return Err(SaveError::DataParse {
            offset: 0,
            reason: "missing FSBN magic".to_owned(),
        });
    }
    let version = reader.u16()?;
    if version != LEGACY_VERSION {
        return Err(reader.error(format!("unsupported layout version {version}")));
    }
    let size = u32::from(reader.u8()?);
    let map = Map::new(size).map_err(|error| reader.error(error.to_string()))?;
    let mut game = Game::with_map(map);

    read_game_fields(&mut reader, &mut game)?;
    read_tiles(&mut reader, game.map_mut())?;
    read_players(&mut reader, &game)?;
    read_flags(&mut reader, &game)?;
    read_buildings(&mut reader, &game)?;
    read_inventories(&mut reader, &game)?;
    read_serfs(&mut reader, &game)?;

    if reader.remaining() != 0 {
        return Err(reader.error(format!("{} trailing bytes", reader.remaining())));
    }
    game.reset_dirty();
    Ok(game)
}

fn read_game_fields(reader: &mut ByteReader<'_>, game: &mut Game) -> Result<(), SaveError> {
    let state = game.state_mut();
    state.set_game_time(reader.u32()?);
    state.set_tick(reader.u32()?);
    state.set_const_tick(reader.u32()?);
    state.set_random_state([reader.u16()?, reader.u16()?, reader.u16()?]);
    state.set_gold_total(reader.u32()?);
    state.set_game_speed(u32::from(reader.u16()?));
    Ok(())
}

fn read_tiles(reader: &mut ByteReader<'_>, map: &mut Map) -> Result<(), SaveError> {
    let geometry = map.geometry().clone();
    for row in 0..geometry.rows() {
        for column in 0..geometry.columns() {
            let pos = geometry.pos(column, row);
            let height = u32::from(reader.u8()?);
            if height > MAX_HEIGHT {
                return Err(reader.error(format!("height {height} at {pos} exceeds {MAX_HEIGHT}")));
            }
            map.set_height(pos, height)
                .map_err(|error| reader.error(error.to_string()))?;
            let object = reader.coded("map object", MapObject::from_code)?;
            map.set_object(pos, object);
            map.set_paths(pos, reader.u8()? & 0x3f);
            map.set_owner(pos, reader.opt_u8()?);
            map.set_water(pos, reader.u8()? != 0);
        }
    }
    Ok(())
}

fn read_players(reader: &mut ByteReader<'_>, game: &Game) -> Result<(), SaveError> {
    for _ in 0..reader.u16()? {
        let index = u32::from(reader.u8()?);
        let handle = game
            .players()
            .get_or_insert(index)
            .map_err(|error| reader.error(error.to_string()))?;
        let mut player = handle.write();
        let state = player.state_mut();
        state.set_face(reader.u8()?);
        state.set_color([reader.u8()?, reader.u8()?, reader.u8()?]);
        state.set_flags(reader.u8()?);
        state.set_castle_position(reader.opt_u32()?.map(MapPos::from_raw));
        state.set_castle_inventory(reader.opt_u16()?);
        state.set_knight_morale(reader.u32()?);
        state.set_gold_deposited(reader.u32()?);
    }
    Ok(())
}

fn read_flags(reader: &mut ByteReader<'_>, game: &Game) -> Result<(), SaveError> {
    for _ in 0..reader.u16()? {
        let index = u32::from(reader.u16()?);
        let position = reader.position(game.map())?;
        let handle = game
            .flags()
            .get_or_insert(index)
            .map_err(|error| reader.error(error.to_string()))?;
        let mut flag = handle.write();
        let state = flag.state_mut();
        state.set_position(position);
        state.set_owner(u32::from(reader.u8()?));
        state.set_path_con(reader.u8()? & 0x3f);
        state.set_endpoints(reader.u8()? & 0x3f);
        state.set_building(reader.opt_u16()?);
        let mut slots = [None; FLAG_SLOTS];
        for slot in &mut slots {
            *slot = match reader.u8()? {
                NONE_8 => None,
                code => Some(
                    Resource::from_code(code)
                        .ok_or_else(|| reader.error(format!("unknown resource code {code}")))?,
                ),
            };
        }
        state.set_slots(slots);
    }
    Ok(())
}

fn read_buildings(reader: &mut ByteReader<'_>, game: &Game) -> Result<(), SaveError> {
    for _ in 0..reader.u16()? {
        let index = u32::from(reader.u16()?);
        let building_type = reader.coded("building type", BuildingType::from_code)?;
        let position = reader.position(game.map())?;
        let handle = game
            .buildings()
            .get_or_insert(index)
            .map_err(|error| reader.error(error.to_string()))?;
        let mut building = handle.write();
        let state = building.state_mut();
        state.set_building_type(building_type);
        state.set_position(position);
        state.set_owner(u32::from(reader.u8()?));
        state.set_flag(reader.opt_u16()?);
        state.set_inventory(reader.opt_u16()?);
        state.set_progress(reader.u32()?);
        let bits = reader.u8()?;
        state.set_burning(bits & BUILDING_BURNING != 0);
        state.set_active(bits & BUILDING_ACTIVE != 0);
    }
    Ok(())
}

fn read_inventories(reader: &mut ByteReader<'_>, game: &Game) -> Result<(), SaveError> {
    for _ in 0..reader.u16()? {
        let index = u32::from(reader.u16()?);
        let handle = game
            .inventories()
            .get_or_insert(index)
            .map_err(|error| reader.error(error.to_string()))?;
        let mut inventory = handle.write();
        let state = inventory.state_mut();
        state.set_owner(u32::from(reader.u8()?));
        state.set_flag(reader.opt_u16()?);
        state.set_building(reader.opt_u16()?);
        let mut resources = [0; Resource::COUNT];
        for amount in &mut resources {
            *amount = u32::from(reader.u16()?);
        }
        state.set_resources(resources);
        let mut serfs = [0; SerfType::COUNT];
        for count in &mut serfs {
            *count = u32::from(reader.u16()?);
        }
        state.set_serfs(serfs);
    }
    Ok(())
}

fn read_serfs(reader: &mut ByteReader<'_>, game: &Game) -> Result<(), SaveError> {
    for _ in 0..reader.u16()? {
        let index = u32::from(reader.u16()?);
        let serf_type = reader.coded("serf type", SerfType::from_code)?;
        let owner = u32::from(reader.u8()?);
        let activity = reader.coded("serf activity", SerfActivity::from_code)?;
        let position = reader.position(game.map())?;
        let handle = game
            .serfs()
            .get_or_insert(index)
            .map_err(|error| reader.error(error.to_string()))?;
        let mut serf = handle.write();
        let state = serf.state_mut();
        state.set_serf_type(serf_type);
        state.set_owner(owner);
        state.set_activity(activity);
        state.set_position(position);
        state.set_building(reader.opt_u16()?);
        state.set_inventory(reader.opt_u16()?);
        state.set_counter(reader.i32()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_decodes_big_endian() {
        let mut reader = ByteReader::new(&[0x12, 0x34, 0x00, 0x00, 0x01, 0x00, 0xff, 0xff]);
        assert_eq!(reader.u16().expect("two bytes"), 0x1234);
        assert_eq!(reader.u32().expect("four bytes"), 0x100);
        assert_eq!(reader.opt_u16().expect("two bytes"), None);
        assert!(matches!(
            reader.u8(),
            Err(SaveError::DataParse { offset: 8, .. })
        ));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        assert!(!is_legacy(b"[game]\n"));
        assert!(matches!(
            read_legacy(b"FSXX\x00\x01\x00"),
            Err(SaveError::DataParse { offset: 0, .. })
        ));
    }

    #[test]
    fn unknown_versions_are_rejected() {
        assert!(matches!(
            read_legacy(b"FSBN\x00\x07\x03"),
            Err(SaveError::DataParse { offset: 6, .. })
        ));
    }
}
