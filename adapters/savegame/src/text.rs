//! INI-like text save format.
//!
//! ```text
//! [game]
//! game_time = 120
//! [map]
//! size = 3
//! [row 0]
//! height = 0,0,1,...
//! [free]
//! serf = 3
//! [player 0]
//! face = 2
//! ```
//!
//! Numbered sections carry the entity index after the section name. Lists
//! are comma-joined, unset optional values are left empty, and lines
//! starting with `#` or `;` are ignored. The `[free]` section keeps the
//! recycled indices of each collection so that reloaded games allocate the
//! same indices as the game that was saved.

use std::fmt::Write as _;

use freeserf_core::{MapObject, TerrainView};
use freeserf_world::{Collection, Game, GameObject, Map, Object, Record};

use crate::SaveError;

/// Version written to the `[game]` section.
pub const TEXT_VERSION: u32 = 1;

const ROW_KEYS: [&str; 5] = ["height", "object", "paths", "owner", "water"];

/// Renders `game` in the text save format.
#[must_use]
pub fn write_text(game: &Game) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# freeserf save");
    let _ = writeln!(out, "[game]");
    let _ = writeln!(out, "version = {TEXT_VERSION}");
    write_fields(&mut out, game.state());

    let map = game.map();
    let geometry = map.geometry();
    let _ = writeln!(out, "\n[map]");
    let _ = writeln!(out, "size = {}", geometry.size());

    for row in 0..geometry.rows() {
        let tiles: Vec<_> = (0..geometry.columns())
            .map(|column| map.tile(geometry.pos(column, row)))
            .collect();
        let _ = writeln!(out, "\n[row {row}]");
        let _ = writeln!(out, "height = {}", join(tiles.iter().map(|tile| tile.height)));
        let _ = writeln!(
            out,
            "object = {}",
            join(tiles.iter().map(|tile| tile.object.code()))
        );
        let _ = writeln!(out, "paths = {}", join(tiles.iter().map(|tile| tile.paths)));
        let _ = writeln!(
            out,
            "owner = {}",
            tiles
                .iter()
                .map(|tile| tile.owner.map(|owner| owner.to_string()).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(",")
        );
        let _ = writeln!(
            out,
            "water = {}",
            join(tiles.iter().map(|tile| u8::from(tile.water)))
        );
    }

    let _ = writeln!(out, "\n[free]");
    write_free(&mut out, game.players());
    write_free(&mut out, game.inventories());
    write_free(&mut out, game.buildings());
    write_free(&mut out, game.flags());
    write_free(&mut out, game.serfs());

    write_collection(&mut out, game.players());
    write_collection(&mut out, game.inventories());
    write_collection(&mut out, game.buildings());
    write_collection(&mut out, game.flags());
    write_collection(&mut out, game.serfs());
    out
}

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values.map(|value| value.to_string()).collect::<Vec<_>>().join(",")
}

fn write_fields<S: Record>(out: &mut String, record: &S) {
    for (key, value) in record.text_fields() {
        let _ = writeln!(out, "{key} = {value}");
    }
}

fn write_free<S: Record>(out: &mut String, collection: &Collection<Object<S>>) {
    let _ = writeln!(out, "{} = {}", S::SECTION, join(collection.free_indices().into_iter()));
}

fn write_collection<S: Record>(out: &mut String, collection: &Collection<Object<S>>) {
    for handle in collection.to_list() {
        let object = handle.read();
        let _ = writeln!(out, "\n[{} {}]", S::SECTION, object.index());
        write_fields(out, object.state());
    }
}

#[derive(Debug)]
struct Section {
    line: usize,
    name: String,
    number: Option<u32>,
    entries: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    line: usize,
    key: String,
    value: String,
}

fn parse_error(line: usize, reason: impl Into<String>) -> SaveError {
    SaveError::Parse {
        line,
        reason: reason.into(),
    }
}

fn parse_sections(input: &str) -> Result<Vec<Section>, SaveError> {
    let mut sections: Vec<Section> = Vec::new();
    for (offset, raw) in input.lines().enumerate() {
        let line = offset + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') || text.starts_with(';') {
            continue;
        }
        if !text.is_ascii() {
            return Err(parse_error(line, "non-ASCII content"));
        }

        if let Some(header) = text.strip_prefix('[') {
            let header = header
                .strip_suffix(']')
                .ok_or_else(|| parse_error(line, "unterminated section header"))?
                .trim();
            let (name, number) = match header.split_once(' ') {
                Some((name, number)) => {
                    let number = number
                        .trim()
                        .parse()
                        .map_err(|_| parse_error(line, format!("bad section number `{number}`")))?;
                    (name, Some(number))
                }
                None => (header, None),
            };
            sections.push(Section {
                line,
                name: name.to_owned(),
                number,
                entries: Vec::new(),
            });
            continue;
        }

        let (key, value) = text
            .split_once('=')
            .ok_or_else(|| parse_error(line, "expected `key = value`"))?;
        let section = sections
            .last_mut()
            .ok_or_else(|| parse_error(line, "value outside of a section"))?;
        section.entries.push(Entry {
            line,
            key: key.trim().to_owned(),
            value: value.trim().to_owned(),
        });
    }
    Ok(sections)
}

fn apply_fields<S: Record>(record: &mut S, section: &Section) -> Result<(), SaveError> {
    for entry in &section.entries {
        record
            .apply_text_field(&entry.key, &entry.value)
            .map_err(|error| parse_error(entry.line, error.to_string()))?;
    }
    Ok(())
}

fn load_objects<S: Record>(
    collection: &Collection<Object<S>>,
    section: &Section,
) -> Result<(), SaveError> {
    let index = section
        .number
        .ok_or_else(|| parse_error(section.line, format!("[{}] needs an index", section.name)))?;
    if collection.contains(index) {
        return Err(parse_error(
            section.line,
            format!("duplicate section [{} {index}]", section.name),
        ));
    }
    let handle = collection
        .get_or_insert(index)
        .map_err(|error| parse_error(section.line, error.to_string()))?;
    let mut object = handle.write();
    apply_fields(object.state_mut(), section)
}

fn load_free<S: Record>(
    collection: &Collection<Object<S>>,
    entry: &Entry,
) -> Result<(), SaveError> {
    let mut free = Vec::new();
    for item in entry.value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let index: u32 = item
            .parse()
            .map_err(|_| parse_error(entry.line, format!("bad free {} index `{item}`", entry.key)))?;
        if collection.contains(index) {
            return Err(parse_error(
                entry.line,
                format!("free {} index {index} is in use", entry.key),
            ));
        }
        free.push(index);
    }
    collection
        .set_free_indices(free)
        .map_err(|error| parse_error(entry.line, error.to_string()))
}

fn load_free_section(game: &Game, section: &Section) -> Result<(), SaveError> {
    for entry in &section.entries {
        match entry.key.as_str() {
            "player" => load_free(game.players(), entry)?,
            "inventory" => load_free(game.inventories(), entry)?,
            "building" => load_free(game.buildings(), entry)?,
            "flag" => load_free(game.flags(), entry)?,
            "serf" => load_free(game.serfs(), entry)?,
            key => return Err(parse_error(entry.line, format!("unknown free list `{key}`"))),
        }
    }
    Ok(())
}

fn parse_list<T: std::str::FromStr>(
    entry: &Entry,
    expected: usize,
) -> Result<Vec<T>, SaveError> {
    let values = entry
        .value
        .split(',')
        .map(|item| {
            item.trim()
                .parse()
                .map_err(|_| parse_error(entry.line, format!("bad {} value `{item}`", entry.key)))
        })
        .collect::<Result<Vec<T>, _>>()?;
    if values.len() != expected {
        return Err(parse_error(
            entry.line,
            format!("{} lists {} tiles, expected {expected}", entry.key, values.len()),
        ));
    }
    Ok(values)
}

fn load_row(map: &mut Map, section: &Section) -> Result<(), SaveError> {
    let geometry = map.geometry().clone();
    let row = section
        .number
        .filter(|row| *row < geometry.rows())
        .ok_or_else(|| parse_error(section.line, "row index out of range"))?;
    let columns = geometry.columns() as usize;
    let position = |column: usize| geometry.pos(column as u32, row);

    for entry in &section.entries {
        match entry.key.as_str() {
            "height" => {
                for (column, height) in parse_list::<u32>(entry, columns)?.into_iter().enumerate() {
                    map.set_height(position(column), height)
                        .map_err(|error| parse_error(entry.line, error.to_string()))?;
                }
            }
            "object" => {
                for (column, code) in parse_list::<u8>(entry, columns)?.into_iter().enumerate() {
                    let object = MapObject::from_code(code)
                        .ok_or_else(|| parse_error(entry.line, format!("unknown object {code}")))?;
                    map.set_object(position(column), object);
                }
            }
            "paths" => {
                for (column, paths) in parse_list::<u8>(entry, columns)?.into_iter().enumerate() {
                    map.set_paths(position(column), paths);
                }
            }
            "owner" => {
                let owners: Vec<&str> = entry.value.split(',').collect();
                if owners.len() != columns {
                    return Err(parse_error(entry.line, "owner list has the wrong length"));
                }
                for (column, owner) in owners.into_iter().enumerate() {
                    let owner = match owner.trim() {
                        "" => None,
                        text => Some(text.parse().map_err(|_| {
                            parse_error(entry.line, format!("bad owner `{text}`"))
                        })?),
                    };
                    map.set_owner(position(column), owner);
                }
            }
            "water" => {
                for (column, water) in parse_list::<u8>(entry, columns)?.into_iter().enumerate() {
                    map.set_water(position(column), water != 0);
                }
            }
            key => {
                return Err(parse_error(
                    entry.line,
                    format!("unknown row key `{key}`, expected one of {ROW_KEYS:?}"),
                ))
            }
        }
    }
    Ok(())
}

/// Parses a game written by [`write_text`].
pub fn read_text(input: &str) -> Result<Game, SaveError> {
    let sections = parse_sections(input)?;

    let game_section = sections
        .iter()
        .find(|section| section.name == "game" && section.number.is_none())
        .ok_or_else(|| parse_error(1, "missing [game] section"))?;
    let map_section = sections
        .iter()
        .find(|section| section.name == "map" && section.number.is_none())
        .ok_or_else(|| parse_error(1, "missing [map] section"))?;

    let size_entry = map_section
        .entries
        .iter()
        .find(|entry| entry.key == "size")
        .ok_or_else(|| parse_error(map_section.line, "[map] has no size"))?;
    let size: u32 = size_entry
        .value
        .parse()
        .map_err(|_| parse_error(size_entry.line, "bad map size"))?;
    let mut map = Map::new(size).map_err(|error| parse_error(size_entry.line, error.to_string()))?;

    for section in sections.iter().filter(|section| section.name == "row") {
        load_row(&mut map, section)?;
    }

    let mut game = Game::with_map(map);
    for entry in &game_section.entries {
        if entry.key == "version" {
            if entry.value != TEXT_VERSION.to_string() {
                return Err(parse_error(
                    entry.line,
                    format!("unsupported save version {}", entry.value),
                ));
            }
            continue;
        }
        game.state_mut()
            .apply_text_field(&entry.key, &entry.value)
            .map_err(|error| parse_error(entry.line, error.to_string()))?;
    }

    for section in &sections {
        match section.name.as_str() {
            "game" | "map" | "row" | "free" => {}
            "player" => load_objects(game.players(), section)?,
            "inventory" => load_objects(game.inventories(), section)?,
            "building" => load_objects(game.buildings(), section)?,
            "flag" => load_objects(game.flags(), section)?,
            "serf" => load_objects(game.serfs(), section)?,
            other => {
                return Err(parse_error(
                    section.line,
                    format!("unknown section [{other}]"),
                ))
            }
        }
    }

    for section in sections.iter().filter(|section| section.name == "free") {
        load_free_section(&game, section)?;
    }

    game.reset_dirty();
    Ok(game)
}
