#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter driving the Freeserf simulation crates.

mod config;
mod frame_transfer;
mod terrain;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use freeserf_core::{MapGeometry, MapObject, MapPos, TerrainView};
use freeserf_rendering::CoordinateSpace;
use freeserf_savegame::GameStore;
use freeserf_system_pathfinder::{actual_cost, Pathfinder};
use freeserf_system_sync::{GameStateSerializer, SavedGameState};
use freeserf_world::{query, read_state, BuildingType, Game, Resource, SerfType};
use glam::IVec2;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::CliConfig;

/// Colors handed to new players in order.
const PLAYER_COLORS: [[u8; 3]; 4] = [
    [0x00, 0xe3, 0xe3],
    [0xcf, 0x63, 0x63],
    [0xdf, 0x7f, 0xef],
    [0xef, 0xef, 0x8f],
];

#[derive(Debug, Parser)]
#[command(name = "freeserf", about = "Freeserf simulation tools", version)]
struct Cli {
    /// TOML config file; `freeserf.toml` is read when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding save files, overriding the config.
    #[arg(long, global = true)]
    save_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Find a road across generated terrain.
    Path {
        /// Start tile as `column,row`.
        #[arg(long, value_parser = parse_tile)]
        from: (u32, u32),
        /// End tile as `column,row`.
        #[arg(long, value_parser = parse_tile)]
        to: (u32, u32),
        /// Map size, overriding the config.
        #[arg(long)]
        size: Option<u32>,
        /// Terrain seed, overriding the config.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Create a small game with one castle per player and save it.
    NewGame {
        /// Save name.
        #[arg(long)]
        name: String,
        /// Number of players.
        #[arg(long, default_value_t = 2)]
        players: u32,
    },
    /// Print the entity counts of a save.
    Inspect {
        /// Save name.
        name: String,
    },
    /// Print a full and a delta sync frame for a save.
    Sync {
        /// Save name.
        name: String,
        /// Ticks to advance between the two frames.
        #[arg(long, default_value_t = 1)]
        ticks: u32,
    },
    /// List the saves in the save folder.
    List,
}

fn parse_tile(value: &str) -> Result<(u32, u32), String> {
    let (column, row) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `column,row`, got `{value}`"))?;
    let column = column
        .trim()
        .parse()
        .map_err(|_| format!("invalid column `{column}`"))?;
    let row = row.trim().parse().map_err(|_| format!("invalid row `{row}`"))?;
    Ok((column, row))
}

/// Entry point for the Freeserf command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let store = GameStore::new(
        cli.save_folder
            .clone()
            .unwrap_or_else(|| config.save_folder.clone()),
    );

    match cli.command {
        Command::Path {
            from,
            to,
            size,
            seed,
        } => run_path(
            size.unwrap_or(config.map_size),
            seed.unwrap_or(config.map_seed),
            from,
            to,
        ),
        Command::NewGame { name, players } => run_new_game(&store, &config, &name, players),
        Command::Inspect { name } => run_inspect(&store, &name),
        Command::Sync { name, ticks } => run_sync(&store, &name, ticks),
        Command::List => {
            for name in store.list_saves()? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn run_path(size: u32, seed: u64, from: (u32, u32), to: (u32, u32)) -> Result<()> {
    let geometry = MapGeometry::new(size)?;
    let start = wrapped_tile(&geometry, from)?;
    let end = wrapped_tile(&geometry, to)?;
    let map = terrain::generate(size, seed, &[start, end])?;

    let road = Pathfinder::new().find_path(&map, start, end, None)?;
    if !road.is_valid() {
        println!("no road from {start} to {end}");
        return Ok(());
    }

    let space = CoordinateSpace::new(map.geometry().clone());
    let mut cost = 0;
    let mut pos = start;
    println!("road from {start} to {end}, {} segments", road.len());
    for dir in road.dirs() {
        cost += actual_cost(&map, pos, *dir)?;
        pos = map.geometry().move_dir(pos, *dir);
        let IVec2 { x, y } = space.tile_space_to_map_space(&map, pos);
        println!(
            "  {dir:?} -> ({}, {}) height {} at pixel ({x}, {y})",
            map.geometry().pos_column(pos),
            map.geometry().pos_row(pos),
            map.height(pos)
        );
    }
    println!("total cost {cost}");
    Ok(())
}

fn wrapped_tile(geometry: &MapGeometry, (column, row): (u32, u32)) -> Result<MapPos> {
    if column >= geometry.columns() || row >= geometry.rows() {
        bail!(
            "tile {column},{row} lies outside the {}x{} map",
            geometry.columns(),
            geometry.rows()
        );
    }
    Ok(geometry.pos(column, row))
}

fn run_new_game(store: &GameStore, config: &CliConfig, name: &str, players: u32) -> Result<()> {
    if players == 0 || players as usize > PLAYER_COLORS.len() {
        bail!("a game holds 1 to {} players", PLAYER_COLORS.len());
    }
    let map = terrain::generate(config.map_size, config.map_seed, &[])?;
    let mut game = Game::with_map(map);
    let geometry = game.geometry().clone();

    for (index, color) in PLAYER_COLORS.into_iter().take(players as usize).enumerate() {
        let player = game.add_player(index as u8, color);
        let column = geometry.columns() / players * index as u32 + geometry.columns() / 8;
        let castle_pos = geometry.pos(column, geometry.rows() / 2);
        let flag_pos = geometry.move_down_right(castle_pos);
        game.map_mut().set_object(castle_pos, MapObject::None);
        game.map_mut().set_object(flag_pos, MapObject::None);
        let castle = game
            .build_building(player, BuildingType::Castle, castle_pos)
            .with_context(|| format!("failed to place the castle of player {player}"))?;

        for (offset, serf_type) in [SerfType::Transporter, SerfType::Builder, SerfType::Knight]
            .into_iter()
            .enumerate()
        {
            let _ = game.spawn_serf(player, serf_type, geometry.pos_add(flag_pos, offset as i32, 1))?;
        }
        if let Some(inventory) = read_state(&game.buildings().require(castle)?).inventory() {
            let handle = game.inventories().require(inventory)?;
            let mut inventory = handle.write();
            inventory.state_mut().push_resource(Resource::Plank, 20);
            inventory.state_mut().push_resource(Resource::Stone, 10);
        }
    }

    game.advance(1);
    game.reset_dirty();
    if !store.save(&game, name) {
        bail!("could not save `{name}` to {}", store.folder().display());
    }
    println!("saved {name} with {players} players");
    Ok(())
}

fn load(store: &GameStore, name: &str) -> Result<Game> {
    match store.load_named(name) {
        Some(game) => Ok(game),
        None => bail!("could not load `{name}` from {}", store.folder().display()),
    }
}

fn run_inspect(store: &GameStore, name: &str) -> Result<()> {
    let game = load(store, name)?;
    let counts = query::collection_counts(&game);
    let geometry = game.geometry();
    println!(
        "{name}: {}x{} map, game time {}",
        geometry.columns(),
        geometry.rows(),
        game.state().game_time()
    );
    println!("  players:     {}", counts.players);
    println!("  inventories: {}", counts.inventories);
    println!("  buildings:   {}", counts.buildings);
    println!("  flags:       {}", counts.flags);
    println!("  serfs:       {}", counts.serfs);
    Ok(())
}

fn run_sync(store: &GameStore, name: &str, ticks: u32) -> Result<()> {
    let mut game = load(store, name)?;
    let full = SavedGameState::capture(&game, true)?;
    println!("{}", frame_transfer::encode(&full));
    SavedGameState::acknowledge(&mut game);

    game.advance(ticks);
    tracing::debug!(dirty = query::dirty_record_count(&game), "records changed");
    let delta = SavedGameState::capture(&game, false)?;
    println!("{}", frame_transfer::encode(&delta));

    let mut replica = Game::new(game.state().map_size())?;
    for line in [frame_transfer::encode(&full), frame_transfer::encode(&delta)] {
        let frame = frame_transfer::decode(&line)?;
        let _ = frame.apply(&mut replica)?;
    }
    let serializer = GameStateSerializer::new();
    if serializer.serialize(&replica, true)? != serializer.serialize(&game, true)? {
        bail!("replica diverged after applying the frames");
    }
    tracing::info!(
        full = full.payload().len(),
        delta = delta.payload().len(),
        "frames verified against a replica"
    );
    Ok(())
}
