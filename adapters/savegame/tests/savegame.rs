use std::fs;

use freeserf_core::{MapObject, TerrainView};
use freeserf_savegame::{
    read_legacy, read_text, write_text, GameStore, SaveError, LEGACY_MAGIC, LEGACY_VERSION,
};
use freeserf_world::{
    read_state, BuildingType, Collection, Game, Object, Record, Resource, SerfActivity, SerfType,
};

fn populated_game() -> Game {
    let mut game = Game::new(3).expect("valid size");
    let first = game.add_player(4, [10, 20, 30]);
    let second = game.add_player(9, [200, 100, 0]);
    let _ = game
        .build_building(first, BuildingType::Castle, game.geometry().pos(12, 8))
        .expect("free site");
    let hut = game
        .build_building(second, BuildingType::Hut, game.geometry().pos(40, 30))
        .expect("free site");
    let serf = game
        .spawn_serf(first, SerfType::Lumberjack, game.geometry().pos(3, 3))
        .expect("player exists");
    let _ = game
        .spawn_serf(second, SerfType::Transporter, game.geometry().pos(41, 31))
        .expect("player exists");
    assert!(game.remove_serf(serf));
    assert!(game.remove_building(hut));

    let pos = game.geometry().pos(5, 6);
    game.map_mut().set_height(pos, 17).expect("height in range");
    game.map_mut().set_object(pos, MapObject::Tree);
    game.map_mut().set_owner(pos, Some(1));
    let water_pos = game.geometry().pos(7, 7);
    game.map_mut().set_water(water_pos, true);
    game.advance(5);
    game
}

fn assert_collections_match<S: Record>(left: &Collection<Object<S>>, right: &Collection<Object<S>>) {
    assert_eq!(left.indices(), right.indices(), "{} indices differ", left.kind());
    assert_eq!(left.free_indices(), right.free_indices(), "{} free indices differ", left.kind());
    for index in left.indices() {
        assert_eq!(
            read_state(&left.require(index).expect("listed")),
            read_state(&right.require(index).expect("listed")),
            "{} {index} differs",
            left.kind()
        );
    }
}

fn assert_games_match(left: &Game, right: &Game) {
    assert_eq!(left.state(), right.state());
    assert_eq!(left.geometry(), right.geometry());
    for pos in left.geometry().positions() {
        assert_eq!(left.map().tile(pos), right.map().tile(pos), "tile {pos} differs");
    }
    assert_collections_match(left.players(), right.players());
    assert_collections_match(left.inventories(), right.inventories());
    assert_collections_match(left.buildings(), right.buildings());
    assert_collections_match(left.flags(), right.flags());
    assert_collections_match(left.serfs(), right.serfs());
}

#[test]
fn text_saves_restore_the_whole_game() {
    let game = populated_game();
    let text = write_text(&game);
    assert!(text.contains("[player 1]"));
    assert!(!text.contains("[serf 0]"), "removed serfs are not written");

    let restored = read_text(&text).expect("own output parses");

    assert_games_match(&game, &restored);
    assert_eq!(restored.serfs().free_indices(), vec![0]);
    assert!(!restored.is_dirty(), "loaded games start clean");
}

#[test]
fn text_errors_name_the_offending_line() {
    let game = Game::new(1).expect("valid size");
    let mut text = write_text(&game);
    text.push_str("\n[serf 2]\nfavourite_colour = 3\n");
    let lines = text.lines().count();

    match read_text(&text) {
        Err(SaveError::Parse { line, reason }) => {
            assert_eq!(line, lines);
            assert!(reason.contains("favourite_colour"), "{reason}");
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn reloaded_games_reuse_the_same_free_indices() {
    let mut game = Game::new(1).expect("valid size");
    let player = game.add_player(1, [1, 2, 3]);
    for column in 0..5 {
        let _ = game
            .spawn_serf(player, SerfType::Transporter, game.geometry().pos(column, 1))
            .expect("player exists");
    }
    assert!(game.remove_serf(3));
    assert!(game.remove_serf(4));

    let mut restored = read_text(&write_text(&game)).expect("own output parses");
    assert_eq!(restored.serfs().free_indices(), vec![3]);

    let pos = game.geometry().pos(9, 9);
    let live = game
        .spawn_serf(player, SerfType::Builder, pos)
        .expect("player exists");
    let reloaded = restored
        .spawn_serf(player, SerfType::Builder, pos)
        .expect("player exists");
    assert_eq!(live, 3);
    assert_eq!(reloaded, live);
}

#[test]
fn store_refuses_saves_with_huge_indices() {
    let folder = tempfile::tempdir().expect("temp dir");
    let store = GameStore::new(folder.path());
    assert!(store.save(&Game::new(1).expect("valid size"), "hostile"));

    let path = folder.path().join("hostile.save");
    let mut text = fs::read_to_string(&path).expect("saved text");
    text.push_str("\n[player 4294967295]\n");
    fs::write(&path, text).expect("write");

    match store.try_load(&path) {
        Err(SaveError::Unreadable { text, .. }) => {
            assert!(matches!(*text, SaveError::Parse { .. }), "{text}");
        }
        other => panic!("expected an unreadable save, got {other:?}"),
    }
    assert!(store.load_named("hostile").is_none());
}

#[test]
fn store_saves_lists_and_loads() {
    let folder = tempfile::tempdir().expect("temp dir");
    let store = GameStore::new(folder.path().join("saves"));
    assert_eq!(store.list_saves().expect("missing folder is empty"), Vec::<String>::new());

    let game = populated_game();
    assert!(store.save(&game, "second"));
    assert!(store.save(&game, "first"));
    assert!(!store.save(&game, "../outside"));

    assert_eq!(store.list_saves().expect("listing"), vec!["first", "second"]);
    let loaded = store.load_named("first").expect("saved game loads");
    assert_games_match(&game, &loaded);
    assert!(store.load_named("missing").is_none());
}

#[test]
fn garbage_fails_both_readers() {
    let folder = tempfile::tempdir().expect("temp dir");
    let path = folder.path().join("noise.save");
    fs::write(&path, [0xde, 0xad, 0xbe, 0xef]).expect("write");

    let store = GameStore::new(folder.path());
    assert!(matches!(
        store.try_load(&path),
        Err(SaveError::Unreadable { .. })
    ));
    assert!(store.load(&path).is_none());
}

struct LegacyWriter(Vec<u8>);

impl LegacyWriter {
    fn u8(&mut self, value: u8) -> &mut Self {
        self.0.push(value);
        self
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }
}

fn legacy_fixture(game: &Game, castle: u32, flag: u32) -> Vec<u8> {
    let geometry = game.geometry();
    let mut out = LegacyWriter(LEGACY_MAGIC.to_vec());
    let _ = out.u16(LEGACY_VERSION).u8(1);
    let _ = out.u32(640).u32(320).u32(320).u16(1).u16(2).u16(3).u32(9).u16(2);

    for pos in geometry.positions() {
        let (height, object, owner) = if pos == castle_pos(game) {
            (3, MapObject::Castle.code(), 0)
        } else if pos == flag_pos(game) {
            (3, MapObject::Flag.code(), 0)
        } else {
            (0, MapObject::None.code(), 0xff)
        };
        let _ = out.u8(height).u8(object).u8(0).u8(owner).u8(0);
    }

    // players
    let _ = out.u16(1).u8(0).u8(7).u8(1).u8(2).u8(3).u8(1);
    let _ = out.u32(castle_pos(game).raw()).u16(0).u32(0x1000).u32(5);
    // flags
    let _ = out.u16(1).u16(flag as u16).u32(flag_pos(game).raw());
    let _ = out.u8(0).u8(0).u8(0).u16(castle as u16);
    let _ = out.u8(Resource::Plank.code());
    for _ in 1..8 {
        let _ = out.u8(0xff);
    }
    // buildings
    let _ = out.u16(1).u16(castle as u16).u8(BuildingType::Castle.code());
    let _ = out.u32(castle_pos(game).raw()).u8(0).u16(flag as u16).u16(0).u32(0).u8(0b10);
    // inventories
    let _ = out.u16(1).u16(0).u8(0).u16(flag as u16).u16(castle as u16);
    for resource in Resource::ALL {
        let _ = out.u16(if *resource == Resource::Stone { 40 } else { 0 });
    }
    for _ in SerfType::ALL {
        let _ = out.u16(1);
    }
    // serfs
    let _ = out.u16(1).u16(2).u8(SerfType::Builder.code()).u8(0);
    let _ = out.u8(SerfActivity::Walking.code()).u32(flag_pos(game).raw());
    let _ = out.u16(0xffff).u16(0).u32((-4i32) as u32);
    out.0
}

fn castle_pos(game: &Game) -> freeserf_core::MapPos {
    game.geometry().pos(4, 4)
}

fn flag_pos(game: &Game) -> freeserf_core::MapPos {
    game.geometry().move_down_right(castle_pos(game))
}

#[test]
fn legacy_saves_are_read_field_by_field() {
    let scratch = Game::new(1).expect("valid size");
    let bytes = legacy_fixture(&scratch, 1, 3);

    let game = read_legacy(&bytes).expect("fixture parses");

    assert_eq!(game.state().game_time(), 640);
    assert_eq!(game.state().random_state(), [1, 2, 3]);
    assert_eq!(game.state().game_speed(), 2);
    assert_eq!(game.map().object(castle_pos(&game)), MapObject::Castle);
    assert_eq!(game.map().height(flag_pos(&game)), 3);
    assert_eq!(game.map().tile(flag_pos(&game)).owner, Some(0));

    let player = read_state(&game.players().require(0).expect("player"));
    assert_eq!(player.face(), 7);
    assert_eq!(player.castle_position(), Some(castle_pos(&game)));
    assert_eq!(player.castle_inventory(), Some(0));

    let flag = read_state(&game.flags().require(3).expect("flag"));
    assert_eq!(flag.building(), Some(1));
    assert_eq!(flag.slots()[0], Some(Resource::Plank));
    assert_eq!(game.flags().free_indices(), vec![0, 1, 2]);

    let building = read_state(&game.buildings().require(1).expect("castle"));
    assert_eq!(building.building_type(), BuildingType::Castle);
    assert!(building.active());
    assert!(!building.burning());

    let inventory = read_state(&game.inventories().require(0).expect("inventory"));
    assert_eq!(inventory.resource(Resource::Stone), 40);

    let serf = read_state(&game.serfs().require(2).expect("serf"));
    assert_eq!(serf.activity(), SerfActivity::Walking);
    assert_eq!(serf.building(), None);
    assert_eq!(serf.counter(), -4);
    assert!(!game.is_dirty());
}

#[test]
fn store_falls_back_to_the_binary_layout() {
    let scratch = Game::new(1).expect("valid size");
    let folder = tempfile::tempdir().expect("temp dir");
    let path = folder.path().join("old.save");
    fs::write(&path, legacy_fixture(&scratch, 1, 3)).expect("write");

    let game = GameStore::new(folder.path()).load(&path).expect("binary fallback");
    assert_eq!(game.buildings().indices(), vec![1]);
}

#[test]
fn legacy_validation_reports_offsets() {
    let scratch = Game::new(1).expect("valid size");
    let mut bytes = legacy_fixture(&scratch, 1, 3);
    let first_tile = 4 + 2 + 1 + 4 * 3 + 2 * 3 + 4 + 2;
    bytes[first_tile] = 40;
    assert!(matches!(
        read_legacy(&bytes),
        Err(SaveError::DataParse { offset, .. }) if offset == first_tile + 1
    ));

    let mut truncated = legacy_fixture(&scratch, 1, 3);
    let _ = truncated.pop();
    assert!(matches!(read_legacy(&truncated), Err(SaveError::DataParse { .. })));

    let mut trailing = legacy_fixture(&scratch, 1, 3);
    trailing.push(0);
    assert!(matches!(read_legacy(&trailing), Err(SaveError::DataParse { .. })));
}
