use freeserf_core::{MapPos, TerrainView};
use freeserf_rendering::{CoordinateSpace, HEIGHT_STEP, TILE_HEIGHT, TILE_WIDTH};
use freeserf_world::Map;
use glam::IVec2;
use proptest::prelude::*;

fn flat(size: u32) -> (Map, CoordinateSpace) {
    let map = Map::new(size).expect("valid size");
    let space = CoordinateSpace::new(map.geometry().clone());
    (map, space)
}

proptest! {
    #[test]
    fn flat_tiles_round_trip_through_map_space(size in 1u32..6, column in 0u32..512, row in 0u32..256) {
        let (map, space) = flat(size);
        let geometry = map.geometry();
        let pos = geometry.pos(column & geometry.column_mask(), row & geometry.row_mask());

        let anchor = space.tile_space_to_map_space(&map, pos);
        prop_assert_eq!(space.map_space_to_tile_space(&map, anchor), pos);
    }

    #[test]
    fn points_near_an_anchor_pick_that_tile(column in 0u32..64, row in 0u32..64, dx in -6i32..7, dy in -4i32..5) {
        let (map, space) = flat(3);
        let pos = map.geometry().pos(column, row);
        let anchor = space.tile_space_to_map_space(&map, pos);

        prop_assert_eq!(space.map_space_to_tile_space(&map, anchor + IVec2::new(dx, dy)), pos);
    }

    #[test]
    fn view_space_inverts_map_space(x in -5000i32..5000, y in -5000i32..5000, sx in 0i32..4096, sy in 0i32..1280) {
        let (_, mut space) = flat(4);
        space.set_scroll(IVec2::new(sx, sy));
        let point = IVec2::new(x, y);

        let view = space.map_space_to_view_space(point);
        prop_assert_eq!(space.view_space_to_map_space(view), space.wrap(point));
    }
}

#[test]
fn anchors_follow_the_sheared_layout() {
    let (mut map, space) = flat(3);
    let pos = map.geometry().pos(10, 10);
    map.set_height(pos, 5).expect("height in range");

    let anchor = space.tile_space_to_map_space(&map, pos);

    assert_eq!(
        anchor,
        IVec2::new(
            TILE_WIDTH * 10 - TILE_WIDTH / 2 * 10,
            TILE_HEIGHT * 10 - HEIGHT_STEP * 5
        )
    );
    assert_eq!(space.map_space_to_tile_space(&map, anchor), pos);
}

#[test]
fn rows_past_the_bottom_wrap_onto_the_top() {
    let (map, space) = flat(3);
    let corner = map.geometry().pos(0, 0);
    assert_eq!(space.tile_space_to_map_space(&map, corner), IVec2::ZERO);

    let near_corner = IVec2::new(-3, -2);
    assert_eq!(space.map_space_to_tile_space(&map, near_corner), corner);
}

#[test]
fn raised_tiles_are_found_below_their_flat_row() {
    let (mut map, space) = flat(3);
    let geometry = map.geometry().clone();
    let plateau: Vec<MapPos> = geometry.spiral(geometry.pos(20, 20), 2).collect();
    for pos in &plateau {
        map.set_height(*pos, 6).expect("height in range");
    }

    for pos in plateau.iter().take(7) {
        let anchor = space.tile_space_to_map_space(&map, *pos);
        assert_eq!(
            space.map_space_to_tile_space(&map, anchor),
            *pos,
            "anchor of {pos} resolved elsewhere"
        );
    }

    let summit = plateau[0];
    map.set_height(summit, 12).expect("height in range");
    let anchor = space.tile_space_to_map_space(&map, summit);
    assert_eq!(space.map_space_to_tile_space(&map, anchor), summit);
}

#[test]
fn only_neighbours_of_the_walk_stop_are_candidates() {
    let (mut map, space) = flat(3);
    let geometry = map.geometry().clone();
    let peak = geometry.pos(12, 13);
    map.set_height(peak, 15).expect("height in range");

    // The walk stops at the first tile drawn below the point, the flat
    // (11, 11), two steps from the peak whose anchor is the point itself.
    let anchor = space.tile_space_to_map_space(&map, peak);
    assert_eq!(anchor, IVec2::new(176, 200));

    let picked = space.map_space_to_tile_space(&map, anchor);
    assert_ne!(picked, peak);
    assert_eq!(picked, geometry.pos(10, 10));
    assert!(geometry.spiral(geometry.pos(11, 11), 1).any(|pos| pos == picked));
}

#[test]
fn scrolling_centres_the_requested_tile() {
    let (map, mut space) = flat(4);
    let pos = map.geometry().pos(100, 3);
    let view_size = IVec2::new(640, 480);

    space.scroll_to(&map, pos, view_size);

    assert_eq!(space.tile_space_to_view_space(&map, pos), view_size / 2);
    assert_eq!(space.view_space_to_tile_space(&map, view_size / 2), pos);
}
