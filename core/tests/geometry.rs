use freeserf_core::{Direction, DirectionCycle, MapGeometry, MapPos, Road};
use proptest::prelude::*;

fn geometry() -> MapGeometry {
    MapGeometry::new(4).expect("valid map size")
}

proptest! {
    #[test]
    fn walking_a_full_lap_returns_to_start(column in 0u32..128, row in 0u32..64, dir_index in 0usize..6) {
        let geometry = geometry();
        let start = geometry.pos(column, row);
        let dir = Direction::from_index(dir_index).expect("index below six");
        let lap = match dir {
            Direction::Right | Direction::Left => geometry.columns(),
            Direction::Down | Direction::Up => geometry.rows(),
            Direction::DownRight | Direction::UpLeft => geometry.columns().max(geometry.rows()),
        };

        let mut pos = start;
        for _ in 0..lap {
            pos = geometry.move_dir(pos, dir);
        }
        prop_assert_eq!(pos, start);
    }

    #[test]
    fn column_distance_is_antisymmetric_and_bounded(
        a_column in 0u32..128,
        a_row in 0u32..64,
        b_column in 0u32..128,
        b_row in 0u32..64,
    ) {
        let geometry = geometry();
        let a = geometry.pos(a_column, a_row);
        let b = geometry.pos(b_column, b_row);
        let half = (geometry.columns() / 2) as i32;
        let forward = geometry.dist_x(a, b);
        let backward = geometry.dist_x(b, a);

        prop_assert!(forward.abs() <= half);
        if forward.abs() != half {
            prop_assert_eq!(forward, -backward);
        }
    }

    #[test]
    fn pos_add_matches_repeated_moves(column in 0u32..128, row in 0u32..64, steps in 0i32..40) {
        let geometry = geometry();
        let start = geometry.pos(column, row);
        let mut walked = start;
        for _ in 0..steps {
            walked = geometry.move_down_right(walked);
        }
        prop_assert_eq!(geometry.pos_add(start, steps, steps), walked);
    }
}

#[test]
fn clockwise_cycle_is_complete_and_ordered() {
    let visited: Vec<_> = DirectionCycle::clockwise().into_iter().collect();
    assert_eq!(visited.len(), 6);
    assert_eq!(visited[0], Direction::Right);
    for pair in visited.windows(2) {
        assert_eq!(pair[0].turn(1), pair[1], "cycle must advance clockwise");
    }
}

#[test]
fn cycle_without_yields_the_other_five() {
    for excluded in Direction::ALL {
        let visited: Vec<_> = DirectionCycle::cw_without(excluded).into_iter().collect();
        assert_eq!(visited.len(), 5);
        assert_eq!(visited[0], excluded.turn(1));
        assert!(!visited.contains(&excluded));
    }
}

#[test]
fn road_round_trips_through_bincode() {
    let geometry = geometry();
    let mut road = Road::starting_at(geometry.pos(7, 9));
    assert!(road.extend(Direction::Up));
    assert!(road.extend(Direction::Left));

    let bytes = bincode::serialize(&road).expect("serialize");
    let restored: Road = bincode::deserialize(&bytes).expect("deserialize");
    assert_eq!(restored, road);
}

#[test]
fn map_pos_exposes_raw_value() {
    let pos = MapPos::from_raw(0x1234);
    assert_eq!(pos.raw(), 0x1234);
    assert_eq!(pos.to_string(), "4660");
}
