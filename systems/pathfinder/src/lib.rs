#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! A* road search over the toroidal hex map.
//!
//! The search runs backwards, from the road's end to its start, so the
//! directions collected while walking parent links already read from start
//! to end once each is reversed.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    time::{Duration, Instant},
};

use freeserf_core::{Direction, DirectionCycle, MapPos, Road, TerrainView, TICK_LENGTH};

/// Cost of one step indexed by the height difference it climbs.
pub const WALK_COST: [u32; 5] = [255, 319, 383, 447, 511];

/// Wall-clock budget of a search.
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(2 * TICK_LENGTH as u64);

/// Errors that indicate corrupt terrain rather than an unreachable target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathfinderError {
    /// Two neighbouring tiles differ by more than the walk cost table covers.
    #[error("height difference {difference} between {from} and {to} exceeds the walk cost table")]
    HeightDifferenceOutOfRange {
        /// Tile the step leaves.
        from: MapPos,
        /// Tile the step enters.
        to: MapPos,
        /// Absolute height difference.
        difference: u32,
    },
}

/// Estimated cost between two tiles.
///
/// Counts hex steps (the larger offset when both axes move the same way, the
/// sum otherwise) and prices each by the average climb. The estimate can
/// overshoot on steep terrain.
#[must_use]
pub fn heuristic_cost<T: TerrainView + ?Sized>(terrain: &T, from: MapPos, to: MapPos) -> u32 {
    let geometry = terrain.geometry();
    let dist_col = geometry.dist_x(from, to);
    let dist_row = geometry.dist_y(from, to);
    let same_sign = (dist_col > 0 && dist_row > 0) || (dist_col < 0 && dist_row < 0);
    let dist = if same_sign {
        dist_col.unsigned_abs().max(dist_row.unsigned_abs())
    } else {
        dist_col.unsigned_abs() + dist_row.unsigned_abs()
    };
    if dist == 0 {
        return 0;
    }
    let climb = terrain.height(from).abs_diff(terrain.height(to));
    let slope = usize::try_from(climb / dist)
        .unwrap_or(usize::MAX)
        .min(WALK_COST.len() - 1);
    WALK_COST[slope] * dist
}

/// Cost of stepping from `pos` towards `dir`.
pub fn actual_cost<T: TerrainView + ?Sized>(
    terrain: &T,
    pos: MapPos,
    dir: Direction,
) -> Result<u32, PathfinderError> {
    let next = terrain.geometry().move_dir(pos, dir);
    let difference = terrain.height(pos).abs_diff(terrain.height(next));
    usize::try_from(difference)
        .ok()
        .and_then(|index| WALK_COST.get(index))
        .copied()
        .ok_or(PathfinderError::HeightDifferenceOutOfRange {
            from: pos,
            to: next,
            difference,
        })
}

/// Finds a road from `start` to `end` with the default deadline.
pub fn find_path<T: TerrainView + ?Sized>(
    terrain: &T,
    start: MapPos,
    end: MapPos,
    building_road: Option<&Road>,
) -> Result<Road, PathfinderError> {
    Pathfinder::default().find_path(terrain, start, end, building_road)
}

#[derive(Clone, Copy, Debug)]
struct SearchNode {
    pos: MapPos,
    g: u32,
    h: u32,
    parent: Option<usize>,
    dir: Option<Direction>,
}

impl SearchNode {
    fn f(&self) -> u32 {
        self.g + self.h
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OpenEntry {
    f: u32,
    sequence: u64,
    node: usize,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the lowest f first.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Road search with a configurable wall-clock deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pathfinder {
    deadline: Duration,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl Pathfinder {
    /// Creates a pathfinder with the default deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pathfinder giving up after `deadline`.
    #[must_use]
    pub const fn with_deadline(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Wall-clock budget of each search.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Finds the cheapest road from `start` to `end`.
    ///
    /// Flags other than `start` are never crossed, and neither are tiles of
    /// `building_road` other than `start` and `end`. An empty road means no
    /// road was found in time.
    pub fn find_path<T: TerrainView + ?Sized>(
        &self,
        terrain: &T,
        start: MapPos,
        end: MapPos,
        building_road: Option<&Road>,
    ) -> Result<Road, PathfinderError> {
        let began = Instant::now();
        let geometry = terrain.geometry();

        let mut nodes = vec![SearchNode {
            pos: end,
            g: 0,
            h: heuristic_cost(terrain, end, start),
            parent: None,
            dir: None,
        }];
        let mut open = BinaryHeap::from([OpenEntry {
            f: nodes[0].f(),
            sequence: 0,
            node: 0,
        }]);
        let mut open_nodes: HashMap<MapPos, usize> = HashMap::from([(end, 0)]);
        let mut closed: Vec<MapPos> = Vec::new();
        let mut sequence = 1u64;

        while let Some(entry) = open.pop() {
            if began.elapsed() >= self.deadline {
                tracing::debug!(%start, %end, expanded = closed.len(), "road search timed out");
                return Ok(Road::empty());
            }

            let current = nodes[entry.node];
            let _ = open_nodes.remove(&current.pos);
            if current.pos == start {
                return Ok(reconstruct(&nodes, entry.node, start));
            }
            closed.push(current.pos);

            for dir in DirectionCycle::clockwise() {
                let next = geometry.move_dir(current.pos, dir);
                if !terrain.is_road_segment_valid(current.pos, dir)
                    || (terrain.has_flag(next) && next != start)
                {
                    continue;
                }
                if building_road.is_some_and(|road| {
                    road.has_position(geometry, next) && next != end && next != start
                }) {
                    continue;
                }

                let cost = actual_cost(terrain, current.pos, dir)?;
                if closed.contains(&next) {
                    continue;
                }

                let g = current.g + cost;
                if let Some(&existing) = open_nodes.get(&next) {
                    if nodes[existing].g >= g {
                        let node = &mut nodes[existing];
                        node.g = g;
                        node.parent = Some(entry.node);
                        node.dir = Some(dir);
                        let f = node.f();
                        let mut entries = open.into_vec();
                        if let Some(stale) = entries.iter_mut().find(|e| e.node == existing) {
                            stale.f = f;
                        }
                        open = BinaryHeap::from(entries);
                    }
                    continue;
                }

                let id = nodes.len();
                nodes.push(SearchNode {
                    pos: next,
                    g,
                    h: heuristic_cost(terrain, next, start),
                    parent: Some(entry.node),
                    dir: Some(dir),
                });
                open.push(OpenEntry {
                    f: nodes[id].f(),
                    sequence,
                    node: id,
                });
                sequence += 1;
                let _ = open_nodes.insert(next, id);
            }
        }

        tracing::debug!(%start, %end, expanded = closed.len(), "no road between flags");
        Ok(Road::empty())
    }
}

fn reconstruct(nodes: &[SearchNode], from: usize, start: MapPos) -> Road {
    let mut road = Road::starting_at(start);
    let mut cursor = &nodes[from];
    while let (Some(parent), Some(dir)) = (cursor.parent, cursor.dir) {
        if !road.extend(dir.reverse()) {
            tracing::debug!(%start, "road exceeds the maximum length");
            return Road::empty();
        }
        cursor = &nodes[parent];
    }
    road
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_entries_pop_lowest_score_first() {
        let mut heap = BinaryHeap::new();
        for (sequence, f) in [900u32, 255, 638].into_iter().enumerate() {
            heap.push(OpenEntry {
                f,
                sequence: sequence as u64,
                node: sequence,
            });
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|e| e.f)).collect();
        assert_eq!(order, vec![255, 638, 900]);
    }

    #[test]
    fn equal_scores_pop_in_insertion_order() {
        let mut heap = BinaryHeap::new();
        for sequence in 0..3u64 {
            heap.push(OpenEntry {
                f: 10,
                sequence,
                node: sequence as usize,
            });
        }
        assert_eq!(heap.pop().map(|e| e.node), Some(0));
        assert_eq!(heap.pop().map(|e| e.node), Some(1));
    }

    #[test]
    fn default_deadline_spans_two_ticks() {
        assert_eq!(Pathfinder::new().deadline(), Duration::from_millis(40));
    }
}
