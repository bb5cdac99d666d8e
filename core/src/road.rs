//! Roads expressed as a start position plus a sequence of steps.

use serde::{Deserialize, Serialize};

use crate::{Direction, MapGeometry, MapPos};

/// Longest road a player may lay in one go.
pub const MAX_ROAD_LENGTH: usize = 256;

/// Ordered list of steps leading away from a source position.
///
/// An empty road has no source at all; the pathfinder returns one when no
/// route was found.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Road {
    source: Option<MapPos>,
    dirs: Vec<Direction>,
}

impl Road {
    /// Road without a source, signalling "no route".
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            source: None,
            dirs: Vec::new(),
        }
    }

    /// Zero-length road anchored at `source`.
    #[must_use]
    pub const fn starting_at(source: MapPos) -> Self {
        Self {
            source: Some(source),
            dirs: Vec::new(),
        }
    }

    /// Reports whether the road has a source position.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.source.is_some()
    }

    /// Reports whether the road holds no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Position the road starts from.
    #[must_use]
    pub const fn source(&self) -> Option<MapPos> {
        self.source
    }

    /// Steps in travel order.
    #[must_use]
    pub fn dirs(&self) -> &[Direction] {
        &self.dirs
    }

    /// Most recent step.
    #[must_use]
    pub fn last(&self) -> Option<Direction> {
        self.dirs.last().copied()
    }

    /// Appends a step. Fails on roads without a source or at [`MAX_ROAD_LENGTH`].
    pub fn extend(&mut self, dir: Direction) -> bool {
        if self.source.is_none() || self.dirs.len() >= MAX_ROAD_LENGTH {
            return false;
        }
        self.dirs.push(dir);
        true
    }

    /// Removes the most recent step.
    pub fn undo(&mut self) -> Option<Direction> {
        self.dirs.pop()
    }

    /// Position reached after walking every step.
    #[must_use]
    pub fn end(&self, geometry: &MapGeometry) -> Option<MapPos> {
        self.positions(geometry).last()
    }

    /// Source followed by every position visited along the road.
    pub fn positions<'a>(&'a self, geometry: &'a MapGeometry) -> impl Iterator<Item = MapPos> + 'a {
        let steps = self.dirs.iter().scan(self.source, move |pos, dir| {
            let next = geometry.move_dir((*pos)?, *dir);
            *pos = Some(next);
            Some(next)
        });
        self.source.into_iter().chain(steps)
    }

    /// Reports whether the road touches `pos`, endpoints included.
    #[must_use]
    pub fn has_position(&self, geometry: &MapGeometry, pos: MapPos) -> bool {
        self.positions(geometry).any(|visited| visited == pos)
    }

    /// Same road walked from its end back to its source.
    #[must_use]
    pub fn reversed(&self, geometry: &MapGeometry) -> Self {
        let Some(end) = self.end(geometry) else {
            return Self::empty();
        };

        Self {
            source: Some(end),
            dirs: self.dirs.iter().rev().map(|dir| dir.reverse()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> MapGeometry {
        MapGeometry::new(3).expect("valid map size")
    }

    #[test]
    fn empty_road_is_invalid_and_cannot_grow() {
        let mut road = Road::empty();
        assert!(!road.is_valid());
        assert!(!road.extend(Direction::Right));
        assert_eq!(road.end(&geometry()), None);
    }

    #[test]
    fn end_follows_every_step() {
        let geometry = geometry();
        let start = geometry.pos(3, 3);
        let mut road = Road::starting_at(start);
        assert!(road.extend(Direction::Right));
        assert!(road.extend(Direction::DownRight));
        assert!(road.extend(Direction::Down));
        assert_eq!(road.end(&geometry), Some(geometry.pos(5, 5)));
        assert!(road.has_position(&geometry, geometry.pos(4, 3)));
        assert!(!road.has_position(&geometry, geometry.pos(4, 4)));
    }

    #[test]
    fn reversed_road_returns_to_source() {
        let geometry = geometry();
        let start = geometry.pos(1, 1);
        let mut road = Road::starting_at(start);
        for dir in [Direction::Left, Direction::UpLeft, Direction::Up] {
            assert!(road.extend(dir));
        }
        let back = road.reversed(&geometry);
        assert_eq!(back.source(), road.end(&geometry));
        assert_eq!(back.end(&geometry), Some(start));
    }

    #[test]
    fn extend_stops_at_maximum_length() {
        let mut road = Road::starting_at(MapPos::from_raw(0));
        for _ in 0..MAX_ROAD_LENGTH {
            assert!(road.extend(Direction::Right));
        }
        assert!(!road.extend(Direction::Right));
        assert_eq!(road.undo(), Some(Direction::Right));
        assert_eq!(road.len(), MAX_ROAD_LENGTH - 1);
    }
}
