//! Hexagonal movement directions and the rotational cycles built on them.

use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// One of the six neighbours of a tile, listed in clockwise order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Increasing column.
    Right,
    /// Increasing column and row.
    DownRight,
    /// Increasing row.
    Down,
    /// Decreasing column.
    Left,
    /// Decreasing column and row.
    UpLeft,
    /// Decreasing row.
    Up,
}

impl Direction {
    /// All directions in clockwise order starting at [`Direction::Right`].
    pub const ALL: [Direction; 6] = [
        Direction::Right,
        Direction::DownRight,
        Direction::Down,
        Direction::Left,
        Direction::UpLeft,
        Direction::Up,
    ];

    /// Zero-based clockwise index of the direction.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Resolves a clockwise index back into a direction.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Rotates by `steps` sixths of a turn; negative values rotate counter-clockwise.
    #[must_use]
    pub fn turn(self, steps: i32) -> Self {
        let index = (self as i32 + steps).rem_euclid(6);
        Self::ALL[index as usize]
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub fn reverse(self) -> Self {
        self.turn(3)
    }

    /// Single-bit mask used by per-tile path sets.
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Rotates a possibly uninitialised direction.
///
/// Fails with [`GeometryError::NoDirection`] when `direction` is `None`.
pub fn try_turn(direction: Option<Direction>, steps: i32) -> Result<Direction, GeometryError> {
    direction
        .map(|direction| direction.turn(steps))
        .ok_or(GeometryError::NoDirection)
}

/// Sense in which a [`DirectionCycle`] advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// Each step turns one sixth clockwise.
    Clockwise,
    /// Each step turns one sixth counter-clockwise.
    CounterClockwise,
}

impl Rotation {
    const fn step(self) -> i32 {
        match self {
            Self::Clockwise => 1,
            Self::CounterClockwise => -1,
        }
    }
}

/// Finite, restartable sequence of directions separated by 60° steps.
///
/// The cycle itself is an immutable description; every call to
/// [`IntoIterator::into_iter`] starts a fresh pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectionCycle {
    start: Direction,
    length: u8,
    rotation: Rotation,
}

impl DirectionCycle {
    /// Clockwise cycle of `length` directions (at most six) beginning at `start`.
    #[must_use]
    pub fn cw(start: Direction, length: u8) -> Self {
        Self {
            start,
            length: length.min(6),
            rotation: Rotation::Clockwise,
        }
    }

    /// Counter-clockwise cycle of `length` directions (at most six) beginning at `start`.
    #[must_use]
    pub fn ccw(start: Direction, length: u8) -> Self {
        Self {
            start,
            length: length.min(6),
            rotation: Rotation::CounterClockwise,
        }
    }

    /// All six directions clockwise from [`Direction::Right`].
    #[must_use]
    pub fn clockwise() -> Self {
        Self::cw(Direction::Right, 6)
    }

    /// All six directions counter-clockwise from [`Direction::Up`].
    #[must_use]
    pub fn counter_clockwise() -> Self {
        Self::ccw(Direction::Up, 6)
    }

    /// The five clockwise directions other than `excluded`, starting right after it.
    #[must_use]
    pub fn cw_without(excluded: Direction) -> Self {
        Self::cw(excluded.turn(1), 5)
    }

    /// The five counter-clockwise directions other than `excluded`, starting right after it.
    #[must_use]
    pub fn ccw_without(excluded: Direction) -> Self {
        Self::ccw(excluded.turn(-1), 5)
    }

    /// First direction produced by the cycle.
    #[must_use]
    pub const fn start(&self) -> Direction {
        self.start
    }

    /// Number of directions produced by one pass.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length as usize
    }

    /// Reports whether a pass produces nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Direction of travel of the cycle.
    #[must_use]
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }
}

impl IntoIterator for DirectionCycle {
    type Item = Direction;
    type IntoIter = DirectionCycleIter;

    fn into_iter(self) -> Self::IntoIter {
        DirectionCycleIter {
            next: self.start,
            remaining: self.length,
            step: self.rotation.step(),
        }
    }
}

impl IntoIterator for &DirectionCycle {
    type Item = Direction;
    type IntoIter = DirectionCycleIter;

    fn into_iter(self) -> Self::IntoIter {
        (*self).into_iter()
    }
}

/// Single pass over a [`DirectionCycle`].
#[derive(Clone, Debug)]
pub struct DirectionCycleIter {
    next: Direction,
    remaining: u8,
    step: i32,
}

impl Iterator for DirectionCycleIter {
    type Item = Direction;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let current = self.next;
        self.next = current.turn(self.step);
        self.remaining -= 1;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.remaining);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DirectionCycleIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_clockwise_cycle_visits_every_direction_once() {
        let visited: Vec<_> = DirectionCycle::clockwise().into_iter().collect();
        assert_eq!(visited, Direction::ALL.to_vec());
    }

    #[test]
    fn cycle_without_skips_excluded_and_starts_after_it() {
        let visited: Vec<_> = DirectionCycle::cw_without(Direction::Down)
            .into_iter()
            .collect();
        assert_eq!(
            visited,
            vec![
                Direction::Left,
                Direction::UpLeft,
                Direction::Up,
                Direction::Right,
                Direction::DownRight,
            ]
        );
    }

    #[test]
    fn counter_clockwise_cycle_starts_at_up() {
        let visited: Vec<_> = DirectionCycle::counter_clockwise().into_iter().collect();
        assert_eq!(
            visited,
            vec![
                Direction::Up,
                Direction::UpLeft,
                Direction::Left,
                Direction::Down,
                Direction::DownRight,
                Direction::Right,
            ]
        );
    }

    #[test]
    fn ccw_without_walks_backwards_from_excluded() {
        let visited: Vec<_> = DirectionCycle::ccw_without(Direction::Right)
            .into_iter()
            .collect();
        assert_eq!(visited.first(), Some(&Direction::Up));
        assert_eq!(visited.len(), 5);
        assert!(!visited.contains(&Direction::Right));
    }

    #[test]
    fn cycles_are_restartable() {
        let cycle = DirectionCycle::cw(Direction::Left, 4);
        let first: Vec<_> = cycle.into_iter().collect();
        let second: Vec<_> = cycle.into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn turn_wraps_in_both_senses() {
        assert_eq!(Direction::Up.turn(1), Direction::Right);
        assert_eq!(Direction::Right.turn(-1), Direction::Up);
        assert_eq!(Direction::Down.turn(-14), Direction::Right);
        assert_eq!(Direction::Left.reverse(), Direction::Right);
        assert_eq!(Direction::UpLeft.reverse(), Direction::DownRight);
    }

    #[test]
    fn turning_an_unset_direction_fails() {
        assert_eq!(try_turn(None, 2), Err(GeometryError::NoDirection));
        assert_eq!(try_turn(Some(Direction::Right), 2), Ok(Direction::Down));
    }
}
