//! Toroidal hex-grid geometry and packed map positions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Direction, DirectionCycle, GeometryError};

/// Largest accepted map size. Larger maps would not fit a packed 32-bit position.
pub const MAX_MAP_SIZE: u32 = 20;

/// Packed `(row << row_shift) | column` index of a tile.
///
/// Positions are only meaningful together with the [`MapGeometry`] that
/// produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapPos(u32);

impl MapPos {
    /// Wraps a raw packed value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Raw packed value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MapPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dimensions and position arithmetic of a toroidal hex map.
///
/// Both axes are powers of two so every coordinate wraps with a mask. The
/// geometry is immutable after construction and may be shared freely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapGeometry {
    size: u32,
    columns: u32,
    rows: u32,
    column_mask: u32,
    row_mask: u32,
    row_shift: u32,
    dirs: [MapPos; 6],
}

impl MapGeometry {
    /// Builds the geometry of a map of the given size.
    ///
    /// Columns are `2^(5 + size/2)` and rows `2^(5 + (size-1)/2)`.
    pub fn new(size: u32) -> Result<Self, GeometryError> {
        if size > MAX_MAP_SIZE {
            return Err(GeometryError::MapTooLarge { size });
        }

        let signed = size as i32;
        let column_size = (5 + signed / 2) as u32;
        let row_size = (5 + (signed - 1) / 2) as u32;
        let columns = 1 << column_size;
        let rows = 1 << row_size;
        let column_mask = columns - 1;
        let row_mask = rows - 1;
        let row_shift = column_size;

        let pack = |column: u32, row: u32| MapPos(((row & row_mask) << row_shift) | (column & column_mask));
        let right = pack(1, 0);
        let down = pack(0, 1);
        let left = pack(column_mask, 0);
        let up = pack(0, row_mask);
        let dirs = [
            right,
            MapPos(right.0 | down.0),
            down,
            left,
            MapPos(left.0 | up.0),
            up,
        ];

        Ok(Self {
            size,
            columns,
            rows,
            column_mask,
            row_mask,
            row_shift,
            dirs,
        })
    }

    /// Size parameter the geometry was built from.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Number of columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Mask applied to column indices.
    #[must_use]
    pub const fn column_mask(&self) -> u32 {
        self.column_mask
    }

    /// Mask applied to row indices.
    #[must_use]
    pub const fn row_mask(&self) -> u32 {
        self.row_mask
    }

    /// Bit offset of the row inside a packed position.
    #[must_use]
    pub const fn row_shift(&self) -> u32 {
        self.row_shift
    }

    /// Total number of tiles.
    #[must_use]
    pub const fn tile_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Packs a column and row, wrapping both onto the torus.
    #[must_use]
    pub const fn pos(&self, column: u32, row: u32) -> MapPos {
        MapPos(((row & self.row_mask) << self.row_shift) | (column & self.column_mask))
    }

    /// Column component of a position.
    #[must_use]
    pub const fn pos_column(&self, pos: MapPos) -> u32 {
        pos.0 & self.column_mask
    }

    /// Row component of a position.
    #[must_use]
    pub const fn pos_row(&self, pos: MapPos) -> u32 {
        (pos.0 >> self.row_shift) & self.row_mask
    }

    /// Dense row-major index of a position, suitable for per-tile arrays.
    #[must_use]
    pub const fn index(&self, pos: MapPos) -> usize {
        (self.pos_row(pos) * self.columns + self.pos_column(pos)) as usize
    }

    /// Offsets a position by signed column and row deltas.
    #[must_use]
    pub const fn pos_add(&self, pos: MapPos, dx: i32, dy: i32) -> MapPos {
        self.pos(
            self.pos_column(pos).wrapping_add(dx as u32),
            self.pos_row(pos).wrapping_add(dy as u32),
        )
    }

    /// Offsets a position by another position interpreted as a wrapped offset.
    #[must_use]
    pub const fn pos_add_offset(&self, pos: MapPos, offset: MapPos) -> MapPos {
        self.pos(
            self.pos_column(pos) + self.pos_column(offset),
            self.pos_row(pos) + self.pos_row(offset),
        )
    }

    /// Precomputed offset for a single step in `dir`.
    #[must_use]
    pub const fn dir_offset(&self, dir: Direction) -> MapPos {
        self.dirs[dir as usize]
    }

    /// Neighbour of `pos` in `dir`.
    #[must_use]
    pub const fn move_dir(&self, pos: MapPos, dir: Direction) -> MapPos {
        self.pos_add_offset(pos, self.dirs[dir as usize])
    }

    /// Right neighbour.
    #[must_use]
    pub const fn move_right(&self, pos: MapPos) -> MapPos {
        self.move_dir(pos, Direction::Right)
    }

    /// Down-right neighbour.
    #[must_use]
    pub const fn move_down_right(&self, pos: MapPos) -> MapPos {
        self.move_dir(pos, Direction::DownRight)
    }

    /// Down neighbour.
    #[must_use]
    pub const fn move_down(&self, pos: MapPos) -> MapPos {
        self.move_dir(pos, Direction::Down)
    }

    /// Left neighbour.
    #[must_use]
    pub const fn move_left(&self, pos: MapPos) -> MapPos {
        self.move_dir(pos, Direction::Left)
    }

    /// Up-left neighbour.
    #[must_use]
    pub const fn move_up_left(&self, pos: MapPos) -> MapPos {
        self.move_dir(pos, Direction::UpLeft)
    }

    /// Up neighbour.
    #[must_use]
    pub const fn move_up(&self, pos: MapPos) -> MapPos {
        self.move_dir(pos, Direction::Up)
    }

    /// Shortest signed column distance from `from` to `to`, in `[-columns/2, columns/2)`.
    #[must_use]
    pub const fn dist_x(&self, from: MapPos, to: MapPos) -> i32 {
        let half = (self.columns / 2) as i32;
        let raw = self.pos_column(to) as i32 - self.pos_column(from) as i32;
        ((raw + half) & self.column_mask as i32) - half
    }

    /// Shortest signed row distance from `from` to `to`, in `[-rows/2, rows/2)`.
    #[must_use]
    pub const fn dist_y(&self, from: MapPos, to: MapPos) -> i32 {
        let half = (self.rows / 2) as i32;
        let raw = self.pos_row(to) as i32 - self.pos_row(from) as i32;
        ((raw + half) & self.row_mask as i32) - half
    }

    /// Number of single steps separating two tiles.
    ///
    /// On this grid a diagonal step changes both coordinates with the same
    /// sign, so equal-signed deltas cost their maximum and opposite-signed
    /// deltas cost their sum.
    #[must_use]
    pub fn distance(&self, from: MapPos, to: MapPos) -> u32 {
        step_distance(self.dist_x(from, to), self.dist_y(from, to))
    }

    /// Every position once, in row-major order. Each call starts a new pass.
    pub fn positions(&self) -> impl Iterator<Item = MapPos> {
        let columns = self.columns;
        let row_shift = self.row_shift;
        (0..self.rows)
            .flat_map(move |row| (0..columns).map(move |column| MapPos((row << row_shift) | column)))
    }

    /// Neighbours of `pos` in clockwise order from [`Direction::Right`].
    pub fn neighbors(&self, pos: MapPos) -> impl Iterator<Item = MapPos> + '_ {
        DirectionCycle::clockwise()
            .into_iter()
            .map(move |dir| self.move_dir(pos, dir))
    }

    /// Positions at increasing ring distance around `center`, up to `radius`.
    ///
    /// Yields the center first. Ring `r` holds `6r` positions and starts at
    /// the tile `r` steps up-left of the center, walking clockwise.
    #[must_use]
    pub fn spiral(&self, center: MapPos, radius: u32) -> Spiral<'_> {
        Spiral {
            geometry: self,
            center,
            radius,
            ring: 0,
            side: 0,
            step: 0,
            cursor: center,
        }
    }
}

/// Number of positions produced by a spiral of `radius`.
#[must_use]
pub const fn spiral_len(radius: u32) -> usize {
    let radius = radius as usize;
    1 + 3 * radius * (radius + 1)
}

/// Step distance for signed column/row deltas.
#[must_use]
pub fn step_distance(dx: i32, dy: i32) -> u32 {
    if (dx > 0 && dy > 0) || (dx < 0 && dy < 0) {
        dx.unsigned_abs().max(dy.unsigned_abs())
    } else {
        dx.unsigned_abs() + dy.unsigned_abs()
    }
}

/// Iterator returned by [`MapGeometry::spiral`].
#[derive(Clone, Debug)]
pub struct Spiral<'a> {
    geometry: &'a MapGeometry,
    center: MapPos,
    radius: u32,
    ring: u32,
    side: usize,
    step: u32,
    cursor: MapPos,
}

impl Spiral<'_> {
    fn ring_corner(&self, ring: u32) -> MapPos {
        let offset = -(ring as i32);
        self.geometry.pos_add(self.center, offset, offset)
    }
}

impl Iterator for Spiral<'_> {
    type Item = MapPos;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ring == 0 {
            self.ring = 1;
            self.cursor = self.ring_corner(1);
            return Some(self.center);
        }

        if self.ring > self.radius {
            return None;
        }

        let current = self.cursor;
        self.cursor = self.geometry.move_dir(self.cursor, Direction::ALL[self.side]);
        self.step += 1;
        if self.step == self.ring {
            self.step = 0;
            self.side += 1;
            if self.side == Direction::ALL.len() {
                self.side = 0;
                self.ring += 1;
                self.cursor = self.ring_corner(self.ring);
            }
        }

        Some(current)
    }
}
