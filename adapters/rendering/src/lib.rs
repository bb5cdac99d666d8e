#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pixel coordinate conversions shared by Freeserf presentation adapters.
//!
//! Three spaces are involved. Tile space addresses map tiles by [`MapPos`].
//! Map space is the pixel plane of the whole toroidal map, where a tile is
//! drawn `TILE_WIDTH` by `TILE_HEIGHT` pixels, every row is shifted half a
//! tile to the left and every height step raises the tile by
//! [`HEIGHT_STEP`] pixels. View space is map space shifted by the scroll
//! offset of a viewport.

use freeserf_core::{Direction, MapGeometry, MapPos, TerrainView};
use glam::IVec2;

/// Width of a tile in pixels.
pub const TILE_WIDTH: i32 = 32;

/// Height of a tile row in pixels.
pub const TILE_HEIGHT: i32 = 20;

/// Pixels a tile is raised per unit of terrain height.
pub const HEIGHT_STEP: i32 = 4;

/// Converts between tile, map and view coordinates of one map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinateSpace {
    geometry: MapGeometry,
    scroll: IVec2,
}

impl CoordinateSpace {
    /// Creates a coordinate space with the view scrolled to the map origin.
    #[must_use]
    pub fn new(geometry: MapGeometry) -> Self {
        Self {
            geometry,
            scroll: IVec2::ZERO,
        }
    }

    /// Geometry the space converts for.
    #[must_use]
    pub fn geometry(&self) -> &MapGeometry {
        &self.geometry
    }

    /// Width of the map plane in pixels.
    #[must_use]
    pub fn map_width(&self) -> i32 {
        self.geometry.columns() as i32 * TILE_WIDTH
    }

    /// Height of the map plane in pixels.
    #[must_use]
    pub fn map_height(&self) -> i32 {
        self.geometry.rows() as i32 * TILE_HEIGHT
    }

    /// Ratio between the map width and the horizontal shift applied when a
    /// point wraps vertically: 4 when the map has twice as many columns as
    /// rows (even sizes above zero), 2 when it is square.
    ///
    /// Size 0 is even but square, so it gets 2 rather than the 4 the even
    /// sizes otherwise share; that keeps the shift equal to the real row
    /// shear of `rows * TILE_WIDTH / 2` pixels.
    #[must_use]
    pub fn column_row_factor(&self) -> i32 {
        (2 * self.geometry.columns() / self.geometry.rows()) as i32
    }

    fn wrap_shift(&self) -> i32 {
        self.map_width() / self.column_row_factor()
    }

    /// Folds a map-space point back onto the map plane.
    ///
    /// Crossing the top or bottom edge also shifts the point horizontally,
    /// since the rows of the map are sheared.
    #[must_use]
    pub fn wrap(&self, point: IVec2) -> IVec2 {
        let (width, height) = (self.map_width(), self.map_height());
        let shift = self.wrap_shift();
        let IVec2 { mut x, mut y } = point;
        while y < 0 {
            y += height;
            x -= shift;
        }
        while y >= height {
            y -= height;
            x += shift;
        }
        IVec2::new(x.rem_euclid(width), y)
    }

    /// Shortest offset from `from` to `to` on the wrapped plane.
    #[must_use]
    pub fn offset(&self, from: IVec2, to: IVec2) -> IVec2 {
        let (width, height) = (self.map_width(), self.map_height());
        let shift = self.wrap_shift();
        let mut delta = to - from;
        if delta.y >= height / 2 {
            delta.y -= height;
            delta.x += shift;
        } else if delta.y < -height / 2 {
            delta.y += height;
            delta.x -= shift;
        }
        delta.x = (delta.x + width / 2).rem_euclid(width) - width / 2;
        delta
    }

    /// Pixel anchor of the tile at `pos`.
    #[must_use]
    pub fn tile_space_to_map_space<T: TerrainView + ?Sized>(&self, terrain: &T, pos: MapPos) -> IVec2 {
        let column = self.geometry.pos_column(pos) as i32;
        let row = self.geometry.pos_row(pos) as i32;
        let height = terrain.height(pos) as i32;
        self.wrap(IVec2::new(
            TILE_WIDTH * column - (TILE_WIDTH / 2) * row,
            TILE_HEIGHT * row - HEIGHT_STEP * height,
        ))
    }

    /// Tile whose anchor lies closest to a map-space point.
    ///
    /// Starts at the tile the point would fall in on flat terrain and walks
    /// down its pixel column, taking a Down or DownRight step by the parity of
    /// the row offset, until a tile is drawn below the point. The answer is
    /// the nearest anchor among that tile and its six neighbours; ties keep
    /// the earlier one in spiral order.
    #[must_use]
    pub fn map_space_to_tile_space<T: TerrainView + ?Sized>(&self, terrain: &T, point: IVec2) -> MapPos {
        let target = self.wrap(point);
        let mut row = target.y / TILE_HEIGHT;
        let column = (target.x + (TILE_WIDTH / 2) * row).div_euclid(TILE_WIDTH);
        let mut pos = self.unwrapped_pos(column, row);

        while target.y >= TILE_HEIGHT * row - HEIGHT_STEP * terrain.height(pos) as i32 {
            let dir = if (target.x + (TILE_WIDTH / 2) * row).rem_euclid(TILE_WIDTH) >= TILE_WIDTH / 2 {
                Direction::DownRight
            } else {
                Direction::Down
            };
            pos = self.geometry.move_dir(pos, dir);
            row += 1;
        }

        let mut best = pos;
        let mut best_distance = i32::MAX;
        for candidate in self.geometry.spiral(pos, 1) {
            let anchor = self.tile_space_to_map_space(terrain, candidate);
            let distance = self.offset(target, anchor).length_squared();
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }

    fn unwrapped_pos(&self, column: i32, row: i32) -> MapPos {
        self.geometry.pos_add(self.geometry.pos(0, 0), column, row)
    }

    /// Current scroll offset of the view.
    #[must_use]
    pub fn scroll(&self) -> IVec2 {
        self.scroll
    }

    /// Moves the view so its top-left corner shows the map-space `offset`.
    pub fn set_scroll(&mut self, offset: IVec2) {
        self.scroll = self.wrap(offset);
    }

    /// Centres a view of `view_size` pixels on the tile at `pos`.
    pub fn scroll_to<T: TerrainView + ?Sized>(&mut self, terrain: &T, pos: MapPos, view_size: IVec2) {
        let anchor = self.tile_space_to_map_space(terrain, pos);
        self.set_scroll(anchor - view_size / 2);
    }

    /// Converts a map-space point to view space.
    #[must_use]
    pub fn map_space_to_view_space(&self, point: IVec2) -> IVec2 {
        self.wrap(point - self.scroll)
    }

    /// Converts a view-space point to map space.
    #[must_use]
    pub fn view_space_to_map_space(&self, point: IVec2) -> IVec2 {
        self.wrap(point + self.scroll)
    }

    /// View-space anchor of the tile at `pos`.
    #[must_use]
    pub fn tile_space_to_view_space<T: TerrainView + ?Sized>(&self, terrain: &T, pos: MapPos) -> IVec2 {
        self.map_space_to_view_space(self.tile_space_to_map_space(terrain, pos))
    }

    /// Tile shown closest to a view-space point.
    #[must_use]
    pub fn view_space_to_tile_space<T: TerrainView + ?Sized>(&self, terrain: &T, point: IVec2) -> MapPos {
        self.map_space_to_tile_space(terrain, self.view_space_to_map_space(point))
    }
}
