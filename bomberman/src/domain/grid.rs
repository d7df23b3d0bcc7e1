// Static terrain grid addressed in 16 px tiles.

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub const TILE_SIZE: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tile {
    Grass,
    Solid,
    // Blocks movement like solid terrain but is cleared by explosions.
    Brick,
}

impl Tile {
    pub fn blocks(self) -> bool {
        matches!(self, Tile::Solid | Tile::Brick)
    }

    pub fn is_destroyable(self) -> bool {
        matches!(self, Tile::Brick)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrainGrid {
    width: usize,
    height: usize,
    // Row-major.
    tiles: Vec<Tile>,
}

impl TerrainGrid {
    pub fn filled(width: usize, height: usize, tile: Tile) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile; width * height],
        }
    }

    /// Builds a grid from rows of possibly different length; the grid is as
    /// wide as the longest row and short rows are padded with grass.
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let height = rows.len();
        let mut tiles = Vec::with_capacity(width * height);
        for mut row in rows {
            row.resize(width, Tile::Grass);
            tiles.extend(row);
        }
        Self {
            width,
            height,
            tiles,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Size of the map in pixels.
    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32) * TILE_SIZE
    }

    fn offset(&self, tile_x: i32, tile_y: i32) -> Option<usize> {
        if tile_x < 0 || tile_y < 0 {
            return None;
        }
        let (x, y) = (tile_x as usize, tile_y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    pub fn get(&self, tile_x: i32, tile_y: i32) -> Option<Tile> {
        self.offset(tile_x, tile_y).map(|i| self.tiles[i])
    }

    /// Replaces one tile; out-of-range coordinates leave the grid untouched.
    pub fn set(&mut self, tile_x: i32, tile_y: i32, tile: Tile) -> bool {
        match self.offset(tile_x, tile_y) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self, tile_x: i32, tile_y: i32) -> bool {
        self.get(tile_x, tile_y).is_some_and(|t| !t.blocks())
    }

    /// Every blocking tile with its coordinates.
    pub fn blocking_tiles(&self) -> impl Iterator<Item = (i32, i32, Tile)> + '_ {
        self.tiles.iter().enumerate().filter_map(move |(i, tile)| {
            tile.blocks()
                .then(|| ((i % self.width) as i32, (i / self.width) as i32, *tile))
        })
    }
}

pub fn tile_of(position: Vec2) -> (i32, i32) {
    (
        (position.x / TILE_SIZE).floor() as i32,
        (position.y / TILE_SIZE).floor() as i32,
    )
}

pub fn tile_origin(tile_x: i32, tile_y: i32) -> Vec2 {
    Vec2::new(tile_x as f32, tile_y as f32) * TILE_SIZE
}

pub fn tile_center(tile_x: i32, tile_y: i32) -> Vec2 {
    tile_origin(tile_x, tile_y) + Vec2::splat(TILE_SIZE / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_rows_differ_in_length_then_short_rows_are_padded_with_grass() {
        let grid = TerrainGrid::from_rows(vec![
            vec![Tile::Solid, Tile::Solid, Tile::Solid],
            vec![Tile::Solid],
        ]);

        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.get(2, 1), Some(Tile::Grass));
    }

    #[test]
    fn when_tile_is_out_of_range_then_lookup_and_mutation_are_rejected() {
        let mut grid = TerrainGrid::filled(4, 4, Tile::Grass);

        assert_eq!(grid.get(-1, 0), None);
        assert_eq!(grid.get(4, 0), None);
        assert!(!grid.set(0, 4, Tile::Solid));
        assert!(grid.set(3, 3, Tile::Solid));
        assert_eq!(grid.get(3, 3), Some(Tile::Solid));
    }

    #[test]
    fn when_position_is_inside_a_tile_then_tile_of_floors_each_axis() {
        assert_eq!(tile_of(Vec2::new(0.0, 15.9)), (0, 0));
        assert_eq!(tile_of(Vec2::new(16.0, 33.0)), (1, 2));
        assert_eq!(tile_of(Vec2::new(-0.5, 8.0)), (-1, 0));
    }

    #[test]
    fn when_listing_blocking_tiles_then_grass_is_skipped() {
        let mut grid = TerrainGrid::filled(3, 2, Tile::Grass);
        grid.set(1, 0, Tile::Solid);
        grid.set(2, 1, Tile::Brick);

        let blocking: Vec<_> = grid.blocking_tiles().collect();
        assert_eq!(blocking, vec![(1, 0, Tile::Solid), (2, 1, Tile::Brick)]);
    }
}
