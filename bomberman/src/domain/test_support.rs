// Level and world builders shared by the domain tests.

use super::grid::{TerrainGrid, Tile};
use super::level::{LEVEL_ROWS, Level, Spawn};
use super::tuning::Tuning;
use super::world::World;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Square map walled in by solid tiles, grass inside, with `terrain`
/// overrides and the given spawns.
pub fn level_with(terrain: &[(i32, i32, Tile)], spawns: &[Spawn]) -> Level {
    let size = LEVEL_ROWS as i32;
    let mut grid = TerrainGrid::filled(LEVEL_ROWS, LEVEL_ROWS, Tile::Grass);
    for i in 0..size {
        grid.set(i, 0, Tile::Solid);
        grid.set(i, size - 1, Tile::Solid);
        grid.set(0, i, Tile::Solid);
        grid.set(size - 1, i, Tile::Solid);
    }
    for &(x, y, tile) in terrain {
        grid.set(x, y, tile);
    }
    Level {
        id: "test".to_string(),
        grid,
        spawns: spawns.to_vec(),
    }
}

pub fn open_level(terrain: &[(i32, i32, Tile)]) -> Level {
    level_with(terrain, &[])
}

pub fn world_for(level: &Level) -> World {
    World::new(level, Tuning::default(), StdRng::seed_from_u64(7))
}
