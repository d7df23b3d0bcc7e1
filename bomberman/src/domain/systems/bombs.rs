use crate::domain::actor::{AnimationState, SpatialActor};
use crate::domain::grid::Tile;
use crate::domain::monster::Direction;
use crate::domain::state::{SimBomb, SimBox, SimExplosion};
use crate::domain::world::World;
use tracing::debug;

// Each axis stops on its own at the first blocking tile.
const BLAST_AXES: [Direction; 4] = [
    Direction::Down,
    Direction::Up,
    Direction::Right,
    Direction::Left,
];

/// Places a bomb on the owner's tile if placement is allowed, allowance
/// remains and the tile is free.
pub fn place_bomb(world: &mut World, owner: usize) -> bool {
    let player = &world.players[owner];
    if !player.stats.can_place_bomb || player.bomb_allowance() == 0 {
        return false;
    }
    let tile = player.actor.tile();
    if !world.grid.is_open(tile.0, tile.1)
        || world.bomb_at(tile).is_some()
        || world.box_at(tile).is_some()
    {
        return false;
    }

    let held = player.effect.is_some_and(|e| e.holds_bombs());
    let bomb = SimBomb {
        actor: SpatialActor::centered_on(
            tile.0,
            tile.1,
            world.tuning.bomb.radius,
            AnimationState::new(3, 20),
        ),
        owner,
        range: player.stats.bomb_range,
        fuse: world.tuning.bomb.fuse_ticks,
        held,
        detonate_now: false,
        owner_on_top: true,
    };
    world.players[owner].bombs_in_flight += 1;
    world.push_bomb(bomb);
    debug!(owner, tile_x = tile.0, tile_y = tile.1, held, "bomb placed");
    true
}

/// Drops a blank obstacle on the tile the owner is facing.
pub fn place_obstacle(world: &mut World, owner: usize) -> bool {
    let player = &world.players[owner];
    let (tx, ty) = player.actor.tile();
    let (dx, dy) = player.facing.tile_offset();
    let tile = (tx + dx, ty + dy);

    let occupied = world.bomb_at(tile).is_some()
        || world.box_at(tile).is_some()
        || world.players.iter().any(|p| p.alive && p.actor.tile() == tile)
        || world.monsters.iter().any(|m| m.actor.tile() == tile);
    if occupied || !world.grid.is_open(tile.0, tile.1) {
        return false;
    }

    let player = &mut world.players[owner];
    player.stats.obstacles = player.stats.obstacles.saturating_sub(1);
    world.push_box(SimBox {
        actor: SpatialActor::tile_block(tile.0, tile.1, AnimationState::still()),
        blank: true,
    });
    true
}

pub fn detonate_held(world: &mut World, owner: usize) {
    for bomb in world.bombs.iter_mut().filter(|b| b.owner == owner && b.held) {
        bomb.detonate_now = true;
    }
}

/// Held bombs go back to their normal fuse.
pub fn release_held(world: &mut World, owner: usize) {
    for bomb in world.bombs.iter_mut().filter(|b| b.owner == owner) {
        bomb.held = false;
    }
}

pub fn advance_bombs(world: &mut World) {
    let mut index = 0;
    while index < world.bombs.len() {
        if world.bombs[index].tick() {
            let bomb = world.remove_bomb(index);
            detonate(world, &bomb);
        } else {
            index += 1;
        }
    }
}

fn detonate(world: &mut World, bomb: &SimBomb) {
    if let Some(owner) = world.players.get_mut(bomb.owner) {
        owner.bombs_in_flight = owner.bombs_in_flight.saturating_sub(1);
    }

    let origin = bomb.actor.tile();
    spawn_explosion(world, origin, bomb.owner);
    for direction in BLAST_AXES {
        let (dx, dy) = direction.tile_offset();
        for step in 1..=bomb.range as i32 {
            let tile = (origin.0 + dx * step, origin.1 + dy * step);
            match world.grid.get(tile.0, tile.1) {
                None | Some(Tile::Solid) => break,
                Some(Tile::Brick) => {
                    spawn_explosion(world, tile, bomb.owner);
                    break;
                }
                Some(Tile::Grass) => {
                    spawn_explosion(world, tile, bomb.owner);
                    if world.box_at(tile).is_some() {
                        break;
                    }
                }
            }
        }
    }
    debug!(
        owner = bomb.owner,
        tile_x = origin.0,
        tile_y = origin.1,
        range = bomb.range,
        "bomb detonated"
    );
}

fn spawn_explosion(world: &mut World, tile: (i32, i32), owner: usize) {
    let explosion = SimExplosion {
        actor: SpatialActor::centered_on(
            tile.0,
            tile.1,
            world.tuning.bomb.explosion_radius,
            AnimationState::new(8, 12),
        ),
        owner: Some(owner),
        ttl: world.tuning.bomb.explosion_ticks,
    };
    world.push_explosion(explosion);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::{ControlRecord, HOST_COLOR, TerrainChange};
    use crate::domain::test_support::{open_level, world_for};
    use glam::Vec2;

    fn bomber_at(world: &mut World, tile: (i32, i32)) {
        world.add_participant("p0", "host", HOST_COLOR);
        world.players[0].actor.position = crate::domain::grid::tile_center(tile.0, tile.1);
        world.start();
    }

    fn place(world: &mut World) {
        world.set_control(
            0,
            ControlRecord {
                ability1: true,
                ..ControlRecord::default()
            },
            None,
        );
        world.tick();
    }

    #[test]
    fn when_fuse_runs_out_then_bomb_detonates_once_and_returns_allowance() {
        let mut world = world_for(&open_level(&[]));
        bomber_at(&mut world, (5, 5));
        place(&mut world);
        // Walk off so the blast does not end the round.
        world.players[0].actor.position = Vec2::new(200.0, 200.0);
        assert_eq!(world.players[0].bomb_allowance(), 0);

        let mut detonations = 0;
        for _ in 1..180 {
            let before = world.bombs.len();
            world.tick();
            if before == 1 && world.bombs.is_empty() {
                detonations += 1;
            }
        }
        assert_eq!(detonations, 1);
        assert!(world.bombs.is_empty());
        assert!(world.snapshot().bombs.is_empty());
        assert_eq!(world.players[0].bomb_allowance(), 1);
    }

    #[test]
    fn when_bomb_is_one_tick_short_of_its_fuse_then_it_is_still_armed() {
        let mut world = world_for(&open_level(&[]));
        bomber_at(&mut world, (5, 5));
        place(&mut world);
        world.players[0].actor.position = Vec2::new(200.0, 200.0);

        // Placement tick already counted one fuse tick.
        for _ in 0..178 {
            world.tick();
        }
        assert_eq!(world.bombs.len(), 1);
        world.tick();
        assert!(world.bombs.is_empty());
    }

    #[test]
    fn when_axis_hits_solid_tile_then_propagation_stops_there() {
        let mut world = world_for(&open_level(&[(6, 5, Tile::Solid)]));
        bomber_at(&mut world, (5, 5));
        world.players[0].stats.bomb_range = 3;
        place(&mut world);
        world.players[0].actor.position = Vec2::new(200.0, 200.0);
        for _ in 0..179 {
            world.tick();
        }

        let tiles: Vec<_> = world.explosions.iter().map(|e| e.actor.tile()).collect();
        assert!(tiles.contains(&(5, 5)));
        assert!(!tiles.contains(&(6, 5)));
        assert!(!tiles.contains(&(7, 5)));
        assert!(tiles.contains(&(4, 5)) && tiles.contains(&(2, 5)));
        assert_eq!(world.explosions.len(), world.snapshot().explosions.len());
    }

    #[test]
    fn when_axis_meets_bricks_then_only_the_first_is_destroyed() {
        let mut world = world_for(&open_level(&[(5, 6, Tile::Brick), (5, 7, Tile::Brick)]));
        bomber_at(&mut world, (5, 5));
        world.players[0].stats.bomb_range = 3;
        place(&mut world);
        world.players[0].actor.position = Vec2::new(200.0, 200.0);
        for _ in 0..179 {
            world.tick();
        }

        assert_eq!(
            world.snapshot().terrain_changes,
            vec![TerrainChange {
                tile_x: 5,
                tile_y: 6,
                to: Tile::Grass
            }]
        );
        assert_eq!(world.grid.get(5, 7), Some(Tile::Brick));
        assert_eq!(world.snapshot().participants[0].score, 1);
    }
}
