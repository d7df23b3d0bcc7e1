use crate::domain::monster::Direction;
use crate::domain::world::World;
use glam::Vec2;

use super::bombs;

/// Applies each live player's latest control record: effect countdown,
/// abilities, then movement.
pub fn apply_controls(world: &mut World) {
    let tuning = world.tuning;
    for index in 0..world.players.len() {
        if !world.players[index].alive {
            continue;
        }

        let player = &mut world.players[index];
        if let Some(mut effect) = player.effect.take() {
            if effect.tick(&mut player.stats, &tuning.player, &tuning.effect) {
                if effect.holds_bombs() {
                    bombs::release_held(world, index);
                }
            } else {
                player.effect = Some(effect);
            }
        }

        let player = &mut world.players[index];
        let control = player.control;
        // Ability triggers are consumed by the tick that reads them.
        player.control.ability1 = false;
        player.control.ability2 = false;

        let (effect, obstacles) = (player.effect, player.stats.obstacles);
        if control.ability2 {
            match effect {
                Some(effect) if effect.holds_bombs() => bombs::detonate_held(world, index),
                Some(effect) if effect.places_obstacles() && obstacles > 0 => {
                    bombs::place_obstacle(world, index);
                }
                _ => {}
            }
        }

        let player = &world.players[index];
        if player.stats.auto_place_bomb || control.ability1 {
            bombs::place_bomb(world, index);
        }

        let player = &mut world.players[index];
        let mut delta = Vec2::ZERO;
        // Later keys win the facing, matching the walk animation order.
        for (pressed, direction) in [
            (control.up, Direction::Up),
            (control.down, Direction::Down),
            (control.left, Direction::Left),
            (control.right, Direction::Right),
        ] {
            if pressed {
                delta += direction.unit();
                player.facing = direction;
            }
        }
        if delta != Vec2::ZERO {
            player.actor.translate(delta * player.stats.speed);
            player.actor.animation.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::effects::{ActiveEffect, EffectKind};
    use crate::domain::snapshot::{ControlRecord, HOST_COLOR};
    use crate::domain::test_support::{open_level, world_for};

    #[test]
    fn when_moving_right_then_player_advances_by_its_speed() {
        let mut world = world_for(&open_level(&[]));
        world.add_participant("p0", "host", HOST_COLOR);
        world.start();
        let start = world.players[0].actor.position;

        world.set_control(
            0,
            ControlRecord {
                right: true,
                ..ControlRecord::default()
            },
            None,
        );
        world.tick();

        let moved = world.players[0].actor.position - start;
        assert!((moved.x - 0.6).abs() < 1e-5);
        assert_eq!(moved.y, 0.0);
        assert_eq!(world.snapshot().participants[0].x, world.players[0].actor.position.x);
    }

    #[test]
    fn when_ability_is_held_then_only_one_bomb_is_placed_per_tile() {
        let mut world = world_for(&open_level(&[]));
        world.add_participant("p0", "host", HOST_COLOR);
        world.players[0].stats.bomb_capacity = 3;
        world.start();

        for _ in 0..5 {
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

        assert_eq!(world.bombs.len(), 1);
        assert_eq!(world.snapshot().bombs.len(), 1);
        assert_eq!(world.players[0].bombs_in_flight, 1);
        assert_eq!(world.players[0].bomb_allowance(), 2);
    }

    #[test]
    fn when_detonator_is_active_then_ability_two_sets_off_held_bombs() {
        let mut world = world_for(&open_level(&[]));
        world.add_participant("p0", "host", HOST_COLOR);
        world.start();
        let mut effect = ActiveEffect::new(EffectKind::DetonatorIncrease, 1800, &mut world.rng);
        effect.install(&mut world.players[0].stats, &world.tuning.effect);
        world.players[0].effect = Some(effect);

        world.set_control(0, ControlRecord { ability1: true, ..ControlRecord::default() }, None);
        for _ in 0..400 {
            world.tick();
        }
        assert_eq!(world.bombs.len(), 1, "held bomb must not go off on its own");

        world.set_control(0, ControlRecord { ability2: true, ..ControlRecord::default() }, None);
        world.tick();
        assert!(world.bombs.is_empty());
        assert_eq!(world.players[0].bombs_in_flight, 0);
        // The owner stood on the bomb, so the blast caught them.
        assert!(world.snapshot().participants[0].dead);
        assert!(!world.explosions.is_empty());
    }
}
