use crate::domain::collision::{EntityKind, separation};
use crate::domain::monster::{Obstacle, snap_to_cell_center};
use crate::domain::world::World;
use rand::Rng;

use super::collisions::{blocker_index, clamp_inside};

/// Moves every monster one step along its direction, then lets its policy
/// react to whatever it bumped into.
pub fn advance_monsters(world: &mut World) {
    let tuning = world.tuning.monster;
    let bounds = world.bounds();
    let blockers = blocker_index(world);
    let live: Vec<usize> = (0..world.players.len())
        .filter(|&i| world.players[i].alive)
        .collect();

    for m in 0..world.monsters.len() {
        let monster = &mut world.monsters[m];
        if monster.brain.wants_target() {
            let target_alive = monster.brain.target.is_some_and(|t| live.contains(&t));
            if !target_alive {
                monster.brain.target = (!live.is_empty())
                    .then(|| live[world.rng.gen_range(0..live.len())]);
            }
        }
        let target = monster
            .brain
            .target
            .and_then(|t| world.players.get(t))
            .map(|p| p.actor.position);

        monster.brain.tick_timer(&tuning, &mut world.rng);
        monster
            .actor
            .translate(monster.brain.direction.unit() * tuning.speed);
        monster.actor.position = snap_to_cell_center(monster.actor.position, tuning.snap_tolerance);

        let shape = monster.actor.shape;
        let passes_terrain = monster.brain.passes_terrain();
        for contact in blockers.contacts(shape, monster.actor.position) {
            let obstacle = match contact.kind {
                EntityKind::Bomb(_) => Obstacle::Movable,
                EntityKind::Box(_) | EntityKind::Terrain { destroyable: true, .. }
                    if !passes_terrain =>
                {
                    Obstacle::Movable
                }
                EntityKind::Terrain {
                    destroyable: false, ..
                } if !passes_terrain => Obstacle::Solid,
                _ => continue,
            };
            if let Some(push) = separation(
                monster.actor.position,
                shape,
                contact.position,
                contact.shape,
            ) {
                monster.actor.translate(push);
            }
            let position = monster.actor.position;
            monster
                .brain
                .on_collision(obstacle, position, target, &tuning, &mut world.rng);
        }

        monster.actor.position = clamp_inside(monster.actor.position, shape, bounds);
        monster.actor.animation.advance();
    }
    world.mirror_positions();
}
