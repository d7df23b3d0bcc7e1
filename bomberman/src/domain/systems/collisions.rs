use crate::domain::actor::{AnimationState, Shape, SpatialActor};
use crate::domain::collision::{EntityKind, SpatialIndex, separation};
use crate::domain::effects::{ActiveEffect, EffectKind};
use crate::domain::world::World;
use glam::Vec2;
use tracing::debug;

use super::bombs;

/// Terrain, bombs and boxes: everything that stops movement.
pub fn blocker_index(world: &World) -> SpatialIndex {
    let mut index = SpatialIndex::new();
    for (tile_x, tile_y, tile) in world.grid.blocking_tiles() {
        let block = SpatialActor::tile_block(tile_x, tile_y, AnimationState::still());
        index.insert(
            EntityKind::Terrain {
                tile_x,
                tile_y,
                destroyable: tile.is_destroyable(),
            },
            &block,
        );
    }
    for (i, bomb) in world.bombs.iter().enumerate() {
        index.insert(EntityKind::Bomb(i), &bomb.actor);
    }
    for (i, sim_box) in world.boxes.iter().enumerate() {
        index.insert(EntityKind::Box(i), &sim_box.actor);
    }
    index
}

fn full_index(world: &World) -> SpatialIndex {
    let mut index = blocker_index(world);
    for (i, monster) in world.monsters.iter().enumerate() {
        index.insert(EntityKind::Monster(i), &monster.actor);
    }
    for (i, explosion) in world.explosions.iter().enumerate() {
        index.insert(EntityKind::Explosion(i), &explosion.actor);
    }
    for (i, pickup) in world.pickups.iter().enumerate() {
        index.insert(EntityKind::Effect(i), &pickup.actor);
    }
    for (i, player) in world.players.iter().enumerate().filter(|(_, p)| p.alive) {
        index.insert(EntityKind::Player(i), &player.actor);
    }
    index
}

/// Pushes players out of blockers, applies lethal contacts and hands out
/// pickups.
pub fn resolve_players(world: &mut World) {
    let index = full_index(world);
    let bounds = world.bounds();
    // Pickup index -> first player that touched it this tick.
    let mut claims: Vec<Option<usize>> = vec![None; world.pickups.len()];

    for p in 0..world.players.len() {
        if !world.players[p].alive {
            continue;
        }
        let start = world.players[p].actor;
        let passes = world.players[p].passes_through_blocks();
        let invincible = world.players[p].is_invincible();
        let mut position = start.position;
        let mut lethal = false;

        for contact in index.contacts(start.shape, start.position) {
            let blocks = match contact.kind {
                EntityKind::Terrain { .. } => true,
                EntityKind::Bomb(b) => {
                    let bomb = &world.bombs[b];
                    !passes && !(bomb.owner == p && bomb.owner_on_top)
                }
                EntityKind::Box(_) => !passes,
                EntityKind::Monster(_) | EntityKind::Explosion(_) => {
                    lethal |= !invincible;
                    false
                }
                EntityKind::Effect(e) => {
                    if claims[e].is_none() {
                        claims[e] = Some(p);
                    }
                    false
                }
                EntityKind::Player(_) => false,
            };
            // Earlier pushes may already have cleared this contact.
            if blocks {
                if let Some(push) = separation(position, start.shape, contact.position, contact.shape)
                {
                    position += push;
                }
            }
        }

        world.players[p].actor.position = clamp_inside(position, start.shape, bounds);
        if lethal {
            world.kill_participant(p);
        }
    }

    for (e, claimant) in claims.into_iter().enumerate().rev() {
        if let Some(p) = claimant {
            let pickup = world.remove_pickup(e);
            install_effect(world, p, pickup.kind);
        }
    }

    for bomb in world.bombs.iter_mut().filter(|b| b.owner_on_top) {
        let owner = &world.players[bomb.owner];
        let still_on_top = owner.alive
            && separation(
                owner.actor.position,
                owner.actor.shape,
                bomb.actor.position,
                bomb.actor.shape,
            )
            .is_some();
        bomb.owner_on_top = still_on_top;
    }
}

/// Keeps a centre-positioned circle inside the map.
pub fn clamp_inside(position: Vec2, shape: Shape, bounds: Vec2) -> Vec2 {
    let radius = match shape {
        Shape::Circle { radius } => radius,
        Shape::Rect { .. } => 0.0,
    };
    let min = Vec2::splat(radius);
    position.clamp(min, (bounds - radius).max(min))
}

fn install_effect(world: &mut World, p: usize, kind: EffectKind) {
    let tuning = world.tuning;
    let mut effect = ActiveEffect::new(kind, tuning.effect.duration_ticks, &mut world.rng);
    let player = &mut world.players[p];
    let previous = player.effect.take();
    if let Some(previous) = previous {
        previous.restore(&mut player.stats, &tuning.player);
    }
    effect.install(&mut player.stats, &tuning.effect);
    player.effect = Some(effect);

    if previous.is_some_and(|e| e.holds_bombs()) {
        bombs::release_held(world, p);
    }
    debug!(participant = p, ?kind, "effect picked up");
}
