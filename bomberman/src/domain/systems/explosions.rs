use crate::domain::effects::EffectKind;
use crate::domain::world::{World, pickup_at};
use rand::Rng;
use tracing::debug;

/// Ages explosions, then lets every live one act on its tile. The check runs
/// on every tick an explosion exists, not only when it appears.
pub fn advance_explosions(world: &mut World) {
    let mut index = 0;
    while index < world.explosions.len() {
        let explosion = &mut world.explosions[index];
        explosion.ttl = explosion.ttl.saturating_sub(1);
        if explosion.ttl == 0 {
            world.remove_explosion(index);
        } else {
            index += 1;
        }
    }

    for index in 0..world.explosions.len() {
        let tile = world.explosions[index].actor.tile();
        let owner = world.explosions[index].owner;

        for player in 0..world.players.len() {
            let p = &world.players[player];
            if p.alive && !p.is_invincible() && p.actor.tile() == tile {
                world.kill_participant(player);
            }
        }

        while let Some(box_index) = world.box_at(tile) {
            let destroyed = world.remove_box(box_index);
            world.award_point(owner);
            let drop_chance = world.tuning.effect.box_drop_chance;
            if !destroyed.blank && world.rng.gen_bool(drop_chance) {
                let kind = EffectKind::random(&mut world.rng);
                world.push_pickup(pickup_at(tile.0, tile.1, kind));
                debug!(tile_x = tile.0, tile_y = tile.1, ?kind, "box dropped pickup");
            }
        }

        if world.clear_tile(tile.0, tile.1) {
            world.award_point(owner);
        }
    }
}
