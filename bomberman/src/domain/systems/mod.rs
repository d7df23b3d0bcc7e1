// Per-tick systems, run in a fixed order by `step`.

pub mod bombs;
pub mod collisions;
pub mod explosions;
pub mod monsters;
pub mod players;

use super::world::World;

pub fn step(world: &mut World) {
    players::apply_controls(world);
    monsters::advance_monsters(world);
    bombs::advance_bombs(world);
    explosions::advance_explosions(world);
    collisions::resolve_players(world);
    animate_idle(world);
    world.mirror_positions();
    world.refresh_round_state();
}

fn animate_idle(world: &mut World) {
    for pickup in &mut world.pickups {
        pickup.actor.animation.advance();
    }
    for sim_box in &mut world.boxes {
        sim_box.actor.animation.advance();
    }
}
