// The authoritative world and the snapshot mirrored from it.
//
// Every method that adds or removes an ephemeral entity edits the live
// sequence and the matching snapshot sequence together, at the same index.

use super::actor::{AnimationState, SpatialActor};
use super::effects::EffectKind;
use super::grid::{TerrainGrid, Tile};
use super::level::{Level, SpawnKind};
use super::monster::MonsterBrain;
use super::snapshot::{
    ControlRecord, EffectRecord, EntityRecord, GameState, ParticipantRecord, Rgba, TerrainChange,
    WorldSnapshot,
};
use super::state::{SimBomb, SimBox, SimExplosion, SimMonster, SimPickup, SimPlayer};
use super::systems;
use super::tuning::Tuning;
use glam::Vec2;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::info;

// Random tiles tried before a joining player falls back to the level spawn.
const SPAWN_ATTEMPTS: usize = 64;

pub struct World {
    pub grid: TerrainGrid,
    pub players: Vec<SimPlayer>,
    pub monsters: Vec<SimMonster>,
    pub bombs: Vec<SimBomb>,
    pub explosions: Vec<SimExplosion>,
    pub boxes: Vec<SimBox>,
    pub pickups: Vec<SimPickup>,
    pub tuning: Tuning,
    pub(crate) rng: StdRng,
    snapshot: WorldSnapshot,
    player_spawn: (i32, i32),
    tick: u64,
}

impl World {
    /// Loads terrain and every level entity; the round starts in the lobby.
    pub fn new(level: &Level, tuning: Tuning, rng: StdRng) -> Self {
        let mut world = Self {
            grid: level.grid.clone(),
            players: Vec::new(),
            monsters: Vec::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            boxes: Vec::new(),
            pickups: Vec::new(),
            tuning,
            rng,
            snapshot: WorldSnapshot::lobby(level.id.clone()),
            player_spawn: level.player_spawn().unwrap_or((1, 1)),
            tick: 0,
        };

        for spawn in &level.spawns {
            let (tx, ty) = (spawn.tile_x, spawn.tile_y);
            match spawn.kind {
                SpawnKind::Player => {}
                SpawnKind::Box => world.push_box(SimBox {
                    actor: SpatialActor::tile_block(tx, ty, AnimationState::new(4, 15)),
                    blank: false,
                }),
                SpawnKind::Monster(kind) => {
                    let brain = MonsterBrain::new(kind, &mut world.rng);
                    world.push_monster(SimMonster {
                        actor: SpatialActor::centered_on(
                            tx,
                            ty,
                            world.tuning.monster.radius,
                            AnimationState::new(4, 10),
                        ),
                        brain,
                    });
                }
                SpawnKind::Effect(kind) => world.push_pickup(pickup_at(tx, ty, kind)),
            }
        }
        world
    }

    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.snapshot
    }

    pub fn game_state(&self) -> GameState {
        self.snapshot.game_state
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Lobby to running; any other state is left alone.
    pub fn start(&mut self) -> bool {
        if self.snapshot.game_state != GameState::Lobby {
            return false;
        }
        self.snapshot.game_state = GameState::Running;
        info!(
            level_id = %self.snapshot.level_id,
            participants = self.players.len(),
            "round started"
        );
        true
    }

    /// Runs one simulation step while the round is running.
    pub fn tick(&mut self) {
        if self.snapshot.game_state != GameState::Running {
            return;
        }
        systems::step(self);
        self.tick += 1;
    }

    pub fn participant_index(&self, participant_id: &str) -> Option<usize> {
        self.snapshot.participant(participant_id).map(|(i, _)| i)
    }

    /// Appends a participant record and its player; returns the record index.
    pub fn add_participant(
        &mut self,
        participant_id: impl Into<String>,
        display_name: impl Into<String>,
        color: Rgba,
    ) -> usize {
        let (tx, ty) = if self.players.is_empty() {
            self.player_spawn
        } else {
            self.random_open_tile().unwrap_or(self.player_spawn)
        };
        let actor = SpatialActor::centered_on(
            tx,
            ty,
            self.tuning.player.radius,
            AnimationState::new(3, 10),
        );
        self.players.push(SimPlayer::new(actor, &self.tuning.player));
        self.snapshot.participants.push(ParticipantRecord {
            participant_id: participant_id.into(),
            display_name: display_name.into(),
            x: actor.position.x,
            y: actor.position.y,
            color,
            control: ControlRecord::default(),
            dead: false,
            score: 0,
            latency_ms: 0,
        });
        self.snapshot.participants.len() - 1
    }

    /// Merges the latest control record a participant sent.
    pub fn set_control(&mut self, index: usize, control: ControlRecord, latency_ms: Option<u32>) {
        let (Some(player), Some(record)) = (
            self.players.get_mut(index),
            self.snapshot.participants.get_mut(index),
        ) else {
            return;
        };
        // Abilities stay armed until a tick consumes them.
        player.control = ControlRecord {
            ability1: player.control.ability1 || control.ability1,
            ability2: player.control.ability2 || control.ability2,
            ..control
        };
        record.control = control;
        if let Some(latency_ms) = latency_ms {
            record.latency_ms = latency_ms;
        }
    }

    /// Marks a participant dead without removing its record.
    pub fn kill_participant(&mut self, index: usize) {
        let (Some(player), Some(record)) = (
            self.players.get_mut(index),
            self.snapshot.participants.get_mut(index),
        ) else {
            return;
        };
        if !player.alive {
            return;
        }
        player.alive = false;
        player.control = ControlRecord::default();
        record.dead = true;
        info!(
            participant_id = %record.participant_id,
            score = record.score,
            "participant died"
        );
    }

    pub(crate) fn award_point(&mut self, owner: Option<usize>) {
        if let Some(record) = owner.and_then(|i| self.snapshot.participants.get_mut(i)) {
            record.score += 1;
        }
    }

    pub(crate) fn refresh_round_state(&mut self) {
        if self.snapshot.game_state == GameState::Running && self.snapshot.everyone_dead() {
            self.snapshot.game_state = GameState::Ended;
            info!(ticks = self.tick, "round ended");
        }
    }

    /// Copies player and monster positions into the snapshot.
    pub(crate) fn mirror_positions(&mut self) {
        for (player, record) in self.players.iter().zip(self.snapshot.participants.iter_mut()) {
            record.x = player.actor.position.x;
            record.y = player.actor.position.y;
        }
        for (monster, record) in self.monsters.iter().zip(self.snapshot.monsters.iter_mut()) {
            *record = EntityRecord::from(&monster.actor);
        }
    }

    /// Reveals a destroyable tile as grass and logs the change.
    pub(crate) fn clear_tile(&mut self, tile_x: i32, tile_y: i32) -> bool {
        if !self.grid.get(tile_x, tile_y).is_some_and(Tile::is_destroyable) {
            return false;
        }
        self.grid.set(tile_x, tile_y, Tile::Grass);
        self.snapshot.terrain_changes.push(TerrainChange {
            tile_x,
            tile_y,
            to: Tile::Grass,
        });
        true
    }

    fn push_monster(&mut self, monster: SimMonster) {
        self.snapshot.monsters.push(EntityRecord::from(&monster.actor));
        self.monsters.push(monster);
    }

    pub(crate) fn push_bomb(&mut self, bomb: SimBomb) {
        self.snapshot.bombs.push(EntityRecord::from(&bomb.actor));
        self.bombs.push(bomb);
    }

    pub(crate) fn remove_bomb(&mut self, index: usize) -> SimBomb {
        self.snapshot.bombs.remove(index);
        self.bombs.remove(index)
    }

    pub(crate) fn push_explosion(&mut self, explosion: SimExplosion) {
        self.snapshot
            .explosions
            .push(EntityRecord::from(&explosion.actor));
        self.explosions.push(explosion);
    }

    pub(crate) fn remove_explosion(&mut self, index: usize) -> SimExplosion {
        self.snapshot.explosions.remove(index);
        self.explosions.remove(index)
    }

    pub(crate) fn push_box(&mut self, sim_box: SimBox) {
        self.snapshot.boxes.push(EntityRecord::from(&sim_box.actor));
        self.boxes.push(sim_box);
    }

    pub(crate) fn remove_box(&mut self, index: usize) -> SimBox {
        self.snapshot.boxes.remove(index);
        self.boxes.remove(index)
    }

    pub(crate) fn push_pickup(&mut self, pickup: SimPickup) {
        self.snapshot.effects.push(EffectRecord::from(&pickup));
        self.pickups.push(pickup);
    }

    pub(crate) fn remove_pickup(&mut self, index: usize) -> SimPickup {
        self.snapshot.effects.remove(index);
        self.pickups.remove(index)
    }

    pub(crate) fn bomb_at(&self, tile: (i32, i32)) -> Option<usize> {
        self.bombs.iter().position(|b| b.actor.tile() == tile)
    }

    pub(crate) fn box_at(&self, tile: (i32, i32)) -> Option<usize> {
        self.boxes.iter().position(|b| b.actor.tile() == tile)
    }

    /// Grass tile with nothing standing or lying on it, if one turns up.
    fn random_open_tile(&mut self) -> Option<(i32, i32)> {
        let (width, height) = (self.grid.width() as i32, self.grid.height() as i32);
        if width == 0 || height == 0 {
            return None;
        }
        for _ in 0..SPAWN_ATTEMPTS {
            let tile = (self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            let occupied = self.box_at(tile).is_some()
                || self.monsters.iter().any(|m| m.actor.tile() == tile)
                || self.players.iter().any(|p| p.actor.tile() == tile);
            if self.grid.is_open(tile.0, tile.1) && !occupied {
                return Some(tile);
            }
        }
        None
    }

    /// Map size in pixels.
    pub fn bounds(&self) -> Vec2 {
        self.grid.pixel_size()
    }
}

pub(crate) fn pickup_at(tile_x: i32, tile_y: i32, kind: EffectKind) -> SimPickup {
    SimPickup {
        actor: SpatialActor::centered_on(tile_x, tile_y, 6.0, AnimationState::new(4, 12)),
        kind,
    }
}
