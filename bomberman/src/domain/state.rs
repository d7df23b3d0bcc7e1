// Domain-level simulation entities. Each embeds one `SpatialActor` by value.

use super::actor::SpatialActor;
use super::effects::{ActiveEffect, EffectKind};
use super::monster::{Direction, MonsterBrain};
use super::snapshot::{ControlRecord, EffectRecord, EntityRecord};
use super::tuning::PlayerTuning;

/// Player attributes that status effects modify.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerStats {
    pub speed: f32,
    pub bomb_range: u32,
    pub bomb_capacity: u32,
    pub obstacles: u32,
    pub can_place_bomb: bool,
    pub auto_place_bomb: bool,
}

impl PlayerStats {
    pub fn baseline(tuning: &PlayerTuning) -> Self {
        Self {
            speed: tuning.speed,
            bomb_range: tuning.bomb_range,
            bomb_capacity: tuning.bomb_capacity,
            obstacles: 0,
            can_place_bomb: true,
            auto_place_bomb: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimPlayer {
    pub actor: SpatialActor,
    pub stats: PlayerStats,
    pub effect: Option<ActiveEffect>,
    // Latest control record merged from the owning connection.
    pub control: ControlRecord,
    pub facing: Direction,
    pub bombs_in_flight: u32,
    pub alive: bool,
}

impl SimPlayer {
    pub fn new(actor: SpatialActor, tuning: &PlayerTuning) -> Self {
        Self {
            actor,
            stats: PlayerStats::baseline(tuning),
            effect: None,
            control: ControlRecord::default(),
            facing: Direction::Down,
            bombs_in_flight: 0,
            alive: true,
        }
    }

    /// Bombs this player may still place.
    pub fn bomb_allowance(&self) -> u32 {
        self.stats.bomb_capacity.saturating_sub(self.bombs_in_flight)
    }

    pub fn passes_through_blocks(&self) -> bool {
        self.effect.is_some_and(|e| e.passes_through_blocks())
    }

    pub fn is_invincible(&self) -> bool {
        self.effect.is_some_and(|e| e.is_invincible())
    }
}

#[derive(Debug, Clone)]
pub struct SimMonster {
    pub actor: SpatialActor,
    pub brain: MonsterBrain,
}

#[derive(Debug, Clone)]
pub struct SimBomb {
    pub actor: SpatialActor,
    pub owner: usize,
    pub range: u32,
    pub fuse: u32,
    // Waits for manual detonation; the fuse is paused meanwhile.
    pub held: bool,
    pub detonate_now: bool,
    // The owner is still standing on the bomb it just placed.
    pub owner_on_top: bool,
}

impl SimBomb {
    /// Advances the fuse by one tick and reports whether it goes off now.
    pub fn tick(&mut self) -> bool {
        if self.detonate_now {
            return true;
        }
        if self.held {
            return false;
        }
        self.fuse = self.fuse.saturating_sub(1);
        self.fuse == 0
    }
}

#[derive(Debug, Clone)]
pub struct SimExplosion {
    pub actor: SpatialActor,
    // Participant credited with anything this explosion destroys.
    pub owner: Option<usize>,
    pub ttl: u32,
}

#[derive(Debug, Clone)]
pub struct SimBox {
    pub actor: SpatialActor,
    // Placed obstacles never drop a pickup.
    pub blank: bool,
}

#[derive(Debug, Clone)]
pub struct SimPickup {
    pub actor: SpatialActor,
    pub kind: EffectKind,
}

impl From<&SpatialActor> for EntityRecord {
    fn from(a: &SpatialActor) -> Self {
        Self {
            x: a.position.x,
            y: a.position.y,
        }
    }
}

impl From<&SimPickup> for EffectRecord {
    fn from(p: &SimPickup) -> Self {
        Self {
            x: p.actor.position.x,
            y: p.actor.position.y,
            kind: p.kind,
        }
    }
}
