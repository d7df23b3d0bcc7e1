// Client-side reconciliation of world snapshots onto renderable actors.
//
// The scene never simulates. Positions come from the snapshot; the only
// local state is a cosmetic countdown on bombs and explosions, and the
// terrain cursor into the snapshot's change log.

use crate::domain::actor::{AnimationState, Shape, SpatialActor};
use crate::domain::effects::EffectKind;
use crate::domain::grid::{TILE_SIZE, TerrainGrid};
use crate::domain::level::Level;
use crate::domain::snapshot::{EffectRecord, EntityRecord, ParticipantRecord, Rgba, WorldSnapshot};
use crate::domain::tuning::Tuning;
use crate::use_cases::types::SceneStats;
use glam::Vec2;
use tracing::debug;

// Drift below this is left alone to avoid re-snapping near-equal positions.
const NUDGE_EPSILON: f32 = 0.5;
const PICKUP_RADIUS: f32 = 6.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerActor {
    pub actor: SpatialActor,
    pub color: Rgba,
    pub visible: bool,
}

/// A bomb or explosion visual with its locally replayed lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedActor {
    pub actor: SpatialActor,
    pub remaining: u32,
}

impl TimedActor {
    // True once the countdown has run out.
    fn advance(&mut self) -> bool {
        self.actor.animation.advance();
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectActor {
    pub actor: SpatialActor,
    pub kind: EffectKind,
}

/// Renderable state of one participant's view of the world.
#[derive(Debug, Clone)]
pub struct ClientScene {
    level_id: String,
    local_id: String,
    tuning: Tuning,
    pub grid: TerrainGrid,
    pub players: Vec<PlayerActor>,
    pub monsters: Vec<SpatialActor>,
    pub bombs: Vec<TimedActor>,
    pub explosions: Vec<TimedActor>,
    pub boxes: Vec<SpatialActor>,
    pub effects: Vec<EffectActor>,
    terrain_cursor: usize,
    local_color: Option<Rgba>,
}

impl ClientScene {
    pub fn new(level: &Level, local_id: impl Into<String>, tuning: Tuning) -> Self {
        Self {
            level_id: level.id.clone(),
            local_id: local_id.into(),
            tuning,
            grid: level.grid.clone(),
            players: Vec::new(),
            monsters: Vec::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            boxes: Vec::new(),
            effects: Vec::new(),
            terrain_cursor: 0,
            local_color: None,
        }
    }

    pub fn level_id(&self) -> &str {
        &self.level_id
    }

    /// Display color of the local participant, once its record has been seen.
    pub fn local_color(&self) -> Option<Rgba> {
        self.local_color
    }

    pub fn terrain_cursor(&self) -> usize {
        self.terrain_cursor
    }

    /// Brings every actor list in line with `snapshot`. Never fails.
    pub fn reconcile(&mut self, snapshot: &WorldSnapshot) {
        self.reconcile_players(&snapshot.participants);
        self.reconcile_monsters(&snapshot.monsters);

        let bomb_ticks = self.tuning.bomb.fuse_ticks;
        let bomb_radius = self.tuning.bomb.radius;
        reconcile_timed(&mut self.bombs, &snapshot.bombs, || {
            (bomb_ticks, bomb_radius, AnimationState::new(3, 20))
        });
        let explosion_ticks = self.tuning.bomb.explosion_ticks;
        let explosion_radius = self.tuning.bomb.explosion_radius;
        reconcile_timed(&mut self.explosions, &snapshot.explosions, || {
            (explosion_ticks, explosion_radius, AnimationState::new(8, 12))
        });

        self.reconcile_boxes(&snapshot.boxes);
        self.reconcile_effects(&snapshot.effects);
        self.replay_terrain(snapshot);

        self.local_color = snapshot
            .participant(&self.local_id)
            .map(|(_, record)| record.color);
    }

    fn reconcile_players(&mut self, records: &[ParticipantRecord]) {
        let radius = self.tuning.player.radius;
        if self.players.len() != records.len() {
            // Dead records still get an actor, hidden, so indices match the snapshot.
            self.players = records
                .iter()
                .map(|r| PlayerActor {
                    actor: SpatialActor::circle(
                        Vec2::new(r.x, r.y),
                        radius,
                        AnimationState::new(4, 8),
                    ),
                    color: r.color,
                    visible: !r.dead,
                })
                .collect();
            return;
        }
        for (local, record) in self.players.iter_mut().zip(records) {
            local.color = record.color;
            local.visible = !record.dead;
            let target = Vec2::new(record.x, record.y);
            if local.actor.position != target {
                local.actor.animation.advance();
            }
            local.actor.position = target;
        }
    }

    fn reconcile_monsters(&mut self, records: &[EntityRecord]) {
        let radius = self.tuning.monster.radius;
        if self.monsters.len() != records.len() {
            self.monsters = records
                .iter()
                .map(|r| SpatialActor::circle(Vec2::new(r.x, r.y), radius, AnimationState::new(4, 10)))
                .collect();
            return;
        }
        for (local, record) in self.monsters.iter_mut().zip(records) {
            local.position = Vec2::new(record.x, record.y);
            local.animation.advance();
        }
    }

    fn reconcile_boxes(&mut self, records: &[EntityRecord]) {
        if self.boxes.len() != records.len() {
            self.boxes = records.iter().map(box_actor).collect();
            return;
        }
        for (local, record) in self.boxes.iter_mut().zip(records) {
            nudge(local, Vec2::new(record.x, record.y));
            local.animation.advance();
        }
    }

    fn reconcile_effects(&mut self, records: &[EffectRecord]) {
        if self.effects.len() != records.len() {
            self.effects = records.iter().map(effect_actor).collect();
            return;
        }
        for (local, record) in self.effects.iter_mut().zip(records) {
            if local.kind != record.kind {
                *local = effect_actor(record);
                continue;
            }
            nudge(&mut local.actor, Vec2::new(record.x, record.y));
            local.actor.animation.advance();
        }
    }

    fn replay_terrain(&mut self, snapshot: &WorldSnapshot) {
        let log = &snapshot.terrain_changes;
        if log.len() < self.terrain_cursor {
            debug!(
                cursor = self.terrain_cursor,
                log_len = log.len(),
                "terrain log shorter than cursor; ignoring"
            );
            return;
        }
        for change in &log[self.terrain_cursor..] {
            if !self.grid.set(change.tile_x, change.tile_y, change.to) {
                debug!(
                    tile_x = change.tile_x,
                    tile_y = change.tile_y,
                    "terrain change outside the map; skipped"
                );
            }
        }
        self.terrain_cursor = log.len();
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            players: self.players.len(),
            visible_players: self.players.iter().filter(|p| p.visible).count(),
            monsters: self.monsters.len(),
            bombs: self.bombs.len(),
            explosions: self.explosions.len(),
            boxes: self.boxes.len(),
            effects: self.effects.len(),
            terrain_applied: self.terrain_cursor,
        }
    }
}

// Countdown first, then drop the oldest visuals if the snapshot shrank
// further, then append fresh actors for trailing entries.
fn reconcile_timed(
    local: &mut Vec<TimedActor>,
    records: &[EntityRecord],
    build: impl Fn() -> (u32, f32, AnimationState),
) {
    local.retain_mut(|visual| !visual.advance());
    if local.len() > records.len() {
        let excess = local.len() - records.len();
        local.drain(..excess);
    }
    for record in &records[local.len()..] {
        let (ticks, radius, animation) = build();
        local.push(TimedActor {
            actor: SpatialActor::circle(Vec2::new(record.x, record.y), radius, animation),
            remaining: ticks,
        });
    }
}

fn box_actor(record: &EntityRecord) -> SpatialActor {
    SpatialActor {
        position: Vec2::new(record.x, record.y),
        shape: Shape::Rect {
            width: TILE_SIZE,
            height: TILE_SIZE,
        },
        animation: AnimationState::new(4, 15),
    }
}

fn effect_actor(record: &EffectRecord) -> EffectActor {
    EffectActor {
        actor: SpatialActor::circle(
            Vec2::new(record.x, record.y),
            PICKUP_RADIUS,
            AnimationState::new(2, 30),
        ),
        kind: record.kind,
    }
}

fn nudge(actor: &mut SpatialActor, target: Vec2) {
    if actor.position.distance(target) > NUDGE_EPSILON {
        actor.position = target;
    }
}
