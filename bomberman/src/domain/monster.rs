// Monster movement policies: one shared state shape, four variants.

use super::grid::TILE_SIZE;
use super::tuning::MonsterTuning;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonsterKind {
    // Wanders on a timer and flies over terrain.
    Ghost,
    // Chases its target, takes a wrong turn now and then.
    Slime,
    // Chases its target.
    Balloon,
    // Never targets anyone.
    Onion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::NEG_Y,
            Direction::Down => Vec2::Y,
            Direction::Left => Vec2::NEG_X,
            Direction::Right => Vec2::X,
        }
    }

    pub fn tile_offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Greedy step along whichever axis has the larger distance to the target.
/// Ties go to the horizontal axis.
pub fn direction_towards(from: Vec2, to: Vec2) -> Direction {
    let delta = to - from;
    if delta.x.abs() >= delta.y.abs() {
        if delta.x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if delta.y > 0.0 {
        Direction::Down
    } else {
        Direction::Up
    }
}

/// Snaps a centre position onto the nearest cell centre when both axes are
/// within `tolerance` of it.
pub fn snap_to_cell_center(position: Vec2, tolerance: f32) -> Vec2 {
    let half = TILE_SIZE / 2.0;
    let snapped = ((position - Vec2::splat(half)) / TILE_SIZE).round() * TILE_SIZE + Vec2::splat(half);
    let drift = (position - snapped).abs();
    if drift.x < tolerance && drift.y < tolerance {
        snapped
    } else {
        position
    }
}

/// What a monster bumped into this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obstacle {
    // Bombs, boxes and bricks.
    Movable,
    // Non-destroyable terrain.
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonsterBrain {
    pub kind: MonsterKind,
    pub direction: Direction,
    /// Index of the chased participant.
    pub target: Option<usize>,
    timer: u32,
}

impl MonsterBrain {
    pub fn new<R: Rng + ?Sized>(kind: MonsterKind, rng: &mut R) -> Self {
        Self {
            kind,
            direction: Direction::random(rng),
            target: None,
            timer: 0,
        }
    }

    pub fn wants_target(&self) -> bool {
        matches!(self.kind, MonsterKind::Slime | MonsterKind::Balloon)
    }

    pub fn passes_terrain(&self) -> bool {
        self.kind == MonsterKind::Ghost
    }

    /// Periodic re-roll for the timer-driven variant.
    pub fn tick_timer<R: Rng + ?Sized>(&mut self, tuning: &MonsterTuning, rng: &mut R) {
        if self.kind != MonsterKind::Ghost {
            return;
        }
        self.timer += 1;
        if self.timer >= tuning.reroll_ticks {
            self.timer = 0;
            self.direction = Direction::random(rng);
        }
    }

    /// Picks the next direction after hitting `obstacle`.
    pub fn on_collision<R: Rng + ?Sized>(
        &mut self,
        obstacle: Obstacle,
        position: Vec2,
        target: Option<Vec2>,
        tuning: &MonsterTuning,
        rng: &mut R,
    ) {
        self.timer = 0;
        self.direction = match (obstacle, self.kind) {
            (Obstacle::Movable, _) => Direction::random(rng),
            (Obstacle::Solid, MonsterKind::Ghost) => self.direction,
            (Obstacle::Solid, MonsterKind::Onion) => Direction::random(rng),
            (Obstacle::Solid, MonsterKind::Balloon) => match target {
                Some(target) => direction_towards(position, target),
                None => Direction::random(rng),
            },
            (Obstacle::Solid, MonsterKind::Slime) => match target {
                Some(_) if rng.gen_bool(tuning.wrong_turn_chance) => Direction::random(rng),
                Some(target) => direction_towards(position, target),
                None => Direction::random(rng),
            },
        };
    }
}
