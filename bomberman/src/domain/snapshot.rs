// World Snapshot: the flat, wire-ready copy of one round's state.

use super::effects::EffectKind;
use super::grid::Tile;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    #[default]
    Lobby,
    Running,
    Ended,
}

/// Per-frame input intent of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlRecord {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub ability1: bool,
    pub ability2: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Colors handed out to joining participants, without replacement.
pub const PALETTE: [Rgba; 7] = [
    Rgba::opaque(255, 0, 0),
    Rgba::opaque(0, 255, 0),
    Rgba::opaque(0, 0, 255),
    Rgba::opaque(255, 255, 0),
    Rgba::opaque(0, 255, 255),
    Rgba::opaque(255, 0, 255),
    Rgba::opaque(255, 255, 255),
];

/// Reserved for the host's own participant; never drawn from the palette.
pub const HOST_COLOR: Rgba = Rgba::opaque(0, 155, 150);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub participant_id: String,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub color: Rgba,
    pub control: ControlRecord,
    pub dead: bool,
    pub score: u32,
    pub latency_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub x: f32,
    pub y: f32,
    pub kind: EffectKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainChange {
    pub tile_x: i32,
    pub tile_y: i32,
    pub to: Tile,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub game_state: GameState,
    pub level_id: String,
    // Append-only; a participant that leaves is marked dead, never removed.
    pub participants: Vec<ParticipantRecord>,
    pub monsters: Vec<EntityRecord>,
    pub bombs: Vec<EntityRecord>,
    pub explosions: Vec<EntityRecord>,
    pub boxes: Vec<EntityRecord>,
    pub effects: Vec<EffectRecord>,
    // Append-only; clients keep a cursor into it.
    pub terrain_changes: Vec<TerrainChange>,
}

impl WorldSnapshot {
    pub fn lobby(level_id: impl Into<String>) -> Self {
        Self {
            level_id: level_id.into(),
            ..Self::default()
        }
    }

    pub fn participant(&self, participant_id: &str) -> Option<(usize, &ParticipantRecord)> {
        self.participants
            .iter()
            .enumerate()
            .find(|(_, p)| p.participant_id == participant_id)
    }

    /// True when at least one participant exists and every one is dead.
    pub fn everyone_dead(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.dead)
    }
}
