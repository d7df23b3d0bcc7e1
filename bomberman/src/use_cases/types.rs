// Use-case level inputs/outputs for the host world task.

use crate::domain::snapshot::{ControlRecord, Rgba};

/// Everything a network session may ask of the world. The world task is the
/// only consumer, so sessions never touch the world directly.
#[derive(Debug, Clone)]
pub enum GameEvent {
    Join {
        participant_id: String,
        display_name: String,
        color: Rgba,
    },
    Leave {
        participant_id: String,
    },
    Control {
        participant_id: String,
        control: ControlRecord,
        latency_ms: Option<u32>,
    },
    Start,
}

/// Actor counts of a reconciled scene, published for observers of the
/// host's render path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub players: usize,
    pub visible_players: usize,
    pub monsters: usize,
    pub bombs: usize,
    pub explosions: usize,
    pub boxes: usize,
    pub effects: usize,
    pub terrain_applied: usize,
}
