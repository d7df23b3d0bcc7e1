/// Gameplay tuning for monsters.
#[derive(Debug, Clone, Copy)]
pub struct MonsterTuning {
    /// Movement speed in pixels per tick.
    pub speed: f32,
    /// Collision radius in pixels.
    pub radius: f32,
    /// Ticks between random direction changes for monsters on a timer.
    pub reroll_ticks: u32,
    /// Chance that a slime ignores its target when it hits a wall.
    pub wrong_turn_chance: f64,
    /// Distance from a cell centre below which a monster snaps onto it.
    pub snap_tolerance: f32,
}

impl Default for MonsterTuning {
    fn default() -> Self {
        Self {
            speed: 0.6,
            radius: 7.0,
            reroll_ticks: 30,
            wrong_turn_chance: 0.4,
            snap_tolerance: 0.3,
        }
    }
}
