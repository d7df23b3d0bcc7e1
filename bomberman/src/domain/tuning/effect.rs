/// Gameplay tuning for status effects and their pickups.
#[derive(Debug, Clone, Copy)]
pub struct EffectTuning {
    /// Ticks an effect stays active after pickup.
    pub duration_ticks: u32,
    /// Walking speed under the roller effect.
    pub roller_speed: f32,
    /// Walking speed under the slow skull curse.
    pub slowed_speed: f32,
    /// Explosion range under the radius effect.
    pub boosted_range: u32,
    /// Explosion range under the short range skull curse.
    pub short_range: u32,
    /// Obstacles granted by the obstacle effect.
    pub obstacle_grant: u32,
    /// Chance that a destroyed level box leaves a pickup behind.
    pub box_drop_chance: f64,
}

impl Default for EffectTuning {
    fn default() -> Self {
        Self {
            duration_ticks: 1800,
            roller_speed: 1.2,
            slowed_speed: 0.3,
            boosted_range: 5,
            short_range: 1,
            obstacle_grant: 3,
            box_drop_chance: 0.4,
        }
    }
}
