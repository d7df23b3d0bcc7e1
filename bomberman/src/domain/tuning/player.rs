/// Gameplay tuning for player characters.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).
#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Walking speed in pixels per tick.
    pub speed: f32,
    /// Collision radius in pixels.
    pub radius: f32,
    /// Tiles an explosion travels along each axis.
    pub bomb_range: u32,
    /// Bombs a player may have on the field at once.
    pub bomb_capacity: u32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 0.6,
            radius: 7.0,
            bomb_range: 2,
            bomb_capacity: 1,
        }
    }
}
