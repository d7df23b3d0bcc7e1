/// Gameplay tuning for bombs and the explosions they leave behind.
#[derive(Debug, Clone, Copy)]
pub struct BombTuning {
    /// Ticks between placement and detonation.
    pub fuse_ticks: u32,
    /// Ticks an explosion tile stays lethal.
    pub explosion_ticks: u32,
    /// Collision radius of a bomb in pixels.
    pub radius: f32,
    /// Collision radius of one explosion tile in pixels.
    pub explosion_radius: f32,
}

impl Default for BombTuning {
    fn default() -> Self {
        Self {
            fuse_ticks: 180,
            explosion_ticks: 90,
            radius: 7.0,
            explosion_radius: 6.0,
        }
    }
}
