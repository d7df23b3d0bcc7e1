// Gameplay tuning grouped by the entity it applies to.

pub mod bomb;
pub mod effect;
pub mod monster;
pub mod player;

pub use bomb::BombTuning;
pub use effect::EffectTuning;
pub use monster::MonsterTuning;
pub use player::PlayerTuning;

/// Every gameplay knob the simulation reads, bundled so a world can be built
/// with non-default values in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tuning {
    pub player: PlayerTuning,
    pub bomb: BombTuning,
    pub monster: MonsterTuning,
    pub effect: EffectTuning,
}
