// Timed status effects and the player attributes they modify.

use super::state::PlayerStats;
use super::tuning::{EffectTuning, PlayerTuning};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Effect kinds; the variant names double as the wire type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    SkullDebuff,
    BombCountIncrease,
    RadiusIncrease,
    RollerIncrease,
    ObstacleIncrease,
    DetonatorIncrease,
    GhostIncrease,
    InvincibilityIncrease,
}

impl EffectKind {
    pub const ALL: [EffectKind; 8] = [
        EffectKind::SkullDebuff,
        EffectKind::BombCountIncrease,
        EffectKind::RadiusIncrease,
        EffectKind::RollerIncrease,
        EffectKind::ObstacleIncrease,
        EffectKind::DetonatorIncrease,
        EffectKind::GhostIncrease,
        EffectKind::InvincibilityIncrease,
    ];

    pub fn from_level_token(token: &str) -> Option<Self> {
        let kind = match token {
            "SKULLDEB" => EffectKind::SkullDebuff,
            "BOMBINC" => EffectKind::BombCountIncrease,
            "RADIUSINC" => EffectKind::RadiusIncrease,
            "ROLLER" => EffectKind::RollerIncrease,
            "OBSTACLE" => EffectKind::ObstacleIncrease,
            "DETONATOR" => EffectKind::DetonatorIncrease,
            "GHOSTINC" => EffectKind::GhostIncrease,
            "INVINC" => EffectKind::InvincibilityIncrease,
            _ => return None,
        };
        Some(kind)
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// The one negative modifier a skull debuff rolls at pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkullCurse {
    Slow,
    ShortRange,
    NoPlacement,
    AutoPlacement,
}

impl SkullCurse {
    const ALL: [SkullCurse; 4] = [
        SkullCurse::Slow,
        SkullCurse::ShortRange,
        SkullCurse::NoPlacement,
        SkullCurse::AutoPlacement,
    ];

    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// An effect installed on a player.
///
/// The modification is applied by [`ActiveEffect::install`] and held while
/// ticks remain; the tick that brings the counter to zero restores the
/// baseline and reports expiry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEffect {
    kind: EffectKind,
    curse: Option<SkullCurse>,
    remaining: u32,
    // One-shot grants (extra bomb, obstacles) must not stack per tick.
    granted: bool,
}

impl ActiveEffect {
    pub fn new<R: Rng + ?Sized>(kind: EffectKind, duration_ticks: u32, rng: &mut R) -> Self {
        let curse = (kind == EffectKind::SkullDebuff).then(|| SkullCurse::random(rng));
        Self {
            kind,
            curse,
            remaining: duration_ticks,
            granted: false,
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn curse(&self) -> Option<SkullCurse> {
        self.curse
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn passes_through_blocks(&self) -> bool {
        self.kind == EffectKind::GhostIncrease
    }

    pub fn is_invincible(&self) -> bool {
        self.kind == EffectKind::InvincibilityIncrease
    }

    pub fn holds_bombs(&self) -> bool {
        self.kind == EffectKind::DetonatorIncrease
    }

    pub fn places_obstacles(&self) -> bool {
        self.kind == EffectKind::ObstacleIncrease
    }

    pub fn install(&mut self, stats: &mut PlayerStats, tuning: &EffectTuning) {
        self.apply(stats, tuning);
    }

    /// Returns `true` on the tick the effect expires.
    pub fn tick(
        &mut self,
        stats: &mut PlayerStats,
        base: &PlayerTuning,
        tuning: &EffectTuning,
    ) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.restore(stats, base);
            return true;
        }
        self.apply(stats, tuning);
        false
    }

    fn apply(&mut self, stats: &mut PlayerStats, tuning: &EffectTuning) {
        match self.kind {
            EffectKind::SkullDebuff => match self.curse {
                Some(SkullCurse::Slow) => stats.speed = tuning.slowed_speed,
                Some(SkullCurse::ShortRange) => stats.bomb_range = tuning.short_range,
                Some(SkullCurse::NoPlacement) => stats.can_place_bomb = false,
                Some(SkullCurse::AutoPlacement) => stats.auto_place_bomb = true,
                None => {}
            },
            EffectKind::BombCountIncrease => {
                if !self.granted {
                    stats.bomb_capacity += 1;
                    self.granted = true;
                }
            }
            EffectKind::RadiusIncrease => stats.bomb_range = tuning.boosted_range,
            EffectKind::RollerIncrease => stats.speed = tuning.roller_speed,
            EffectKind::ObstacleIncrease => {
                if !self.granted {
                    stats.obstacles += tuning.obstacle_grant;
                    self.granted = true;
                }
            }
            EffectKind::DetonatorIncrease
            | EffectKind::GhostIncrease
            | EffectKind::InvincibilityIncrease => {}
        }
    }

    /// Puts back whatever attribute this effect modified.
    pub fn restore(&self, stats: &mut PlayerStats, base: &PlayerTuning) {
        match self.kind {
            EffectKind::SkullDebuff => match self.curse {
                Some(SkullCurse::Slow) => stats.speed = base.speed,
                Some(SkullCurse::ShortRange) => stats.bomb_range = base.bomb_range,
                Some(SkullCurse::NoPlacement) => stats.can_place_bomb = true,
                Some(SkullCurse::AutoPlacement) => stats.auto_place_bomb = false,
                None => {}
            },
            EffectKind::BombCountIncrease => {
                if self.granted {
                    stats.bomb_capacity = stats.bomb_capacity.saturating_sub(1);
                }
            }
            EffectKind::RadiusIncrease => stats.bomb_range = base.bomb_range,
            EffectKind::RollerIncrease => stats.speed = base.speed,
            EffectKind::ObstacleIncrease => stats.obstacles = 0,
            EffectKind::DetonatorIncrease
            | EffectKind::GhostIncrease
            | EffectKind::InvincibilityIncrease => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn installed(kind: EffectKind, seed: u64) -> (ActiveEffect, PlayerStats) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut stats = PlayerStats::baseline(&PlayerTuning::default());
        let mut effect = ActiveEffect::new(kind, EffectTuning::default().duration_ticks, &mut rng);
        effect.install(&mut stats, &EffectTuning::default());
        (effect, stats)
    }

    fn run_until_expiry(effect: &mut ActiveEffect, stats: &mut PlayerStats) -> u32 {
        let (base, tuning) = (PlayerTuning::default(), EffectTuning::default());
        let mut ticks = 0;
        loop {
            ticks += 1;
            if effect.tick(stats, &base, &tuning) {
                return ticks;
            }
        }
    }

    #[test]
    fn when_roller_is_active_then_speed_is_restored_exactly_at_expiry() {
        let (mut effect, mut stats) = installed(EffectKind::RollerIncrease, 1);
        let (base, tuning) = (PlayerTuning::default(), EffectTuning::default());

        for _ in 0..1799 {
            assert!(!effect.tick(&mut stats, &base, &tuning));
            assert_eq!(stats.speed, tuning.roller_speed);
        }
        assert!(effect.tick(&mut stats, &base, &tuning));
        assert_eq!(stats.speed, base.speed);
    }

    #[test]
    fn when_any_skull_curse_expires_then_every_attribute_is_back_to_baseline() {
        let baseline = PlayerStats::baseline(&PlayerTuning::default());
        for seed in 0..32 {
            let (mut effect, mut stats) = installed(EffectKind::SkullDebuff, seed);
            assert_ne!(stats, baseline, "curse {:?} changed nothing", effect.curse());

            assert_eq!(run_until_expiry(&mut effect, &mut stats), 1800);
            assert_eq!(stats, baseline);
        }
    }

    #[test]
    fn when_bomb_count_increase_ticks_then_capacity_grows_only_once() {
        let (mut effect, mut stats) = installed(EffectKind::BombCountIncrease, 2);
        let (base, tuning) = (PlayerTuning::default(), EffectTuning::default());
        for _ in 0..10 {
            effect.tick(&mut stats, &base, &tuning);
        }
        assert_eq!(stats.bomb_capacity, base.bomb_capacity + 1);

        run_until_expiry(&mut effect, &mut stats);
        assert_eq!(stats.bomb_capacity, base.bomb_capacity);
    }

    #[test]
    fn when_obstacle_effect_expires_then_unused_obstacles_are_removed() {
        let (mut effect, mut stats) = installed(EffectKind::ObstacleIncrease, 3);
        assert_eq!(stats.obstacles, 3);
        stats.obstacles -= 1;

        run_until_expiry(&mut effect, &mut stats);
        assert_eq!(stats.obstacles, 0);
    }

    #[test]
    fn when_level_token_is_unknown_then_no_effect_kind_is_returned() {
        assert_eq!(
            EffectKind::from_level_token("INVINC"),
            Some(EffectKind::InvincibilityIncrease)
        );
        assert_eq!(EffectKind::from_level_token("SKATE"), None);
    }
}
