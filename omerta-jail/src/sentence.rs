//! Sentence arithmetic and breakout odds.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::record::Severity;

/// Tunables for sentencing and breakout resolution.
///
/// Defaults match the live game balance; `from_json` lets deployments
/// override individual fields without restating the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JailConfig {
    /// Hard floor on any sentence, in seconds.
    pub min_sentence_secs: u64,
    /// Discount per level for the new-player leniency factor.
    pub new_player_leniency_per_level: f64,
    /// Level at which the leniency discount stops growing.
    pub new_player_leniency_cap: u32,
    /// Discount per level while at or below the cutoff.
    pub level_discount_per_level: f64,
    /// Highest level that still uses the per-level discount.
    pub level_discount_cutoff: u32,
    /// Flat factor applied above the cutoff.
    pub level_discount_floor: f64,
    pub breakout_base_chance: f64,
    pub breakout_level_bonus: f64,
    pub breakout_severity_penalty: f64,
    pub breakout_min_chance: f64,
    pub breakout_max_chance: f64,
    /// Assumed sentence length when backfilling a legacy-only jailing.
    pub legacy_backfill_secs: u64,
    /// Remaining time reported when a stored window cannot be trusted.
    pub fallback_remaining_secs: u64,
    pub default_history_limit: usize,
    /// Whether a superseded sentence credits its served time to the stats.
    pub accrue_time_on_supersede: bool,
}

impl Default for JailConfig {
    fn default() -> Self {
        Self {
            min_sentence_secs: 15,
            new_player_leniency_per_level: 0.04,
            new_player_leniency_cap: 5,
            level_discount_per_level: 0.02,
            level_discount_cutoff: 10,
            level_discount_floor: 0.8,
            breakout_base_chance: 0.6,
            breakout_level_bonus: 0.015,
            breakout_severity_penalty: 0.03,
            breakout_min_chance: 0.25,
            breakout_max_chance: 0.9,
            legacy_backfill_secs: 3_600,
            fallback_remaining_secs: 60,
            default_history_limit: 10,
            accrue_time_on_supersede: false,
        }
    }
}

impl JailConfig {
    /// Parse overrides from JSON; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON is malformed or a field has the
    /// wrong type.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Effective sentence after the leniency and level discounts, floored at
/// `min_sentence_secs`. Lower-level players serve shorter sentences.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn reduced_sentence_secs(cfg: &JailConfig, requested_secs: u64, level: u32) -> u64 {
    let leniency_level = level.min(cfg.new_player_leniency_cap);
    let new_player_factor =
        (1.0 - f64::from(leniency_level) * cfg.new_player_leniency_per_level).max(0.0);
    let level_factor = if level <= cfg.level_discount_cutoff {
        1.0 - f64::from(level) * cfg.level_discount_per_level
    } else {
        cfg.level_discount_floor
    };
    let scaled = (requested_secs as f64 * level_factor * new_player_factor).round();
    let scaled = if scaled.is_sign_negative() { 0 } else { scaled as u64 };
    scaled.max(cfg.min_sentence_secs)
}

/// Probability that a breakout attempt succeeds, clamped to the configured
/// band. Level helps, severity hurts.
#[must_use]
pub fn breakout_chance(cfg: &JailConfig, level: u32, severity: Severity) -> f64 {
    let chance = cfg.breakout_base_chance + f64::from(level) * cfg.breakout_level_bonus
        - f64::from(severity.get()) * cfg.breakout_severity_penalty;
    chance.clamp(cfg.breakout_min_chance, cfg.breakout_max_chance)
}

/// Draw a uniform roll and compare against `chance`.
pub fn roll_breakout<R: Rng + ?Sized>(chance: f64, rng: &mut R) -> bool {
    rng.r#gen::<f64>() < chance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn level_one_example_from_game_balance() {
        let cfg = JailConfig::default();
        // 300 * (1 - 0.02) * (1 - 0.04) = 282.24, rounded
        assert_eq!(reduced_sentence_secs(&cfg, 300, 1), 282);
    }

    #[test]
    fn sentence_stays_within_floor_and_request() {
        let cfg = JailConfig::default();
        for level in 1..=100 {
            for requested in [15, 60, 300, 86_400] {
                let effective = reduced_sentence_secs(&cfg, requested, level);
                assert!(effective >= cfg.min_sentence_secs, "level {level}");
                assert!(effective <= requested, "level {level} requested {requested}");
            }
        }
    }

    #[test]
    fn tiny_requests_hit_the_floor() {
        let cfg = JailConfig::default();
        assert_eq!(reduced_sentence_secs(&cfg, 15, 10), 15);
        assert_eq!(reduced_sentence_secs(&cfg, 0, 1), 15);
    }

    #[test]
    fn high_levels_use_the_flat_discount() {
        let cfg = JailConfig::default();
        // Above the cutoff both factors bottom out: 0.8 * 0.8 = 0.64.
        assert_eq!(reduced_sentence_secs(&cfg, 1_000, 50), 640);
        assert_eq!(
            reduced_sentence_secs(&cfg, 1_000, 11),
            reduced_sentence_secs(&cfg, 1_000, 99)
        );
    }

    #[test]
    fn breakout_chance_clamps_both_ends() {
        let cfg = JailConfig::default();
        // Level 1, severity 1: 0.6 + 0.015 - 0.03 = 0.585
        let chance = breakout_chance(&cfg, 1, Severity::new(1));
        assert!((chance - 0.585).abs() < 1e-9);
        // A very high level pushes past the cap.
        assert!((breakout_chance(&cfg, 100, Severity::new(1)) - cfg.breakout_max_chance).abs() < 1e-9);
        // A hostile config cannot push below the floor.
        let harsh = JailConfig {
            breakout_base_chance: 0.1,
            ..JailConfig::default()
        };
        assert!(
            (breakout_chance(&harsh, 1, Severity::new(5)) - harsh.breakout_min_chance).abs() < 1e-9
        );
    }

    #[test]
    fn severity_raises_the_bar() {
        let cfg = JailConfig::default();
        let easy = breakout_chance(&cfg, 5, Severity::new(1));
        let hard = breakout_chance(&cfg, 5, Severity::new(5));
        assert!(hard < easy);
    }

    #[test]
    fn forced_rolls_are_deterministic() {
        let mut always = StepRng::new(0, 0);
        assert!(roll_breakout(0.25, &mut always));
        let mut never = StepRng::new(u64::MAX, 0);
        assert!(!roll_breakout(0.9, &mut never));
    }

    #[test]
    fn json_overrides_merge_onto_defaults() {
        let cfg = JailConfig::from_json(r#"{ "minSentenceSecs": 30, "accrueTimeOnSupersede": true }"#)
            .unwrap();
        assert_eq!(cfg.min_sentence_secs, 30);
        assert!(cfg.accrue_time_on_supersede);
        assert!((cfg.breakout_base_chance - 0.6).abs() < 1e-9);
    }
}
