//! Game configuration.
//!
//! Every struct here has a `Default` and `#[serde(default)]`, so a JSON
//! config file only needs the fields it changes. The anti-cheat weight
//! table lives in [`AntiCheatConfig`] and is tunable the same way.

use serde::{Deserialize, Serialize};

use scribble_engine::{AntiCheatConfig, ScoringConfig};

use crate::moderation::AppealPolicy;

/// Clock settings of the turn state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    /// Phase timer period. One tick is one second of game time.
    pub tick_ms: u64,
    /// Seconds the drawer has to pick a word before the first one is
    /// picked for them.
    pub choose_secs: u32,
    /// Seconds the turn result stays on screen.
    pub round_end_secs: u32,
    /// Fractions of the draw time at which a letter is revealed.
    pub hint_fractions: Vec<f32>,
    /// Random delay (0 to this many ms) before a room's first tick, so
    /// rooms created together do not tick in lockstep.
    pub initial_jitter_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            choose_secs: 15,
            round_end_secs: 5,
            hint_fractions: vec![0.5, 0.75],
            initial_jitter_ms: 50,
        }
    }
}

/// Everything a room needs to run a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub scoring: ScoringConfig,
    pub anticheat: AntiCheatConfig,
    pub appeal: AppealPolicy,
    /// Duration of an anti-cheat ban.
    pub temp_ban_secs: u64,
    /// Duration of a ban issued by a room host.
    pub host_ban_secs: u64,
    /// Words offered to the drawer.
    pub choice_count: usize,
    /// Recently drawn words a room avoids offering again.
    pub recent_word_memory: usize,
    /// Capacity of each room's command queue.
    pub command_channel_size: usize,
    /// Fixed seed for every room's RNG. Only useful in tests.
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            scoring: ScoringConfig::default(),
            anticheat: AntiCheatConfig::default(),
            appeal: AppealPolicy::default(),
            temp_ban_secs: 600,
            host_ban_secs: 3_600,
            choice_count: 3,
            recent_word_memory: 20,
            command_channel_size: 64,
            rng_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_config_default_values() {
        let config = GameConfig::default();
        assert_eq!(config.timing.tick_ms, 1_000);
        assert_eq!(config.timing.choose_secs, 15);
        assert_eq!(config.temp_ban_secs, 600);
        assert_eq!(config.choice_count, 3);
        assert_eq!(config.anticheat.ban_threshold, 80);
    }

    #[test]
    fn test_game_config_partial_json_overrides_nested_fields() {
        let json = r#"{
            "timing": { "chooseSecs": 10 },
            "anticheat": { "warnThreshold": 50 },
            "tempBanSecs": 60
        }"#;
        let config: GameConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timing.choose_secs, 10);
        assert_eq!(config.timing.round_end_secs, 5);
        assert_eq!(config.anticheat.warn_threshold, 50);
        assert_eq!(config.anticheat.ban_threshold, 80);
        assert_eq!(config.temp_ban_secs, 60);
    }
}
