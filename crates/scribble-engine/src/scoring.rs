//! Points for correct guesses, and guess evaluation.

use serde::{Deserialize, Serialize};

use crate::text::{edit_distance, normalize};

/// Scoring weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    /// Points at the very start of the turn for a non-first guesser.
    pub base_points: u32,
    /// Flat award for the first correct guesser of a turn.
    pub first_guess_points: u32,
    /// Floor of the decay curve, as a fraction of `base_points`.
    pub min_factor: f32,
    /// Drawer bonus per distinct correct guesser.
    pub drawer_points_per_guess: u32,
    /// Max edit distance for a "close" guess.
    pub close_distance: usize,
    /// Max edit distance for a "close" guess on long words.
    pub close_distance_long: usize,
    /// Letter count from which a word counts as long.
    pub long_word_len: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: 100,
            first_guess_points: 150,
            min_factor: 0.2,
            drawer_points_per_guess: 25,
            close_distance: 1,
            close_distance_long: 2,
            long_word_len: 8,
        }
    }
}

impl ScoringConfig {
    /// Points for a correct guess.
    ///
    /// `order` is the 0-based rank of this guess within the turn. The first
    /// guesser gets the flat bonus; everyone else gets a linear decay from
    /// `base_points` down to `base_points * min_factor` at the end of the
    /// turn. Both branches are monotonic, and the first guess never earns
    /// less than a later one.
    pub fn guess_points(&self, order: usize, elapsed_secs: u32, draw_time: u32) -> u32 {
        if order == 0 {
            return self.first_guess_points.max(self.base_points);
        }
        let progress = if draw_time == 0 {
            1.0
        } else {
            (elapsed_secs as f32 / draw_time as f32).min(1.0)
        };
        let factor = (1.0 - progress).max(self.min_factor.clamp(0.0, 1.0));
        (self.base_points as f32 * factor).round() as u32
    }

    /// Drawer bonus for one more correct guesser.
    pub fn drawer_points(&self) -> u32 {
        self.drawer_points_per_guess
    }
}

/// How a chat line relates to the secret word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct,
    /// Within the close threshold: flagged, never scored.
    Close,
    Miss,
}

/// Compares a guess against the secret word, ignoring case, diacritics and
/// extra whitespace.
pub fn evaluate_guess(guess: &str, secret: &str, config: &ScoringConfig) -> GuessOutcome {
    let guess = normalize(guess);
    let secret = normalize(secret);
    if guess.is_empty() {
        return GuessOutcome::Miss;
    }
    if guess == secret {
        return GuessOutcome::Correct;
    }

    let letters = secret.chars().filter(|c| c.is_alphanumeric()).count();
    if letters < 3 {
        return GuessOutcome::Miss;
    }
    let threshold = if letters >= config.long_word_len {
        config.close_distance_long
    } else {
        config.close_distance
    };
    if edit_distance(&guess, &secret) <= threshold {
        GuessOutcome::Close
    } else {
        GuessOutcome::Miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_points_first_guesser_gets_flat_bonus() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.guess_points(0, 0, 80), 150);
        assert_eq!(cfg.guess_points(0, 79, 80), 150);
    }

    #[test]
    fn test_guess_points_decay_is_monotonic() {
        let cfg = ScoringConfig::default();
        let mut last = u32::MAX;
        for elapsed in 0..=80 {
            let points = cfg.guess_points(1, elapsed, 80);
            assert!(points <= last);
            last = points;
        }
        assert_eq!(cfg.guess_points(1, 0, 80), 100);
        assert_eq!(cfg.guess_points(1, 40, 80), 50);
        assert_eq!(cfg.guess_points(1, 80, 80), 20);
    }

    #[test]
    fn test_guess_points_first_never_below_later() {
        let cfg = ScoringConfig {
            first_guess_points: 10,
            ..ScoringConfig::default()
        };
        for elapsed in 0..=80 {
            assert!(cfg.guess_points(0, elapsed, 80) >= cfg.guess_points(1, elapsed, 80));
        }
    }

    #[test]
    fn test_guess_points_zero_draw_time_uses_floor() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.guess_points(2, 0, 0), 20);
    }

    #[test]
    fn test_evaluate_guess_correct_is_insensitive() {
        let cfg = ScoringConfig::default();
        assert_eq!(evaluate_guess("  CHAT ", "chat", &cfg), GuessOutcome::Correct);
        assert_eq!(evaluate_guess("Chateau", "château", &cfg), GuessOutcome::Correct);
        assert_eq!(evaluate_guess("ice   cream", "ice cream", &cfg), GuessOutcome::Correct);
    }

    #[test]
    fn test_evaluate_guess_decomposed_input_is_correct() {
        let cfg = ScoringConfig::default();
        assert_eq!(
            evaluate_guess("cha\u{0302}teau", "château", &cfg),
            GuessOutcome::Correct
        );
        assert_eq!(
            evaluate_guess("chateau", "cha\u{0302}teau", &cfg),
            GuessOutcome::Correct
        );
        assert_eq!(evaluate_guess("ẽ", "e", &cfg), GuessOutcome::Correct);
        assert_eq!(evaluate_guess("pho", "phở", &cfg), GuessOutcome::Correct);
    }

    #[test]
    fn test_evaluate_guess_close_within_threshold() {
        let cfg = ScoringConfig::default();
        assert_eq!(evaluate_guess("chart", "chat", &cfg), GuessOutcome::Close);
        assert_eq!(evaluate_guess("dog", "chat", &cfg), GuessOutcome::Miss);
        assert_eq!(
            evaluate_guess("lighthuose", "lighthouse", &cfg),
            GuessOutcome::Close
        );
    }

    #[test]
    fn test_evaluate_guess_short_words_never_close() {
        let cfg = ScoringConfig::default();
        assert_eq!(evaluate_guess("ax", "ox", &cfg), GuessOutcome::Miss);
        assert_eq!(evaluate_guess("", "chat", &cfg), GuessOutcome::Miss);
    }
}
