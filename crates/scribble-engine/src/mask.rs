//! Masked display of the secret word and the progressive hint schedule.
//!
//! Masking keeps the length profile of the word on purpose: knowing there
//! are two words of five letters is part of the game.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::IndexedRandom;

/// Placeholder shown for a hidden letter.
pub const PLACEHOLDER: char = '_';

/// Renders `word` with every unrevealed letter replaced by [`PLACEHOLDER`].
///
/// `revealed` holds char indices. Whitespace and punctuation are always
/// shown as-is. Masking with every index revealed yields `word` itself.
pub fn mask(word: &str, revealed: &BTreeSet<usize>) -> String {
    word.chars()
        .enumerate()
        .map(|(i, c)| {
            if is_maskable(c) && !revealed.contains(&i) {
                PLACEHOLDER
            } else {
                c
            }
        })
        .collect()
}

/// Char indices of the letters (and digits) that masking hides.
pub fn maskable_indices(word: &str) -> Vec<usize> {
    word.chars()
        .enumerate()
        .filter(|(_, c)| is_maskable(*c))
        .map(|(i, _)| i)
        .collect()
}

fn is_maskable(c: char) -> bool {
    c.is_alphanumeric()
}

/// Picks one hidden letter at random and returns its index and char.
///
/// Returns `None` once every letter is revealed. Never returns an index
/// that is already in `revealed`.
pub fn pick_reveal<R: Rng + ?Sized>(
    word: &str,
    revealed: &BTreeSet<usize>,
    rng: &mut R,
) -> Option<(usize, char)> {
    let hidden: Vec<usize> = maskable_indices(word)
        .into_iter()
        .filter(|i| !revealed.contains(i))
        .collect();
    let index = *hidden.choose(rng)?;
    word.chars().nth(index).map(|c| (index, c))
}

// ---------------------------------------------------------------------------
// Hint schedule
// ---------------------------------------------------------------------------

/// Letters that always stay hidden, however many hints are configured.
const MIN_HIDDEN: usize = 2;

/// When hints are revealed during a turn.
///
/// The schedule only depends on the letter count, the draw time and the
/// configured fractions, so every client can compute the same marks. The
/// server still pushes each reveal as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintSchedule {
    /// Elapsed seconds at which each hint is due, ascending.
    marks: Vec<u32>,
}

impl HintSchedule {
    /// Builds the schedule for a word with `letters` maskable characters.
    ///
    /// One hint per fraction of `draw_time` (e.g. `[0.5, 0.75]`), capped so
    /// that at least two letters stay hidden.
    pub fn new(letters: usize, draw_time: u32, fractions: &[f32]) -> Self {
        let allowed = letters.saturating_sub(MIN_HIDDEN);
        let mut fractions: Vec<f32> = fractions
            .iter()
            .copied()
            .filter(|f| *f > 0.0 && *f < 1.0)
            .collect();
        fractions.sort_by(f32::total_cmp);

        let marks = fractions
            .into_iter()
            .take(allowed)
            .map(|f| (draw_time as f32 * f).round() as u32)
            .collect();
        Self { marks }
    }

    /// Number of hints that are due once `elapsed` seconds have passed.
    pub fn due(&self, elapsed: u32) -> usize {
        self.marks.iter().filter(|m| **m <= elapsed).count()
    }

    /// The elapsed-second marks.
    pub fn marks(&self) -> &[u32] {
        &self.marks
    }
}
