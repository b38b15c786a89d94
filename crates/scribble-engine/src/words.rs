//! The word bank: static pools of candidate words per language and theme.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::text::normalize;

const EN_GENERAL: &[&str] = &[
    "apple", "airplane", "anchor", "backpack", "balloon", "banana", "bicycle", "bridge",
    "butterfly", "camera", "candle", "castle", "chat", "cloud", "compass", "cookie",
    "diamond", "dragon", "drum", "envelope", "feather", "fire truck", "flower", "guitar",
    "hammer", "helicopter", "house", "ice cream", "island", "kite", "ladder", "lamp",
    "lighthouse", "mountain", "mushroom", "octopus", "palm tree", "parachute", "pencil",
    "piano", "pirate", "pizza", "rainbow", "robot", "rocket", "sandwich", "scissors",
    "snowman", "spider", "star", "submarine", "sun", "sword", "telescope", "tent",
    "tornado", "train", "treasure", "umbrella", "volcano", "waterfall", "whale", "window",
    "wizard",
];

const EN_ANIMALS: &[&str] = &[
    "ant", "bat", "bear", "camel", "cat", "crab", "crocodile", "deer", "dolphin", "duck",
    "eagle", "elephant", "flamingo", "fox", "frog", "giraffe", "hedgehog", "horse",
    "jellyfish", "kangaroo", "koala", "lion", "lobster", "monkey", "owl", "panda",
    "parrot", "penguin", "rabbit", "shark", "sheep", "snail", "snake", "squirrel", "tiger",
    "turtle", "zebra",
];

const EN_FOOD: &[&str] = &[
    "bread", "burger", "cake", "carrot", "cheese", "cherry", "chocolate", "corn",
    "croissant", "cupcake", "donut", "egg", "french fries", "grapes", "hot dog", "lemon",
    "noodles", "pancake", "pear", "pineapple", "popcorn", "pretzel", "sushi", "taco",
    "watermelon",
];

const FR_GENERAL: &[&str] = &[
    "arbre", "avion", "bateau", "château", "chat", "chien", "étoile", "fenêtre", "fleur",
    "fromage", "gâteau", "guitare", "lune", "maison", "montagne", "nuage", "parapluie",
    "poisson", "soleil", "téléphone", "train", "vélo",
];

/// Default theme used when a requested theme is unknown.
pub const DEFAULT_THEME: &str = "general";
/// Default language used when a requested language is unknown.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Static pools of candidate words keyed by `(language, theme)`.
///
/// The bank itself is pure lookup. Per-room state (recently used words)
/// is passed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct WordBank {
    pools: HashMap<(String, String), Vec<String>>,
}

impl WordBank {
    /// An empty bank. Use [`with_pool`](Self::with_pool) to fill it.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bank shipped with the server.
    pub fn builtin() -> Self {
        Self::new()
            .with_pool("en", "general", EN_GENERAL.iter().copied())
            .with_pool("en", "animals", EN_ANIMALS.iter().copied())
            .with_pool("en", "food", EN_FOOD.iter().copied())
            .with_pool("fr", "general", FR_GENERAL.iter().copied())
    }

    /// Adds (or replaces) the pool for a language/theme pair.
    pub fn with_pool<I, S>(mut self, language: &str, theme: &str, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        self.pools
            .insert((language.to_lowercase(), theme.to_lowercase()), words);
        self
    }

    /// Returns the pool for a language/theme pair.
    ///
    /// Falls back to the language's general pool, then to the English
    /// general pool, so an unknown theme still yields words.
    pub fn pool(&self, language: &str, theme: &str) -> &[String] {
        let language = language.to_lowercase();
        let lookups = [
            (language.clone(), theme.to_lowercase()),
            (language, DEFAULT_THEME.to_string()),
            (DEFAULT_LANGUAGE.to_string(), DEFAULT_THEME.to_string()),
        ];
        lookups
            .iter()
            .find_map(|key| self.pools.get(key).filter(|pool| !pool.is_empty()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if the theme has its own pool for the language.
    pub fn has_theme(&self, language: &str, theme: &str) -> bool {
        self.pools
            .contains_key(&(language.to_lowercase(), theme.to_lowercase()))
    }

    /// Picks up to `count` distinct words, avoiding `recent` ones.
    ///
    /// If excluding recent words leaves fewer than `count` candidates, the
    /// whole pool is used instead: a short repeat beats offering nothing.
    pub fn choices<R: Rng + ?Sized>(
        &self,
        language: &str,
        theme: &str,
        count: usize,
        recent: &[String],
        rng: &mut R,
    ) -> Vec<String> {
        let pool = self.pool(language, theme);
        let recent: Vec<String> = recent.iter().map(|w| normalize(w)).collect();
        let fresh: Vec<&String> = pool
            .iter()
            .filter(|w| !recent.contains(&normalize(w)))
            .collect();

        let candidates: Vec<&String> = if fresh.len() >= count {
            fresh
        } else {
            pool.iter().collect()
        };

        candidates
            .choose_multiple(rng, count)
            .map(|w| (*w).clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_choices_are_distinct() {
        let bank = WordBank::builtin();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let words = bank.choices("en", "general", 3, &[], &mut rng);
            assert_eq!(words.len(), 3);
            assert_ne!(words[0], words[1]);
            assert_ne!(words[1], words[2]);
            assert_ne!(words[0], words[2]);
        }
    }

    #[test]
    fn test_choices_skip_recent_words() {
        let bank = WordBank::new().with_pool("en", "general", ["a1", "b2", "c3", "d4", "e5"]);
        let recent = vec!["a1".to_string(), "B2".to_string()];
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            let words = bank.choices("en", "general", 3, &recent, &mut rng);
            assert!(!words.contains(&"a1".to_string()));
            assert!(!words.contains(&"b2".to_string()));
        }
    }

    #[test]
    fn test_choices_fall_back_to_full_pool_when_exhausted() {
        let bank = WordBank::new().with_pool("en", "general", ["one", "two", "three"]);
        let recent = vec!["one".to_string()];
        let mut rng = StdRng::seed_from_u64(3);
        let words = bank.choices("en", "general", 3, &recent, &mut rng);
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn test_pool_unknown_theme_falls_back_to_general() {
        let bank = WordBank::builtin();
        assert!(!bank.has_theme("en", "space"));
        assert_eq!(bank.pool("en", "space"), bank.pool("en", "general"));
        assert_eq!(bank.pool("xx", "animals"), bank.pool("en", "general"));
        assert_eq!(bank.pool("EN", "Animals"), bank.pool("en", "animals"));
    }
}
