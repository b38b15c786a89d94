//! Behavioural anti-cheat heuristics.
//!
//! The engine is a fixed table of weighted signals. Each chat message or
//! correct guess is recorded into the player's [`BehaviorRecord`], then the
//! record is scored. Scoring reads only the record, so the same evidence
//! always yields the same [`Assessment`].
//!
//! Rate-based signals get generous thresholds. Hard evidence (injection
//! characters, userscripts, repeated instant guesses) is weighted heavily.

use std::collections::{BTreeSet, VecDeque};

use scribble_protocol::{ClientSignals, EvidenceTag};
use serde::{Deserialize, Serialize};

use crate::text::normalize;

/// Weights and thresholds of every signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AntiCheatConfig {
    /// Rolling window for rate signals, in milliseconds.
    pub window_ms: u64,
    /// Max messages kept for duplicate detection.
    pub history_len: usize,

    pub spam_moderate_count: usize,
    pub spam_moderate_weight: u32,
    pub spam_intense_count: usize,
    pub spam_intense_weight: u32,

    pub duplicate_min_messages: usize,
    pub duplicate_ratio: f32,
    pub duplicate_weight: u32,

    /// Intervals shorter than this are not typed by a human.
    pub human_floor_ms: u64,
    pub inhuman_hits: usize,
    pub inhuman_weight: u32,

    pub injection_weight: u32,

    pub paste_count: usize,
    pub paste_weight: u32,

    /// A correct guess faster than this after turn start is "instant".
    pub instant_guess_ms: u64,
    pub instant_guess_count: usize,
    pub instant_guess_weight: u32,

    pub userscript_weight: u32,

    pub max_confidence: u32,
    pub warn_threshold: u32,
    pub ban_threshold: u32,
}

impl Default for AntiCheatConfig {
    fn default() -> Self {
        Self {
            window_ms: 5_000,
            history_len: 10,
            spam_moderate_count: 8,
            spam_moderate_weight: 30,
            spam_intense_count: 13,
            spam_intense_weight: 85,
            duplicate_min_messages: 4,
            duplicate_ratio: 0.5,
            duplicate_weight: 25,
            human_floor_ms: 120,
            inhuman_hits: 3,
            inhuman_weight: 30,
            injection_weight: 45,
            paste_count: 5,
            paste_weight: 20,
            instant_guess_ms: 1_000,
            instant_guess_count: 3,
            instant_guess_weight: 60,
            userscript_weight: 100,
            max_confidence: 100,
            warn_threshold: 40,
            ban_threshold: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Recommendation {
    Allow,
    Warn,
    Ban,
}

/// The result of scoring a [`BehaviorRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// 0 to `max_confidence`.
    pub confidence: u32,
    pub recommendation: Recommendation,
    /// The signals that contributed to `confidence`.
    pub tags: BTreeSet<EvidenceTag>,
}

/// Rolling behaviour of one player in one room.
///
/// Created on join and dropped on leave.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorRecord {
    /// `(timestamp_ms, normalized text)` of recent messages, oldest first.
    messages: VecDeque<(u64, String)>,
    pastes: VecDeque<u64>,
    injections: VecDeque<u64>,
    userscript: bool,
    /// Milliseconds from turn start to each correct guess.
    guess_latencies: Vec<u64>,
    warnings: u32,
    /// Every tag this record has ever produced.
    seen_tags: BTreeSet<EvidenceTag>,
}

impl BehaviorRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `warn` assessments so far.
    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    pub fn seen_tags(&self) -> &BTreeSet<EvidenceTag> {
        &self.seen_tags
    }

    fn latest(&self) -> Option<u64> {
        self.messages.back().map(|(ts, _)| *ts)
    }

    fn prune(&mut self, now_ms: u64, config: &AntiCheatConfig) {
        let cutoff = now_ms.saturating_sub(config.window_ms);
        while self.messages.front().is_some_and(|(ts, _)| *ts < cutoff)
            || self.messages.len() > config.history_len.max(config.spam_intense_count)
        {
            self.messages.pop_front();
        }
        while self.pastes.front().is_some_and(|ts| *ts < cutoff) {
            self.pastes.pop_front();
        }
        while self.injections.front().is_some_and(|ts| *ts < cutoff) {
            self.injections.pop_front();
        }
    }
}

/// Scores behaviour records against an [`AntiCheatConfig`].
#[derive(Debug, Clone, Default)]
pub struct AntiCheatEngine {
    config: AntiCheatConfig,
}

impl AntiCheatEngine {
    pub fn new(config: AntiCheatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AntiCheatConfig {
        &self.config
    }

    /// Records a chat message (guesses included) and scores the record.
    ///
    /// A `warn` result bumps the record's warning count.
    pub fn observe_message(
        &self,
        record: &mut BehaviorRecord,
        now_ms: u64,
        text: &str,
        signals: ClientSignals,
    ) -> Assessment {
        // Out-of-order clocks never move the window backwards.
        let now_ms = record.latest().map_or(now_ms, |last| now_ms.max(last));

        record.messages.push_back((now_ms, normalize(text)));
        if signals.pasted {
            record.pastes.push_back(now_ms);
        }
        if contains_injection(text) {
            record.injections.push_back(now_ms);
        }
        record.userscript |= signals.userscript;
        record.prune(now_ms, &self.config);

        self.conclude(record)
    }

    /// Records a correct guess made `latency_ms` after the turn started.
    pub fn observe_correct_guess(&self, record: &mut BehaviorRecord, latency_ms: u64) -> Assessment {
        record.guess_latencies.push(latency_ms);
        self.conclude(record)
    }

    fn conclude(&self, record: &mut BehaviorRecord) -> Assessment {
        let assessment = self.assess(record);
        if assessment.recommendation == Recommendation::Warn {
            record.warnings += 1;
        }
        record.seen_tags.extend(assessment.tags.iter().copied());
        assessment
    }

    /// Scores a record without changing it.
    ///
    /// Rate signals are measured relative to the record's newest message.
    pub fn assess(&self, record: &BehaviorRecord) -> Assessment {
        let cfg = &self.config;
        let mut tags = BTreeSet::new();
        let mut score = 0u32;
        let mut add = |tag: EvidenceTag, weight: u32| {
            tags.insert(tag);
            score = score.saturating_add(weight);
        };

        let cutoff = record
            .latest()
            .map_or(0, |latest| latest.saturating_sub(cfg.window_ms));
        let windowed: Vec<&(u64, String)> = record
            .messages
            .iter()
            .filter(|(ts, _)| *ts >= cutoff)
            .collect();

        // Burst rate: intense replaces moderate.
        if windowed.len() >= cfg.spam_intense_count {
            add(EvidenceTag::SpamIntense, cfg.spam_intense_weight);
        } else if windowed.len() >= cfg.spam_moderate_count {
            add(EvidenceTag::SpamModerate, cfg.spam_moderate_weight);
        }

        let recent: Vec<&str> = windowed
            .iter()
            .rev()
            .take(cfg.history_len)
            .map(|(_, text)| text.as_str())
            .collect();
        if recent.len() >= cfg.duplicate_min_messages {
            let distinct: BTreeSet<&str> = recent.iter().copied().collect();
            let duplicates = recent.len() - distinct.len();
            if duplicates as f32 / recent.len() as f32 >= cfg.duplicate_ratio {
                add(EvidenceTag::DuplicateMessages, cfg.duplicate_weight);
            }
        }

        let fast_intervals = windowed
            .windows(2)
            .filter(|pair| pair[1].0.saturating_sub(pair[0].0) < cfg.human_floor_ms)
            .count();
        if fast_intervals >= cfg.inhuman_hits {
            add(EvidenceTag::InhumanLatency, cfg.inhuman_weight);
        }

        if record.injections.iter().any(|ts| *ts >= cutoff) {
            add(EvidenceTag::InjectionCharacters, cfg.injection_weight);
        }

        if record.pastes.iter().filter(|ts| **ts >= cutoff).count() >= cfg.paste_count {
            add(EvidenceTag::PasteAbuse, cfg.paste_weight);
        }

        let instant = record
            .guess_latencies
            .iter()
            .filter(|ms| **ms < cfg.instant_guess_ms)
            .count();
        if instant >= cfg.instant_guess_count {
            add(EvidenceTag::InstantGuesses, cfg.instant_guess_weight);
        }

        if record.userscript {
            add(EvidenceTag::UserscriptDetected, cfg.userscript_weight);
        }

        let confidence = score.min(cfg.max_confidence);
        let recommendation = if confidence >= cfg.ban_threshold {
            Recommendation::Ban
        } else if confidence >= cfg.warn_threshold {
            Recommendation::Warn
        } else {
            Recommendation::Allow
        };
        Assessment {
            confidence,
            recommendation,
            tags,
        }
    }
}

/// Control, zero-width or bidi characters, or markup that tries to run
/// script in another client.
pub fn contains_injection(text: &str) -> bool {
    let suspicious_char = text.chars().any(|c| {
        c.is_control()
            || matches!(
                c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2069}' | '\u{FEFF}'
            )
    });
    if suspicious_char {
        return true;
    }
    let lower = text.to_lowercase();
    ["<script", "javascript:", "onerror=", "onload=", "<iframe"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AntiCheatEngine {
        AntiCheatEngine::default()
    }

    fn typed() -> ClientSignals {
        ClientSignals::default()
    }

    #[test]
    fn test_observe_message_normal_chat_allows() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        for (i, text) in ["hi", "is it a cat", "a dog?", "house"].iter().enumerate() {
            let a = engine.observe_message(&mut record, i as u64 * 1_500, text, typed());
            assert_eq!(a.recommendation, Recommendation::Allow);
            assert!(a.tags.is_empty());
        }
    }

    #[test]
    fn test_observe_message_thirteen_in_window_bans_on_spam_intense_alone() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        let mut last = None;
        for i in 0..13u64 {
            let text = format!("guess number {i}");
            last = Some(engine.observe_message(&mut record, i * 350, &text, typed()));
        }
        let last = last.unwrap();
        assert_eq!(last.recommendation, Recommendation::Ban);
        assert_eq!(last.confidence, 85);
        assert_eq!(last.tags, BTreeSet::from([EvidenceTag::SpamIntense]));
    }

    #[test]
    fn test_observe_message_moderate_spam_stays_allowed() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        let mut last = None;
        for i in 0..8u64 {
            last = Some(engine.observe_message(&mut record, i * 500, &format!("m{i}"), typed()));
        }
        let last = last.unwrap();
        assert_eq!(last.tags, BTreeSet::from([EvidenceTag::SpamModerate]));
        assert_eq!(last.recommendation, Recommendation::Allow);
    }

    #[test]
    fn test_observe_message_window_slides() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        for i in 0..12u64 {
            engine.observe_message(&mut record, i * 400, &format!("m{i}"), typed());
        }
        // Long pause: old messages fall out of the window.
        let a = engine.observe_message(&mut record, 60_000, "back", typed());
        assert_eq!(a.recommendation, Recommendation::Allow);
        assert!(a.tags.is_empty());
    }

    #[test]
    fn test_observe_message_duplicates_and_inhuman_latency_warn() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        let mut last = None;
        for i in 0..4u64 {
            last = Some(engine.observe_message(&mut record, 1_000 + i * 50, "same", typed()));
        }
        let last = last.unwrap();
        assert!(last.tags.contains(&EvidenceTag::DuplicateMessages));
        assert!(last.tags.contains(&EvidenceTag::InhumanLatency));
        assert_eq!(last.confidence, 55);
        assert_eq!(last.recommendation, Recommendation::Warn);
        assert_eq!(record.warnings(), 1);
    }

    #[test]
    fn test_observe_message_injection_characters_flagged() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        let a = engine.observe_message(&mut record, 0, "<script>alert(1)</script>", typed());
        assert_eq!(a.tags, BTreeSet::from([EvidenceTag::InjectionCharacters]));
        assert_eq!(a.recommendation, Recommendation::Warn);

        let mut record = BehaviorRecord::new();
        let a = engine.observe_message(&mut record, 0, "hel\u{200B}lo", typed());
        assert!(a.tags.contains(&EvidenceTag::InjectionCharacters));
    }

    #[test]
    fn test_observe_message_userscript_bans() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        let signals = ClientSignals {
            userscript: true,
            ..ClientSignals::default()
        };
        let a = engine.observe_message(&mut record, 0, "hello", signals);
        assert_eq!(a.recommendation, Recommendation::Ban);
        assert_eq!(a.tags, BTreeSet::from([EvidenceTag::UserscriptDetected]));
        assert_eq!(a.confidence, 100);
    }

    #[test]
    fn test_observe_message_paste_abuse() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        let pasted = ClientSignals {
            pasted: true,
            ..ClientSignals::default()
        };
        let mut last = None;
        for i in 0..5u64 {
            last = Some(engine.observe_message(&mut record, i * 900, &format!("p{i}"), pasted));
        }
        assert!(last.unwrap().tags.contains(&EvidenceTag::PasteAbuse));
    }

    #[test]
    fn test_observe_correct_guess_repeated_instant_guesses() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        assert!(engine.observe_correct_guess(&mut record, 400).tags.is_empty());
        assert!(engine.observe_correct_guess(&mut record, 20_000).tags.is_empty());
        assert!(engine.observe_correct_guess(&mut record, 300).tags.is_empty());
        let a = engine.observe_correct_guess(&mut record, 250);
        assert_eq!(a.tags, BTreeSet::from([EvidenceTag::InstantGuesses]));
        assert_eq!(a.recommendation, Recommendation::Warn);
    }

    #[test]
    fn test_assess_is_deterministic() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        for i in 0..9u64 {
            engine.observe_message(&mut record, i * 100, "dup", typed());
        }
        let copy = record.clone();
        assert_eq!(engine.assess(&record), engine.assess(&copy));
        assert_eq!(engine.assess(&record), engine.assess(&record));
    }

    #[test]
    fn test_assess_confidence_is_capped() {
        let engine = engine();
        let mut record = BehaviorRecord::new();
        let signals = ClientSignals {
            pasted: true,
            userscript: true,
        };
        let mut last = None;
        for i in 0..13u64 {
            last = Some(engine.observe_message(&mut record, i * 10, "<script>", signals));
        }
        assert_eq!(last.unwrap().confidence, 100);
    }

    #[test]
    fn test_config_partial_json_keeps_defaults() {
        let cfg: AntiCheatConfig =
            serde_json::from_str(r#"{"banThreshold": 90, "spamIntenseWeight": 95}"#).unwrap();
        assert_eq!(cfg.ban_threshold, 90);
        assert_eq!(cfg.spam_intense_weight, 95);
        assert_eq!(cfg.window_ms, 5_000);
    }
}
