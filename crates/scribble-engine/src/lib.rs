//! Pure game rules for Scribble.
//!
//! Nothing in this crate does I/O or reads a clock: every time input is an
//! explicit argument, and randomness comes from a caller-supplied `Rng`.
//! That keeps the rules unit-testable and reproducible.
//!
//! - [`words`]: the word bank.
//! - [`mask`]: masked display and the hint schedule.
//! - [`scoring`]: points and guess evaluation.
//! - [`names`]: display-name validation.
//! - [`anticheat`]: the behavioural heuristic engine.
//! - [`text`]: normalization helpers shared by the others.

pub mod anticheat;
pub mod mask;
pub mod names;
pub mod scoring;
pub mod text;
pub mod words;

pub use anticheat::{AntiCheatConfig, AntiCheatEngine, Assessment, BehaviorRecord, Recommendation};
pub use mask::{HintSchedule, PLACEHOLDER, mask, maskable_indices, pick_reveal};
pub use names::{NameError, validate_name};
pub use scoring::{GuessOutcome, ScoringConfig, evaluate_guess};
pub use text::{compact, edit_distance, normalize};
pub use words::WordBank;
