//! qe-prefs - Quality-estimation scoring and preference-pair construction
//! for bilingual (English/Irish) translation data.
//!
//! ## Architecture
//!
//! Two passes, run separately:
//! - **Scoring**: raw records → four directional tasks each → batched calls
//!   to a quality-estimation oracle → append-only scored-task stream
//! - **Pairing**: scored tasks → groups by (source, base direction) →
//!   stable ranking + tie-break → (chosen, rejected) pairs
//!
//! ## Failure model
//!
//! - Malformed input lines and incomplete records are skipped and logged
//! - An oracle failure abandons its batch only; the run moves on
//! - A failure to persist a scored task ends the run

pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod sink;

// Re-exports for convenience
pub use models::{
    Config, Direction, PairStats, PreferencePair, PrefsError, RawRecord, Result, ScoreStats,
    ScoredTask, ScoringTask, TiePolicy,
};
pub use oracle::{BatchScores, CometClient, OracleRegistry, ScoringOracle};
pub use pipeline::{
    BatchOutcome, PreferReference, PreferenceBuilder, RankOrder, ScoringPipeline, TieBreak,
    expand, expand_all,
};
pub use sink::{ResultSink, ScoredLedger};
