//! Record, task and pair types for qe-prefs.
//!
//! These types carry the data flow: raw bilingual records expand into scoring
//! tasks, the oracle turns tasks into scored tasks, and scored tasks collapse
//! into preference pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One aligned bilingual sample from the input stream.
///
/// Every field is optional at parse time; a record missing any of them is
/// dropped before expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// English reference sentence
    #[serde(default)]
    pub en: Option<String>,

    /// Irish reference sentence
    #[serde(default)]
    pub ga: Option<String>,

    /// Machine translation of `ga` into English
    #[serde(default)]
    pub gpt_4_en: Option<String>,

    /// Machine translation of `en` into Irish
    #[serde(default)]
    pub gpt_4_ga: Option<String>,
}

impl RawRecord {
    /// Build a complete record.
    pub fn new(
        en: impl Into<String>,
        ga: impl Into<String>,
        gpt_4_en: impl Into<String>,
        gpt_4_ga: impl Into<String>,
    ) -> Self {
        Self {
            en: Some(en.into()),
            ga: Some(ga.into()),
            gpt_4_en: Some(gpt_4_en.into()),
            gpt_4_ga: Some(gpt_4_ga.into()),
        }
    }

    /// Names of the required fields that are absent or null.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("en", self.en.is_none()),
            ("ga", self.ga.is_none()),
            ("gpt_4_en", self.gpt_4_en.is_none()),
            ("gpt_4_ga", self.gpt_4_ga.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

/// Which language pair and which candidate a scoring task represents.
///
/// The `_gpt` variants score a machine-generated candidate; the plain
/// variants score the human reference pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "en-ga")]
    EnGa,
    #[serde(rename = "ga-en")]
    GaEn,
    #[serde(rename = "en-ga_gpt")]
    EnGaGpt,
    #[serde(rename = "ga-en_gpt")]
    GaEnGpt,
}

impl Direction {
    /// Wire name, as written in the scored-task stream.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnGa => "en-ga",
            Self::GaEn => "ga-en",
            Self::EnGaGpt => "en-ga_gpt",
            Self::GaEnGpt => "ga-en_gpt",
        }
    }

    /// Whether the candidate was machine generated.
    pub fn is_machine(self) -> bool {
        matches!(self, Self::EnGaGpt | Self::GaEnGpt)
    }

    /// Direction with the machine-candidate marker stripped.
    pub fn base(self) -> BaseDirection {
        match self {
            Self::EnGa | Self::EnGaGpt => BaseDirection::EnGa,
            Self::GaEn | Self::GaEnGpt => BaseDirection::GaEn,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language pair of a direction, used as half of the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseDirection {
    #[serde(rename = "en-ga")]
    EnGa,
    #[serde(rename = "ga-en")]
    GaEn,
}

impl fmt::Display for BaseDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnGa => f.write_str("en-ga"),
            Self::GaEn => f.write_str("ga-en"),
        }
    }
}

/// One (source, candidate) pair to be scored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoringTask {
    /// Source sentence
    pub src: String,

    /// Candidate translation
    pub mt: String,

    /// Which field pair produced this task
    pub direction: Direction,
}

impl ScoringTask {
    pub fn new(src: impl Into<String>, mt: impl Into<String>, direction: Direction) -> Self {
        Self {
            src: src.into(),
            mt: mt.into(),
            direction,
        }
    }
}

/// A scoring task plus the oracle's verdict on it.
///
/// Serialized with the field names downstream tooling expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTask {
    pub src: String,

    pub mt: String,

    pub direction: Direction,

    /// Segment-level quality score from the oracle
    #[serde(rename = "cometkiwi_score")]
    pub quality_score: f64,

    /// Batch-level aggregate, kept for provenance only
    pub system_score: f64,
}

impl ScoredTask {
    /// Attach scores to a task.
    pub fn new(task: ScoringTask, quality_score: f64, system_score: f64) -> Self {
        Self {
            src: task.src,
            mt: task.mt,
            direction: task.direction,
            quality_score,
            system_score,
        }
    }

    /// Drop the scores, keeping the task they were assigned to.
    pub fn into_task(self) -> ScoringTask {
        ScoringTask {
            src: self.src,
            mt: self.mt,
            direction: self.direction,
        }
    }
}

/// A (chosen, rejected) example for one source sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencePair {
    /// Shared source sentence
    pub prompt: String,

    /// Preferred candidate
    pub chosen: String,

    /// Dispreferred candidate (equal to `chosen` for single-member groups)
    pub rejected: String,
}

impl PreferencePair {
    /// Output line for the preference dataset.
    pub fn to_record(&self, system: &str) -> PairRecord {
        PairRecord {
            system: system.to_string(),
            question: self.prompt.clone(),
            chosen: self.chosen.clone(),
            rejected: self.rejected.clone(),
        }
    }
}

/// One line of the preference-pair output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRecord {
    pub system: String,
    pub question: String,
    pub chosen: String,
    pub rejected: String,
}

/// A batch the scoring driver gave up on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedBatch {
    /// Index of the first task of the batch
    pub start: usize,

    /// Number of tasks in the batch
    pub len: usize,

    /// Oracle error message
    pub reason: String,
}

/// Statistics for a scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreStats {
    /// Run identifier (also attached to log lines)
    pub run_id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Records parsed from the input stream
    pub total_records: usize,

    /// Lines that could not be parsed
    pub malformed_lines: usize,

    /// Records dropped for missing fields
    pub dropped_records: usize,

    /// Tasks submitted to the oracle
    pub total_tasks: usize,

    /// Tasks left out because a previous run already scored them
    pub already_scored: usize,

    /// Tasks written to the sink
    pub scored_tasks: usize,

    /// Batches abandoned after an oracle failure
    pub skipped_batches: Vec<SkippedBatch>,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Scored tasks per hour
    pub throughput_per_hour: f64,
}

impl Default for ScoreStats {
    fn default() -> Self {
        Self {
            run_id: String::new(),
            started_at: Utc::now(),
            total_records: 0,
            malformed_lines: 0,
            dropped_records: 0,
            total_tasks: 0,
            already_scored: 0,
            scored_tasks: 0,
            skipped_batches: Vec::new(),
            runtime_secs: 0.0,
            throughput_per_hour: 0.0,
        }
    }
}

impl ScoreStats {
    /// Tasks lost to skipped batches.
    pub fn skipped_tasks(&self) -> usize {
        self.skipped_batches.iter().map(|b| b.len).sum()
    }

    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.runtime_secs > 0.0 {
            self.throughput_per_hour = self.scored_tasks as f64 / self.runtime_secs * 3600.0;
        }
    }
}

/// Statistics for a preference-pair run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairStats {
    /// Scored tasks read
    pub input_tasks: usize,

    /// Lines that could not be parsed
    pub malformed_lines: usize,

    /// Distinct (source, base direction) groups
    pub groups: usize,

    /// Pairs written
    pub pairs: usize,

    /// Groups with a single member
    pub degenerate_groups: usize,

    /// Ties resolved by swapping the top two
    pub tie_swaps: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_wire_names_round_trip_through_json() {
        let json = serde_json::to_string(&Direction::EnGaGpt).unwrap();
        assert_eq!(json, r#""en-ga_gpt""#);
        let parsed: Direction = serde_json::from_str(r#""ga-en""#).unwrap();
        assert_eq!(parsed, Direction::GaEn);
    }

    #[test]
    fn test_base_direction_collapses_machine_marker() {
        assert_eq!(Direction::EnGaGpt.base(), Direction::EnGa.base());
        assert_eq!(Direction::GaEnGpt.base(), Direction::GaEn.base());
        assert_ne!(Direction::EnGa.base(), Direction::GaEn.base());
        assert!(Direction::GaEnGpt.is_machine());
        assert!(!Direction::GaEn.is_machine());
    }

    #[test]
    fn test_scored_task_uses_downstream_field_names() {
        let task = ScoredTask::new(
            ScoringTask::new("Hi", "Dia dhuit", Direction::EnGa),
            0.9,
            0.8,
        );
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["src"], "Hi");
        assert_eq!(value["mt"], "Dia dhuit");
        assert_eq!(value["direction"], "en-ga");
        assert_eq!(value["cometkiwi_score"], 0.9);
        assert_eq!(value["system_score"], 0.8);
        assert!(value.get("quality_score").is_none());
    }

    #[test]
    fn test_null_and_absent_fields_are_missing() {
        let record: RawRecord =
            serde_json::from_str(r#"{"en": "Hi", "ga": null, "gpt_4_en": "Hi there"}"#).unwrap();
        assert_eq!(record.missing_fields(), vec!["ga", "gpt_4_ga"]);
    }

    #[test]
    fn test_pair_record_carries_system_prompt() {
        let pair = PreferencePair {
            prompt: "Hi".to_string(),
            chosen: "Dia dhuit".to_string(),
            rejected: "Dia duit".to_string(),
        };
        let record = pair.to_record("Translate:");
        assert_eq!(record.system, "Translate:");
        assert_eq!(record.question, "Hi");
        assert_eq!(record.chosen, "Dia dhuit");
        assert_eq!(record.rejected, "Dia duit");
    }
}
