//! Task expansion: raw bilingual records into directional scoring tasks.
//!
//! Each complete record yields four tasks, always in this order:
//!
//! | direction   | src | mt       |
//! |-------------|-----|----------|
//! | `en-ga_gpt` | en  | gpt_4_ga |
//! | `ga-en_gpt` | ga  | gpt_4_en |
//! | `en-ga`     | en  | ga       |
//! | `ga-en`     | ga  | en       |

use crate::models::{Direction, RawRecord, Result, ScoringTask};
use crate::sink::{JsonlRead, read_jsonl};
use std::path::Path;
use tracing::{debug, info};

/// Tasks derived from a run's worth of records.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub tasks: Vec<ScoringTask>,
    /// Records rejected for missing fields
    pub dropped: usize,
}

/// Load raw records from a JSONL file, skipping lines that do not parse.
pub fn load_records(path: &Path) -> Result<JsonlRead<RawRecord>> {
    let read = read_jsonl::<RawRecord>(path)?;
    info!(
        count = read.items.len(),
        malformed = read.malformed,
        "Loaded records"
    );
    Ok(read)
}

/// Expand one record into its scoring tasks.
///
/// Returns no tasks when any required field is absent or null.
pub fn expand(record: &RawRecord) -> Vec<ScoringTask> {
    let (Some(en), Some(ga), Some(gpt_4_en), Some(gpt_4_ga)) =
        (&record.en, &record.ga, &record.gpt_4_en, &record.gpt_4_ga)
    else {
        return Vec::new();
    };

    vec![
        ScoringTask::new(en, gpt_4_ga, Direction::EnGaGpt),
        ScoringTask::new(ga, gpt_4_en, Direction::GaEnGpt),
        ScoringTask::new(en, ga, Direction::EnGa),
        ScoringTask::new(ga, en, Direction::GaEn),
    ]
}

/// Expand every record, logging and counting the ones that are dropped.
pub fn expand_all(records: &[RawRecord]) -> Expansion {
    let mut expansion = Expansion {
        tasks: Vec::with_capacity(records.len() * 4),
        dropped: 0,
    };

    for (idx, record) in records.iter().enumerate() {
        let tasks = expand(record);
        if tasks.is_empty() {
            debug!(
                record = idx,
                missing = ?record.missing_fields(),
                "Dropping incomplete record"
            );
            expansion.dropped += 1;
            continue;
        }
        expansion.tasks.extend(tasks);
    }

    info!(
        tasks = expansion.tasks.len(),
        dropped = expansion.dropped,
        "Expanded records into scoring tasks"
    );
    expansion
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting() -> RawRecord {
        RawRecord::new("Hi", "Dia dhuit", "Hi there", "Dia duit")
    }

    #[test]
    fn test_complete_record_yields_four_tasks_in_fixed_order() {
        let tasks = expand(&greeting());
        assert_eq!(
            tasks,
            vec![
                ScoringTask::new("Hi", "Dia duit", Direction::EnGaGpt),
                ScoringTask::new("Dia dhuit", "Hi there", Direction::GaEnGpt),
                ScoringTask::new("Hi", "Dia dhuit", Direction::EnGa),
                ScoringTask::new("Dia dhuit", "Hi", Direction::GaEn),
            ]
        );
    }

    #[test]
    fn test_any_missing_field_yields_nothing() {
        let base = greeting();
        let variants = [
            RawRecord {
                en: None,
                ..base.clone()
            },
            RawRecord {
                ga: None,
                ..base.clone()
            },
            RawRecord {
                gpt_4_en: None,
                ..base.clone()
            },
            RawRecord {
                gpt_4_ga: None,
                ..base.clone()
            },
            RawRecord::default(),
        ];

        for record in &variants {
            assert!(expand(record).is_empty(), "{record:?}");
        }
    }

    #[test]
    fn test_empty_strings_are_present_values() {
        let record = RawRecord::new("", "", "", "");
        assert_eq!(expand(&record).len(), 4);
    }

    #[test]
    fn test_expand_all_keeps_going_past_dropped_records() {
        let incomplete = RawRecord {
            gpt_4_en: None,
            ..greeting()
        };
        let other = RawRecord::new("Bye", "Slán", "Goodbye", "Slán leat");

        let expansion = expand_all(&[greeting(), incomplete, other]);
        assert_eq!(expansion.dropped, 1);
        assert_eq!(expansion.tasks.len(), 8);
        assert_eq!(expansion.tasks[4].src, "Bye");
        assert_eq!(expansion.tasks[4].direction, Direction::EnGaGpt);
    }
}
