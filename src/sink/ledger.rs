//! Opt-in resume support for the scoring pass.
//!
//! The scored-task stream doubles as the record of what has been done: a
//! restarted run can load it and leave out tasks that already have a score.
//! Nothing here runs unless the caller asks for it.

use crate::models::{Result, ScoredTask, ScoringTask};
use crate::sink::read_jsonl;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Set of tasks already present in a scored-task stream.
#[derive(Debug, Default)]
pub struct ScoredLedger {
    seen: HashSet<ScoringTask>,
}

impl ScoredLedger {
    /// Load the ledger from an existing scored-task stream.
    ///
    /// A missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let read = read_jsonl::<ScoredTask>(path)?;
        let seen: HashSet<ScoringTask> = read.items.into_iter().map(ScoredTask::into_task).collect();

        info!(
            scored = seen.len(),
            malformed = read.malformed,
            path = %path.display(),
            "Loaded scored-task ledger"
        );
        Ok(Self { seen })
    }

    /// Whether `task` already has a persisted score.
    pub fn contains(&self, task: &ScoringTask) -> bool {
        self.seen.contains(task)
    }

    /// Number of distinct scored tasks.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been scored yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Filter tasks to only those without a persisted score.
    pub fn filter_unscored(&self, tasks: Vec<ScoringTask>) -> Vec<ScoringTask> {
        if self.seen.is_empty() {
            return tasks;
        }
        tasks.into_iter().filter(|t| !self.contains(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use crate::sink::ResultSink;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ScoredLedger::load(&temp_dir.path().join("none.jsonl")).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_filter_drops_scored_tasks_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scored.jsonl");

        let done = ScoringTask::new("Hi", "Dia dhuit", Direction::EnGa);
        let mut sink = ResultSink::open_append(&path).unwrap();
        sink.append(&ScoredTask::new(done.clone(), 0.9, 0.8)).unwrap();

        let ledger = ScoredLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 1);

        let same_text_other_direction = ScoringTask::new("Hi", "Dia dhuit", Direction::EnGaGpt);
        let fresh = ScoringTask::new("Dia dhuit", "Hi", Direction::GaEn);
        let pending = ledger.filter_unscored(vec![
            done,
            same_text_other_direction.clone(),
            fresh.clone(),
        ]);
        assert_eq!(pending, vec![same_text_other_direction, fresh]);
    }
}
