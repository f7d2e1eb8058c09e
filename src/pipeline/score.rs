//! Scoring pipeline: records → tasks → oracle batches → durable JSONL.
//!
//! Pipeline flow:
//! Raw records → Expand (4 tasks each) → fixed-size batches → Oracle → Result sink
//!
//! Batches run strictly one after another. A batch the oracle fails on is
//! logged and skipped whole; its tasks are not retried in the same run. A
//! failure while persisting ends the run.

use crate::models::{OracleError, Result, ScoreStats, ScoredTask, ScoringTask, SkippedBatch};
use crate::oracle::ScoringOracle;
use crate::pipeline::{expand_all, load_records};
use crate::sink::{ResultSink, ScoredLedger};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Every task in the batch was scored and persisted
    Scored { start: usize, written: usize },
    /// The oracle failed; nothing from the batch was persisted
    Skipped {
        start: usize,
        len: usize,
        reason: String,
    },
}

/// Scoring pipeline bound to one oracle.
pub struct ScoringPipeline {
    oracle: Arc<dyn ScoringOracle>,
    batch_size: usize,
    show_progress: bool,
}

impl ScoringPipeline {
    /// Create a pipeline that submits `batch_size` tasks per oracle call.
    pub fn new(oracle: Arc<dyn ScoringOracle>, batch_size: usize) -> Self {
        Self {
            oracle,
            batch_size: batch_size.max(1),
            show_progress: true,
        }
    }

    /// Enable or disable the terminal progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Tasks per oracle call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Score one batch, returning index-aligned scored tasks.
    ///
    /// A response whose length differs from the request, or that carries a
    /// NaN or infinite score, is rejected as a whole rather than partially
    /// matched.
    pub async fn score_batch(&self, batch: &[ScoringTask]) -> Result<Vec<ScoredTask>> {
        if batch.is_empty() {
            return Err(OracleError::EmptyBatch.into());
        }

        let scores = self.oracle.score(batch, self.batch_size).await?;
        if scores.scores.len() != batch.len() {
            return Err(OracleError::LengthMismatch {
                expected: batch.len(),
                got: scores.scores.len(),
            }
            .into());
        }
        // JSON has no NaN or infinity; such a score could not be read back.
        if let Some(idx) = scores.scores.iter().position(|s| !s.is_finite()) {
            return Err(OracleError::InvalidResponse(format!(
                "non-finite score {} at index {idx}",
                scores.scores[idx]
            ))
            .into());
        }
        if !scores.system_score.is_finite() {
            return Err(OracleError::InvalidResponse(format!(
                "non-finite system score {}",
                scores.system_score
            ))
            .into());
        }

        Ok(batch
            .iter()
            .cloned()
            .zip(scores.scores)
            .map(|(task, score)| ScoredTask::new(task, score, scores.system_score))
            .collect())
    }

    /// Score `tasks` batch by batch, appending each result to `sink`.
    ///
    /// Oracle failures become [`BatchOutcome::Skipped`]; sink failures are
    /// returned as errors.
    pub async fn score_tasks(
        &self,
        tasks: &[ScoringTask],
        sink: &mut ResultSink,
    ) -> Result<Vec<BatchOutcome>> {
        let total = tasks.len();
        let pb = self.progress_bar(total);
        let mut outcomes = Vec::with_capacity(total.div_ceil(self.batch_size));

        for (batch_idx, batch) in tasks.chunks(self.batch_size).enumerate() {
            let start = batch_idx * self.batch_size;

            let outcome = match self.score_batch(batch).await {
                Ok(scored) => {
                    for (offset, task) in scored.iter().enumerate() {
                        sink.append(task)?;

                        let processed = start + offset + 1;
                        pb.set_position(processed as u64);
                        debug!(processed = processed, total = total, "Processed item");
                    }
                    BatchOutcome::Scored {
                        start,
                        written: scored.len(),
                    }
                }
                Err(e) => {
                    warn!(
                        batch_start = start,
                        batch_len = batch.len(),
                        error = %e,
                        "Error processing batch, skipping"
                    );
                    BatchOutcome::Skipped {
                        start,
                        len: batch.len(),
                        reason: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Skipped { .. }))
            .count();
        pb.finish_with_message(format!("Done! {} batches, {skipped} skipped", outcomes.len()));

        Ok(outcomes)
    }

    /// Run the full scoring pass from a raw record file.
    ///
    /// With `resume`, tasks already present in `output_path` are left out.
    pub async fn run(&self, input_path: &Path, output_path: &Path, resume: bool) -> Result<ScoreStats> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("score", run_id = %run_id);
        self.run_inner(run_id, input_path, output_path, resume)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: String,
        input_path: &Path,
        output_path: &Path,
        resume: bool,
    ) -> Result<ScoreStats> {
        let started = Instant::now();
        let mut stats = ScoreStats {
            run_id,
            ..Default::default()
        };

        let records = load_records(input_path)?;
        stats.total_records = records.items.len();
        stats.malformed_lines = records.malformed;

        let expansion = expand_all(&records.items);
        stats.dropped_records = expansion.dropped;

        let mut tasks = expansion.tasks;
        if resume {
            let ledger = ScoredLedger::load(output_path)?;
            let before = tasks.len();
            tasks = ledger.filter_unscored(tasks);
            stats.already_scored = before - tasks.len();
        }
        stats.total_tasks = tasks.len();

        info!(
            total_tasks = stats.total_tasks,
            already_scored = stats.already_scored,
            batch_size = self.batch_size,
            "Starting scoring pipeline"
        );

        if tasks.is_empty() {
            info!("Nothing to score");
            stats.runtime_secs = started.elapsed().as_secs_f64();
            return Ok(stats);
        }

        let mut sink = ResultSink::open_append(output_path)?;
        let outcomes = self.score_tasks(&tasks, &mut sink).await?;

        for outcome in outcomes {
            if let BatchOutcome::Skipped { start, len, reason } = outcome {
                stats.skipped_batches.push(SkippedBatch { start, len, reason });
            }
        }
        stats.scored_tasks = sink.written();
        stats.runtime_secs = started.elapsed().as_secs_f64();
        stats.finalize();

        info!(
            scored = stats.scored_tasks,
            skipped_batches = stats.skipped_batches.len(),
            skipped_tasks = stats.skipped_tasks(),
            throughput = format!("{:.0} tasks/hr", stats.throughput_per_hour),
            output = %sink.path().display(),
            "Scoring pipeline complete"
        );

        Ok(stats)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

impl std::fmt::Debug for ScoringPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringPipeline")
            .field("batch_size", &self.batch_size)
            .field("show_progress", &self.show_progress)
            .finish()
    }
}
