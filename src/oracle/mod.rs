//! Scoring oracle boundary.
//!
//! The quality-estimation model is opaque: callers hand it a batch of tasks
//! and get back one score per task in request order, plus one aggregate.

mod comet;
mod registry;

pub use comet::*;
pub use registry::*;

use crate::models::{Result, ScoringTask};
use async_trait::async_trait;

/// Scores returned for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchScores {
    /// Segment scores, index-aligned with the request
    pub scores: Vec<f64>,

    /// Aggregate over the whole batch
    pub system_score: f64,
}

/// Anything that can assign quality scores to scoring tasks.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Score a non-empty batch.
    ///
    /// `batch_size` is a hint forwarded to the model; it does not have to
    /// match `tasks.len()`.
    async fn score(&self, tasks: &[ScoringTask], batch_size: usize) -> Result<BatchScores>;
}
