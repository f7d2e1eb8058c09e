//! Persistence for scored tasks.
//!
//! Provides:
//! - `read_jsonl`: Tolerant line-by-line reader
//! - `ResultSink`: Durable, append-only writer of scored tasks
//! - `ScoredLedger`: What a previous run already scored, for opt-in resume

mod jsonl;
mod ledger;

pub use jsonl::*;
pub use ledger::*;
