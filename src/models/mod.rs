//! Core data models for qe-prefs.

mod config;
mod error;
mod task;

pub use config::*;
pub use error::*;
pub use task::*;
