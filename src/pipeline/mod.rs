//! Pipeline module - scoring and preference-pair passes.

mod expand;
mod pairs;
mod score;

pub use expand::*;
pub use pairs::*;
pub use score::*;
