//! The four record schemas.

mod compliance;
mod gap;
mod rcm;
mod trend;

pub use compliance::Compliance;
pub use gap::{GapAnalysis, GapTally};
pub use rcm::Rcm;
pub use trend::Trend;
