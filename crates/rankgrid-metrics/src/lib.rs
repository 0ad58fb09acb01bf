//! rankgrid-metrics: what a finished run looked like.
//!
//! Computed once, after the run loop returns, from the run history and
//! the wall-clock window of the run.
//!
//! # Architecture
//!
//! ```text
//! RunStatistics (history, begin, end, total_ranks)
//!   ├── load_balance_ratio() ← consumed rank-time / available rank-time
//!   ├── summary() → RunSummary (console + JSON)
//!   └── render_svg() → utilization timeline, one rectangle per instance
//! ```

pub mod statistics;
pub mod svg;

pub use statistics::{CommandTiming, RunStatistics, RunSummary};
pub use svg::render_svg;
