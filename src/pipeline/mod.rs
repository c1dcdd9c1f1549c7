//! Pipeline entry points for CLI operations.
//!
//! - `run_threadmarks`: List a thread's threadmarks
//! - `run_tally`: Fetch posts after a threadmark and rank the ballots
//! - `run_invalidate` / `run_sweep`: Cache housekeeping
//! - `run_validate`: Check a configuration file

pub mod maintenance;
pub mod tally;
pub mod threadmarks;
pub mod validate;

pub use maintenance::{run_invalidate, run_sweep};
pub use tally::{TallyOptions, run_tally};
pub use threadmarks::run_threadmarks;
pub use validate::run_validate;
