//! Scheduler error types.

use thiserror::Error;

use rank_runtime::AllocError;
use rankgrid_state::StateError;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("command {id} requests {requested} ranks but only {available} exist")]
    UnsatisfiableCommand {
        id: String,
        requested: u32,
        available: u32,
    },

    #[error("command {id} failed to launch {attempts} times in a row: {reason}")]
    LaunchRetriesExhausted {
        id: String,
        attempts: u32,
        reason: String,
    },

    #[error("allocator invariant violated: {0}")]
    Allocator(#[from] AllocError),

    #[error("checkpoint error: {0}")]
    State(#[from] StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
