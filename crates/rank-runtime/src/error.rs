//! Allocation and launch error types.

use std::path::PathBuf;

use thiserror::Error;

/// Violations of the rank pool's bookkeeping. These indicate a scheduling
/// bug, never an external condition, and abort the run.
#[derive(Debug, Error)]
pub enum AllocError {
    #[error("cannot grant {requested} ranks to {id}: {free} of {total} free")]
    InsufficientRanks {
        id: String,
        requested: u32,
        free: u32,
        total: u32,
    },

    #[error("command already holds a rank grant: {0}")]
    AlreadyGranted(String),

    #[error("command holds no rank grant: {0}")]
    NotGranted(String),

    #[error("rank {rank} is not held by {id}")]
    RankNotHeld { id: String, rank: u32 },
}

pub type AllocResult<T> = Result<T, AllocError>;

/// A command could not be started. Recoverable: the scheduler frees the
/// grant and retries later.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("command {0} has nothing to execute")]
    EmptyCommand(String),

    #[error("failed to spawn {program} for {id}: {source}")]
    Spawn {
        id: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log file {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("executor rejected {id}: {reason}")]
    Rejected { id: String, reason: String },
}
