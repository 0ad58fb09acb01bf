//! Persisted checkpoint types.

use serde::{Deserialize, Serialize};

/// One command known to have finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub id: String,
    /// Wall-clock run time of the command in the run that completed it.
    pub elapsed_ms: u64,
    /// Unix timestamp (seconds) of the completion.
    pub finished_at: u64,
}
