//! Command: one schedulable unit of work.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;

/// Immutable description of a command: who it is, how many ranks it needs,
/// how expensive it is expected to be, and what to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    id: String,
    is_mpi: bool,
    ranks: u32,
    estimated_cost: u64,
    args: Vec<String>,
}

impl Command {
    /// Build a command. A command must request at least one rank.
    pub fn new(
        id: impl Into<String>,
        is_mpi: bool,
        ranks: u32,
        estimated_cost: u64,
        args: Vec<String>,
    ) -> Result<Self, CatalogError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CatalogError::EmptyId);
        }
        if ranks == 0 {
            return Err(CatalogError::ZeroRanks(id));
        }
        Ok(Self {
            id,
            is_mpi,
            ranks,
            estimated_cost,
            args,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// True for a multi-rank ("mpi") command.
    pub fn is_mpi(&self) -> bool {
        self.is_mpi
    }

    pub fn ranks(&self) -> u32 {
        self.ranks
    }

    /// Relative duration hint, only used to break ties between commands
    /// requesting the same number of ranks.
    pub fn estimated_cost(&self) -> u64 {
        self.estimated_cost
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, if self.is_mpi { "mpi" } else { "seq" })?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(
            f,
            " {{ranks: {}, estimated cost: {}}}",
            self.ranks, self.estimated_cost
        )
    }
}
