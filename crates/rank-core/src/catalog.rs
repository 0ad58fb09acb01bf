//! Commands catalog and commands-file parser.
//!
//! A commands file holds one command per line:
//!
//! ```text
//! # id      mode  ranks  cost  args...
//! first_a   mpi   4      120   --msa a.fasta --threads 1
//! first_b   seq   1      10    --msa b.fasta
//! ```
//!
//! Everything after a `#` is a comment, blank lines are skipped. A mode of
//! `mpi` marks a multi-rank command, any other token a sequential one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::command::Command;

/// Errors raised while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read commands file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: missing {field}")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid {field} {value:?}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("duplicate command id {id:?}")]
    DuplicateCommand { id: String },

    #[error("line {line}: duplicate command id {id:?}")]
    DuplicateLine { line: usize, id: String },

    #[error("command {0:?} requests zero ranks")]
    ZeroRanks(String),

    #[error("command id must not be empty")]
    EmptyId,
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Ordered collection of commands, unique by id.
///
/// Filled once before scheduling starts and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct CommandCatalog {
    commands: Vec<Arc<Command>>,
    by_id: HashMap<String, Arc<Command>>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a commands file.
    pub fn from_file(path: &Path) -> CatalogResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse the commands-file format.
    pub fn parse(content: &str) -> CatalogResult<Self> {
        let mut catalog = Self::new();
        for (index, raw) in content.lines().enumerate() {
            let line = index + 1;
            let Some(command) = parse_line(raw, line)? else {
                continue;
            };
            if catalog.by_id.contains_key(command.id()) {
                return Err(CatalogError::DuplicateLine {
                    line,
                    id: command.id().to_string(),
                });
            }
            catalog.add(command)?;
        }
        Ok(catalog)
    }

    /// Insert a command. Fails if a command with the same id exists.
    pub fn add(&mut self, command: Command) -> CatalogResult<Arc<Command>> {
        if self.by_id.contains_key(command.id()) {
            return Err(CatalogError::DuplicateCommand {
                id: command.id().to_string(),
            });
        }
        let command = Arc::new(command);
        self.by_id
            .insert(command.id().to_string(), Arc::clone(&command));
        self.commands.push(Arc::clone(&command));
        Ok(command)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Command>> {
        self.by_id.get(id).cloned()
    }

    /// All commands in insertion order.
    pub fn all(&self) -> &[Arc<Command>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Largest rank demand of any command (0 for an empty catalog).
    pub fn max_ranks(&self) -> u32 {
        self.commands.iter().map(|c| c.ranks()).max().unwrap_or(0)
    }
}

/// Parse one line. Returns `None` for blank and comment-only lines.
fn parse_line(raw: &str, line: usize) -> CatalogResult<Option<Command>> {
    let content = match raw.find('#') {
        Some(end) => &raw[..end],
        None => raw,
    }
    .trim();
    if content.is_empty() {
        return Ok(None);
    }

    let mut tokens = content.split_whitespace();
    let id = tokens
        .next()
        .ok_or(CatalogError::MissingField { line, field: "id" })?;
    let mode = tokens
        .next()
        .ok_or(CatalogError::MissingField { line, field: "mode" })?;
    let ranks = parse_number::<u32>(tokens.next(), line, "ranks")?;
    let cost = parse_number::<u64>(tokens.next(), line, "estimated cost")?;
    let args = tokens.map(str::to_string).collect();

    Command::new(id, mode == "mpi", ranks, cost, args).map(Some)
}

fn parse_number<T: std::str::FromStr>(
    token: Option<&str>,
    line: usize,
    field: &'static str,
) -> CatalogResult<T> {
    let token = token.ok_or(CatalogError::MissingField { line, field })?;
    token.parse().map_err(|_| CatalogError::InvalidNumber {
        line,
        field,
        value: token.to_string(),
    })
}
