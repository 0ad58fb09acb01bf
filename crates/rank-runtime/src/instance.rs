//! Instance: a command bound to the rank range it was granted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rank_core::Command;

use crate::error::LaunchError;
use crate::executor::Executor;

/// Runtime record of one admitted command.
///
/// Created by the allocator when ranks are granted, kept in the run
/// history after it finishes.
#[derive(Debug, Clone)]
pub struct Instance {
    command: Arc<Command>,
    starting_rank: u32,
    ranks: u32,
    started_at: Instant,
    finished_at: Option<Instant>,
}

impl Instance {
    /// Bind a command to `ranks` ranks starting at `starting_rank`, stamped now.
    pub fn new(command: Arc<Command>, starting_rank: u32, ranks: u32) -> Self {
        Self::with_start(command, starting_rank, ranks, Instant::now())
    }

    /// Same as [`Instance::new`] with an explicit start time.
    pub fn with_start(
        command: Arc<Command>,
        starting_rank: u32,
        ranks: u32,
        started_at: Instant,
    ) -> Self {
        Self {
            command,
            starting_rank,
            ranks,
            started_at,
            finished_at: None,
        }
    }

    /// Ask the executor to start the command on the granted ranks.
    pub fn launch<E: Executor + ?Sized>(&self, executor: &mut E) -> Result<(), LaunchError> {
        executor.launch(self)
    }

    /// Record completion now. Returns `false` (and changes nothing) if the
    /// instance was already marked finished.
    pub fn mark_finished(&mut self) -> bool {
        self.mark_finished_at(Instant::now())
    }

    pub fn mark_finished_at(&mut self, at: Instant) -> bool {
        if self.finished_at.is_some() {
            return false;
        }
        self.finished_at = Some(at);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Wall-clock run time; zero until finished.
    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .map(|end| end.saturating_duration_since(self.started_at))
            .unwrap_or_default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn id(&self) -> &str {
        self.command.id()
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    pub fn starting_rank(&self) -> u32 {
        self.starting_rank
    }

    pub fn ranks(&self) -> u32 {
        self.ranks
    }

    /// Last rank index of the grant (inclusive).
    pub fn last_rank(&self) -> u32 {
        self.starting_rank + self.ranks - 1
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }
}
