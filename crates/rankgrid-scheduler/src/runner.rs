//! CommandsRunner: the control loop.
//!
//! The runner:
//! - Builds the pending queue from the catalog, minus checkpointed commands
//! - Admits the queue head whenever the allocator can grant its ranks
//! - Polls the allocator for finished instances and reclaims their ranks
//! - Records completions in the checkpoint
//! - Stops once the queue is empty and every rank is free
//!
//! Everything runs on one task. The only suspension point is the short
//! sleep taken when an iteration made no progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rank_core::{CommandCatalog, RunConfig};
use rank_runtime::{Instance, RankAllocator};
use rankgrid_state::CheckpointStore;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::queue::PendingQueue;

/// Loop tuning.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Sleep between iterations that made no progress.
    pub poll_interval: Duration,
    /// Interval of the "still waiting" notice while idle.
    pub heartbeat_interval: Duration,
    /// Consecutive launch failures tolerated for the queue head.
    /// `None` retries forever.
    pub max_launch_attempts: Option<u32>,
    /// Write each completion to the checkpoint as it is observed.
    pub persist_completions: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            heartbeat_interval: Duration::from_secs(60),
            max_launch_attempts: None,
            persist_completions: true,
        }
    }
}

impl RunnerOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            heartbeat_interval: config.heartbeat_interval(),
            max_launch_attempts: config.max_launch_attempts(),
            persist_completions: config.persist_completions(),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub begin: Instant,
    pub end: Instant,
    pub total_ranks: u32,
    /// Commands admitted during this run.
    pub admitted: usize,
    /// Commands skipped because the checkpoint marked them done.
    pub skipped: usize,
    /// Launch attempts that failed and were retried.
    pub launch_failures: u32,
}

impl RunReport {
    pub fn elapsed(&self) -> Duration {
        self.end.saturating_duration_since(self.begin)
    }
}

pub struct CommandsRunner<A> {
    allocator: A,
    checkpoint: Option<CheckpointStore>,
    options: RunnerOptions,
    queue: PendingQueue,
    skipped: usize,
    /// Every admitted instance, in admission order.
    historic: Vec<Instance>,
    /// Running command id → index into `historic`.
    running: HashMap<String, usize>,
    /// Consecutive launch failures of the current queue head.
    head_failures: u32,
    launch_failures: u32,
}

impl<A: RankAllocator> CommandsRunner<A> {
    /// Build the runner and its pending queue.
    ///
    /// Fails if any command asks for more ranks than the allocator owns,
    /// since such a command could never be admitted.
    pub fn new(
        catalog: &CommandCatalog,
        allocator: A,
        checkpoint: Option<CheckpointStore>,
        options: RunnerOptions,
    ) -> SchedulerResult<Self> {
        let total = allocator.total_ranks();
        if let Some(command) = catalog.all().iter().find(|c| c.ranks() > total) {
            return Err(SchedulerError::UnsatisfiableCommand {
                id: command.id().to_string(),
                requested: command.ranks(),
                available: total,
            });
        }

        let mut pending = Vec::with_capacity(catalog.len());
        let mut skipped = 0;
        for command in catalog.all() {
            let done = match &checkpoint {
                Some(store) => store.is_done(command.id())?,
                None => false,
            };
            if done {
                debug!(command = %command.id(), "already done, skipping");
                skipped += 1;
            } else {
                pending.push(Arc::clone(command));
            }
        }

        if skipped > 0 {
            info!(skipped, pending = pending.len(), "resuming from checkpoint");
        }

        Ok(Self {
            allocator,
            checkpoint,
            options,
            queue: PendingQueue::new(pending),
            skipped,
            historic: Vec::new(),
            running: HashMap::new(),
            head_failures: 0,
            launch_failures: 0,
        })
    }

    /// True once nothing is pending and no rank is granted.
    pub fn is_done(&self) -> bool {
        self.queue.is_empty() && self.allocator.all_ranks_available()
    }

    /// Run until every pending command has been admitted and has finished.
    pub async fn run(&mut self) -> SchedulerResult<RunReport> {
        let begin = Instant::now();
        let mut last_notice = begin;
        let admitted_before = self.historic.len();

        info!(
            pending = self.queue.len(),
            ranks = self.allocator.total_ranks(),
            "starting run"
        );

        while !self.is_done() {
            if self.step()? {
                continue;
            }
            if last_notice.elapsed() >= self.options.heartbeat_interval {
                info!(
                    pending = self.queue.len(),
                    running = self.running.len(),
                    free_ranks = self.allocator.free_ranks(),
                    "still waiting for commands to finish"
                );
                last_notice = Instant::now();
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }

        let end = Instant::now();
        info!(
            admitted = self.historic.len() - admitted_before,
            elapsed_ms = end.duration_since(begin).as_millis() as u64,
            "run finished"
        );

        Ok(RunReport {
            begin,
            end,
            total_ranks: self.allocator.total_ranks(),
            admitted: self.historic.len() - admitted_before,
            skipped: self.skipped,
            launch_failures: self.launch_failures,
        })
    }

    /// One loop iteration: try to admit the queue head, then collect
    /// finished instances. Returns whether anything changed.
    pub fn step(&mut self) -> SchedulerResult<bool> {
        let admitted = self.admit_next()?;
        let finished = self.collect_finished()?;
        Ok(admitted || finished > 0)
    }

    fn admit_next(&mut self) -> SchedulerResult<bool> {
        let Some(command) = self.queue.head().cloned() else {
            return Ok(false);
        };
        if !self.allocator.ranks_available() || !self.allocator.can_allocate(command.ranks()) {
            return Ok(false);
        }

        let instance = self.allocator.allocate(Arc::clone(&command))?;
        if let Err(e) = self.allocator.launch(&instance) {
            self.allocator.free(&instance)?;
            self.head_failures += 1;
            self.launch_failures += 1;
            warn!(
                command = %command.id(),
                attempt = self.head_failures,
                error = %e,
                "launch failed, command stays at the head of the queue"
            );
            if let Some(max) = self.options.max_launch_attempts {
                if self.head_failures >= max {
                    return Err(SchedulerError::LaunchRetriesExhausted {
                        id: command.id().to_string(),
                        attempts: self.head_failures,
                        reason: e.to_string(),
                    });
                }
            }
            return Ok(false);
        }

        info!(
            command = %command,
            first_rank = instance.starting_rank(),
            last_rank = instance.last_rank(),
            "executing command"
        );
        self.queue.advance();
        self.head_failures = 0;
        self.running
            .insert(command.id().to_string(), self.historic.len());
        self.historic.push(instance);
        Ok(true)
    }

    fn collect_finished(&mut self) -> SchedulerResult<usize> {
        let mut count = 0;
        for id in self.allocator.poll_finished() {
            let Some(&index) = self.running.get(&id) else {
                debug!(command = %id, "completion for a command that is not running");
                continue;
            };
            let instance = &mut self.historic[index];
            if !instance.mark_finished() {
                continue;
            }
            self.allocator.free(instance)?;
            let elapsed_ms = instance.elapsed_ms();
            self.running.remove(&id);
            info!(command = %id, elapsed_ms, "command finished");
            self.record_completion(&id, elapsed_ms);
            count += 1;
        }
        Ok(count)
    }

    fn record_completion(&self, id: &str, elapsed_ms: u64) {
        if !self.options.persist_completions {
            return;
        }
        if let Some(store) = &self.checkpoint {
            if let Err(e) = store.mark_done(id, elapsed_ms) {
                error!(command = %id, error = %e, "failed to checkpoint completion");
            }
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Every admitted instance, in admission order.
    pub fn historic(&self) -> &[Instance] {
        &self.historic
    }

    pub fn into_historic(self) -> Vec<Instance> {
        self.historic
    }

    /// Ids of commands not yet admitted, in admission order.
    pub fn pending_ids(&self) -> Vec<&str> {
        self.queue.remaining().iter().map(|c| c.id()).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn launch_failures(&self) -> u32 {
        self.launch_failures
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }
}
