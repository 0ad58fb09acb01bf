//! Rank allocator: sole authority over the rank pool.
//!
//! The allocator grants contiguous rank ranges to admitted commands,
//! reclaims them when the commands finish, and relays completion reports
//! from its executor, filtering duplicates so that every live instance is
//! reported exactly once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rank_core::Command;
use tracing::debug;

use crate::error::{AllocError, AllocResult, LaunchError};
use crate::executor::Executor;
use crate::instance::Instance;
use crate::pool::RankPool;

/// Contract the scheduler relies on.
pub trait RankAllocator {
    /// Size of the pool.
    fn total_ranks(&self) -> u32;

    /// Ranks not currently granted.
    fn free_ranks(&self) -> u32;

    /// At least one rank is free.
    fn ranks_available(&self) -> bool {
        self.free_ranks() > 0
    }

    /// No rank is granted.
    fn all_ranks_available(&self) -> bool {
        self.free_ranks() == self.total_ranks()
    }

    /// A grant of `ranks` ranks would succeed right now.
    fn can_allocate(&self, ranks: u32) -> bool;

    /// Reserve `command.ranks()` ranks and bind them to a new instance.
    fn allocate(&mut self, command: Arc<Command>) -> AllocResult<Instance>;

    /// Start the instance through the allocator's executor.
    fn launch(&mut self, instance: &Instance) -> Result<(), LaunchError>;

    /// Give the instance's ranks back to the pool.
    fn free(&mut self, instance: &Instance) -> AllocResult<()>;

    /// Ids of granted instances whose execution finished since the last
    /// poll. Each live instance is reported once.
    fn poll_finished(&mut self) -> Vec<String>;
}

/// Live grant of one command.
#[derive(Debug, Clone, Copy)]
struct Grant {
    first_rank: u32,
    ranks: u32,
}

/// Positional allocator driving an [`Executor`].
pub struct SpawnedRanksAllocator<E> {
    pool: RankPool,
    executor: E,
    grants: HashMap<String, Grant>,
    /// Granted ids already reported finished but not yet freed.
    reported: HashSet<String>,
}

impl<E: Executor> SpawnedRanksAllocator<E> {
    pub fn new(total_ranks: u32, executor: E) -> Self {
        Self {
            pool: RankPool::new(total_ranks),
            executor,
            grants: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    pub fn pool(&self) -> &RankPool {
        &self.pool
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Number of live grants.
    pub fn granted_count(&self) -> usize {
        self.grants.len()
    }
}

impl<E: Executor> RankAllocator for SpawnedRanksAllocator<E> {
    fn total_ranks(&self) -> u32 {
        self.pool.total()
    }

    fn free_ranks(&self) -> u32 {
        self.pool.free_count()
    }

    fn can_allocate(&self, ranks: u32) -> bool {
        self.pool.find_block(ranks).is_some()
    }

    fn allocate(&mut self, command: Arc<Command>) -> AllocResult<Instance> {
        if self.grants.contains_key(command.id()) {
            return Err(AllocError::AlreadyGranted(command.id().to_string()));
        }
        let ranks = command.ranks();
        let first_rank = self.pool.reserve(command.id(), ranks)?;
        self.grants
            .insert(command.id().to_string(), Grant { first_rank, ranks });
        Ok(Instance::new(command, first_rank, ranks))
    }

    fn launch(&mut self, instance: &Instance) -> Result<(), LaunchError> {
        instance.launch(&mut self.executor)
    }

    fn free(&mut self, instance: &Instance) -> AllocResult<()> {
        let grant = self
            .grants
            .get(instance.id())
            .copied()
            .ok_or_else(|| AllocError::NotGranted(instance.id().to_string()))?;
        if grant.first_rank != instance.starting_rank() || grant.ranks != instance.ranks() {
            return Err(AllocError::RankNotHeld {
                id: instance.id().to_string(),
                rank: instance.starting_rank(),
            });
        }
        self.pool
            .release(instance.id(), grant.first_rank, grant.ranks)?;
        self.grants.remove(instance.id());
        self.reported.remove(instance.id());
        Ok(())
    }

    fn poll_finished(&mut self) -> Vec<String> {
        let mut finished = Vec::new();
        for id in self.executor.poll_finished() {
            if !self.grants.contains_key(&id) {
                debug!(command = %id, "ignoring completion signal for ungranted command");
                continue;
            }
            if !self.reported.insert(id.clone()) {
                debug!(command = %id, "ignoring duplicate completion signal");
                continue;
            }
            finished.push(id);
        }
        finished
    }
}
