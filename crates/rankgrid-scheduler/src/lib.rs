//! rankgrid-scheduler: admission policy and the run loop.
//!
//! Turns a `CommandCatalog` (from `rank-core`) into a run over a rank
//! allocator (from `rank-runtime`). The scheduler:
//!
//! - Skips commands the checkpoint (from `rankgrid-state`) marks done
//! - Rejects commands that can never fit in the pool
//! - Admits commands widest-first, costliest-first among equals
//! - Retries failed launches without giving up the queue head
//! - Absorbs duplicate completion signals
//!
//! # Architecture
//!
//! ```text
//! CommandsRunner
//!   ├── PendingQueue (static admission order + cursor)
//!   ├── RankAllocator (grant, launch, free, poll_finished)
//!   ├── CheckpointStore (resume filter, completion log)
//!   └── historic: Vec<Instance> (admission order)
//! ```

pub mod error;
pub mod queue;
pub mod runner;

pub use error::{SchedulerError, SchedulerResult};
pub use queue::PendingQueue;
pub use runner::{CommandsRunner, RunReport, RunnerOptions};
