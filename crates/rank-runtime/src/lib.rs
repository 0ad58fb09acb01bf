//! rank-runtime: instances, rank allocation, and command execution.
//!
//! The runtime owns everything between "this command may run now" and
//! "this command has finished":
//!
//! - **Instances**: a command bound to a contiguous rank range, with its
//!   wall-clock start and end
//! - **Rank pool**: positional first-fit bookkeeping of the fixed rank set
//! - **Allocator**: grants and reclaims ranges, relays completions
//! - **Executors**: pluggable launch + completion transport
//!
//! # Architecture
//!
//! ```text
//! SpawnedRanksAllocator<E: Executor>
//!   ├── RankPool (rank index → holder)
//!   ├── live grants (command id → range)
//!   └── E
//!       └── ProcessExecutor
//!           ├── tokio child processes (mpi launcher or direct)
//!           └── CompletionMode (process exit | SentinelWatcher)
//! ```

pub mod allocator;
pub mod error;
pub mod executor;
pub mod instance;
pub mod pool;
pub mod process;
pub mod sentinel;

pub use allocator::{RankAllocator, SpawnedRanksAllocator};
pub use error::{AllocError, AllocResult, LaunchError};
pub use executor::Executor;
pub use instance::Instance;
pub use pool::RankPool;
pub use process::{CompletionMode, ProcessConfig, ProcessExecutor};
pub use sentinel::SentinelWatcher;
