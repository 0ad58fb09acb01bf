//! rankgrid-state: checkpoint store for rankgrid runs.
//!
//! Backed by [redb](https://docs.rs/redb). Records which commands finished
//! in earlier runs so that a restarted run only schedules the rest.
//!
//! # Architecture
//!
//! Checkpoint records are JSON-serialized into redb's `&[u8]` value column,
//! keyed by command id. Marking is an idempotent upsert; nothing in the
//! scheduler ever un-marks a command.
//!
//! The `CheckpointStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::CheckpointStore;
pub use types::CheckpointRecord;
