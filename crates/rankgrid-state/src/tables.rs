//! redb table definitions for the checkpoint store.

use redb::TableDefinition;

/// Completed commands keyed by command id.
pub const COMPLETED: TableDefinition<&str, &[u8]> = TableDefinition::new("completed");
