//! Pending queue: commands awaiting admission, in admission order.
//!
//! The order is fixed once at construction: most ranks first, then the
//! highest estimated cost among equals. Placing the widest and longest
//! commands first keeps fragmentation and the end-of-run tail low.

use std::cmp::Ordering;
use std::sync::Arc;

use rank_core::Command;

#[derive(Debug, Default)]
pub struct PendingQueue {
    commands: Vec<Arc<Command>>,
    /// Index of the next command to admit.
    cursor: usize,
}

impl PendingQueue {
    pub fn new(mut commands: Vec<Arc<Command>>) -> Self {
        commands.sort_by(|a, b| admission_order(a, b));
        Self {
            commands,
            cursor: 0,
        }
    }

    /// Next command to admit.
    pub fn head(&self) -> Option<&Arc<Command>> {
        self.commands.get(self.cursor)
    }

    /// Move past the head after it was admitted.
    pub fn advance(&mut self) {
        if self.cursor < self.commands.len() {
            self.cursor += 1;
        }
    }

    /// Commands not yet admitted.
    pub fn remaining(&self) -> &[Arc<Command>] {
        &self.commands[self.cursor..]
    }

    pub fn len(&self) -> usize {
        self.commands.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor >= self.commands.len()
    }
}

/// Descending ranks, then descending estimated cost.
pub fn admission_order(a: &Command, b: &Command) -> Ordering {
    b.ranks()
        .cmp(&a.ranks())
        .then_with(|| b.estimated_cost().cmp(&a.estimated_cost()))
}
