//! Executor: the seam between the scheduler and whatever runs commands.

use crate::error::LaunchError;
use crate::instance::Instance;

/// Starts commands and reports when they have finished.
///
/// Implementations must never block: `launch` returns as soon as the
/// command has been handed off, and `poll_finished` only reports what is
/// already known. Reporting the same id more than once is allowed; the
/// allocator filters duplicates.
pub trait Executor {
    /// Start `instance`'s command on its granted ranks.
    fn launch(&mut self, instance: &Instance) -> Result<(), LaunchError>;

    /// Ids of commands that finished since the last poll.
    fn poll_finished(&mut self) -> Vec<String>;
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn launch(&mut self, instance: &Instance) -> Result<(), LaunchError> {
        (**self).launch(instance)
    }

    fn poll_finished(&mut self) -> Vec<String> {
        (**self).poll_finished()
    }
}
