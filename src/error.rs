//! Error types for the scheduler
//!
//! Only two things ever reach a caller: failures raised by a routine's own
//! logic, and contract violations by a routine. Operations on dead tasks are
//! silent no-ops and cancellation failures are logged, never returned.

use std::error::Error as StdError;

/// Errors surfaced by [`Task::resume`](crate::scheduler::Task::resume) and
/// [`TaskManager::update`](crate::scheduler::TaskManager::update).
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// A coroutine went pending without yielding a signal or a task.
    ///
    /// This happens when an async routine awaits a future that is not driven
    /// by the scheduler (a channel, a timer from another runtime...). The
    /// scheduler has no waker to honour, so the routine is malformed.
    #[error("routine suspended without yielding a signal or a task")]
    ForeignPending,

    /// A routine was advanced after it had already completed.
    #[error("routine advanced after completion")]
    Exhausted,

    /// A single resume advanced routines more times than allowed.
    #[error("resume exceeded {limit} routine steps without suspending")]
    StepBudgetExceeded {
        /// The configured budget.
        limit: usize,
    },

    /// A cancellation hook failed. Logged during close, never returned by it.
    #[error("cancellation failed: {0}")]
    Cancel(String),

    /// The routine's own logic failed.
    #[error("routine failed: {0}")]
    Routine(#[source] Box<dyn StdError + 'static>),
}

impl TaskError {
    /// Wrap an arbitrary error raised by gameplay logic.
    pub fn routine<E>(err: E) -> Self
    where
        E: StdError + 'static,
    {
        Self::Routine(Box::new(err))
    }

    /// Wrap a plain message raised by gameplay logic.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Routine(message.into())
    }
}

/// Errors loading a [`SchedulerConfig`](crate::config::SchedulerConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document was not valid JSON for the config shape.
    #[error("invalid scheduler config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field held a value the scheduler cannot run with.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            TaskError::ForeignPending.to_string(),
            "routine suspended without yielding a signal or a task"
        );
        assert_eq!(
            TaskError::StepBudgetExceeded { limit: 8 }.to_string(),
            "resume exceeded 8 routine steps without suspending"
        );
        assert_eq!(TaskError::msg("boom").to_string(), "routine failed: boom");
    }

    #[test]
    fn test_routine_error_keeps_source() {
        let io = std::io::Error::other("disk gone");
        let err = TaskError::routine(io);
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk gone"));
    }
}
