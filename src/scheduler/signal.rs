//! Values a routine hands back to the scheduler

use super::task::Task;
use std::fmt;

/// Scheduling request yielded by a routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop for this tick, continue from here on the next resume.
    Suspended,
    /// Complete now, exactly as if the routine had returned.
    Finished,
}

/// Outcome of advancing a routine once.
pub enum Step {
    /// Hand a signal to the scheduler.
    Yield(Signal),
    /// Wait for a child task. The child joins this task's chain.
    Await(Task),
    /// The routine ran to its end.
    Done,
}

impl From<Signal> for Step {
    fn from(signal: Signal) -> Self {
        Step::Yield(signal)
    }
}

impl From<Task> for Step {
    fn from(task: Task) -> Self {
        Step::Await(task)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Yield(signal) => f.debug_tuple("Yield").field(signal).finish(),
            Step::Await(task) => f.debug_tuple("Await").field(&task.id()).finish(),
            Step::Done => f.write_str("Done"),
        }
    }
}

/// Yield control for exactly one tick.
pub fn suspend() -> Signal {
    Signal::Suspended
}

/// Terminate the active frame on this drive.
pub fn finish_now() -> Signal {
    Signal::Finished
}
