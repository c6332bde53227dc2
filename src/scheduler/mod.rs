//! The scheduler - tasks, routines, and the waits built on them
//!
//! Gameplay logic is written as long-lived routines that suspend between
//! ticks. The host loop resumes root tasks once per fixed tick, either by
//! hand or through a `TaskManager`.
//!
//! Synchronous mental model, cooperative implementation: nothing runs
//! between suspension points, and nothing runs on another thread.

pub mod combinators;
pub mod manager;
pub mod routine;
pub mod signal;
pub mod task;

pub use combinators::{
    IntoPredicate, Predicate, WaitSeconds, try_wait_until, wait_seconds, wait_ticks, wait_until,
};
pub use manager::{Spawner, TaskManager};
pub use routine::{Co, Coroutine, FnRoutine, Routine, Yield};
pub use signal::{Signal, Step, finish_now, suspend};
pub use task::{Task, TaskId};
