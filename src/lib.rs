//! tickflow - cooperative task scheduling for tick-driven game scripts
//!
//! Design principles:
//! - Tractable: a small trampoline you can read in one sitting
//! - Deterministic: progress happens only inside `resume()`, once per tick
//! - Total cancellation: closing a task unwinds everything it waits on
//! - Explicit time: clocks and time dilation are passed in, never global
//!
//! ```ignore
//! use tickflow::prelude::*;
//!
//! let time = TimeContext::wall();
//! let mut task = Task::from_future(move |co| async move {
//!     co.wait(wait_seconds(0.25, &time)).await;
//!     Ok(())
//! });
//! // once per fixed tick:
//! task.resume()?;
//! ```

pub mod config;
pub mod error;
pub mod scheduler;
pub mod time;

pub use config::SchedulerConfig;
pub use error::{ConfigError, TaskError};
pub use scheduler::{Task, TaskId, TaskManager};

/// Everything a gameplay script usually needs
pub mod prelude {
    pub use crate::error::TaskError;
    pub use crate::scheduler::{
        Co, Routine, Signal, Spawner, Step, Task, TaskId, TaskManager, WaitSeconds, finish_now,
        suspend, try_wait_until, wait_seconds, wait_ticks, wait_until,
    };
    pub use crate::time::{Clock, ManualClock, TimeContext, TimeScale, Timer};
}
