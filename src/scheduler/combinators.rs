//! Common waits, built only from tasks and signals
//!
//! Every combinator returns a `Task`, so a routine awaits it like any other
//! child: `co.wait(wait_seconds(0.5, &time)).await`.

use super::routine::{FnRoutine, Routine};
use super::signal::{Signal, Step, suspend};
use super::task::Task;
use crate::error::TaskError;
use crate::time::TimeContext;

/// Condition polled by [`wait_until`].
pub enum Predicate {
    /// Re-evaluated every tick until it returns true.
    Check(Box<dyn FnMut() -> Result<bool, TaskError>>),
    /// Resumed once per tick; the wait ends when the sequence finishes.
    Sequence(Task),
}

/// Anything [`wait_until`] can wait on.
pub trait IntoPredicate {
    fn into_predicate(self) -> Predicate;
}

impl IntoPredicate for Predicate {
    fn into_predicate(self) -> Predicate {
        self
    }
}

impl IntoPredicate for Task {
    fn into_predicate(self) -> Predicate {
        Predicate::Sequence(self)
    }
}

impl<F> IntoPredicate for F
where
    F: FnMut() -> bool + 'static,
{
    fn into_predicate(mut self) -> Predicate {
        Predicate::Check(Box::new(move || Ok(self())))
    }
}

struct WaitUntil {
    predicate: Predicate,
}

impl Routine for WaitUntil {
    fn advance(&mut self) -> Result<Step, TaskError> {
        let satisfied = match &mut self.predicate {
            Predicate::Check(check) => check()?,
            Predicate::Sequence(task) => {
                task.resume()?;
                !task.is_valid()
            }
        };
        Ok(if satisfied {
            Step::Done
        } else {
            suspend().into()
        })
    }

    fn cancel(&mut self) -> Result<(), TaskError> {
        if let Predicate::Sequence(task) = &mut self.predicate {
            task.close();
        }
        Ok(())
    }
}

/// Suspend every tick until `predicate` holds.
///
/// A predicate that already holds on the first drive finishes the wait
/// without suspending.
pub fn wait_until(predicate: impl IntoPredicate) -> Task {
    Task::new(WaitUntil {
        predicate: predicate.into_predicate(),
    })
}

/// [`wait_until`] with a check that can fail. Errors leave through `resume`.
pub fn try_wait_until<F>(check: F) -> Task
where
    F: FnMut() -> Result<bool, TaskError> + 'static,
{
    wait_until(Predicate::Check(Box::new(check)))
}

/// Suspend for exactly `ticks` resumes.
pub fn wait_ticks(ticks: usize) -> Task {
    let mut remaining = ticks;
    Task::new(FnRoutine::new(move || {
        if remaining == 0 {
            return Ok(Step::Done);
        }
        remaining -= 1;
        Ok(suspend().into())
    }))
}

/// A timed wait, measured in (optionally dilated) seconds.
///
/// The clock is sampled when the wait is built. Each drive adds the time
/// since the previous sample, scaled by the current time dilation, so a
/// scale of zero freezes the wait without losing what already elapsed.
///
/// Because sampling starts at construction, a wait built early and awaited
/// later also counts the gap in between, and that gap is scaled by whatever
/// dilation is in force at the first drive. Time that passed during a
/// freeze is then counted once the scale is back up. Build the wait where
/// it is awaited unless the head start is wanted.
#[derive(Debug)]
pub struct WaitSeconds {
    seconds: f64,
    time: TimeContext,
    last: f64,
    elapsed: f64,
    ignore_time_scale: bool,
}

impl WaitSeconds {
    /// Start measuring now. A NaN duration counts as zero.
    pub fn new(seconds: f64, time: &TimeContext) -> Self {
        Self {
            seconds: if seconds.is_nan() { 0.0 } else { seconds },
            last: time.now(),
            time: time.clone(),
            elapsed: 0.0,
            ignore_time_scale: false,
        }
    }

    /// Count real seconds regardless of time dilation.
    pub fn ignore_time_scale(mut self) -> Self {
        self.ignore_time_scale = true;
        self
    }

    /// Seconds accumulated so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn into_task(self) -> Task {
        Task::new(self)
    }
}

impl Routine for WaitSeconds {
    fn advance(&mut self) -> Result<Step, TaskError> {
        let now = self.time.now();
        // A clock that jumps backwards never un-elapses time
        let mut delta = (now - self.last).max(0.0);
        self.last = now;
        if !self.ignore_time_scale {
            delta *= self.time.scale().get();
        }
        self.elapsed += delta;

        if self.elapsed >= self.seconds {
            Ok(Step::Done)
        } else {
            Ok(Step::Yield(Signal::Suspended))
        }
    }
}

/// Wait `seconds` of dilated time.
///
/// `seconds <= 0.0` (or NaN) finishes on the first drive without
/// suspending. The clock is sampled here, not when the task is first
/// awaited; see [`WaitSeconds`] for what that means for waits built ahead
/// of time.
pub fn wait_seconds(seconds: f64, time: &TimeContext) -> Task {
    WaitSeconds::new(seconds, time).into_task()
}
