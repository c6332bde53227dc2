//! Task trampoline
//!
//! A Task owns one top-level routine and drives it forward, one resume per
//! tick. When a routine awaits another task, the child's frames move into
//! this task's arena and the child becomes the active frame. The chain is a
//! stack kept as parent indices into a slab, with `current` as the top:
//!
//! ```text
//!   root frame  <-parent-  child frame  <-parent-  grandchild (current)
//! ```
//!
//! Rules the trampoline keeps:
//! - A newly awaited child is driven in the same resume it was awaited in
//! - A finished frame hands control back to its parent in the same resume
//! - Closing walks from `current` outward, cancelling every frame
//! - Once invalid, a task is inert: resume and close do nothing

use super::routine::{Co, Coroutine, FnRoutine, Routine};
use super::signal::{Signal, Step};
use crate::config::DEFAULT_STEP_BUDGET;
use crate::error::TaskError;
use slab::Slab;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// One routine in a chain
struct Frame {
    /// Id of the task this frame was created for
    id: TaskId,
    routine: Box<dyn Routine>,
    /// Frame waiting on this one, `None` for the root
    parent: Option<usize>,
}

/// A resumable chain of routines.
pub struct Task {
    id: TaskId,
    frames: Slab<Frame>,
    /// Active frame, always a key in `frames` while the task is valid
    current: usize,
    valid: bool,
    step_budget: usize,
}

impl Task {
    /// Wrap a routine that has not started yet.
    pub fn new(routine: impl Routine + 'static) -> Self {
        let id = TaskId::next();
        let mut frames = Slab::new();
        let current = frames.insert(Frame {
            id,
            routine: Box::new(routine),
            parent: None,
        });
        Self {
            id,
            frames,
            current,
            valid: true,
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }

    /// Task driven by a closure state machine.
    pub fn from_fn<F>(step: F) -> Self
    where
        F: FnMut() -> Result<Step, TaskError> + 'static,
    {
        Self::new(FnRoutine::new(step))
    }

    /// Task driven by an async body.
    pub fn from_future<B, Fut>(body: B) -> Self
    where
        B: FnOnce(Co) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + 'static,
    {
        Self::new(Coroutine::new(body))
    }

    /// Builder form of [`set_step_budget`](Self::set_step_budget).
    pub fn with_step_budget(mut self, budget: usize) -> Self {
        self.set_step_budget(budget);
        self
    }

    /// Cap routine advances per resume. Clamped to at least one.
    ///
    /// Only the root's budget counts; children adopt it when awaited.
    pub fn set_step_budget(&mut self, budget: usize) {
        self.step_budget = budget.max(1);
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the task can still make progress.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of live frames in the chain (0 once invalid).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drive the chain until it suspends or finishes.
    ///
    /// An error from a routine tears the whole chain down before it is
    /// returned, so the task is either intact or fully invalid afterwards.
    /// The failing routine is dropped; the frames waiting on it are cancelled.
    pub fn resume(&mut self) -> Result<(), TaskError> {
        if !self.valid {
            return Ok(());
        }

        let mut steps = 0;
        loop {
            if steps == self.step_budget {
                let limit = self.step_budget;
                tracing::error!(task = %self.id, limit, "step budget exhausted without a suspend");
                self.unwind();
                return Err(TaskError::StepBudgetExceeded { limit });
            }
            steps += 1;

            let frame = &mut self.frames[self.current];
            let frame_id = frame.id;
            let step = match frame.routine.advance() {
                Ok(step) => step,
                Err(err) => {
                    if matches!(err, TaskError::ForeignPending | TaskError::Exhausted) {
                        tracing::error!(task = %self.id, frame = %frame_id, error = %err, "malformed routine");
                    } else {
                        tracing::debug!(task = %self.id, frame = %frame_id, error = %err, "routine failed");
                    }
                    self.unwind_after_failure();
                    return Err(err);
                }
            };

            match step {
                Step::Yield(Signal::Suspended) => return Ok(()),
                Step::Yield(Signal::Finished) | Step::Done => {
                    if !self.pop_current() {
                        return Ok(());
                    }
                }
                Step::Await(child) => self.adopt(child),
            }
        }
    }

    /// Cancel every frame in the chain, innermost first.
    ///
    /// Each routine's cleanup runs before this returns. A failing cleanup is
    /// logged and the unwind carries on with the next frame.
    pub fn close(&mut self) {
        if !self.valid {
            return;
        }
        tracing::debug!(task = %self.id, depth = self.depth(), "closing task");
        self.unwind();
    }

    /// Remove the finished active frame.
    ///
    /// Returns true if a parent became active and should be driven next.
    fn pop_current(&mut self) -> bool {
        let frame = self.frames.remove(self.current);
        match frame.parent {
            Some(parent) => {
                tracing::trace!(task = %self.id, frame = %frame.id, "frame finished, resuming parent");
                self.current = parent;
                true
            }
            None => {
                tracing::debug!(task = %self.id, "task finished");
                self.valid = false;
                false
            }
        }
    }

    /// Splice an awaited task's chain on top of the active frame.
    ///
    /// An already finished child leaves `current` untouched, so the awaiting
    /// frame is simply driven again.
    fn adopt(&mut self, mut child: Task) {
        if !child.valid {
            tracing::trace!(task = %self.id, child = %child.id, "awaited task already finished");
            return;
        }

        let frames = std::mem::take(&mut child.frames);
        let child_current = child.current;
        child.valid = false;

        let awaiting = self.current;
        let moved: Vec<(usize, usize)> = frames
            .into_iter()
            .map(|(old, frame)| (old, self.frames.insert(frame)))
            .collect();
        let remap = |old: usize| {
            moved
                .iter()
                .find(|&&(from, _)| from == old)
                .map(|&(_, to)| to)
        };

        for &(_, new) in &moved {
            let frame = &mut self.frames[new];
            frame.parent = match frame.parent {
                Some(old_parent) => remap(old_parent),
                None => Some(awaiting),
            };
        }
        // The child was valid, so its active frame was one of the moved ones
        self.current = remap(child_current).unwrap_or(awaiting);

        tracing::trace!(
            task = %self.id,
            child = %child.id,
            depth = self.frames.len(),
            "awaiting child task"
        );
    }

    /// Tear down the chain above a frame whose `advance` just failed.
    ///
    /// The failed routine already completed, so it is dropped without being
    /// cancelled. Everything waiting on it is cancelled as usual.
    fn unwind_after_failure(&mut self) {
        let parent = self.frames.remove(self.current).parent;
        match parent {
            Some(parent) => {
                self.current = parent;
                self.unwind();
            }
            None => {
                self.frames.clear();
                self.valid = false;
            }
        }
    }

    fn unwind(&mut self) {
        let mut cursor = Some(self.current);
        while let Some(index) = cursor {
            let Some(mut frame) = self.frames.try_remove(index) else {
                break;
            };
            cursor = frame.parent;
            if let Err(err) = frame.routine.cancel() {
                tracing::warn!(task = %self.id, frame = %frame.id, error = %err, "cleanup failed during cancel");
            }
        }
        self.frames.clear();
        self.valid = false;
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("valid", &self.valid)
            .field("depth", &self.depth())
            .finish()
    }
}
