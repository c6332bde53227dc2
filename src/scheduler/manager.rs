//! Task manager - resumes a set of independent root tasks once per tick
//!
//! Tasks are resumed in insertion order. Tasks spawned while an update is
//! running wait in a pending queue and join the end of the list once the
//! pass is over, so they are neither skipped nor resumed twice: their first
//! resume happens on the next update.

use super::task::{Task, TaskId};
use crate::config::SchedulerConfig;
use crate::error::TaskError;
use std::cell::RefCell;
use std::rc::Rc;

/// Queue shared between a manager and its spawners
type PendingQueue = Rc<RefCell<Vec<Task>>>;

/// Owns root tasks and drives them together.
#[derive(Debug, Default)]
pub struct TaskManager {
    /// Live tasks, in resume order
    tasks: Vec<Task>,

    /// Tasks handed to a `Spawner`, not yet part of `tasks`
    pending: PendingQueue,

    /// Budget applied to every task that joins, if configured
    step_budget: Option<usize>,
}

/// Cloneable handle for adding tasks from inside running tasks.
#[derive(Debug, Clone)]
pub struct Spawner {
    pending: PendingQueue,
    step_budget: Option<usize>,
}

impl Spawner {
    /// Queue a task. It is first resumed by the next `update()` that starts
    /// after this call.
    pub fn spawn(&self, mut task: Task) -> TaskId {
        if let Some(budget) = self.step_budget {
            task.set_step_budget(budget);
        }
        let id = task.id();
        self.pending.borrow_mut().push(task);
        id
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager that applies `config.step_budget` to every task it receives.
    pub fn with_config(config: &SchedulerConfig) -> Self {
        Self {
            step_budget: Some(config.step_budget),
            ..Self::default()
        }
    }

    /// Append a task. No de-duplication.
    pub fn add(&mut self, mut task: Task) -> TaskId {
        if let Some(budget) = self.step_budget {
            task.set_step_budget(budget);
        }
        let id = task.id();
        self.tasks.push(task);
        id
    }

    pub fn spawner(&self) -> Spawner {
        Spawner {
            pending: self.pending.clone(),
            step_budget: self.step_budget,
        }
    }

    /// Resume every task once, then evict the ones that finished.
    ///
    /// Every task is resumed even if an earlier one fails. Failed tasks are
    /// already torn down and get evicted with the finished ones; the first
    /// failure is returned once the pass is complete. On success, returns how
    /// many tasks were resumed.
    pub fn update(&mut self) -> Result<usize, TaskError> {
        // Spawned since the last update: resumed in this pass
        self.integrate_pending();

        let mut first_error = None;
        for task in &mut self.tasks {
            if let Err(err) = task.resume() {
                tracing::error!(task = %task.id(), error = %err, "task failed during update");
                first_error.get_or_insert(err);
            }
        }
        let resumed = self.tasks.len();

        self.tasks.retain(Task::is_valid);
        let evicted = resumed - self.tasks.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.tasks.len(), "evicted finished tasks");
        }

        // Spawned during this pass: first resumed next update
        self.integrate_pending();

        match first_error {
            Some(err) => Err(err),
            None => Ok(resumed),
        }
    }

    /// Close every task, running their cleanup, and forget them.
    pub fn close_all(&mut self) {
        let mut closed = 0;
        loop {
            let mut batch = std::mem::take(&mut self.tasks);
            batch.append(&mut self.pending.borrow_mut());
            if batch.is_empty() {
                break;
            }
            // Cleanup may spawn more tasks; they are closed on the next round
            for task in &mut batch {
                if task.is_valid() {
                    task.close();
                    closed += 1;
                }
            }
        }
        tracing::debug!(closed, "closed all tasks");
    }

    /// Take a task out of the manager without closing it.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        if let Some(pos) = self.tasks.iter().position(|t| t.id() == id) {
            return Some(self.tasks.remove(pos));
        }
        let mut pending = self.pending.borrow_mut();
        let pos = pending.iter().position(|t| t.id() == id)?;
        Some(pending.remove(pos))
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id() == id)
            || self.pending.borrow().iter().any(|t| t.id() == id)
    }

    /// Ids of held tasks in resume order, pending ones last.
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .chain(self.pending.borrow().iter())
            .map(Task::id)
            .collect()
    }

    /// Number of held tasks, including ones spawned but not yet resumed.
    pub fn len(&self) -> usize {
        self.tasks.len() + self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn integrate_pending(&mut self) {
        let mut pending = self.pending.borrow_mut();
        self.tasks.append(&mut pending);
    }
}
