//! Resumable units
//!
//! A routine is anything that can be advanced one step at a time and
//! cancelled between steps. Two flavours ship with the crate:
//! - `FnRoutine`: a closure that keeps its own state, one call per step
//! - `Coroutine`: an `async` block that yields through a `Co` handle
//!
//! Neither is woken by anything. The owning task advances them once per tick
//! (or more, when a child finishes), so the async flavour is polled with a
//! no-op waker and must only ever await the futures `Co` hands out.

use super::signal::{Signal, Step};
use super::task::Task;
use crate::error::TaskError;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// A unit of logic the scheduler can drive.
pub trait Routine {
    /// Run until the next suspension point.
    fn advance(&mut self) -> Result<Step, TaskError>;

    /// Abandon the routine between steps, running its cleanup.
    ///
    /// Called at most once, and never after `advance` reported completion.
    fn cancel(&mut self) -> Result<(), TaskError> {
        Ok(())
    }
}

// ============================================================================
// Closure routines
// ============================================================================

/// A closure-driven state machine.
///
/// The closure is called once per step and returns what to do next. State
/// lives in whatever the closure captures.
pub struct FnRoutine<F> {
    step: F,
    on_cancel: Option<Box<dyn FnOnce()>>,
    finished: bool,
}

impl<F> FnRoutine<F>
where
    F: FnMut() -> Result<Step, TaskError>,
{
    pub fn new(step: F) -> Self {
        Self {
            step,
            on_cancel: None,
            finished: false,
        }
    }

    /// Run `hook` if the routine is cancelled before it finishes.
    pub fn with_cancel(mut self, hook: impl FnOnce() + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }
}

impl<F> Routine for FnRoutine<F>
where
    F: FnMut() -> Result<Step, TaskError>,
{
    fn advance(&mut self) -> Result<Step, TaskError> {
        if self.finished {
            return Err(TaskError::Exhausted);
        }
        let step = (self.step)();
        if matches!(step, Ok(Step::Done | Step::Yield(Signal::Finished)) | Err(_)) {
            self.finished = true;
            self.on_cancel = None;
        }
        step
    }

    fn cancel(&mut self) -> Result<(), TaskError> {
        self.finished = true;
        if let Some(hook) = self.on_cancel.take() {
            hook();
        }
        Ok(())
    }
}

// ============================================================================
// Async routines
// ============================================================================

type LocalFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>>>>;

/// State shared between a coroutine and its `Co` handle
#[derive(Default)]
struct Shared {
    /// What the body asked for at its last suspension point
    yielded: Option<Step>,
    /// Cleanup to run if the body is cancelled, in registration order
    cancel_hooks: Vec<Box<dyn FnOnce()>>,
}

/// Handle an async routine body uses to talk to the scheduler.
#[derive(Clone)]
pub struct Co {
    shared: Rc<RefCell<Shared>>,
}

impl Co {
    /// Suspend until the next tick.
    pub fn suspend(&self) -> Yield {
        self.yield_step(Step::Yield(Signal::Suspended))
    }

    /// Complete the routine now. The body is dropped and never polled again.
    pub fn finish(&self) -> Yield {
        self.yield_step(Step::Yield(Signal::Finished))
    }

    /// Hand an arbitrary signal to the scheduler.
    pub fn signal(&self, signal: Signal) -> Yield {
        self.yield_step(Step::Yield(signal))
    }

    /// Wait for a child task to finish.
    ///
    /// The child is driven in the same resume it is awaited in, and this
    /// body continues in the same resume the child finishes in.
    pub fn wait(&self, task: Task) -> Yield {
        self.yield_step(Step::Await(task))
    }

    /// Register cleanup that runs only if this routine is cancelled.
    ///
    /// Hooks run innermost-registered first. Cleanup that must also run on a
    /// normal exit belongs in a `Drop` guard held by the body instead.
    pub fn on_cancel(&self, hook: impl FnOnce() + 'static) {
        self.shared.borrow_mut().cancel_hooks.push(Box::new(hook));
    }

    fn yield_step(&self, step: Step) -> Yield {
        Yield {
            shared: self.shared.clone(),
            step: Some(step),
        }
    }
}

/// Future returned by the `Co` methods: pending once, ready on the next poll.
#[must_use = "yields do nothing unless awaited"]
pub struct Yield {
    shared: Rc<RefCell<Shared>>,
    step: Option<Step>,
}

impl Future for Yield {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.step.take() {
            Some(step) => {
                self.shared.borrow_mut().yielded = Some(step);
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

/// An `async` body driven as a routine.
pub struct Coroutine {
    future: Option<LocalFuture>,
    shared: Rc<RefCell<Shared>>,
}

impl Coroutine {
    /// Build a coroutine from a body that receives its `Co` handle.
    ///
    /// ```ignore
    /// let routine = Coroutine::new(|co| async move {
    ///     co.suspend().await;
    ///     co.wait(wait_seconds(0.5, &time)).await;
    ///     Ok(())
    /// });
    /// ```
    pub fn new<B, Fut>(body: B) -> Self
    where
        B: FnOnce(Co) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + 'static,
    {
        let shared = Rc::new(RefCell::new(Shared::default()));
        let co = Co {
            shared: shared.clone(),
        };
        Self {
            future: Some(Box::pin(body(co))),
            shared,
        }
    }

    /// Drop the body after it completed; cancel hooks no longer apply.
    fn retire(&mut self) {
        self.shared.borrow_mut().cancel_hooks.clear();
        self.future = None;
    }
}

impl Routine for Coroutine {
    fn advance(&mut self) -> Result<Step, TaskError> {
        let Some(future) = self.future.as_mut() else {
            return Err(TaskError::Exhausted);
        };

        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                self.retire();
                result.map(|()| Step::Done)
            }
            Poll::Pending => {
                let yielded = self.shared.borrow_mut().yielded.take();
                match yielded {
                    Some(step @ Step::Yield(Signal::Finished)) => {
                        self.retire();
                        Ok(step)
                    }
                    Some(step) => Ok(step),
                    None => {
                        self.retire();
                        Err(TaskError::ForeignPending)
                    }
                }
            }
        }
    }

    fn cancel(&mut self) -> Result<(), TaskError> {
        let hooks = std::mem::take(&mut self.shared.borrow_mut().cancel_hooks);
        for hook in hooks.into_iter().rev() {
            hook();
        }
        // Dropping the body runs the Drop of everything it holds
        self.future = None;
        Ok(())
    }
}
