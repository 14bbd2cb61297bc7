//! Scheduling contract shared by operators and the virtual clock.
//!
//! Operators never read wall-clock time. They ask a [`Scheduler`] for `now()`
//! and hand it work to run after a delay. The [`TestScheduler`] answers from
//! a virtual clock, so every delay-based operator runs instantly and
//! deterministically under test while seeing the exact same contract.

use std::{cell::Cell, rc::Rc};

pub use std::time::Duration;

mod action_queue;
pub mod ambient;
pub mod test_scheduler;

pub use action_queue::{ActionQueue, ScheduledAction};
pub use ambient::{AmbientGuard, AmbientScheduler};
pub use test_scheduler::TestScheduler;

use crate::subscription::Subscription;

/// What a task wants after it ran once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  /// The task is done and leaves the queue.
  Finished,
  /// Run again at the current instant, after the work already queued there.
  Yield,
  /// Run again once the duration has elapsed.
  Sleeping(Duration),
}

/// Unit of schedulable work.
pub type Task = Box<dyn FnMut() -> TaskState>;

/// A Scheduler orders tasks by time and runs them when they are due.
pub trait Scheduler {
  /// Current time as seen by this scheduler.
  fn now(&self) -> Duration;

  /// Queue `task` to run once `delay` (or nothing) has elapsed.
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle;
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
  #[inline]
  fn now(&self) -> Duration { (**self).now() }

  #[inline]
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    (**self).schedule(task, delay)
  }
}

pub trait SchedulerExt: Scheduler {
  /// Schedule a closure that runs exactly once.
  fn schedule_once(&self, f: impl FnOnce() + 'static, delay: Option<Duration>) -> TaskHandle {
    let mut f = Some(f);
    self.schedule(
      Box::new(move || {
        if let Some(f) = f.take() {
          f();
        }
        TaskState::Finished
      }),
      delay,
    )
  }

  /// Schedule a closure that decides after every run whether it repeats.
  fn schedule_fn(
    &self, f: impl FnMut() -> TaskState + 'static, delay: Option<Duration>,
  ) -> TaskHandle {
    self.schedule(Box::new(f), delay)
  }
}

impl<S: Scheduler + ?Sized> SchedulerExt for S {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
  Pending,
  Finished,
  Cancelled,
}

/// Cancellation handle of a scheduled task.
///
/// Cancelling is synchronous: once `cancel` returns, the task never runs
/// again, even if it is already the head of the queue. Cancelling a task
/// that already finished is a no-op.
#[derive(Debug, Clone)]
pub struct TaskHandle(Rc<Cell<HandleState>>);

impl TaskHandle {
  pub fn new() -> Self { TaskHandle(Rc::new(Cell::new(HandleState::Pending))) }

  pub fn cancel(&self) {
    if self.0.get() == HandleState::Pending {
      self.0.set(HandleState::Cancelled);
    }
  }

  /// Finished or cancelled.
  #[inline]
  pub fn is_closed(&self) -> bool { self.0.get() != HandleState::Pending }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.0.get() == HandleState::Cancelled }

  #[inline]
  pub fn is_finished(&self) -> bool { self.0.get() == HandleState::Finished }

  pub(crate) fn mark_finished(&self) {
    if self.0.get() == HandleState::Pending {
      self.0.set(HandleState::Finished);
    }
  }
}

impl Default for TaskHandle {
  fn default() -> Self { Self::new() }
}

impl Subscription for TaskHandle {
  #[inline]
  fn unsubscribe(self) { self.cancel() }

  #[inline]
  fn is_closed(&self) -> bool { TaskHandle::is_closed(self) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxmarble_macro::test]
  fn cancel_after_finish_is_noop() {
    let handle = TaskHandle::new();
    handle.mark_finished();
    handle.cancel();
    assert!(handle.is_finished());
    assert!(!handle.is_cancelled());
    assert!(handle.is_closed());
  }

  #[rxmarble_macro::test]
  fn clones_share_state() {
    let handle = TaskHandle::new();
    let other = handle.clone();
    other.unsubscribe();
    assert!(handle.is_cancelled());
    handle.mark_finished();
    assert!(handle.is_cancelled());
  }
}
