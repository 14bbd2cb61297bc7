//! Virtual clock for deterministic testing of time-based operators.
//!
//! Virtual time only advances when explicitly instructed. Tasks execute
//! synchronously, in `(due, sequence)` order, while the clock is advanced:
//!
//! ```rust
//! use std::{cell::Cell, rc::Rc};
//!
//! use rxmarble::prelude::*;
//!
//! let clock = TestScheduler::new();
//! let fired = Rc::new(Cell::new(false));
//! let c_fired = fired.clone();
//! clock.schedule_once(move || c_fired.set(true), Some(Duration::from_millis(100)));
//!
//! clock.advance_by(Duration::from_millis(99)).unwrap();
//! assert!(!fired.get());
//! clock.advance_by(Duration::from_millis(1)).unwrap();
//! assert!(fired.get());
//! ```
//!
//! Every `TestScheduler` owns its own queue. Clones share it.

use tracing::{debug, trace};

use super::{ActionQueue, Duration, Scheduler, SchedulerExt, Task, TaskHandle, TaskState};
use crate::{
  error::MarbleError,
  rc::{MutRc, RcDeref, RcDerefMut, WeakRc},
};

#[derive(Default)]
struct ClockState {
  now: Duration,
  queue: ActionQueue,
  max_frame: Option<Duration>,
}

/// A virtual time scheduler.
#[derive(Clone, Default)]
pub struct TestScheduler(MutRc<ClockState>);

/// Non-owning handle of a [`TestScheduler`], for work queued on the clock
/// that needs to read it back.
#[derive(Clone)]
pub struct WeakTestScheduler(WeakRc<ClockState>);

impl WeakTestScheduler {
  /// Current virtual time, or `None` once the clock is gone.
  pub fn now(&self) -> Option<Duration> {
    self.0.upgrade().map(|state| state.rc_deref().now)
  }

  pub fn upgrade(&self) -> Option<TestScheduler> { self.0.upgrade().map(TestScheduler) }
}

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  /// A clock that refuses to execute work due after `max_frame`.
  pub fn with_max_frame(max_frame: Option<Duration>) -> Self {
    let clock = Self::new();
    clock.set_max_frame(max_frame);
    clock
  }

  #[inline]
  pub fn max_frame(&self) -> Option<Duration> { self.0.rc_deref().max_frame }

  pub fn set_max_frame(&self, max_frame: Option<Duration>) {
    self.0.rc_deref_mut().max_frame = max_frame;
  }

  /// Number of tasks waiting in the queue.
  pub fn pending_count(&self) -> usize { self.0.rc_deref().queue.len() }

  pub fn is_empty(&self) -> bool { self.0.rc_deref().queue.is_empty() }

  /// Cancel a task. A task that already finished is left alone.
  pub fn cancel(&self, handle: &TaskHandle) { self.0.rc_deref().queue.cancel(handle) }

  /// Schedule `f` to run once at absolute virtual time `at`. A time already
  /// passed runs at the current instant.
  pub fn schedule_once_at(&self, f: impl FnOnce() + 'static, at: Duration) -> TaskHandle {
    let delay = at.saturating_sub(self.now());
    self.schedule_once(f, Some(delay))
  }

  pub fn downgrade(&self) -> WeakTestScheduler { WeakTestScheduler(self.0.downgrade()) }

  /// Drop every pending task without running it.
  pub fn clear(&self) {
    let dropped = self.0.rc_deref_mut().queue.clear();
    // Dropped outside the borrow, captures may touch the clock.
    drop(dropped);
  }

  /// Advance virtual time by `duration`, executing every task due meanwhile.
  /// The clock stops at `Duration::MAX`.
  pub fn advance_by(&self, duration: Duration) -> Result<(), MarbleError> {
    let target = self.now().saturating_add(duration);
    self.advance_to(target)
  }

  /// Execute every task due at or before `target`, then leave the clock at
  /// `target` (or where it already was, if that is later).
  ///
  /// Work queued by a running task at or before `target` runs within the
  /// same call, so one call settles everything expressible up to `target`.
  pub fn advance_to(&self, target: Duration) -> Result<(), MarbleError> {
    debug!(target = ?target, pending = self.pending_count(), "advance virtual clock");
    self.execute_until(Some(target))?;
    let mut state = self.0.rc_deref_mut();
    state.now = state.now.max(target);
    Ok(())
  }

  /// Execute every pending task, including the ones they schedule, until the
  /// queue is empty.
  ///
  /// Tasks that keep rescheduling themselves run until they finish or are
  /// cancelled; a ceiling set with [`TestScheduler::set_max_frame`] bounds
  /// that.
  pub fn flush(&self) -> Result<(), MarbleError> {
    debug!(now = ?self.now(), pending = self.pending_count(), "flush virtual clock");
    self.execute_until(None)
  }

  fn execute_until(&self, target: Option<Duration>) -> Result<(), MarbleError> {
    loop {
      let action = {
        let mut state = self.0.rc_deref_mut();
        let Some(due) = state.queue.peek_due() else { break };
        if target.is_some_and(|target| due > target) {
          break;
        }
        if let Some(ceiling) = state.max_frame {
          if due > ceiling {
            return Err(MarbleError::FrameCeilingExceeded { due, ceiling });
          }
        }
        let Some(action) = state.queue.pop_due(target) else { break };
        state.now = state.now.max(action.due());
        action
      };

      trace!(due = ?action.due(), sequence = action.sequence(), "execute action");
      let mut action = action;
      let result = action.run();

      let mut state = self.0.rc_deref_mut();
      if action.handle().is_cancelled() {
        continue;
      }
      match result {
        TaskState::Finished => action.handle().mark_finished(),
        TaskState::Yield => {
          let due = state.now;
          state.queue.requeue(due, action);
        }
        TaskState::Sleeping(delay) => {
          let due = state.now.saturating_add(delay);
          state.queue.requeue(due, action);
        }
      }
    }
    Ok(())
  }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Duration { self.0.rc_deref().now }

  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let mut state = self.0.rc_deref_mut();
    // Saturates at `Duration::MAX`.
    let due = state.now.saturating_add(delay.unwrap_or_default());
    state.queue.enqueue(due, task)
  }
}

impl std::fmt::Debug for TestScheduler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.0.rc_deref();
    f.debug_struct("TestScheduler")
      .field("now", &state.now)
      .field("pending", &state.queue.len())
      .field("max_frame", &state.max_frame)
      .finish()
  }
}
