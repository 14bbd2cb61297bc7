//! Scoped override slot for call sites that cannot take an explicit
//! scheduler.
//!
//! The slot is thread-local. [`install`] pushes a binding and returns a guard
//! that pops it again when dropped, also while unwinding, so a panicking test
//! never leaks its clock into the next one.

use std::{cell::RefCell, rc::Rc};

use tracing::trace;

use super::{Duration, Scheduler, Task, TaskHandle};

thread_local! {
  static AMBIENT: RefCell<Option<Rc<dyn Scheduler>>> = const { RefCell::new(None) };
}

/// The scheduler currently installed on this thread.
pub fn current() -> Option<Rc<dyn Scheduler>> { AMBIENT.with(|slot| slot.borrow().clone()) }

pub fn is_installed() -> bool { AMBIENT.with(|slot| slot.borrow().is_some()) }

/// Bind `scheduler` until the returned guard is dropped.
pub fn install(scheduler: Rc<dyn Scheduler>) -> AmbientGuard {
  let previous = AMBIENT.with(|slot| slot.borrow_mut().replace(scheduler));
  trace!(had_previous = previous.is_some(), "install ambient scheduler");
  AmbientGuard { previous }
}

/// Restores the previous ambient binding on drop.
#[must_use = "the binding is removed as soon as the guard is dropped"]
pub struct AmbientGuard {
  previous: Option<Rc<dyn Scheduler>>,
}

impl Drop for AmbientGuard {
  fn drop(&mut self) {
    let previous = self.previous.take();
    trace!(restores_previous = previous.is_some(), "restore ambient scheduler");
    // `try_with`: the slot may already be destroyed during thread teardown
    let _ = AMBIENT.try_with(|slot| *slot.borrow_mut() = previous);
  }
}

/// Zero-sized scheduler delegating to the installed ambient binding.
///
/// # Panics
///
/// Every method panics if nothing is installed on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientScheduler;

impl AmbientScheduler {
  fn binding() -> Rc<dyn Scheduler> {
    match current() {
      Some(scheduler) => scheduler,
      None => panic!(
        "no ambient scheduler installed on this thread; run inside `MarbleRunner::run` or \
         call `scheduler::ambient::install` first"
      ),
    }
  }
}

impl Scheduler for AmbientScheduler {
  fn now(&self) -> Duration { Self::binding().now() }

  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    Self::binding().schedule(task, delay)
  }
}
