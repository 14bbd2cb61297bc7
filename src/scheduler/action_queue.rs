use std::{cmp::Ordering, collections::BinaryHeap, fmt};

use super::{Duration, Task, TaskHandle, TaskState};

/// One queued unit of work.
pub struct ScheduledAction {
  due: Duration,
  sequence: u64,
  task: Task,
  handle: TaskHandle,
}

impl ScheduledAction {
  #[inline]
  pub fn due(&self) -> Duration { self.due }

  #[inline]
  pub fn sequence(&self) -> u64 { self.sequence }

  #[inline]
  pub fn handle(&self) -> &TaskHandle { &self.handle }

  /// Run the work once.
  #[inline]
  pub fn run(&mut self) -> TaskState { (self.task)() }
}

impl fmt::Debug for ScheduledAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScheduledAction")
      .field("due", &self.due)
      .field("sequence", &self.sequence)
      .field("cancelled", &self.handle.is_cancelled())
      .finish()
  }
}

impl PartialEq for ScheduledAction {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.sequence == other.sequence }
}

impl Eq for ScheduledAction {}

impl PartialOrd for ScheduledAction {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledAction {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by sequence
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.sequence.cmp(&self.sequence))
  }
}

/// Priority queue of actions keyed by `(due, sequence)`.
///
/// Sequence numbers are handed out monotonically, so actions due at the same
/// instant pop in insertion order, including actions inserted while another
/// action of that instant is running. Cancelled actions are dropped lazily
/// when they reach the head.
#[derive(Default)]
pub struct ActionQueue {
  heap: BinaryHeap<ScheduledAction>,
  next_sequence: u64,
}

impl ActionQueue {
  pub fn new() -> Self { Self::default() }

  /// Insert `task` due at `due` and return its cancellation handle.
  pub fn enqueue(&mut self, due: Duration, task: Task) -> TaskHandle {
    let handle = TaskHandle::new();
    let sequence = self.take_sequence();
    self.heap.push(ScheduledAction { due, sequence, task, handle: handle.clone() });
    handle
  }

  /// Put an action that asked to run again back in, behind everything
  /// already queued for `due`.
  pub fn requeue(&mut self, due: Duration, action: ScheduledAction) {
    let sequence = self.take_sequence();
    self.heap.push(ScheduledAction { due, sequence, ..action });
  }

  #[inline]
  pub fn cancel(&self, handle: &TaskHandle) { handle.cancel() }

  /// Due time of the earliest live action.
  pub fn peek_due(&mut self) -> Option<Duration> {
    self.discard_cancelled();
    self.heap.peek().map(ScheduledAction::due)
  }

  /// Remove the earliest live action if it is due at or before `target`
  /// (`None` means no limit).
  pub fn pop_due(&mut self, target: Option<Duration>) -> Option<ScheduledAction> {
    let due = self.peek_due()?;
    if target.is_some_and(|target| due > target) {
      return None;
    }
    self.heap.pop()
  }

  /// Number of live (not cancelled) actions.
  pub fn len(&self) -> usize {
    self
      .heap
      .iter()
      .filter(|action| !action.handle.is_cancelled())
      .count()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Remove every action and hand them back, so the caller decides where
  /// they are dropped.
  pub fn clear(&mut self) -> Vec<ScheduledAction> { std::mem::take(&mut self.heap).into_vec() }

  fn take_sequence(&mut self) -> u64 {
    let sequence = self.next_sequence;
    self.next_sequence += 1;
    sequence
  }

  fn discard_cancelled(&mut self) {
    while self
      .heap
      .peek()
      .is_some_and(|head| head.handle.is_cancelled())
    {
      self.heap.pop();
    }
  }
}

impl fmt::Debug for ActionQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActionQueue")
      .field("len", &self.len())
      .field("next_sequence", &self.next_sequence)
      .finish()
  }
}
