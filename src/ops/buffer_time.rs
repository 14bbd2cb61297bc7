//! BufferTime operator
//!
//! Collects source values into a buffer. The buffer is emitted every time the
//! window elapses, or as soon as it holds `max_size` values. Windows that
//! collected nothing emit nothing.

use crate::{
  observable::{CoreObservable, ObservableType},
  observer::Observer,
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler::{Duration, Scheduler, SchedulerExt, TaskHandle, TaskState},
  subscription::SourceWithHandle,
};

#[derive(Clone)]
pub struct BufferTimeOp<S, SD> {
  pub(crate) source: S,
  pub(crate) span: Duration,
  pub(crate) max_size: Option<usize>,
  pub(crate) scheduler: SD,
}

impl<S: ObservableType, SD> ObservableType for BufferTimeOp<S, SD> {
  type Item = Vec<S::Item>;
  type Err = S::Err;
}

pub struct BufferTimeState<O, Item> {
  observer: Option<O>,
  buffer: Vec<Item>,
  max_size: Option<usize>,
}

impl<O, Item> BufferTimeState<O, Item> {
  fn take_buffer(&mut self) -> Vec<Item> {
    let capacity = self.max_size.unwrap_or(0);
    std::mem::replace(&mut self.buffer, Vec::with_capacity(capacity))
  }
}

pub struct BufferTimeObserver<O, Item> {
  state: MutRc<BufferTimeState<O, Item>>,
  timer: TaskHandle,
}

impl<Item, Err, O> Observer<Item, Err> for BufferTimeObserver<O, Item>
where
  O: Observer<Vec<Item>, Err>,
{
  fn next(&mut self, value: Item) {
    let mut state = self.state.rc_deref_mut();
    state.buffer.push(value);
    if state.max_size.is_some_and(|max| state.buffer.len() >= max) {
      let buffer = state.take_buffer();
      if let Some(observer) = state.observer.as_mut() {
        observer.next(buffer);
      }
    }
  }

  fn error(self, err: Err) {
    self.timer.cancel();
    let observer = self.state.rc_deref_mut().observer.take();
    if let Some(observer) = observer {
      observer.error(err);
    }
  }

  fn complete(self) {
    self.timer.cancel();
    let (observer, buffer) = {
      let mut state = self.state.rc_deref_mut();
      (state.observer.take(), state.take_buffer())
    };
    if let Some(mut observer) = observer {
      if !buffer.is_empty() {
        observer.next(buffer);
      }
      observer.complete();
    }
  }

  fn is_closed(&self) -> bool {
    self
      .state
      .rc_deref()
      .observer
      .as_ref()
      .is_none_or(|o| o.is_closed())
  }
}

fn emit_window<O, Item, Err>(state: &MutRc<BufferTimeState<O, Item>>, span: Duration) -> TaskState
where
  O: Observer<Vec<Item>, Err>,
{
  let mut state = state.rc_deref_mut();
  if state.observer.is_none() {
    return TaskState::Finished;
  }
  if !state.buffer.is_empty() {
    let buffer = state.take_buffer();
    if let Some(observer) = state.observer.as_mut() {
      observer.next(buffer);
    }
  }
  TaskState::Sleeping(span)
}

impl<S, SD, O, Item, Err> CoreObservable<O> for BufferTimeOp<S, SD>
where
  S: CoreObservable<BufferTimeObserver<O, Item>> + ObservableType<Item = Item, Err = Err>,
  SD: Scheduler,
  O: Observer<Vec<Item>, Err> + 'static,
  Item: 'static,
{
  type Unsub = SourceWithHandle<S::Unsub, TaskHandle>;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let BufferTimeOp { source, span, max_size, scheduler } = self;
    let state = MutRc::own(BufferTimeState {
      observer: Some(observer),
      buffer: Vec::with_capacity(max_size.unwrap_or(0)),
      max_size,
    });

    let c_state = state.clone();
    let timer =
      scheduler.schedule_fn(move || emit_window::<O, Item, Err>(&c_state, span), Some(span));

    let unsub = source.actual_subscribe(BufferTimeObserver { state, timer: timer.clone() });
    SourceWithHandle::new(unsub, timer)
  }
}
