//! Observable traits.
//!
//! A stream is split in two traits: [`ObservableType`] names what it emits,
//! [`CoreObservable`] connects it to one concrete observer type. Operators
//! wrap the observer on the way up and the source on the way down, so a
//! whole pipeline is monomorphized into a single subscribe call.

use std::time::Duration;

use crate::{
  observer::FnMutObserver,
  ops::{
    buffer_time::BufferTimeOp, combine_latest::CombineLatestOp, delay::DelayOp, map::MapOp,
    merge::MergeOp, take::TakeOp,
  },
  scheduler::Scheduler,
  subscription::Subscription,
};

/// The item and error types of a stream.
pub trait ObservableType {
  type Item;
  type Err;
}

/// Subscribe logic of a stream for observers of type `O`.
pub trait CoreObservable<O>: ObservableType {
  type Unsub: Subscription;

  fn actual_subscribe(self, observer: O) -> Self::Unsub;
}

/// Operators and subscribe helpers available on every stream.
pub trait ObservableExt: ObservableType + Sized {
  /// Transform each value with `f`.
  fn map<F, Out>(self, f: F) -> MapOp<Self, F>
  where
    F: FnMut(Self::Item) -> Out,
  {
    MapOp { source: self, func: f }
  }

  /// Interleave the values of both streams. Completes when both completed,
  /// errors on the first error.
  fn merge<S>(self, other: S) -> MergeOp<Self, S>
  where
    S: ObservableType<Item = Self::Item, Err = Self::Err>,
  {
    MergeOp { source1: self, source2: other }
  }

  /// Once both streams emitted, combine the latest value of each whenever
  /// either emits.
  fn combine_latest<S, F, Out>(self, other: S, f: F) -> CombineLatestOp<Self, S, F>
  where
    S: ObservableType<Err = Self::Err>,
    F: FnMut(Self::Item, S::Item) -> Out,
  {
    CombineLatestOp { a: self, b: other, func: f }
  }

  /// Emit only the first `count` values, then complete.
  fn take(self, count: usize) -> TakeOp<Self> { TakeOp { source: self, count } }

  /// Shift values and completion by `delay` on `scheduler`. Errors are not
  /// delayed.
  fn delay<SD: Scheduler>(self, delay: Duration, scheduler: SD) -> DelayOp<Self, SD> {
    DelayOp { source: self, delay, scheduler }
  }

  /// Collect values into buffers emitted every `span`, or as soon as a buffer
  /// holds `max_size` values.
  fn buffer_time<SD: Scheduler>(
    self, span: Duration, max_size: Option<usize>, scheduler: SD,
  ) -> BufferTimeOp<Self, SD> {
    BufferTimeOp { source: self, span, max_size, scheduler }
  }

  /// Subscribe with a closure handling values. Terminal notifications are
  /// ignored.
  fn subscribe<F>(self, f: F) -> <Self as CoreObservable<FnMutObserver<F>>>::Unsub
  where
    F: FnMut(Self::Item),
    Self: CoreObservable<FnMutObserver<F>>,
  {
    self.actual_subscribe(FnMutObserver(f))
  }

  /// Subscribe with a full observer.
  fn subscribe_with<O>(self, observer: O) -> <Self as CoreObservable<O>>::Unsub
  where
    Self: CoreObservable<O>,
  {
    self.actual_subscribe(observer)
  }
}

impl<T: ObservableType> ObservableExt for T {}
