use crate::{
  observable::{CoreObservable, ObservableType},
  observer::Observer,
  rc::MutRc,
  scheduler::{Duration, Scheduler, SchedulerExt},
  subscription::{LocalSubscription, SourceWithHandle, Subscription},
};

#[derive(Debug, Clone)]
pub struct DelayOp<S, SD> {
  pub(crate) source: S,
  pub(crate) delay: Duration,
  pub(crate) scheduler: SD,
}

pub struct DelayObserver<O, SD> {
  delay: Duration,
  scheduler: SD,
  observer: MutRc<Option<O>>,
  pending: LocalSubscription,
}

impl<S: ObservableType, SD> ObservableType for DelayOp<S, SD> {
  type Item = S::Item;
  type Err = S::Err;
}

impl<S, SD, O> CoreObservable<O> for DelayOp<S, SD>
where
  S: CoreObservable<DelayObserver<O, SD>>,
  S::Item: 'static,
  SD: Scheduler,
  O: Observer<S::Item, S::Err> + 'static,
{
  type Unsub = SourceWithHandle<S::Unsub, LocalSubscription>;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let DelayOp { source, delay, scheduler } = self;
    let pending = LocalSubscription::default();
    let observer = DelayObserver {
      delay,
      scheduler,
      observer: MutRc::own(Some(observer)),
      pending: pending.clone(),
    };
    let unsub = source.actual_subscribe(observer);
    SourceWithHandle::new(unsub, pending)
  }
}

impl<Item, Err, O, SD> Observer<Item, Err> for DelayObserver<O, SD>
where
  O: Observer<Item, Err> + 'static,
  SD: Scheduler,
  Item: 'static,
{
  fn next(&mut self, value: Item) {
    let mut observer = self.observer.clone();
    let handle = self
      .scheduler
      .schedule_once(move || Observer::<Item, Err>::next(&mut observer, value), Some(self.delay));
    self.pending.add(handle);
  }

  fn error(self, err: Err) {
    self.pending.unsubscribe();
    Observer::<Item, Err>::error(self.observer, err)
  }

  fn complete(self) {
    let observer = self.observer;
    let handle = self.scheduler.schedule_once(
      move || Observer::<Item, Err>::complete(observer),
      Some(self.delay),
    );
    self.pending.add(handle);
  }

  fn is_closed(&self) -> bool { Observer::<Item, Err>::is_closed(&self.observer) }
}
