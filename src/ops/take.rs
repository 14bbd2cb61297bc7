use crate::{
  observable::{CoreObservable, ObservableType},
  observer::Observer,
  subscription::{LocalSubscription, Subscription},
};

/// Emits only the first `count` values of the source, then completes and
/// unsubscribes from the source.
#[derive(Clone)]
pub struct TakeOp<S> {
  pub(crate) source: S,
  pub(crate) count: usize,
}

pub struct TakeObserver<O> {
  observer: Option<O>,
  remaining: usize,
  subscription: LocalSubscription,
}

impl<S: ObservableType> ObservableType for TakeOp<S> {
  type Item = S::Item;
  type Err = S::Err;
}

impl<S, O> CoreObservable<O> for TakeOp<S>
where
  S: CoreObservable<TakeObserver<O>>,
  S::Unsub: 'static,
  O: Observer<S::Item, S::Err>,
{
  type Unsub = LocalSubscription;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let subscription = LocalSubscription::default();
    if self.count == 0 {
      observer.complete();
      subscription.clone().unsubscribe();
      return subscription;
    }
    let observer = TakeObserver {
      observer: Some(observer),
      remaining: self.count,
      subscription: subscription.clone(),
    };
    // Completing during subscribe closes `subscription`, so `add` tears the
    // source down right away.
    subscription.add(self.source.actual_subscribe(observer));
    subscription
  }
}

impl<Item, Err, O> Observer<Item, Err> for TakeObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    let Some(observer) = self.observer.as_mut() else { return };
    self.remaining -= 1;
    observer.next(value);
    if self.remaining == 0 {
      if let Some(observer) = self.observer.take() {
        observer.complete();
      }
      self.subscription.clone().unsubscribe();
    }
  }

  fn error(self, err: Err) {
    if let Some(observer) = self.observer {
      observer.error(err);
    }
  }

  fn complete(self) {
    if let Some(observer) = self.observer {
      observer.complete();
    }
  }

  fn is_closed(&self) -> bool { self.observer.as_ref().is_none_or(|o| o.is_closed()) }
}
