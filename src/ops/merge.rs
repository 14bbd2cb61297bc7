use crate::{
  observable::{CoreObservable, ObservableType},
  observer::Observer,
  rc::{MutRc, RcDeref, RcDerefMut},
  subscription::{LocalSubscription, Subscription},
};

#[derive(Clone)]
pub struct MergeOp<S1, S2> {
  pub(crate) source1: S1,
  pub(crate) source2: S2,
}

impl<S1, S2> ObservableType for MergeOp<S1, S2>
where
  S1: ObservableType,
{
  type Item = S1::Item;
  type Err = S1::Err;
}

struct MergeState<O> {
  observer: Option<O>,
  completed_one: bool,
}

pub struct MergeObserver<O> {
  state: MutRc<MergeState<O>>,
  subscription: LocalSubscription,
}

impl<S1, S2, O, Item, Err> CoreObservable<O> for MergeOp<S1, S2>
where
  S1: CoreObservable<MergeObserver<O>> + ObservableType<Item = Item, Err = Err>,
  S2: CoreObservable<MergeObserver<O>> + ObservableType<Item = Item, Err = Err>,
  S1::Unsub: 'static,
  S2::Unsub: 'static,
  O: Observer<Item, Err>,
{
  type Unsub = LocalSubscription;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let subscription = LocalSubscription::default();
    let state = MutRc::own(MergeState { observer: Some(observer), completed_one: false });
    let first = MergeObserver { state: state.clone(), subscription: subscription.clone() };
    subscription.add(self.source1.actual_subscribe(first));
    let second = MergeObserver { state, subscription: subscription.clone() };
    subscription.add(self.source2.actual_subscribe(second));
    subscription
  }
}

impl<Item, Err, O> Observer<Item, Err> for MergeObserver<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if let Some(observer) = self.state.rc_deref_mut().observer.as_mut() {
      observer.next(value);
    }
  }

  fn error(self, err: Err) {
    let observer = self.state.rc_deref_mut().observer.take();
    if let Some(observer) = observer {
      observer.error(err);
      self.subscription.unsubscribe();
    }
  }

  fn complete(self) {
    let observer = {
      let mut state = self.state.rc_deref_mut();
      if state.completed_one {
        state.observer.take()
      } else {
        state.completed_one = true;
        None
      }
    };
    if let Some(observer) = observer {
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

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[rxmarble_macro::test]
  fn interleaves_on_the_shared_clock() {
    MarbleRunner::new()
      .run(|h| {
        let e1 = h.cold::<char>("-a--b-|")?;
        let e2 = h.cold::<char>("--c--d---|")?;
        let e1_subs = e1.subscriptions();
        let e2_subs = e2.subscriptions();
        h.expect_observable(e1.merge(e2)).to_be("-ac-bd---|")?;
        h.expect_subscriptions(e1_subs).to_be(&["^-----!"])?;
        h.expect_subscriptions(e2_subs).to_be(&["^--------!"])
      })
      .unwrap();
  }

  #[rxmarble_macro::test]
  fn same_frame_keeps_subscription_order() {
    MarbleRunner::new()
      .run(|h| {
        let e1 = h.cold::<char>("--a|")?;
        let e2 = h.cold::<char>("--b|")?;
        h.expect_observable(e1.merge(e2)).to_be("--(ab)|")
      })
      .unwrap();
  }

  #[rxmarble_macro::test]
  fn error_unsubscribes_the_other_source() {
    MarbleRunner::new()
      .run(|h| {
        let e1 = h.cold::<char>("--#")?;
        let e2 = h.cold::<char>("-a---b|")?;
        let e2_subs = e2.subscriptions();
        h.expect_observable(e1.merge(e2)).to_be("-a#")?;
        h.expect_subscriptions(e2_subs).to_be(&["^-!"])
      })
      .unwrap();
  }
}
