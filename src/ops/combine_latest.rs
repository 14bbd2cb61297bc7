use crate::{
  observable::{CoreObservable, ObservableType},
  observer::Observer,
  rc::{MutRc, RcDeref, RcDerefMut},
  subscription::{LocalSubscription, Subscription},
};

#[derive(Clone)]
pub struct CombineLatestOp<A, B, F> {
  pub(crate) a: A,
  pub(crate) b: B,
  pub(crate) func: F,
}

impl<A, B, F, Out> ObservableType for CombineLatestOp<A, B, F>
where
  A: ObservableType,
  B: ObservableType<Err = A::Err>,
  F: FnMut(A::Item, B::Item) -> Out,
{
  type Item = Out;
  type Err = A::Err;
}

struct CombineLatestState<O, A, B, F> {
  observer: Option<O>,
  a: Option<A>,
  b: Option<B>,
  func: F,
  completed_one: bool,
}

impl<O, A, B, F, Out> CombineLatestState<O, A, B, F>
where
  F: FnMut(A, B) -> Out,
  A: Clone,
  B: Clone,
{
  fn combined(&mut self) -> Option<Out> {
    match (&self.a, &self.b) {
      (Some(a), Some(b)) => Some((self.func)(a.clone(), b.clone())),
      _ => None,
    }
  }
}

type SharedState<O, A, B, F> = MutRc<CombineLatestState<O, A, B, F>>;

pub struct AObserver<O, A, B, F> {
  state: SharedState<O, A, B, F>,
  subscription: LocalSubscription,
}

pub struct BObserver<O, A, B, F> {
  state: SharedState<O, A, B, F>,
  subscription: LocalSubscription,
}

impl<SA, SB, F, O, ItemA, ItemB, Out, Err> CoreObservable<O> for CombineLatestOp<SA, SB, F>
where
  SA: CoreObservable<AObserver<O, ItemA, ItemB, F>> + ObservableType<Item = ItemA, Err = Err>,
  SB: CoreObservable<BObserver<O, ItemA, ItemB, F>> + ObservableType<Item = ItemB, Err = Err>,
  SA::Unsub: 'static,
  SB::Unsub: 'static,
  F: FnMut(ItemA, ItemB) -> Out,
  O: Observer<Out, Err>,
{
  type Unsub = LocalSubscription;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let subscription = LocalSubscription::default();
    let state = MutRc::own(CombineLatestState {
      observer: Some(observer),
      a: None,
      b: None,
      func: self.func,
      completed_one: false,
    });
    let a = AObserver { state: state.clone(), subscription: subscription.clone() };
    subscription.add(self.a.actual_subscribe(a));
    let b = BObserver { state, subscription: subscription.clone() };
    subscription.add(self.b.actual_subscribe(b));
    subscription
  }
}

fn emit_latest<O, A, B, F, Out, Err>(state: &SharedState<O, A, B, F>)
where
  F: FnMut(A, B) -> Out,
  O: Observer<Out, Err>,
  A: Clone,
  B: Clone,
{
  let mut state = state.rc_deref_mut();
  if let Some(value) = state.combined() {
    if let Some(observer) = state.observer.as_mut() {
      observer.next(value);
    }
  }
}

fn error_all<O, A, B, F, Out, Err>(
  state: &SharedState<O, A, B, F>, subscription: LocalSubscription, err: Err,
)
where
  O: Observer<Out, Err>,
{
  let observer = state.rc_deref_mut().observer.take();
  if let Some(observer) = observer {
    observer.error(err);
    subscription.unsubscribe();
  }
}

fn complete_one<O, A, B, F, Out, Err>(state: &SharedState<O, A, B, F>)
where
  O: Observer<Out, Err>,
{
  let observer = {
    let mut state = state.rc_deref_mut();
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

fn downstream_closed<O, A, B, F, Out, Err>(state: &SharedState<O, A, B, F>) -> bool
where
  O: Observer<Out, Err>,
{
  state
    .rc_deref()
    .observer
    .as_ref()
    .is_none_or(|o| o.is_closed())
}

impl<O, A, B, F, Out, Err> Observer<A, Err> for AObserver<O, A, B, F>
where
  F: FnMut(A, B) -> Out,
  O: Observer<Out, Err>,
  A: Clone,
  B: Clone,
{
  fn next(&mut self, value: A) {
    self.state.rc_deref_mut().a = Some(value);
    emit_latest::<O, A, B, F, Out, Err>(&self.state);
  }

  fn error(self, err: Err) {
    error_all::<O, A, B, F, Out, Err>(&self.state, self.subscription, err)
  }

  fn complete(self) { complete_one::<O, A, B, F, Out, Err>(&self.state) }

  fn is_closed(&self) -> bool { downstream_closed::<O, A, B, F, Out, Err>(&self.state) }
}

impl<O, A, B, F, Out, Err> Observer<B, Err> for BObserver<O, A, B, F>
where
  F: FnMut(A, B) -> Out,
  O: Observer<Out, Err>,
  A: Clone,
  B: Clone,
{
  fn next(&mut self, value: B) {
    self.state.rc_deref_mut().b = Some(value);
    emit_latest::<O, A, B, F, Out, Err>(&self.state);
  }

  fn error(self, err: Err) {
    error_all::<O, A, B, F, Out, Err>(&self.state, self.subscription, err)
  }

  fn complete(self) { complete_one::<O, A, B, F, Out, Err>(&self.state) }

  fn is_closed(&self) -> bool { downstream_closed::<O, A, B, F, Out, Err>(&self.state) }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[rxmarble_macro::test]
  fn waits_for_both_sources() {
    MarbleRunner::new()
      .run(|h| {
        let e1 = h.cold::<char>("-a--b---|")?;
        let e2 = h.cold::<char>("---1--2|")?;
        let combined = e1.combine_latest(e2, |a, b| format!("{a}{b}"));
        h.expect_observable(combined).to_be_with(
          "---xy-z-|",
          &[('x', "a1".to_owned()), ('y', "b1".to_owned()), ('z', "b2".to_owned())]
            .into_iter()
            .collect::<std::collections::HashMap<_, _>>(),
          None,
        )
      })
      .unwrap();
  }

  #[rxmarble_macro::test]
  fn completes_only_after_both_completed() {
    MarbleRunner::new()
      .run(|h| {
        let e1 = h.cold::<char>("a|")?;
        let e2 = h.cold::<char>("-b----|")?;
        h.expect_observable(e1.combine_latest(e2, |a, _| a)).to_be("-a----|")
      })
      .unwrap();
  }

  #[rxmarble_macro::test]
  fn error_tears_down_both_sources() {
    MarbleRunner::new()
      .run(|h| {
        let e1 = h.cold::<char>("-a-----")?;
        let e2 = h.cold::<char>("--b-#")?;
        let e1_subs = e1.subscriptions();
        let combined = e1.combine_latest(e2, |a, b| if a < b { a } else { b });
        h.expect_observable(combined).to_be("--a-#")?;
        h.expect_subscriptions(e1_subs).to_be(&["^---!"])
      })
      .unwrap();
  }
}
