use crate::{
  observable::{CoreObservable, ObservableType},
  observer::Observer,
};

#[derive(Clone)]
pub struct MapOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: F,
}

pub struct MapObserver<O, F> {
  observer: O,
  func: F,
}

impl<S, F, Out> ObservableType for MapOp<S, F>
where
  S: ObservableType,
  F: FnMut(S::Item) -> Out,
{
  type Item = Out;
  type Err = S::Err;
}

impl<S, F, O, Item, Out> CoreObservable<O> for MapOp<S, F>
where
  S: CoreObservable<MapObserver<O, F>> + ObservableType<Item = Item>,
  F: FnMut(Item) -> Out,
  O: Observer<Out, S::Err>,
{
  type Unsub = S::Unsub;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    self
      .source
      .actual_subscribe(MapObserver { observer, func: self.func })
  }
}

impl<Item, Err, O, F, Out> Observer<Item, Err> for MapObserver<O, F>
where
  O: Observer<Out, Err>,
  F: FnMut(Item) -> Out,
{
  #[inline]
  fn next(&mut self, value: Item) { self.observer.next((self.func)(value)) }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use crate::prelude::*;

  #[rxmarble_macro::test]
  fn maps_every_value_at_its_frame() {
    MarbleRunner::new()
      .run(|h| {
        let source = h.cold::<i32>("-1-2-3|")?;
        h.expect_observable(source.map(|v| v * 10)).to_be_with(
          "-a-b-c|",
          &HashMap::from([('a', 10), ('b', 20), ('c', 30)]),
          None,
        )
      })
      .unwrap();
  }

  #[rxmarble_macro::test]
  fn forwards_errors() {
    MarbleRunner::new()
      .run(|h| {
        let source = h.cold::<char>("--a--#")?;
        h.expect_observable(source.map(|c| c.to_ascii_uppercase()))
          .to_be_with("--A--#", &Symbols, None)
      })
      .unwrap();
  }
}
