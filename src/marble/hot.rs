use std::{cell::Cell, rc::Rc};

use super::{
  frame::Frame,
  notification::{Notification, TestMessage},
  subscription_log::{SubscriptionLogs, WindowTicket},
};
use crate::{
  observable::{CoreObservable, ObservableType},
  observer::{BoxedObserver, Observer},
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler::{test_scheduler::WeakTestScheduler, Scheduler, TestScheduler},
  subscription::Subscription,
};

struct HotSubscriber<Item, Err> {
  observer: BoxedObserver<'static, Item, Err>,
  ticket: WindowTicket,
  closed: Rc<Cell<bool>>,
}

struct HotState<Item, Err> {
  subscribers: Vec<HotSubscriber<Item, Err>>,
  terminal: Option<Notification<Item, Err>>,
  scheduled: bool,
}

/// Synthetic source playing one timeline on the shared clock. Subscribers
/// only see what happens from the frame they attached at.
pub struct HotObservable<Item, Err> {
  state: MutRc<HotState<Item, Err>>,
  messages: Rc<Vec<TestMessage<Item, Err>>>,
  scheduler: TestScheduler,
  logs: SubscriptionLogs,
}

impl<Item, Err> HotObservable<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  /// A source over `messages`, silent until [`HotObservable::setup`] puts its
  /// timeline on the clock.
  pub fn new(messages: Vec<TestMessage<Item, Err>>, scheduler: TestScheduler) -> Self {
    let state = MutRc::own(HotState { subscribers: vec![], terminal: None, scheduled: false });
    HotObservable { state, messages: Rc::new(messages), scheduler, logs: SubscriptionLogs::new() }
  }

  /// Schedule the timeline. Frames are absolute; those already passed are
  /// never played. Only the first call has an effect.
  pub fn setup(&self) {
    if std::mem::replace(&mut self.state.rc_deref_mut().scheduled, true) {
      return;
    }
    let now = Frame::from(self.scheduler.now());
    for message in self.messages.iter().filter(|m| m.frame >= now) {
      let Some(at) = message.frame.to_duration() else { continue };
      let notification = message.notification.clone();
      // The clock owns the timeline until it plays or the run clears it.
      let state = self.state.clone();
      let clock = self.scheduler.downgrade();
      self
        .scheduler
        .schedule_once_at(move || broadcast(&state, notification, &clock), at);
    }
  }
}

impl<Item, Err> HotObservable<Item, Err> {
  /// Windows of every subscription made so far, shared with all clones.
  pub fn subscriptions(&self) -> SubscriptionLogs { self.logs.clone() }

  pub fn messages(&self) -> &[TestMessage<Item, Err>] { &self.messages }
}

impl<Item, Err> Clone for HotObservable<Item, Err> {
  fn clone(&self) -> Self {
    HotObservable {
      state: self.state.clone(),
      messages: self.messages.clone(),
      scheduler: self.scheduler.clone(),
      logs: self.logs.clone(),
    }
  }
}

fn now_frame(clock: &WeakTestScheduler) -> Frame { Frame::from(clock.now().unwrap_or_default()) }

fn broadcast<Item: Clone, Err: Clone>(
  state: &MutRc<HotState<Item, Err>>, notification: Notification<Item, Err>,
  clock: &WeakTestScheduler,
) {
  // Observers run outside the borrow, they may subscribe or unsubscribe.
  let mut subscribers = std::mem::take(&mut state.rc_deref_mut().subscribers);
  match notification {
    Notification::Next(value) => {
      for subscriber in subscribers.iter_mut() {
        if !subscriber.closed.get() {
          subscriber.observer.next(value.clone());
        }
      }
      let mut state = state.rc_deref_mut();
      subscribers.retain(|s| !s.closed.get());
      subscribers.append(&mut state.subscribers);
      state.subscribers = subscribers;
    }
    terminal => {
      state.rc_deref_mut().terminal = Some(terminal.clone());
      let at = now_frame(clock);
      for subscriber in subscribers.into_iter().filter(|s| !s.closed.get()) {
        subscriber.closed.set(true);
        subscriber.ticket.close(at);
        terminal.clone().accept(subscriber.observer);
      }
    }
  }
}

impl<Item, Err> ObservableType for HotObservable<Item, Err> {
  type Item = Item;
  type Err = Err;
}

impl<Item, Err, O> CoreObservable<O> for HotObservable<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
  O: Observer<Item, Err> + 'static,
{
  type Unsub = HotSubscription<Item, Err>;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let at = Frame::from(self.scheduler.now());
    let ticket = self.logs.open(at);
    let closed = Rc::new(Cell::new(false));
    let clock = self.scheduler.downgrade();

    let terminal = self.state.rc_deref().terminal.clone();
    match terminal {
      Some(terminal) => {
        closed.set(true);
        ticket.close(at);
        terminal.accept(observer);
      }
      None => self.state.rc_deref_mut().subscribers.push(HotSubscriber {
        observer: Box::new(observer),
        ticket: ticket.clone(),
        closed: closed.clone(),
      }),
    }
    HotSubscription { state: self.state, ticket, closed, clock }
  }
}

/// Subscription of one hot subscriber.
pub struct HotSubscription<Item, Err> {
  state: MutRc<HotState<Item, Err>>,
  ticket: WindowTicket,
  closed: Rc<Cell<bool>>,
  clock: WeakTestScheduler,
}

impl<Item, Err> Subscription for HotSubscription<Item, Err> {
  fn unsubscribe(self) {
    if self.closed.replace(true) {
      return;
    }
    self.ticket.close(now_frame(&self.clock));
    // While a broadcast runs the list is taken out, it prunes itself.
    let removed = {
      let mut state = self.state.rc_deref_mut();
      let (closed, open) = std::mem::take(&mut state.subscribers)
        .into_iter()
        .partition(|s: &HotSubscriber<Item, Err>| s.closed.get());
      state.subscribers = open;
      closed
    };
    drop(removed);
  }

  fn is_closed(&self) -> bool { self.closed.get() }
}
