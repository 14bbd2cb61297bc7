use std::rc::Rc;

use super::{
  frame::Frame,
  notification::{Notification, TestMessage},
  subscription_log::{SubscriptionLogs, WindowTicket},
};
use crate::{
  observable::{CoreObservable, ObservableType},
  observer::Observer,
  rc::MutRc,
  scheduler::{
    test_scheduler::WeakTestScheduler, Scheduler, SchedulerExt, TaskHandle, TestScheduler,
  },
  subscription::Subscription,
};

/// Synthetic source that replays its timeline for every subscriber, relative
/// to the frame that subscriber attached at.
pub struct ColdObservable<Item, Err> {
  messages: Rc<Vec<TestMessage<Item, Err>>>,
  scheduler: TestScheduler,
  logs: SubscriptionLogs,
}

impl<Item, Err> ColdObservable<Item, Err> {
  pub fn new(messages: Vec<TestMessage<Item, Err>>, scheduler: TestScheduler) -> Self {
    ColdObservable { messages: Rc::new(messages), scheduler, logs: SubscriptionLogs::new() }
  }

  /// Windows of every subscription made so far, shared with all clones.
  pub fn subscriptions(&self) -> SubscriptionLogs { self.logs.clone() }

  pub fn messages(&self) -> &[TestMessage<Item, Err>] { &self.messages }
}

impl<Item, Err> Clone for ColdObservable<Item, Err> {
  fn clone(&self) -> Self {
    ColdObservable {
      messages: self.messages.clone(),
      scheduler: self.scheduler.clone(),
      logs: self.logs.clone(),
    }
  }
}

impl<Item, Err> ObservableType for ColdObservable<Item, Err> {
  type Item = Item;
  type Err = Err;
}

impl<Item, Err, O> CoreObservable<O> for ColdObservable<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
  O: Observer<Item, Err> + 'static,
{
  type Unsub = ColdSubscription;

  fn actual_subscribe(self, observer: O) -> Self::Unsub {
    let subscribed = Frame::from(self.scheduler.now());
    let ticket = self.logs.open(subscribed);
    let observer = MutRc::own(Some(observer));

    let handles = self
      .messages
      .iter()
      .map(|message| {
        let delay = message.frame.to_duration().unwrap_or_default();
        let at = subscribed + delay;
        let notification = message.notification.clone();
        let observer = observer.clone();
        let ticket = ticket.clone();
        self
          .scheduler
          .schedule_once(move || deliver(notification, observer, &ticket, at), Some(delay))
      })
      .collect();

    ColdSubscription { ticket, handles, clock: self.scheduler.downgrade() }
  }
}

fn deliver<Item, Err, O>(
  notification: Notification<Item, Err>, mut observer: MutRc<Option<O>>, ticket: &WindowTicket,
  at: Frame,
) where
  O: Observer<Item, Err>,
{
  match notification {
    Notification::Next(value) => Observer::<Item, Err>::next(&mut observer, value),
    Notification::Error(err) => {
      ticket.close(at);
      Observer::<Item, Err>::error(observer, err)
    }
    Notification::Complete => {
      ticket.close(at);
      Observer::<Item, Err>::complete(observer)
    }
  }
}

/// Subscription of one cold subscriber: cancels its pending notifications
/// and closes its window.
pub struct ColdSubscription {
  ticket: WindowTicket,
  handles: Vec<TaskHandle>,
  clock: WeakTestScheduler,
}

impl Subscription for ColdSubscription {
  fn unsubscribe(self) {
    self.handles.iter().for_each(TaskHandle::cancel);
    if let Some(now) = self.clock.now() {
      self.ticket.close(Frame::from(now));
    }
  }

  fn is_closed(&self) -> bool { self.ticket.is_closed() }
}
