//! Expectations registered during a run and evaluated when it flushes.

use std::fmt::{Debug, Display};

use super::{
  frame::Frame,
  notification::TestMessage,
  parser::{
    parse_subscription_windows, parse_timeline, FromMarble, MarbleValues, ParseOptions, Symbols,
  },
  subscription_log::{SubscriptionLog, SubscriptionLogs},
};
use crate::{
  error::MarbleError,
  observable::{CoreObservable, ObservableType},
  observer::Observer,
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler::{test_scheduler::WeakTestScheduler, TestScheduler},
  subscription::Subscription,
};

pub(crate) type Check = Box<dyn FnOnce() -> Result<(), MarbleError>>;

#[derive(Default)]
struct CheckQueue {
  open: bool,
  checks: Vec<Check>,
}

/// Checks waiting for the next flush of one run.
#[derive(Clone, Default)]
pub(crate) struct PendingChecks(MutRc<CheckQueue>);

impl PendingChecks {
  pub(crate) fn open() -> Self { PendingChecks(MutRc::own(CheckQueue { open: true, checks: vec![] })) }

  pub(crate) fn push(&self, check: Check) -> Result<(), MarbleError> {
    let mut queue = self.0.rc_deref_mut();
    if !queue.open {
      return Err(MarbleError::AlreadyFlushed);
    }
    queue.checks.push(check);
    Ok(())
  }

  pub(crate) fn take(&self) -> Vec<Check> { std::mem::take(&mut self.0.rc_deref_mut().checks) }

  /// Reject every later registration and drop the queued checks.
  pub(crate) fn close(&self) {
    let dropped = {
      let mut queue = self.0.rc_deref_mut();
      queue.open = false;
      std::mem::take(&mut queue.checks)
    };
    drop(dropped);
  }

  pub(crate) fn len(&self) -> usize { self.0.rc_deref().checks.len() }
}

/// Observer that stamps every notification with the virtual time it
/// arrived at.
pub struct RecordingObserver<Item, Err> {
  messages: MutRc<Vec<TestMessage<Item, Err>>>,
  clock: WeakTestScheduler,
}

impl<Item, Err> RecordingObserver<Item, Err> {
  fn now(&self) -> Frame { Frame::from(self.clock.now().unwrap_or_default()) }
}

impl<Item, Err> Observer<Item, Err> for RecordingObserver<Item, Err> {
  fn next(&mut self, value: Item) {
    let at = self.now();
    self.messages.rc_deref_mut().push(TestMessage::next(at, value));
  }

  fn error(self, err: Err) {
    let at = self.now();
    self.messages.rc_deref_mut().push(TestMessage::error(at, err));
  }

  fn complete(self) {
    let at = self.now();
    self.messages.rc_deref_mut().push(TestMessage::complete(at));
  }

  fn is_closed(&self) -> bool { false }
}

/// What a stream is expected to emit. Created by
/// [`RunHelpers::expect_observable`](super::runner::RunHelpers::expect_observable).
pub struct ObservableExpectation<Item, Err> {
  recorded: MutRc<Vec<TestMessage<Item, Err>>>,
  checks: PendingChecks,
  options: ParseOptions,
  setup_error: Option<MarbleError>,
}

impl<Item, Err> ObservableExpectation<Item, Err>
where
  Item: 'static,
  Err: 'static,
{
  /// Subscribe `source` at the start of `window` and unsubscribe at its end.
  pub(crate) fn observe<S>(
    source: S, window: SubscriptionLog, scheduler: &TestScheduler, checks: PendingChecks,
    options: ParseOptions,
  ) -> Self
  where
    S: CoreObservable<RecordingObserver<Item, Err>> + ObservableType<Item = Item, Err = Err> + 'static,
    S::Unsub: 'static,
  {
    let recorded = MutRc::own(vec![]);
    let observer = RecordingObserver { messages: recorded.clone(), clock: scheduler.downgrade() };
    let subscription: MutRc<Option<S::Unsub>> = MutRc::own(None);

    let c_subscription = subscription.clone();
    scheduler.schedule_once_at(
      move || {
        let unsub = source.actual_subscribe(observer);
        *c_subscription.rc_deref_mut() = Some(unsub);
      },
      window.subscribed.to_duration().unwrap_or_default(),
    );
    if let Some(end) = window.unsubscribed {
      scheduler.schedule_once_at(
        move || {
          let unsub = subscription.rc_deref_mut().take();
          if let Some(unsub) = unsub {
            unsub.unsubscribe();
          }
        },
        end.to_duration().unwrap_or_default(),
      );
    }

    ObservableExpectation { recorded, checks, options, setup_error: None }
  }

  pub(crate) fn failed(err: MarbleError, checks: PendingChecks, options: ParseOptions) -> Self {
    ObservableExpectation {
      recorded: MutRc::own(vec![]),
      checks,
      options,
      setup_error: Some(err),
    }
  }
}

impl<Item, Err> ObservableExpectation<Item, Err>
where
  Item: PartialEq + Debug + 'static,
  Err: PartialEq + Debug + Clone + Default + 'static,
{
  /// Expect the timeline drawn by `marbles`, values read through
  /// [`FromMarble`].
  pub fn to_be(self, marbles: &str) -> Result<(), MarbleError>
  where
    Item: FromMarble,
  {
    self.to_be_with(marbles, &Symbols, None)
  }

  /// Expect the timeline drawn by `marbles`, values looked up in `values`
  /// and `#` carrying `error` (or `Err::default()`).
  pub fn to_be_with<V: MarbleValues<Item> + ?Sized>(
    self, marbles: &str, values: &V, error: Option<Err>,
  ) -> Result<(), MarbleError> {
    if let Some(err) = self.setup_error {
      return Err(err);
    }
    let expected = parse_timeline(marbles, values, error, self.options)?;
    self.to_equal(expected)
  }

  /// Expect exactly these messages.
  pub fn to_equal(self, expected: Vec<TestMessage<Item, Err>>) -> Result<(), MarbleError> {
    if let Some(err) = self.setup_error {
      return Err(err);
    }
    let recorded = self.recorded;
    self
      .checks
      .push(Box::new(move || compare("notifications", &expected, &recorded.rc_deref())))
  }
}

/// What subscription windows a synthetic source is expected to see.
pub struct SubscriptionsExpectation {
  logs: SubscriptionLogs,
  checks: PendingChecks,
  options: ParseOptions,
}

impl SubscriptionsExpectation {
  pub(crate) fn new(logs: SubscriptionLogs, checks: PendingChecks, options: ParseOptions) -> Self {
    SubscriptionsExpectation { logs, checks, options }
  }

  /// One subscription diagram per expected window, in subscribe order.
  pub fn to_be(self, marbles: &[&str]) -> Result<(), MarbleError> {
    let expected = parse_subscription_windows(marbles, self.options)?;
    self.to_equal(expected)
  }

  pub fn to_equal(self, expected: Vec<SubscriptionLog>) -> Result<(), MarbleError> {
    let logs = self.logs;
    self
      .checks
      .push(Box::new(move || compare("subscriptions", &expected, &logs.snapshot())))
  }
}

fn render<T: Display>(items: &[T]) -> String {
  let items: Vec<_> = items.iter().map(ToString::to_string).collect();
  format!("[{}]", items.join(", "))
}

/// Where two sequences part ways.
fn divergence<T: PartialEq + Display>(expected: &[T], actual: &[T]) -> String {
  let idx = expected
    .iter()
    .zip(actual)
    .position(|(e, a)| e != a)
    .unwrap_or_else(|| expected.len().min(actual.len()));
  match (expected.get(idx), actual.get(idx)) {
    (Some(e), Some(a)) => format!("first difference at #{idx}: expected {e}, got {a}"),
    (Some(e), None) => format!("missing from #{idx}: {e}"),
    (None, Some(a)) => format!("unexpected from #{idx}: {a}"),
    (None, None) => "no difference".to_owned(),
  }
}

pub(crate) fn compare<T: PartialEq + Display>(
  subject: &'static str, expected: &[T], actual: &[T],
) -> Result<(), MarbleError> {
  if expected == actual {
    return Ok(());
  }
  Err(MarbleError::Mismatch {
    subject,
    expected: render(expected),
    actual: render(actual),
    diff: divergence(expected, actual),
  })
}
