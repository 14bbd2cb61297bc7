//! Run harness.
//!
//! A run moves through `Idle -> Configuring -> Flushing -> Done`. While
//! configuring, the body builds sources and registers expectations; the
//! flush drains the virtual clock and evaluates them. Teardown is a guard, so
//! the ambient scheduler is restored on every exit path, panics included.

use std::{cell::Cell, fmt::Debug, future::Future, rc::Rc, time::Duration};

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, warn};

use super::{
  cold::ColdObservable,
  expectation::{
    ObservableExpectation, PendingChecks, RecordingObserver, SubscriptionsExpectation,
  },
  frame::Frame,
  hot::HotObservable,
  notification::TestError,
  parser::{
    parse_subscription_window, parse_time, parse_timeline, FromMarble, MarbleValues, ParseOptions,
    Symbols,
  },
  subscription_log::{SubscriptionLog, SubscriptionLogs},
};
use crate::{
  error::MarbleError,
  observable::{CoreObservable, ObservableType},
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler::{ambient, AmbientGuard, TestScheduler},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
  Idle,
  Configuring,
  Flushing,
  Done,
}

/// Knobs of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
  /// Virtual time one marble character stands for.
  pub frame_duration: Duration,
  /// Work due after this fails the flush. `None` is unbounded.
  pub max_frame: Option<Duration>,
  /// Recognize time literals such as `10ms` in diagrams.
  pub time_literals: bool,
}

impl Default for RunConfig {
  fn default() -> Self {
    RunConfig { frame_duration: Duration::from_millis(1), max_frame: None, time_literals: true }
  }
}

impl RunConfig {
  #[must_use]
  pub fn frame_duration(mut self, frame_duration: Duration) -> Self {
    self.frame_duration = frame_duration;
    self
  }

  #[must_use]
  pub fn max_frame(mut self, max_frame: Option<Duration>) -> Self {
    self.max_frame = max_frame;
    self
  }

  #[must_use]
  pub fn time_literals(mut self, time_literals: bool) -> Self {
    self.time_literals = time_literals;
    self
  }

  fn parse_options(&self) -> ParseOptions {
    ParseOptions::default()
      .frame_duration(self.frame_duration)
      .run_mode(self.time_literals)
  }
}

/// State of one run, shared by its helpers.
struct Session {
  phase: Cell<RunPhase>,
  scheduler: TestScheduler,
  checks: PendingChecks,
  hot_setups: MutRc<Vec<Box<dyn FnOnce()>>>,
  options: ParseOptions,
}

impl Session {
  fn flush(&self) -> Result<(), MarbleError> {
    if self.phase.get() != RunPhase::Configuring {
      return Err(MarbleError::AlreadyFlushed);
    }
    self.phase.set(RunPhase::Flushing);

    let setups = std::mem::take(&mut *self.hot_setups.rc_deref_mut());
    setups.into_iter().for_each(|setup| setup());
    debug!(pending = self.scheduler.pending_count(), checks = self.checks.len(), "flush run");
    let drained = self.scheduler.flush();
    let checks = self.checks.take();
    // Expectations added after this flush are evaluated by the next one.
    self.phase.set(RunPhase::Configuring);
    drained?;

    let mut failures: Vec<MarbleError> =
      checks.into_iter().filter_map(|check| check().err()).collect();
    for failure in failures.iter() {
      warn!(%failure, "expectation failed");
    }
    match failures.len() {
      0 => Ok(()),
      1 => Err(failures.remove(0)),
      _ => Err(MarbleError::Multiple(failures)),
    }
  }
}

/// Restores everything a run changed when dropped.
struct Teardown {
  slot: MutRc<Option<Rc<Session>>>,
  session: Rc<Session>,
  _ambient: AmbientGuard,
}

impl Drop for Teardown {
  fn drop(&mut self) {
    self.session.phase.set(RunPhase::Done);
    self.session.checks.close();
    let setups = std::mem::take(&mut *self.session.hot_setups.rc_deref_mut());
    drop(setups);
    self.session.scheduler.clear();
    let previous = self.slot.rc_deref_mut().take();
    drop(previous);
    debug!("run torn down");
  }
}

/// Entry point of marble tests.
///
/// ```rust
/// use rxmarble::prelude::*;
///
/// MarbleRunner::new()
///   .run(|h| {
///     let source = h.cold::<char>("-a--b-|")?;
///     let subs = source.subscriptions();
///     h.expect_observable(source.take(1)).to_be("-(a|)")?;
///     h.expect_subscriptions(subs).to_be(&["^!"])
///   })
///   .unwrap();
/// ```
#[derive(Default)]
pub struct MarbleRunner {
  config: RunConfig,
  current: MutRc<Option<Rc<Session>>>,
}

impl MarbleRunner {
  pub fn new() -> Self { Self::default() }

  /// A runner whose runs start from `config`.
  pub fn with_config(config: RunConfig) -> Self {
    MarbleRunner { config, current: MutRc::default() }
  }

  pub fn config(&self) -> RunConfig { self.config }

  pub fn phase(&self) -> RunPhase {
    self
      .current
      .rc_deref()
      .as_ref()
      .map_or(RunPhase::Idle, |session| session.phase.get())
  }

  /// Run `body` with the runner's configuration. See [`MarbleRunner::run_with`].
  pub fn run<R>(
    &self, body: impl FnOnce(&RunHelpers) -> Result<R, MarbleError>,
  ) -> Result<R, MarbleError> {
    self.run_with(self.config, body)
  }

  /// Install a fresh virtual clock as the ambient scheduler, run `body`, then
  /// flush and evaluate every expectation it registered.
  ///
  /// Whatever `body` returns is handed back once the flush passed. The
  /// ambient binding present before the call is restored however the call
  /// ends.
  pub fn run_with<R>(
    &self, config: RunConfig, body: impl FnOnce(&RunHelpers) -> Result<R, MarbleError>,
  ) -> Result<R, MarbleError> {
    if self.current.rc_deref().is_some() {
      return Err(MarbleError::NestedRun);
    }

    let scheduler = TestScheduler::with_max_frame(config.max_frame);
    let session = Rc::new(Session {
      phase: Cell::new(RunPhase::Configuring),
      scheduler: scheduler.clone(),
      checks: PendingChecks::open(),
      hot_setups: MutRc::default(),
      options: config.parse_options(),
    });
    *self.current.rc_deref_mut() = Some(session.clone());
    let _teardown = Teardown {
      slot: self.current.clone(),
      session: session.clone(),
      _ambient: ambient::install(Rc::new(scheduler)),
    };
    debug!(?config, "run started");

    let helpers = RunHelpers { session };
    let value = body(&helpers)?;
    helpers.session.flush()?;
    Ok(value)
  }

  /// Run a body that hands back a future. The virtual-time part completes
  /// before the returned future is polled; the future then only awaits the
  /// body's own result.
  pub fn run_future<F>(
    &self, body: impl FnOnce(&RunHelpers) -> Result<F, MarbleError>,
  ) -> LocalBoxFuture<'static, Result<F::Output, MarbleError>>
  where
    F: Future + 'static,
  {
    match self.run(body) {
      Ok(fut) => fut.map(Ok).boxed_local(),
      Err(err) => futures::future::ready(Err(err)).boxed_local(),
    }
  }

  /// Flush the run in progress. Fails with [`MarbleError::AlreadyFlushed`]
  /// when no run is configuring.
  pub fn flush(&self) -> Result<(), MarbleError> {
    let session = self.current.rc_deref().clone();
    match session {
      Some(session) => session.flush(),
      None => Err(MarbleError::AlreadyFlushed),
    }
  }
}

/// Helpers handed to a run body.
#[derive(Clone)]
pub struct RunHelpers {
  session: Rc<Session>,
}

impl RunHelpers {
  /// Cold source over `marbles`, values read through [`FromMarble`].
  pub fn cold<Item>(&self, marbles: &str) -> Result<ColdObservable<Item, TestError>, MarbleError>
  where
    Item: FromMarble + Clone + 'static,
  {
    self.cold_with(marbles, &Symbols, None)
  }

  /// Cold source over `marbles`, values looked up in `values`, `#` carrying
  /// `error` or `Err::default()`.
  pub fn cold_with<Item, Err, V>(
    &self, marbles: &str, values: &V, error: Option<Err>,
  ) -> Result<ColdObservable<Item, Err>, MarbleError>
  where
    Item: Clone + 'static,
    Err: Clone + Default + 'static,
    V: MarbleValues<Item> + ?Sized,
  {
    let messages = parse_timeline(marbles, values, error, self.session.options)?;
    Ok(ColdObservable::new(messages, self.scheduler()))
  }

  /// Hot source over `marbles`; `^` marks frame zero.
  pub fn hot<Item>(&self, marbles: &str) -> Result<HotObservable<Item, TestError>, MarbleError>
  where
    Item: FromMarble + Clone + 'static,
  {
    self.hot_with(marbles, &Symbols, None)
  }

  pub fn hot_with<Item, Err, V>(
    &self, marbles: &str, values: &V, error: Option<Err>,
  ) -> Result<HotObservable<Item, Err>, MarbleError>
  where
    Item: Clone + 'static,
    Err: Clone + Default + 'static,
    V: MarbleValues<Item> + ?Sized,
  {
    let messages = parse_timeline(marbles, values, error, self.session.options.hot(true))?;
    let hot = HotObservable::new(messages, self.scheduler());
    let c_hot = hot.clone();
    self
      .session
      .hot_setups
      .rc_deref_mut()
      .push(Box::new(move || c_hot.setup()));
    Ok(hot)
  }

  /// Record what `source` emits from frame zero on.
  pub fn expect_observable<S, Item, Err>(&self, source: S) -> ObservableExpectation<Item, Err>
  where
    S: CoreObservable<RecordingObserver<Item, Err>>
      + ObservableType<Item = Item, Err = Err>
      + 'static,
    S::Unsub: 'static,
    Item: 'static,
    Err: 'static,
  {
    let window = SubscriptionLog::new(Frame::ZERO, None);
    self.observe(source, window)
  }

  /// Record what `source` emits while subscribed along `subscription`, a
  /// diagram such as `"--^---!"`.
  pub fn expect_observable_with_subscription<S, Item, Err>(
    &self, source: S, subscription: &str,
  ) -> ObservableExpectation<Item, Err>
  where
    S: CoreObservable<RecordingObserver<Item, Err>>
      + ObservableType<Item = Item, Err = Err>
      + 'static,
    S::Unsub: 'static,
    Item: 'static,
    Err: 'static,
  {
    match parse_subscription_window(subscription, self.session.options) {
      Ok(window) => self.observe(source, window),
      Err(err) => {
        ObservableExpectation::failed(err, self.session.checks.clone(), self.session.options)
      }
    }
  }

  fn observe<S, Item, Err>(
    &self, source: S, window: SubscriptionLog,
  ) -> ObservableExpectation<Item, Err>
  where
    S: CoreObservable<RecordingObserver<Item, Err>>
      + ObservableType<Item = Item, Err = Err>
      + 'static,
    S::Unsub: 'static,
    Item: 'static,
    Err: 'static,
  {
    let session = &self.session;
    ObservableExpectation::observe(
      source,
      window,
      &session.scheduler,
      session.checks.clone(),
      session.options,
    )
  }

  /// Expect the subscription windows recorded in `logs`.
  pub fn expect_subscriptions(&self, logs: SubscriptionLogs) -> SubscriptionsExpectation {
    SubscriptionsExpectation::new(logs, self.session.checks.clone(), self.session.options)
  }

  /// Drain the clock and evaluate what was registered so far. The run stays
  /// open for more expectations.
  pub fn flush(&self) -> Result<(), MarbleError> { self.session.flush() }

  pub fn scheduler(&self) -> TestScheduler { self.session.scheduler.clone() }

  pub fn phase(&self) -> RunPhase { self.session.phase.get() }

  pub fn parse_options(&self) -> ParseOptions { self.session.options }

  /// Time of the `|` marker in `marbles`, e.g. `"---|"` is three frames.
  pub fn time(&self, marbles: &str) -> Result<Duration, MarbleError> {
    let frame = parse_time(marbles, self.session.options)?;
    frame
      .to_duration()
      .ok_or_else(|| MarbleError::syntax(marbles, 0, "negative time"))
  }
}

impl Debug for RunHelpers {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RunHelpers")
      .field("phase", &self.session.phase.get())
      .field("scheduler", &self.session.scheduler)
      .finish()
  }
}
