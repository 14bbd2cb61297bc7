use std::fmt;

use super::frame::Frame;
use crate::rc::{MutRc, RcDeref, RcDerefMut};

/// The `[subscribed, unsubscribed)` window of one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionLog {
  pub subscribed: Frame,
  /// `None` while the subscriber is still attached.
  pub unsubscribed: Option<Frame>,
}

impl SubscriptionLog {
  pub fn new(subscribed: Frame, unsubscribed: Option<Frame>) -> Self {
    SubscriptionLog { subscribed, unsubscribed }
  }

  #[inline]
  pub fn is_open(&self) -> bool { self.unsubscribed.is_none() }
}

impl fmt::Display for SubscriptionLog {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.unsubscribed {
      Some(end) => write!(f, "[{}, {end})", self.subscribed),
      None => write!(f, "[{}, ∞)", self.subscribed),
    }
  }
}

/// Append-only list of the windows a synthetic source saw.
///
/// Clones share the list, so a handle taken before the source is moved into
/// a pipeline still sees every window recorded later.
#[derive(Clone, Default)]
pub struct SubscriptionLogs(MutRc<Vec<SubscriptionLog>>);

impl SubscriptionLogs {
  pub fn new() -> Self { Self::default() }

  /// Open a window at `at`.
  pub(crate) fn open(&self, at: Frame) -> WindowTicket {
    let mut logs = self.0.rc_deref_mut();
    logs.push(SubscriptionLog::new(at, None));
    WindowTicket { logs: self.clone(), index: logs.len() - 1 }
  }

  /// Copy of the windows recorded so far.
  pub fn snapshot(&self) -> Vec<SubscriptionLog> { self.0.rc_deref().clone() }

  pub fn len(&self) -> usize { self.0.rc_deref().len() }

  pub fn is_empty(&self) -> bool { self.0.rc_deref().is_empty() }
}

impl fmt::Debug for SubscriptionLogs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.0.rc_deref().iter()).finish()
  }
}

/// Closes the window it was opened for. Only the first close counts.
#[derive(Clone)]
pub(crate) struct WindowTicket {
  logs: SubscriptionLogs,
  index: usize,
}

impl WindowTicket {
  pub(crate) fn close(&self, at: Frame) {
    let mut logs = self.logs.0.rc_deref_mut();
    if let Some(log) = logs.get_mut(self.index) {
      if log.unsubscribed.is_none() {
        log.unsubscribed = Some(at);
      }
    }
  }

  pub(crate) fn is_closed(&self) -> bool {
    self
      .logs
      .0
      .rc_deref()
      .get(self.index)
      .is_none_or(|log| log.unsubscribed.is_some())
  }
}
