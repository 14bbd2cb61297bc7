use std::{error::Error, fmt};

use thiserror::Error;

use super::frame::Frame;
use crate::observer::Observer;

/// One recorded event of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Notification<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

impl<Item, Err> Notification<Item, Err> {
  #[inline]
  pub fn is_terminal(&self) -> bool { !matches!(self, Notification::Next(_)) }

  /// Replay this notification into `observer`. A terminal notification
  /// consumes the observer, so it is passed by value and returned while the
  /// stream is still open.
  pub fn accept<O: Observer<Item, Err>>(self, mut observer: O) -> Option<O> {
    match self {
      Notification::Next(value) => {
        observer.next(value);
        Some(observer)
      }
      Notification::Error(err) => {
        observer.error(err);
        None
      }
      Notification::Complete => {
        observer.complete();
        None
      }
    }
  }
}

impl<Item: fmt::Debug, Err: fmt::Debug> fmt::Display for Notification<Item, Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Notification::Next(value) => write!(f, "next({value:?})"),
      Notification::Error(err) => write!(f, "error({err:?})"),
      Notification::Complete => f.write_str("complete"),
    }
  }
}

/// A notification stamped with the frame it happened at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestMessage<Item, Err> {
  pub frame: Frame,
  pub notification: Notification<Item, Err>,
}

impl<Item, Err> TestMessage<Item, Err> {
  pub fn next(frame: Frame, value: Item) -> Self {
    TestMessage { frame, notification: Notification::Next(value) }
  }

  pub fn error(frame: Frame, err: Err) -> Self {
    TestMessage { frame, notification: Notification::Error(err) }
  }

  pub fn complete(frame: Frame) -> Self { TestMessage { frame, notification: Notification::Complete } }
}

impl<Item: fmt::Debug, Err: fmt::Debug> fmt::Display for TestMessage<Item, Err> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.frame, self.notification)
  }
}

/// Comparable error value for timelines.
///
/// Only the name and the message take part in equality, so errors raised by
/// real code can be projected into a `TestError` and compared against `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{name}: {message}")]
pub struct TestError {
  pub name: String,
  pub message: String,
}

impl TestError {
  /// An error with the default name.
  pub fn new(message: impl Into<String>) -> Self { Self::named("Error", message) }

  pub fn named(name: impl Into<String>, message: impl Into<String>) -> Self {
    TestError { name: name.into(), message: message.into() }
  }

  /// Keep the stable part of any error: its type name and its message.
  pub fn project<E: Error + ?Sized>(err: &E) -> Self {
    let name = std::any::type_name::<E>();
    let name = name.rsplit("::").next().unwrap_or(name);
    Self::named(name, err.to_string())
  }
}

impl Default for TestError {
  fn default() -> Self { TestError::new("error") }
}

impl From<&str> for TestError {
  fn from(message: &str) -> Self { TestError::new(message) }
}

impl From<String> for TestError {
  fn from(message: String) -> Self { TestError::new(message) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::observer::FnMutObserver;

  #[rxmarble_macro::test]
  fn equality_is_structural() {
    let a = TestMessage::<_, TestError>::next(Frame::from_millis(2), 'a');
    assert_eq!(a, TestMessage::next(Frame::from_millis(2), 'a'));
    assert_ne!(a, TestMessage::next(Frame::from_millis(3), 'a'));
    assert_ne!(
      TestMessage::<char, _>::error(Frame::ZERO, TestError::new("x")),
      TestMessage::error(Frame::ZERO, TestError::named("TypeError", "x"))
    );
  }

  #[rxmarble_macro::test]
  fn display() {
    let msg = TestMessage::<char, TestError>::error(Frame::from_millis(4), TestError::default());
    assert_eq!(
      msg.to_string(),
      "4ms: error(TestError { name: \"Error\", message: \"error\" })"
    );
    assert_eq!(TestError::default().to_string(), "Error: error");
    assert_eq!(TestMessage::<char, TestError>::complete(Frame::ZERO).to_string(), "0ms: complete");
  }

  #[rxmarble_macro::test]
  fn projection_drops_everything_but_name_and_message() {
    let err = "x".parse::<i32>().unwrap_err();
    let projected = TestError::project(&err);
    assert_eq!(projected.name, "ParseIntError");
    assert_eq!(projected.message, err.to_string());
  }

  #[rxmarble_macro::test]
  fn accept_replays_into_an_observer() {
    let mut seen = vec![];
    let observer = FnMutObserver(|v: i32| seen.push(v));
    let observer = Notification::<i32, ()>::Next(1).accept(observer);
    assert!(observer.is_some());
    let observer = observer.and_then(|o| Notification::<i32, ()>::Complete.accept(o));
    assert!(observer.is_none());
    assert_eq!(seen, vec![1]);
  }
}
