//! Errors raised by the marble parser, the virtual clock and the run harness.

use std::time::Duration;

use thiserror::Error;

/// Every fallible operation of the crate returns this error.
///
/// An `Error` notification inside a timeline is data, not a `MarbleError`: it
/// only turns into [`MarbleError::Mismatch`] when it differs from what an
/// expectation asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarbleError {
  /// A marble or subscription diagram could not be parsed.
  #[error("invalid marble diagram {marbles:?} at position {position}: {reason}")]
  Syntax { marbles: String, position: usize, reason: String },

  /// `flush` was invoked on a run that already finished.
  #[error("the run was already flushed; start a new run to register more expectations")]
  AlreadyFlushed,

  /// `run` was invoked while the same runner is still configuring a run.
  #[error("a run is already in progress on this runner")]
  NestedRun,

  /// Drain found work due after the configured ceiling.
  #[error("scheduled work is due at {due:?}, after the maximum frame {ceiling:?}")]
  FrameCeilingExceeded { due: Duration, ceiling: Duration },

  /// Recorded notifications or subscription windows differ from the expected ones.
  #[error("{subject} mismatch: {diff}\n  expected: {expected}\n  actual:   {actual}")]
  Mismatch { subject: &'static str, expected: String, actual: String, diff: String },

  /// More than one expectation failed during one flush.
  #[error("{} expectations failed:\n{}", .0.len(), format_all(.0))]
  Multiple(Vec<MarbleError>),
}

impl MarbleError {
  pub(crate) fn syntax(marbles: &str, position: usize, reason: impl Into<String>) -> Self {
    MarbleError::Syntax { marbles: marbles.to_owned(), position, reason: reason.into() }
  }

  /// Whether this error (or any error it aggregates) is an assertion mismatch.
  pub fn is_mismatch(&self) -> bool {
    match self {
      MarbleError::Mismatch { .. } => true,
      MarbleError::Multiple(all) => all.iter().any(MarbleError::is_mismatch),
      _ => false,
    }
  }
}

fn format_all(errors: &[MarbleError]) -> String {
  errors
    .iter()
    .enumerate()
    .map(|(idx, err)| format!("[{idx}] {err}"))
    .collect::<Vec<_>>()
    .join("\n")
}
