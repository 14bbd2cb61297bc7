use std::{
  fmt,
  ops::{Add, AddAssign, Sub},
  time::Duration,
};

/// Position on a marble timeline, in virtual nanoseconds.
///
/// Frames are signed: a hot timeline may carry events before its `^` zero
/// point. The clock itself never goes below zero, see [`Frame::to_duration`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Frame(i64);

const NANOS_PER_MILLI: i64 = 1_000_000;

impl Frame {
  pub const ZERO: Frame = Frame(0);

  #[inline]
  pub const fn from_nanos(nanos: i64) -> Self { Frame(nanos) }

  #[inline]
  pub const fn from_micros(micros: i64) -> Self { Frame(micros * 1_000) }

  #[inline]
  pub const fn from_millis(millis: i64) -> Self { Frame(millis * NANOS_PER_MILLI) }

  #[inline]
  pub const fn as_nanos(self) -> i64 { self.0 }

  #[inline]
  pub const fn is_negative(self) -> bool { self.0 < 0 }

  /// The clock time of this frame, `None` before the zero point.
  pub fn to_duration(self) -> Option<Duration> {
    u64::try_from(self.0).ok().map(Duration::from_nanos)
  }
}

impl From<Duration> for Frame {
  /// Saturates at `i64::MAX` nanoseconds (about 292 years).
  fn from(d: Duration) -> Self { Frame(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)) }
}

impl Add<Duration> for Frame {
  type Output = Frame;

  fn add(self, rhs: Duration) -> Frame { Frame(self.0.saturating_add(Frame::from(rhs).0)) }
}

impl AddAssign<Duration> for Frame {
  fn add_assign(&mut self, rhs: Duration) { *self = *self + rhs; }
}

impl Sub for Frame {
  type Output = Frame;

  fn sub(self, rhs: Frame) -> Frame { Frame(self.0.saturating_sub(rhs.0)) }
}

impl fmt::Display for Frame {
  /// Milliseconds with trailing zeros trimmed: `2ms`, `10.2ms`, `-1ms`.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    let millis = abs / NANOS_PER_MILLI as u64;
    let rest = abs % NANOS_PER_MILLI as u64;
    if rest == 0 {
      write!(f, "{sign}{millis}ms")
    } else {
      let fraction = format!("{rest:06}");
      write!(f, "{sign}{millis}.{}ms", fraction.trim_end_matches('0'))
    }
  }
}

impl fmt::Debug for Frame {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxmarble_macro::test]
  fn display_in_millis() {
    assert_eq!(Frame::from_millis(2).to_string(), "2ms");
    assert_eq!(Frame::from_micros(10_200).to_string(), "10.2ms");
    assert_eq!(Frame::from_nanos(1).to_string(), "0.000001ms");
    assert_eq!(Frame::from_millis(-3).to_string(), "-3ms");
  }

  #[rxmarble_macro::test]
  fn negative_frames_have_no_clock_time() {
    assert_eq!(Frame::from_millis(-1).to_duration(), None);
    assert_eq!(Frame::from_millis(4).to_duration(), Some(Duration::from_millis(4)));
    assert_eq!(Frame::from(Duration::MAX), Frame::from_nanos(i64::MAX));
  }

  #[rxmarble_macro::test]
  fn arithmetic() {
    let mut frame = Frame::from_millis(-2);
    frame += Duration::from_millis(5);
    assert_eq!(frame, Frame::from_millis(3));
    assert_eq!(frame - Frame::from_millis(1), Frame::from_millis(2));
  }
}
