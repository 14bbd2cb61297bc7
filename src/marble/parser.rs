//! Marble diagram parser.
//!
//! A timeline diagram reads left to right, one frame per character:
//!
//! | marker | meaning |
//! |---|---|
//! | `-` | one frame of silence |
//! | `a` | a value at the current frame, then one frame passes |
//! | `\|` | completion, nothing but whitespace or `)` may follow |
//! | `#` | error, same rule as `\|` |
//! | `(ab)` | every event of the group shares the frame of `(`; one frame passes at `)` |
//! | `^` | zero point of a hot timeline |
//! | `10ms` | with time literals enabled, at the start or after whitespace: that much time passes |
//!
//! Whitespace never takes time. A subscription diagram uses `^` for the
//! subscribe frame and `!` for the unsubscribe frame; `!` takes no time.
//!
//! Parsing is pure: the same input always yields the same timeline.

use std::{
  collections::{BTreeMap, HashMap},
  hash::BuildHasher,
  time::Duration,
};

use super::{frame::Frame, notification::TestMessage, subscription_log::SubscriptionLog};
use crate::error::MarbleError;

/// Conversion of a marble character into a value when no value map is given.
pub trait FromMarble: Sized {
  fn from_marble(c: char) -> Option<Self>;
}

impl FromMarble for char {
  #[inline]
  fn from_marble(c: char) -> Option<Self> { Some(c) }
}

impl FromMarble for String {
  #[inline]
  fn from_marble(c: char) -> Option<Self> { Some(c.to_string()) }
}

macro_rules! impl_from_marble_for_int {
  ($($t:ty),*) => {
    $(
      impl FromMarble for $t {
        #[inline]
        fn from_marble(c: char) -> Option<Self> {
          c.to_digit(10).and_then(|d| <$t>::try_from(d).ok())
        }
      }
    )*
  };
}

impl_from_marble_for_int!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// Lookup of the value a marble character stands for.
pub trait MarbleValues<Item> {
  fn value_of(&self, c: char) -> Option<Item>;
}

/// Every character stands for itself, converted through [`FromMarble`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Symbols;

impl<Item: FromMarble> MarbleValues<Item> for Symbols {
  #[inline]
  fn value_of(&self, c: char) -> Option<Item> { Item::from_marble(c) }
}

impl<Item: Clone, S: BuildHasher> MarbleValues<Item> for HashMap<char, Item, S> {
  fn value_of(&self, c: char) -> Option<Item> { self.get(&c).cloned() }
}

impl<Item: Clone> MarbleValues<Item> for BTreeMap<char, Item> {
  fn value_of(&self, c: char) -> Option<Item> { self.get(&c).cloned() }
}

impl<Item, V: MarbleValues<Item> + ?Sized> MarbleValues<Item> for &V {
  #[inline]
  fn value_of(&self, c: char) -> Option<Item> { (**self).value_of(c) }
}

/// Knobs of the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
  /// Virtual time one character stands for.
  pub frame_duration: Duration,
  /// Recognize time literals such as `10ms`.
  pub run_mode: bool,
  /// Allow the `^` zero point.
  pub hot: bool,
}

impl Default for ParseOptions {
  fn default() -> Self {
    ParseOptions { frame_duration: Duration::from_millis(1), run_mode: false, hot: false }
  }
}

impl ParseOptions {
  #[must_use]
  pub fn frame_duration(mut self, frame_duration: Duration) -> Self {
    self.frame_duration = frame_duration;
    self
  }

  #[must_use]
  pub fn run_mode(mut self, run_mode: bool) -> Self {
    self.run_mode = run_mode;
    self
  }

  #[must_use]
  pub fn hot(mut self, hot: bool) -> Self {
    self.hot = hot;
    self
  }
}

struct Cursor<'a> {
  marbles: &'a str,
  chars: Vec<char>,
  pos: usize,
  frame: Frame,
  unit: Duration,
  run_mode: bool,
  group: Option<(Frame, usize)>,
}

impl<'a> Cursor<'a> {
  fn new(marbles: &'a str, options: &ParseOptions) -> Self {
    Cursor {
      marbles,
      chars: marbles.chars().collect(),
      pos: 0,
      frame: Frame::ZERO,
      unit: options.frame_duration,
      run_mode: options.run_mode,
      group: None,
    }
  }

  fn error(&self, reason: impl Into<String>) -> MarbleError {
    MarbleError::syntax(self.marbles, self.pos, reason)
  }

  /// Frame of an event at the cursor.
  fn event_frame(&self) -> Frame { self.group.map_or(self.frame, |(start, _)| start) }

  /// One frame passes, unless inside a group.
  fn tick(&mut self) {
    if self.group.is_none() {
      self.frame += self.unit;
    }
  }

  fn open_group(&mut self) -> Result<(), MarbleError> {
    if self.group.is_some() {
      return Err(self.error("nested group"));
    }
    self.group = Some((self.frame, self.pos));
    Ok(())
  }

  fn close_group(&mut self) -> Result<(), MarbleError> {
    let Some((start, _)) = self.group.take() else {
      return Err(self.error("')' without a matching '('"));
    };
    self.frame = start + self.unit;
    Ok(())
  }

  fn silence(&mut self) -> Result<(), MarbleError> {
    if self.group.is_some() {
      return Err(self.error("'-' inside a group"));
    }
    self.tick();
    Ok(())
  }

  fn finish(&self) -> Result<(), MarbleError> {
    match self.group {
      Some((_, open)) => Err(MarbleError::syntax(self.marbles, open, "unclosed group")),
      None => Ok(()),
    }
  }

  /// Consume a time literal at the cursor, if there is one.
  fn time_literal(&mut self) -> Result<bool, MarbleError> {
    if !self.run_mode {
      return Ok(false);
    }
    let at_boundary = self.pos == 0 || self.chars[self.pos - 1].is_whitespace();
    if !at_boundary {
      return Ok(false);
    }
    let Some((duration, end)) = scan_time_literal(self.marbles, &self.chars, self.pos)? else {
      return Ok(false);
    };
    if self.group.is_some() {
      return Err(self.error("time literal inside a group"));
    }
    self.frame += duration;
    self.pos = end;
    Ok(true)
  }
}

/// `[0-9]+(\.[0-9]+)?(ms|s|m)` followed by whitespace. Returns the duration
/// and the position right after the unit.
fn scan_time_literal(
  marbles: &str, chars: &[char], start: usize,
) -> Result<Option<(Duration, usize)>, MarbleError> {
  let digits_end = |from: usize| {
    let mut i = from;
    while i < chars.len() && chars[i].is_ascii_digit() {
      i += 1;
    }
    i
  };

  let int_end = digits_end(start);
  if int_end == start {
    return Ok(None);
  }
  let mut end = int_end;
  let mut fraction = &chars[int_end..int_end];
  if chars.get(end) == Some(&'.') {
    let frac_end = digits_end(end + 1);
    if frac_end == end + 1 {
      return Ok(None);
    }
    fraction = &chars[end + 1..frac_end];
    end = frac_end;
  }

  let (unit_nanos, unit_len): (u128, usize) = match (chars.get(end), chars.get(end + 1)) {
    (Some('m'), Some('s')) => (1_000_000, 2),
    (Some('s'), _) => (1_000_000_000, 1),
    (Some('m'), _) => (60_000_000_000, 1),
    _ => return Ok(None),
  };
  end += unit_len;
  if !chars.get(end).is_some_and(|c| c.is_whitespace()) {
    return Ok(None);
  }

  let out_of_range = || MarbleError::syntax(marbles, start, "time literal out of range");
  let to_number = |digits: &[char]| -> Option<u128> {
    digits
      .iter()
      .try_fold(0u128, |acc, c| acc.checked_mul(10)?.checked_add(c.to_digit(10)? as u128))
  };

  let int = to_number(&chars[start..int_end]).ok_or_else(out_of_range)?;
  let frac = to_number(fraction).ok_or_else(out_of_range)?;
  let scale = 10u128
    .checked_pow(fraction.len() as u32)
    .ok_or_else(out_of_range)?;
  let nanos = int
    .checked_mul(scale)
    .and_then(|v| v.checked_add(frac))
    .and_then(|v| v.checked_mul(unit_nanos))
    .map(|v| v / scale)
    .and_then(|v| u64::try_from(v).ok())
    .ok_or_else(out_of_range)?;
  Ok(Some((Duration::from_nanos(nanos), end)))
}

/// Parse a timeline diagram into the notifications it describes.
///
/// Values come from `values`; `#` carries `error` or `Err::default()`. With
/// `options.hot`, frames are relative to `^` and may be negative.
pub fn parse_timeline<Item, Err, V>(
  marbles: &str, values: &V, error: Option<Err>, options: ParseOptions,
) -> Result<Vec<TestMessage<Item, Err>>, MarbleError>
where
  Err: Clone + Default,
  V: MarbleValues<Item> + ?Sized,
{
  let mut cursor = Cursor::new(marbles, &options);
  let mut messages = vec![];
  let mut zero: Option<Frame> = None;
  let mut terminated = false;

  while cursor.pos < cursor.chars.len() {
    let c = cursor.chars[cursor.pos];
    if c.is_whitespace() {
      cursor.pos += 1;
      continue;
    }
    if terminated && c != ')' {
      return Err(cursor.error(format!("unexpected '{c}' after the terminal notification")));
    }
    if cursor.time_literal()? {
      continue;
    }

    let at = cursor.event_frame();
    match c {
      '-' => cursor.silence()?,
      '(' => cursor.open_group()?,
      ')' => cursor.close_group()?,
      '^' => {
        if !options.hot {
          return Err(cursor.error("'^' is only allowed in hot timelines"));
        }
        if zero.is_some() {
          return Err(cursor.error("duplicate '^'"));
        }
        zero = Some(at);
        cursor.tick();
      }
      '!' => return Err(cursor.error("'!' is only allowed in subscription diagrams")),
      '|' => {
        messages.push(TestMessage::complete(at));
        terminated = true;
        cursor.tick();
      }
      '#' => {
        messages.push(TestMessage::error(at, error.clone().unwrap_or_default()));
        terminated = true;
        cursor.tick();
      }
      value => {
        let Some(value) = values.value_of(value) else {
          return Err(cursor.error(format!("no value for '{value}'")));
        };
        messages.push(TestMessage::next(at, value));
        cursor.tick();
      }
    }
    cursor.pos += 1;
  }
  cursor.finish()?;

  if let Some(zero) = zero {
    for message in messages.iter_mut() {
      message.frame = message.frame - zero;
    }
  }
  Ok(messages)
}

/// Parse a subscription diagram such as `"--^---!"` or `"(^!)"`.
pub fn parse_subscription_window(
  marbles: &str, options: ParseOptions,
) -> Result<SubscriptionLog, MarbleError> {
  let mut cursor = Cursor::new(marbles, &options);
  let mut subscribed: Option<Frame> = None;
  let mut unsubscribed: Option<Frame> = None;

  while cursor.pos < cursor.chars.len() {
    let c = cursor.chars[cursor.pos];
    if c.is_whitespace() {
      cursor.pos += 1;
      continue;
    }
    if cursor.time_literal()? {
      continue;
    }

    let at = cursor.event_frame();
    match c {
      '-' => cursor.silence()?,
      '(' => cursor.open_group()?,
      ')' => cursor.close_group()?,
      '^' => {
        if subscribed.is_some() {
          return Err(cursor.error("duplicate '^'"));
        }
        subscribed = Some(at);
        cursor.tick();
      }
      '!' => {
        if subscribed.is_none() {
          return Err(cursor.error("'!' before '^'"));
        }
        if unsubscribed.is_some() {
          return Err(cursor.error("duplicate '!'"));
        }
        unsubscribed = Some(at);
      }
      other => {
        return Err(cursor.error(format!("unexpected '{other}' in a subscription diagram")));
      }
    }
    cursor.pos += 1;
  }
  cursor.finish()?;

  match subscribed {
    Some(subscribed) => Ok(SubscriptionLog { subscribed, unsubscribed }),
    None => Err(MarbleError::syntax(marbles, 0, "missing '^'")),
  }
}

/// Parse one subscription diagram per expected window.
pub fn parse_subscription_windows(
  marbles: &[&str], options: ParseOptions,
) -> Result<Vec<SubscriptionLog>, MarbleError> {
  marbles
    .iter()
    .map(|m| parse_subscription_window(m, options))
    .collect()
}

/// Frame of the `|` marker, e.g. to compute a delay from a diagram.
pub fn parse_time(marbles: &str, options: ParseOptions) -> Result<Frame, MarbleError> {
  parse_timeline::<char, (), _>(marbles, &Symbols, None, options)?
    .into_iter()
    .find(|m| matches!(m.notification, super::notification::Notification::Complete))
    .map(|m| m.frame)
    .ok_or_else(|| MarbleError::syntax(marbles, 0, "no '|' marker"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::marble::notification::TestError;

  type Messages<Item> = Vec<TestMessage<Item, TestError>>;

  fn ms(v: i64) -> Frame { Frame::from_millis(v) }

  fn parse(marbles: &str) -> Result<Messages<char>, MarbleError> {
    parse_timeline(marbles, &Symbols, None, ParseOptions::default())
  }

  fn run_mode(marbles: &str) -> Result<Messages<char>, MarbleError> {
    parse_timeline(marbles, &Symbols, None, ParseOptions::default().run_mode(true))
  }

  #[rxmarble_macro::test]
  fn values_from_a_map() {
    let values = HashMap::from([('a', "A"), ('b', "B")]);
    let messages: Vec<TestMessage<&str, TestError>> =
      parse_timeline("--a--b--|", &values, None, ParseOptions::default()).unwrap();
    assert_eq!(
      messages,
      vec![
        TestMessage::next(ms(2), "A"),
        TestMessage::next(ms(5), "B"),
        TestMessage::complete(ms(8)),
      ]
    );
  }

  #[rxmarble_macro::test]
  fn groups_share_a_frame() {
    assert_eq!(
      parse("-(ab)-c|").unwrap(),
      vec![
        TestMessage::next(ms(1), 'a'),
        TestMessage::next(ms(1), 'b'),
        TestMessage::next(ms(3), 'c'),
        TestMessage::complete(ms(4)),
      ]
    );
    assert_eq!(
      parse("--(b|)").unwrap(),
      vec![TestMessage::next(ms(2), 'b'), TestMessage::complete(ms(2))]
    );
  }

  #[rxmarble_macro::test]
  fn error_value() {
    let messages: Messages<char> = parse_timeline(
      "-#",
      &Symbols,
      Some(TestError::named("TypeError", "boom")),
      ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(messages, vec![TestMessage::error(ms(1), TestError::named("TypeError", "boom"))]);
    assert_eq!(parse("#").unwrap(), vec![TestMessage::error(ms(0), TestError::default())]);
  }

  #[rxmarble_macro::test]
  fn whitespace_is_ignored() {
    assert_eq!(parse("  -a  -|  ").unwrap(), parse("-a-|").unwrap());
  }

  #[rxmarble_macro::test]
  fn frame_duration_scales_frames() {
    let options = ParseOptions::default().frame_duration(Duration::from_millis(10));
    let messages: Messages<char> = parse_timeline("-a|", &Symbols, None, options).unwrap();
    assert_eq!(messages, vec![TestMessage::next(ms(10), 'a'), TestMessage::complete(ms(20))]);
  }

  #[rxmarble_macro::test]
  fn digits_convert_to_numbers() {
    let messages: Vec<TestMessage<i32, TestError>> =
      parse_timeline("1-2|", &Symbols, None, ParseOptions::default()).unwrap();
    assert_eq!(
      messages,
      vec![TestMessage::next(ms(0), 1), TestMessage::next(ms(2), 2), TestMessage::complete(ms(3))]
    );
    let err =
      parse_timeline::<i32, TestError, _>("x", &Symbols, None, ParseOptions::default()).unwrap_err();
    assert!(matches!(err, MarbleError::Syntax { position: 0, .. }));
  }

  #[rxmarble_macro::test]
  fn time_literals() {
    assert_eq!(
      run_mode("10ms a 1.2s b 1m |").unwrap(),
      vec![
        TestMessage::next(ms(10), 'a'),
        TestMessage::next(ms(1211), 'b'),
        TestMessage::complete(ms(61_212)),
      ]
    );
    assert_eq!(
      run_mode("a 10.2ms b|").unwrap(),
      vec![TestMessage::next(ms(0), 'a'), TestMessage::next(Frame::from_micros(11_200), 'b'), TestMessage::complete(Frame::from_micros(12_200))]
    );
  }

  #[rxmarble_macro::test]
  fn time_literal_needs_whitespace_around() {
    // Not at a boundary: plain values
    assert_eq!(run_mode("a5ms|").unwrap().len(), 5);
    // Not followed by whitespace: plain values
    assert_eq!(run_mode("5ms|").unwrap().len(), 4);
    // Literal mode off: plain values
    assert_eq!(parse("5ms |").unwrap().len(), 4);
  }

  #[rxmarble_macro::test]
  fn hot_zero_point() {
    let hot = ParseOptions::default().hot(true);
    let messages: Messages<char> = parse_timeline("a-^-b-|", &Symbols, None, hot).unwrap();
    assert_eq!(
      messages,
      vec![TestMessage::next(ms(-2), 'a'), TestMessage::next(ms(2), 'b'), TestMessage::complete(ms(4))]
    );
  }

  #[rxmarble_macro::test]
  fn syntax_errors_name_the_position() {
    let position = |marbles: &str| match parse(marbles) {
      Err(MarbleError::Syntax { position, .. }) => position,
      other => panic!("expected a syntax error for {marbles:?}, got {other:?}"),
    };
    assert_eq!(position("--^--|"), 2);
    assert_eq!(position("-a|b"), 3);
    assert_eq!(position("-#-"), 2);
    assert_eq!(position("(a(b))"), 2);
    assert_eq!(position("a)"), 1);
    assert_eq!(position("-(ab"), 1);
    assert_eq!(position("(a-b)"), 2);
    assert_eq!(position("--!"), 2);
    let hot = ParseOptions::default().hot(true);
    assert!(parse_timeline::<char, TestError, _>("^-^", &Symbols, None, hot).is_err());
    assert!(run_mode("( 10ms a)").is_err());
  }

  #[rxmarble_macro::test]
  fn subscription_windows() {
    let options = ParseOptions::default();
    assert_eq!(
      parse_subscription_window("---^---!", options).unwrap(),
      SubscriptionLog { subscribed: ms(3), unsubscribed: Some(ms(7)) }
    );
    assert_eq!(
      parse_subscription_window("---(^!)", options).unwrap(),
      SubscriptionLog { subscribed: ms(3), unsubscribed: Some(ms(3)) }
    );
    assert_eq!(
      parse_subscription_window("  ^  ", options).unwrap(),
      SubscriptionLog { subscribed: ms(0), unsubscribed: None }
    );
    assert_eq!(
      parse_subscription_window("^ 1s !", options.run_mode(true)).unwrap(),
      SubscriptionLog { subscribed: ms(0), unsubscribed: Some(ms(1001)) }
    );
    assert_eq!(
      parse_subscription_windows(&["^-!", "-^"], options).unwrap(),
      vec![
        SubscriptionLog { subscribed: ms(0), unsubscribed: Some(ms(2)) },
        SubscriptionLog { subscribed: ms(1), unsubscribed: None },
      ]
    );
  }

  #[rxmarble_macro::test]
  fn malformed_subscription_windows() {
    let options = ParseOptions::default();
    for marbles in ["---", "!^", "^^", "^!!", "^-a-!", "(^", "^)"] {
      assert!(
        parse_subscription_window(marbles, options).is_err(),
        "{marbles:?} should not parse"
      );
    }
  }

  #[rxmarble_macro::test]
  fn time_of_the_completion_marker() {
    assert_eq!(parse_time("-----|", ParseOptions::default()).unwrap(), ms(5));
    assert!(parse_time("--a--", ParseOptions::default()).is_err());
  }
}
