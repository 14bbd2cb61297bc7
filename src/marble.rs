//! Marble testing.
//!
//! Timelines are drawn as ASCII diagrams, one character per frame:
//!
//! ```text
//! source:   --a--b--|
//! expected: ---(ab)-#
//! ```
//!
//! [`MarbleRunner`] installs a virtual clock, hands the body [`RunHelpers`]
//! to build [`ColdObservable`]s and [`HotObservable`]s from diagrams and to
//! register expectations, then drains the clock and compares what was
//! recorded against what was drawn. See [`parser`] for the grammar.

pub mod cold;
pub mod expectation;
pub mod frame;
pub mod hot;
pub mod notification;
pub mod parser;
pub mod runner;
pub mod subscription_log;

pub use cold::{ColdObservable, ColdSubscription};
pub use expectation::{ObservableExpectation, RecordingObserver, SubscriptionsExpectation};
pub use frame::Frame;
pub use hot::{HotObservable, HotSubscription};
pub use notification::{Notification, TestError, TestMessage};
pub use parser::{
  parse_subscription_window, parse_subscription_windows, parse_time, parse_timeline, FromMarble,
  MarbleValues, ParseOptions, Symbols,
};
pub use runner::{MarbleRunner, RunConfig, RunHelpers, RunPhase};
pub use subscription_log::{SubscriptionLog, SubscriptionLogs};
