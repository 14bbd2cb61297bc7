//! Prelude module for convenient imports

pub use crate::{
  error::MarbleError,
  marble::{
    ColdObservable, Frame, FromMarble, HotObservable, MarbleRunner, MarbleValues, Notification,
    ParseOptions, RunConfig, RunHelpers, SubscriptionLog, SubscriptionLogs, Symbols, TestError,
    TestMessage,
  },
  observable::{CoreObservable, ObservableExt, ObservableType},
  observer::Observer,
  scheduler::{
    AmbientScheduler, Duration, Scheduler, SchedulerExt, TaskHandle, TaskState, TestScheduler,
  },
  subscription::{LocalSubscription, Subscription},
};
