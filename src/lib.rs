//! # rxmarble: virtual time and marble diagrams for Reactive Extensions
//!
//! Time-based operators are tested against a virtual clock instead of the
//! wall clock: work is queued by due time and runs, in order, only when the
//! clock is advanced. On top of it sits a marble harness that turns ASCII
//! timelines into synthetic sources and expectations.
//!
//! ```rust
//! use rxmarble::prelude::*;
//!
//! MarbleRunner::new()
//!   .run(|h| {
//!     let e1 = h.cold::<char>("-a--b-|")?;
//!     let e2 = h.cold::<char>("--c--d---|")?;
//!     h.expect_observable(e1.merge(e2)).to_be("-ac-bd---|")
//!   })
//!   .unwrap();
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TestScheduler`] | Virtual clock and action queue |
//! | [`MarbleRunner`] | Runs a test body and checks its expectations |
//! | [`ObservableExt`] | Operators used to drive the clock |
//! | [`Observer`] | Consumes `next`, `error`, and `complete` events |
//! | [`Subscription`] | Handle to cancel an active subscription |
//!
//! [`TestScheduler`]: scheduler::TestScheduler
//! [`MarbleRunner`]: marble::MarbleRunner
//! [`ObservableExt`]: observable::ObservableExt
//! [`Observer`]: observer::Observer
//! [`Subscription`]: subscription::Subscription

pub mod error;
pub mod marble;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod subscription;

pub use error::MarbleError;
pub use prelude::*;
