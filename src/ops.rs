//! Operators used to drive the virtual clock from consumer pipelines.
//!
//! `delay` and `buffer_time` take their scheduler explicitly; the rest are
//! plain combinators over subscriptions.

pub mod buffer_time;
pub mod combine_latest;
pub mod delay;
pub mod map;
pub mod merge;
pub mod take;
