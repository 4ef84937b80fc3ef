//! Run Monitoring Module
//!
//! Utilities for observing submitted workflow runs.
//!
//! # Components
//!
//! - [`StatusTimeline`]: Statuses observed while polling, with transitions
//!   and time spent per status

pub mod timeline;

pub use timeline::{Observation, StatusTimeline, Transition};
