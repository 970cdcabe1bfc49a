//! # calsync Testkit
//!
//! Test utilities for calsync.
//!
//! This crate provides:
//! - Calendar event fixtures on a fixed clock
//! - Property-based test generators using proptest
//! - A fault-injecting key/value store
//! - A tracker that records how many operations overlap in time
//!
//! ## Usage
//!
//! ```rust,ignore
//! use calsync_testkit::prelude::*;
//!
//! let tracker = ConcurrencyTracker::new();
//! mutex.with_lock("k", &options, || tracker.observe(work())).await?;
//! assert_eq!(tracker.max_concurrency(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod flaky;
pub mod generators;
pub mod tracker;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::flaky::*;
    pub use crate::generators::*;
    pub use crate::tracker::*;
}

pub use fixtures::*;
pub use flaky::*;
pub use generators::*;
pub use tracker::*;
