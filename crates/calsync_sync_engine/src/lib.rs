//! # calsync Sync Engine
//!
//! Client-side realtime synchronization for calsync.
//!
//! This crate provides:
//! - Sync state machine (idle → syncing → success | error, plus offline)
//! - Order-independent content hashing to publish only real changes
//! - Reconciliation of local edits through the conflict resolver
//! - A polling driver reacting to timer ticks, connectivity and visibility
//! - A transport-agnostic [`EventFetcher`] seam
//!
//! ## Architecture
//!
//! Each pass fetches the authoritative event set, hashes it and compares the
//! hash with the last one observed:
//! 1. Fetch the full event list through the fetcher
//! 2. Reconcile pending local edits against the server copies
//! 3. Publish the merged set to subscribers when anything changed
//!
//! ## Key Invariants
//!
//! - At most one pass is in flight per engine; overlapping triggers are dropped
//! - A failed pass never discards the last published set or stored hash
//! - Connectivity loss is reflected immediately, independent of in-flight passes
//! - Reconnecting or becoming visible forces exactly one immediate pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
mod error;
mod state;
mod transport;

pub use config::SyncConfig;
pub use driver::SyncHandle;
pub use error::{SyncError, SyncResult};
pub use state::{
    SkipReason, SyncCycleResult, SyncEngine, SyncOutcome, SyncSignal, SyncSnapshot, SyncStats,
    SyncStatus,
};
pub use transport::{EventFetcher, MockFetcher};
