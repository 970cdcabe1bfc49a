//! # calsync Core
//!
//! Concurrency and admission control for calsync.
//!
//! This crate provides:
//! - [`DistributedMutex`]: named locks backed by a [`KeyValueStore`], with
//!   token-checked release and expiry as a safety net against crashed holders
//! - [`Semaphore`]: an in-process FIFO counting semaphore
//! - [`DebounceCache`]: collapses identical in-flight requests into one execution
//! - [`ConcurrencyManager`]: the catalog of named critical sections
//!   (event edits, calendar sync, friend requests, AI and provider API limits,
//!   batch jobs) built on the primitives above
//!
//! ## Scheduling Domains
//!
//! Mutex ownership lives in the external store and is shared by every worker
//! that can reach it. Semaphores and the debounce cache are process-local and
//! only bound concurrency within one running instance.
//!
//! ## Example
//!
//! ```rust
//! use calsync_core::{ConcurrencyManager, CoreError, ManagerConfig};
//! use calsync_store::InMemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), CoreError> {
//! let manager = ConcurrencyManager::new(Arc::new(InMemoryStore::new()), ManagerConfig::default());
//!
//! let title = manager
//!     .with_event_lock("alice", "ev1", || async { Ok::<_, CoreError>("renamed".to_string()) })
//!     .await?;
//! assert_eq!(title, "renamed");
//! # Ok(())
//! # }
//! ```
//!
//! [`KeyValueStore`]: calsync_store::KeyValueStore

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod debounce;
mod error;
mod keys;
mod manager;
mod mutex;
mod semaphore;

pub use config::{LockOptions, ManagerConfig};
pub use debounce::DebounceCache;
pub use error::{CoreError, CoreResult};
pub use keys::LockKey;
pub use manager::{ConcurrencyManager, ConcurrencyStats};
pub use mutex::{DistributedMutex, LockToken};
pub use semaphore::{Semaphore, SemaphorePermit};
