//! # calsync Store
//!
//! Key/value store abstraction used as the substrate for distributed locks.
//!
//! Stores are **opaque string stores with expiry**. They know nothing about
//! lock tokens, semaphores or calendar data; the lock layer owns all
//! interpretation of keys and values.
//!
//! ## Design Principles
//!
//! - Three primitive operations: get, set-with-expiry, delete
//! - Read-after-write visibility for a single key
//! - Expired records are never returned
//! - Must be `Send + Sync` so one store can back every worker in a process
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For tests, demos and single-process deployments
//!
//! ## Example
//!
//! ```rust
//! use calsync_store::{InMemoryStore, KeyValueStore};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryStore::new();
//! store.set("greeting", "hello", Duration::from_secs(5)).await.unwrap();
//! assert_eq!(store.get("greeting").await.unwrap().as_deref(), Some("hello"));
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod clock;
mod error;
mod memory;

pub use backend::KeyValueStore;
pub use clock::instant_after;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
