//! # calsync Protocol
//!
//! Shared data model for calsync.
//!
//! This crate provides:
//! - [`CalendarEvent`], the unit the sync engine fetches and publishes
//! - [`ContentHash`], an order-independent digest over an event set
//! - The conflict resolver: [`resolve`] with a [`ConflictStrategy`]
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod event;
mod hash;

pub use conflict::{resolve, resolve_at, Conflict, ConflictStrategy, ParseStrategyError, Resolution};
pub use event::CalendarEvent;
pub use hash::ContentHash;
