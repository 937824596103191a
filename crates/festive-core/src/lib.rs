//! Core types and trait definitions for the festive greeting dispatcher.
//!
//! This crate has no HTTP, database, or runtime dependencies. It owns the
//! occasion calendar, template rendering, the dedup-ledger vocabulary, and
//! the collaborator traits the engine is built against.

pub mod calendar;
pub mod computus;
pub mod contact;
pub mod error;
pub mod ledger;
pub mod occasion;
pub mod preference;
pub mod stats;
pub mod store;
pub mod target;
pub mod template;
pub mod transport;

pub use error::{Error, Result};
