//! SQLite backend for the festive dispatcher.
//!
//! One [`SqliteStore`] implements all three collaborators: the preference
//! store, the contact directory, and the dedup ledger. It wraps
//! [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
