//! The dispatch engine.
//!
//! A [`Dispatcher`] turns one target date into greetings: it matches the
//! occasion calendar, discovers opted-in users and their active contacts, and
//! fans the sends out over a bounded worker pool. Every send is gated by the
//! dedup ledger, so overlapping runs for the same day never greet a contact
//! twice.

pub mod config;
mod engine;
pub mod error;

pub use config::DispatchConfig;
pub use engine::Dispatcher;
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
