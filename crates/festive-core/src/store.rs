//! Collaborator traits for the dispatch engine.
//!
//! The traits are implemented by storage backends (e.g.
//! `festive-store-sqlite`). The engine and the HTTP layer depend on these
//! abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used from tasks
//! spawned on a multi-threaded runtime.

use std::future::Future;

use uuid::Uuid;

use crate::{
  contact::{Contact, UserProfile},
  ledger::{DispatchKey, DispatchRecord, Reservation},
  preference::UserPreference,
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Error type shared by every collaborator.
///
/// A systemic error (lost connection, unreadable database) means further
/// lookups are pointless and the run must abort. Anything else is scoped to
/// the occasion, user, or contact that triggered it.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_systemic(&self) -> bool;
}

// ─── Preferences ─────────────────────────────────────────────────────────────

/// Per-user occasion opt-in.
pub trait PreferenceStore: Send + Sync {
  type Error: StoreError;

  /// Users who currently have `occasion_id` enabled. Order is stable.
  fn enabled_users<'a>(
    &'a self,
    occasion_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + 'a;

  /// Every stored toggle for `user_id`.
  fn preferences(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<UserPreference>, Self::Error>> + Send + '_;

  /// Upsert one toggle (last write wins).
  fn set_preference<'a>(
    &'a self,
    user_id: Uuid,
    occasion_id: &'a str,
    enabled: bool,
  ) -> impl Future<Output = Result<UserPreference, Self::Error>> + Send + 'a;
}

// ─── Contacts ────────────────────────────────────────────────────────────────

/// Read access to users and their contact lists.
pub trait ContactDirectory: Send + Sync {
  type Error: StoreError;

  /// Contacts of `user_id` with [`ContactStatus::Active`](crate::contact::ContactStatus::Active).
  fn active_contacts(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Personalisation details for `user_id`. `None` if the user is unknown.
  fn profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>> + Send + '_;
}

// ─── Dedup ledger ────────────────────────────────────────────────────────────

/// The durable at-most-once reservation ledger.
///
/// `try_reserve` must be atomic: of any number of concurrent callers with the
/// same key, exactly one observes [`Reservation::Reserved`]. Backends achieve
/// this with a uniqueness constraint and an insert-if-absent, never a
/// check-then-insert.
pub trait DispatchLedger: Send + Sync {
  type Error: StoreError;

  fn try_reserve<'a>(
    &'a self,
    key: &'a DispatchKey,
  ) -> impl Future<Output = Result<Reservation, Self::Error>> + Send + 'a;

  /// Mark a reservation as delivered. Committed rows are never changed again.
  fn commit<'a>(
    &'a self,
    key: &'a DispatchKey,
    message_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Drop an uncommitted reservation so a later run may retry. Committed rows
  /// are left untouched.
  fn release<'a>(
    &'a self,
    key: &'a DispatchKey,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Read-only presence check, used by dry runs.
  fn is_reserved<'a>(
    &'a self,
    key: &'a DispatchKey,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Ledger rows, optionally filtered, newest reservation first.
  fn records<'a>(
    &'a self,
    occasion_id: Option<&'a str>,
    occasion_year: Option<i32>,
  ) -> impl Future<Output = Result<Vec<DispatchRecord>, Self::Error>> + Send + 'a;

  /// Delete rows whose occasion-year is before `year`. Returns the count.
  fn prune_before(
    &self,
    year: i32,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
