//! [`SqliteStore`], the SQLite implementation of the collaborator traits.

use std::path::Path;

use chrono::Utc;
use festive_core::{
  contact::{Contact, ContactStatus, NewContact, UserProfile},
  ledger::{DispatchKey, DispatchRecord, Reservation},
  preference::UserPreference,
  store::{ContactDirectory, DispatchLedger, PreferenceStore},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawContact, RawPreference, RawProfile, RawRecord, decode_uuid, encode_dt,
    encode_markets, encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Users, contacts, preferences and the dedup ledger in one SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. All clones
/// share one connection thread, which serialises statements.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Directory writes ──────────────────────────────────────────────────────

  /// Insert or replace a user profile.
  pub async fn add_user(&self, profile: &UserProfile) -> Result<()> {
    let id_str      = encode_uuid(profile.user_id);
    let email       = profile.email.clone();
    let full_name   = profile.full_name.clone();
    let company     = profile.company.clone();
    let markets_str = encode_markets(&profile.markets)?;
    let at_str      = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, email, full_name, company, markets, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(user_id) DO UPDATE SET
             email     = excluded.email,
             full_name = excluded.full_name,
             company   = excluded.company,
             markets   = excluded.markets",
          rusqlite::params![id_str, email, full_name, company, markets_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Add a contact to an existing user's list.
  pub async fn add_contact(&self, input: NewContact) -> Result<Contact> {
    let contact = Contact {
      contact_id:   Uuid::new_v4(),
      user_id:      input.user_id,
      email:        input.email,
      display_name: input.display_name,
      status:       input.status,
    };

    let id_str      = encode_uuid(contact.contact_id);
    let user_id_str = encode_uuid(contact.user_id);
    let email       = contact.email.clone();
    let name        = contact.display_name.clone();
    let status_str  = encode_status(contact.status);
    let at_str      = encode_dt(Utc::now());

    let user_exists = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![user_id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO contacts (contact_id, user_id, email, display_name, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, user_id_str, email, name, status_str, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !user_exists {
      return Err(Error::UserNotFound(contact.user_id));
    }
    Ok(contact)
  }

  /// Change a contact's status (e.g. after conversion to a client).
  pub async fn set_contact_status(&self, contact_id: Uuid, status: ContactStatus) -> Result<()> {
    let id_str     = encode_uuid(contact_id);
    let status_str = encode_status(status);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contacts SET status = ?2 WHERE contact_id = ?1",
          rusqlite::params![id_str, status_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ContactNotFound(contact_id));
    }
    Ok(())
  }
}

// ─── PreferenceStore impl ────────────────────────────────────────────────────

impl PreferenceStore for SqliteStore {
  type Error = Error;

  async fn enabled_users<'a>(&'a self, occasion_id: &'a str) -> Result<Vec<Uuid>> {
    let occasion_id = occasion_id.to_owned();

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id FROM preferences
           WHERE occasion_id = ?1 AND enabled = 1
           ORDER BY user_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![occasion_id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn preferences(&self, user_id: Uuid) -> Result<Vec<UserPreference>> {
    let user_id_str = encode_uuid(user_id);

    let raws: Vec<RawPreference> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, occasion_id, enabled, updated_at
           FROM preferences WHERE user_id = ?1
           ORDER BY occasion_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id_str], RawPreference::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPreference::into_preference).collect()
  }

  async fn set_preference<'a>(
    &'a self,
    user_id:     Uuid,
    occasion_id: &'a str,
    enabled:     bool,
  ) -> Result<UserPreference> {
    let preference = UserPreference {
      user_id,
      occasion_id: occasion_id.to_owned(),
      enabled,
      updated_at: Utc::now(),
    };

    let user_id_str = encode_uuid(user_id);
    let occasion    = preference.occasion_id.clone();
    let at_str      = encode_dt(preference.updated_at);

    let user_exists = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![user_id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO preferences (user_id, occasion_id, enabled, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(user_id, occasion_id) DO UPDATE SET
             enabled    = excluded.enabled,
             updated_at = excluded.updated_at",
          rusqlite::params![user_id_str, occasion, enabled, at_str],
        )?;
        Ok(true)
      })
      .await?;

    if !user_exists {
      return Err(Error::UserNotFound(user_id));
    }
    Ok(preference)
  }
}

// ─── ContactDirectory impl ───────────────────────────────────────────────────

impl ContactDirectory for SqliteStore {
  type Error = Error;

  async fn active_contacts(&self, user_id: Uuid) -> Result<Vec<Contact>> {
    let user_id_str = encode_uuid(user_id);
    let active      = encode_status(ContactStatus::Active);

    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT contact_id, user_id, email, display_name, status
           FROM contacts
           WHERE user_id = ?1 AND status = ?2
           ORDER BY created_at, contact_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_id_str, active], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }

  async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
    let user_id_str = encode_uuid(user_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, email, full_name, company, markets
               FROM users WHERE user_id = ?1",
              rusqlite::params![user_id_str],
              |row| {
                Ok(RawProfile {
                  user_id:   row.get(0)?,
                  email:     row.get(1)?,
                  full_name: row.get(2)?,
                  company:   row.get(3)?,
                  markets:   row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }
}

// ─── DispatchLedger impl ─────────────────────────────────────────────────────

impl DispatchLedger for SqliteStore {
  type Error = Error;

  async fn try_reserve<'a>(&'a self, key: &'a DispatchKey) -> Result<Reservation> {
    let occasion       = key.occasion_id.clone();
    let contact_id_str = encode_uuid(key.contact_id);
    let year           = key.occasion_year;
    let at_str         = encode_dt(Utc::now());

    // The primary key makes this the reservation primitive: of any number of
    // concurrent inserts for one triple, exactly one affects a row.
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO dispatch_records (occasion_id, contact_id, occasion_year, reserved_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(occasion_id, contact_id, occasion_year) DO NOTHING",
          rusqlite::params![occasion, contact_id_str, year, at_str],
        )?)
      })
      .await?;

    Ok(if inserted == 1 {
      Reservation::Reserved
    } else {
      Reservation::AlreadyReserved
    })
  }

  async fn commit<'a>(&'a self, key: &'a DispatchKey, message_id: &'a str) -> Result<()> {
    let occasion       = key.occasion_id.clone();
    let contact_id_str = encode_uuid(key.contact_id);
    let year           = key.occasion_year;
    let message_id     = message_id.to_owned();
    let at_str         = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE dispatch_records SET sent_at = ?4, message_id = ?5
           WHERE occasion_id = ?1 AND contact_id = ?2 AND occasion_year = ?3
             AND sent_at IS NULL",
          rusqlite::params![occasion, contact_id_str, year, at_str, message_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn release<'a>(&'a self, key: &'a DispatchKey) -> Result<()> {
    let occasion       = key.occasion_id.clone();
    let contact_id_str = encode_uuid(key.contact_id);
    let year           = key.occasion_year;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM dispatch_records
           WHERE occasion_id = ?1 AND contact_id = ?2 AND occasion_year = ?3
             AND sent_at IS NULL",
          rusqlite::params![occasion, contact_id_str, year],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_reserved<'a>(&'a self, key: &'a DispatchKey) -> Result<bool> {
    let occasion       = key.occasion_id.clone();
    let contact_id_str = encode_uuid(key.contact_id);
    let year           = key.occasion_year;

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM dispatch_records
               WHERE occasion_id = ?1 AND contact_id = ?2 AND occasion_year = ?3",
              rusqlite::params![occasion, contact_id_str, year],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn records<'a>(
    &'a self,
    occasion_id:   Option<&'a str>,
    occasion_year: Option<i32>,
  ) -> Result<Vec<DispatchRecord>> {
    let occasion = occasion_id.map(str::to_owned);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT occasion_id, contact_id, occasion_year, reserved_at, sent_at, message_id
           FROM dispatch_records
           WHERE (?1 IS NULL OR occasion_id = ?1)
             AND (?2 IS NULL OR occasion_year = ?2)
           ORDER BY reserved_at DESC, occasion_id, contact_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![occasion, occasion_year], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn prune_before(&self, year: i32) -> Result<usize> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM dispatch_records WHERE occasion_year < ?1",
          rusqlite::params![year],
        )?)
      })
      .await?;
    Ok(deleted)
  }
}
