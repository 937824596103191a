//! Contacts and the users who own them.
//!
//! Both are owned by an external directory; this crate only needs the
//! attributes that feed eligibility and personalisation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle of a contact in the owner's list.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContactStatus {
  Active,
  Inactive,
  /// The contact became a client; occasion greetings stop.
  Converted,
}

/// A recipient owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id:   Uuid,
  pub user_id:      Uuid,
  pub email:        String,
  pub display_name: Option<String>,
  pub status:       ContactStatus,
}

impl Contact {
  /// Only active contacts receive occasion greetings.
  pub fn is_eligible(&self) -> bool { self.status == ContactStatus::Active }
}

/// Input to `add_contact` on a directory backend.
#[derive(Debug, Clone)]
pub struct NewContact {
  pub user_id:      Uuid,
  pub email:        String,
  pub display_name: Option<String>,
  pub status:       ContactStatus,
}

impl NewContact {
  /// An active contact with no display name.
  pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
    Self {
      user_id,
      email: email.into(),
      display_name: None,
      status: ContactStatus::Active,
    }
  }

  pub fn named(mut self, display_name: impl Into<String>) -> Self {
    self.display_name = Some(display_name.into());
    self
  }

  pub fn with_status(mut self, status: ContactStatus) -> Self {
    self.status = status;
    self
  }
}

/// The sending user, as far as personalisation is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub user_id:   Uuid,
  pub email:     String,
  pub full_name: Option<String>,
  pub company:   Option<String>,
  /// Markets the user works in, most important first.
  #[serde(default)]
  pub markets:   Vec<String>,
}

impl UserProfile {
  pub fn primary_market(&self) -> Option<&str> {
    self.markets.first().map(String::as_str)
  }
}
