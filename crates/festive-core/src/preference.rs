//! Per-user occasion opt-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One `(user, occasion)` toggle. Rows are upserted (last write wins) and
/// never deleted; opting out stores `enabled = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
  pub user_id:     Uuid,
  pub occasion_id: String,
  pub enabled:     bool,
  pub updated_at:  DateTime<Utc>,
}
