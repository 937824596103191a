use std::time::Duration;

use festive_core::template::DEFAULT_RECIPIENT_NAME;
use serde::{Deserialize, Serialize};

/// Tuning knobs for a dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
  /// Maximum number of sends in flight at once.
  pub concurrency:            usize,
  /// Upper bound on a single transport call.
  pub send_timeout_secs:      u64,
  /// Copy the sending user on every greeting.
  pub copy_sender:            bool,
  /// Substituted for `{{recipient_name}}` when a contact has no name.
  pub default_recipient_name: String,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      concurrency:            5,
      send_timeout_secs:      30,
      copy_sender:            false,
      default_recipient_name: DEFAULT_RECIPIENT_NAME.to_owned(),
    }
  }
}

impl DispatchConfig {
  pub fn send_timeout(&self) -> Duration { Duration::from_secs(self.send_timeout_secs) }

  /// Pool size; a configured zero still allows one send.
  pub(crate) fn permits(&self) -> usize { self.concurrency.max(1) }
}
