//! `{{placeholder}}` substitution for occasion templates.
//!
//! The placeholder set is closed. The calendar rejects templates naming an
//! unknown placeholder at load time, so rendering never has to fail. A value
//! that is missing at render time falls back to a fixed default.

use std::str::FromStr as _;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _};

use crate::contact::{Contact, UserProfile};

pub const DEFAULT_RECIPIENT_NAME: &str = "there";
pub const DEFAULT_AGENT_NAME: &str = "Your Agent";
pub const DEFAULT_COMPANY: &str = "Your Company";
pub const DEFAULT_CITY: &str = "your city";

/// Every name a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Placeholder {
  RecipientName,
  AgentName,
  Company,
  City,
  Year,
  Occasion,
}

impl Placeholder {
  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }
}

/// Values substituted into one rendered message.
#[derive(Debug, Clone, Default)]
pub struct Personalization {
  pub recipient_name: Option<String>,
  pub agent_name:     Option<String>,
  pub company:        Option<String>,
  pub city:           Option<String>,
  pub year:           i32,
  pub occasion:       String,
}

impl Personalization {
  /// Gather the values for a greeting from `sender` to `contact`.
  ///
  /// `year` is the occasion-year of the send, not the wall-clock year.
  pub fn for_contact(
    contact: &Contact,
    sender: Option<&UserProfile>,
    occasion_name: &str,
    year: i32,
  ) -> Self {
    Self {
      recipient_name: contact.display_name.clone(),
      agent_name:     sender.and_then(|p| p.full_name.clone()),
      company:        sender.and_then(|p| p.company.clone()),
      city:           sender.and_then(|p| p.primary_market().map(str::to_owned)),
      year,
      occasion:       occasion_name.to_owned(),
    }
  }

  fn value(&self, placeholder: Placeholder) -> String {
    fn or_default(value: Option<&String>, default: &str) -> String {
      value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_owned()
    }

    match placeholder {
      Placeholder::RecipientName => {
        or_default(self.recipient_name.as_ref(), DEFAULT_RECIPIENT_NAME)
      }
      Placeholder::AgentName => or_default(self.agent_name.as_ref(), DEFAULT_AGENT_NAME),
      Placeholder::Company => or_default(self.company.as_ref(), DEFAULT_COMPANY),
      Placeholder::City => or_default(self.city.as_ref(), DEFAULT_CITY),
      Placeholder::Year => self.year.to_string(),
      Placeholder::Occasion => self.occasion.clone(),
    }
  }
}

/// Names of all `{{...}}` references in `template`, trimmed, in order.
pub fn references(template: &str) -> Vec<&str> {
  let mut names = Vec::new();
  let mut rest = template;
  while let Some(start) = rest.find("{{") {
    let after = &rest[start + 2..];
    let Some(end) = after.find("}}") else { break };
    names.push(after[..end].trim());
    rest = &after[end + 2..];
  }
  names
}

/// References in `template` that are not a known [`Placeholder`].
pub fn unknown_references(template: &str) -> Vec<&str> {
  references(template)
    .into_iter()
    .filter(|name| Placeholder::from_str(name).is_err())
    .collect()
}

/// Substitute every known placeholder. Unknown references are kept verbatim.
pub fn render(template: &str, values: &Personalization) -> String {
  let mut out = String::with_capacity(template.len());
  let mut rest = template;
  while let Some(start) = rest.find("{{") {
    let after = &rest[start + 2..];
    let Some(end) = after.find("}}") else { break };
    out.push_str(&rest[..start]);
    match Placeholder::from_str(after[..end].trim()) {
      Ok(placeholder) => out.push_str(&values.value(placeholder)),
      Err(_) => out.push_str(&rest[start..start + 2 + end + 2]),
    }
    rest = &after[end + 2..];
  }
  out.push_str(rest);
  out
}
