//! The occasion calendar: a validated, versioned registry of occasions and the
//! date matcher built on top of it.
//!
//! The registry is static configuration, loaded once at process start. Every
//! entry is checked before the calendar is handed out, so a malformed rule
//! surfaces at startup rather than in the middle of a dispatch run.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
  Error, Result,
  occasion::Occasion,
  template::unknown_references,
};

/// The registry compiled into the binary; used when no file is configured.
const BUILTIN_REGISTRY: &str = include_str!("registry.toml");

// ─── Document ────────────────────────────────────────────────────────────────

/// On-disk shape of a registry TOML file.
#[derive(Debug, Deserialize)]
struct RegistryDocument {
  /// Human-facing label, e.g. `"2025.1"`. Not used for matching.
  #[serde(default)]
  label:     Option<String>,
  #[serde(default, rename = "occasion")]
  occasions: Vec<Occasion>,
}

// ─── Calendar ────────────────────────────────────────────────────────────────

/// A validated occasion registry.
#[derive(Debug, Clone)]
pub struct Calendar {
  label:     Option<String>,
  version:   String,
  occasions: Vec<Occasion>,
}

/// An occasion together with its concrete date in some year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOccasion<'a> {
  #[serde(flatten)]
  pub occasion: &'a Occasion,
  pub date:     NaiveDate,
}

impl Calendar {
  /// Validate `occasions` and build a calendar from them.
  pub fn new(occasions: Vec<Occasion>) -> Result<Self> {
    let mut seen = HashSet::new();
    for occasion in &occasions {
      validate_occasion(occasion)?;
      if !seen.insert(occasion.id.as_str()) {
        return Err(Error::DuplicateOccasion(occasion.id.clone()));
      }
    }

    let canonical = serde_json::to_vec(&occasions)?;
    let version = hex::encode(Sha256::digest(&canonical));

    Ok(Self { label: None, version, occasions })
  }

  /// Parse and validate a registry TOML document.
  pub fn from_toml(source: &str) -> Result<Self> {
    let doc: RegistryDocument = toml::from_str(source)?;
    let mut calendar = Self::new(doc.occasions)?;
    calendar.label = doc.label;
    Ok(calendar)
  }

  /// The registry shipped with the crate.
  pub fn builtin() -> Result<Self> { Self::from_toml(BUILTIN_REGISTRY) }

  /// SHA-256 of the canonical registry contents. Equal versions guarantee
  /// equal match sets for every date.
  pub fn version(&self) -> &str { &self.version }

  pub fn label(&self) -> Option<&str> { self.label.as_deref() }

  pub fn occasions(&self) -> &[Occasion] { &self.occasions }

  pub fn get(&self, id: &str) -> Option<&Occasion> {
    self.occasions.iter().find(|o| o.id == id)
  }

  /// Resolve every occasion for `year`, in registry order.
  ///
  /// Fails if any single rule has no date in `year`; a dispatch run calls
  /// this before touching any occasion so it never half-processes a day.
  pub fn resolve_year(&self, year: i32) -> Result<Vec<ResolvedOccasion<'_>>> {
    self
      .occasions
      .iter()
      .map(|occasion| {
        occasion
          .date_in(year)
          .map(|date| ResolvedOccasion { occasion, date })
          .map_err(|source| Error::Unresolvable {
            id: occasion.id.clone(),
            year,
            source,
          })
      })
      .collect()
  }

  /// Occasions whose resolved date is exactly `target`.
  pub fn matches(&self, target: NaiveDate) -> Result<Vec<&Occasion>> {
    Ok(
      self
        .resolve_year(target.year())?
        .into_iter()
        .filter(|r| r.date == target)
        .map(|r| r.occasion)
        .collect(),
    )
  }
}

fn validate_occasion(occasion: &Occasion) -> Result<()> {
  let invalid = |reason: String| Error::InvalidOccasion {
    id: occasion.id.clone(),
    reason,
  };

  if occasion.id.is_empty()
    || !occasion
      .id
      .bytes()
      .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
  {
    return Err(invalid(
      "id must be a non-empty slug of [a-z0-9_-]".to_owned(),
    ));
  }
  if occasion.display_name.trim().is_empty() {
    return Err(invalid("display_name is empty".to_owned()));
  }
  occasion.rule.validate().map_err(|e| invalid(e.to_string()))?;

  for (field, template) in [
    ("subject_template", &occasion.subject_template),
    ("body_template", &occasion.body_template),
  ] {
    if template.trim().is_empty() {
      return Err(invalid(format!("{field} is empty")));
    }
    let unknown = unknown_references(template);
    if !unknown.is_empty() {
      return Err(invalid(format!(
        "{field} references unknown placeholders: {}",
        unknown.join(", ")
      )));
    }
  }
  Ok(())
}
