//! Wiring for the `festive-server` binary: configuration, store and
//! transport construction, and the one-shot run used by cron.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chrono::Datelike as _;
use chrono_tz::Tz;
use festive_api::{AppState, AuthConfig};
use festive_core::{
  calendar::Calendar,
  stats::RunStats,
  store::DispatchLedger,
  target::{resolve_target, today_in},
};
use festive_dispatch::{DispatchConfig, Dispatcher};
use festive_mail::{MailConfig, Mailer};
use festive_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::sync::watch;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("festive.db") }

fn default_time_zone() -> Tz { chrono_tz::America::Toronto }

/// Runtime configuration, deserialised from `config.toml` and the
/// environment.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  /// Reference zone for "today".
  #[serde(default = "default_time_zone")]
  pub time_zone:              Tz,
  /// Occasion registry file; the built-in registry when absent.
  #[serde(default)]
  pub registry_path:          Option<PathBuf>,
  /// Ledger rows older than this many years are pruned after a one-shot run.
  #[serde(default)]
  pub ledger_retention_years: Option<u16>,
  #[serde(default)]
  pub auth:                   Option<AuthConfig>,
  #[serde(default)]
  pub dispatch:               DispatchConfig,
  #[serde(default)]
  pub mail:                   MailConfig,
}

impl ServerConfig {
  /// Layer `FESTIVE_*` environment variables over the optional file at
  /// `path`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("FESTIVE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

/// Load and validate the occasion registry. Any malformed entry is fatal.
pub fn load_calendar(config: &ServerConfig) -> anyhow::Result<Calendar> {
  let calendar = match &config.registry_path {
    Some(path) => {
      let path = expand_tilde(path);
      let source = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read occasion registry {path:?}"))?;
      Calendar::from_toml(&source)
        .with_context(|| format!("invalid occasion registry {path:?}"))?
    }
    None => Calendar::builtin().context("built-in occasion registry is invalid")?,
  };

  tracing::info!(
    version = %calendar.version(),
    label = ?calendar.label(),
    occasions = calendar.occasions().len(),
    "occasion calendar loaded"
  );
  Ok(calendar)
}

/// Open the store, load the calendar, and build the transport.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState<SqliteStore, Mailer>> {
  let calendar = load_calendar(config)?;

  let store_path = expand_tilde(&config.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  let mailer = Mailer::from_config(&config.mail).context("failed to configure mail transport")?;
  tracing::info!(transport = mailer.kind(), "mail transport ready");

  let dispatcher = Dispatcher::new(
    Arc::clone(&store),
    Arc::clone(&store),
    Arc::clone(&store),
    Arc::new(mailer),
    Arc::new(calendar),
    config.dispatch.clone(),
  );

  Ok(AppState {
    store,
    dispatcher,
    time_zone: config.time_zone,
    auth: config.auth.clone().map(Arc::new),
  })
}

/// Perform one dispatch run, then prune the ledger if a retention is set.
pub async fn run_once(
  state: &AppState<SqliteStore, Mailer>,
  date: Option<&str>,
  dry_run: bool,
  retention_years: Option<u16>,
  cancel: watch::Receiver<bool>,
) -> anyhow::Result<RunStats> {
  let today = today_in(&state.time_zone);
  let target = resolve_target(date, today)?;

  let stats = state
    .dispatcher
    .run_with_cancel(target, dry_run, cancel)
    .await?;

  if let Some(years) = retention_years
    && !dry_run
  {
    let cutoff = target.year() - i32::from(years);
    let pruned = state
      .store
      .prune_before(cutoff)
      .await
      .context("failed to prune dispatch ledger")?;
    tracing::info!(before = cutoff, pruned, "dispatch ledger pruned");
  }

  Ok(stats)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use festive_core::{
    contact::{NewContact, UserProfile},
    store::PreferenceStore,
  };
  use uuid::Uuid;

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  fn in_memory() -> ServerConfig { parse(r#"store_path = ":memory:""#) }

  #[test]
  fn empty_config_uses_defaults() {
    let config = parse("");
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
    assert_eq!(config.time_zone, chrono_tz::America::Toronto);
    assert!(config.registry_path.is_none());
    assert!(config.auth.is_none());
    assert_eq!(config.dispatch, DispatchConfig::default());
    assert!(matches!(config.mail, MailConfig::Log));
  }

  #[test]
  fn sample_config_parses() {
    let config = parse(include_str!("../config.example.toml"));
    assert_eq!(config.dispatch.concurrency, 5);
    assert_eq!(config.time_zone, chrono_tz::America::Toronto);
    assert!(matches!(config.mail, MailConfig::Log));
  }

  #[test]
  fn nested_sections_parse() {
    let config = parse(
      r#"
      time_zone = "Europe/Berlin"
      ledger_retention_years = 2

      [dispatch]
      concurrency = 8
      copy_sender = true

      [mail]
      transport = "smtp"
      host = "smtp.example.com"
      from = "noreply@example.com"

      [auth]
      username = "ops"
      password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
      "#,
    );
    assert_eq!(config.time_zone, chrono_tz::Europe::Berlin);
    assert_eq!(config.ledger_retention_years, Some(2));
    assert_eq!(config.dispatch.concurrency, 8);
    assert!(config.dispatch.copy_sender);
    assert_eq!(config.dispatch.send_timeout_secs, 30);
    let MailConfig::Smtp(smtp) = &config.mail else {
      panic!("expected smtp transport");
    };
    assert_eq!(smtp.port, 587);
    assert_eq!(config.auth.as_ref().map(|a| a.username.as_str()), Some("ops"));
  }

  #[test]
  fn missing_registry_file_is_fatal() {
    let mut config = in_memory();
    config.registry_path = Some(PathBuf::from("/nonexistent/registry.toml"));
    assert!(load_calendar(&config).is_err());
  }

  #[test]
  fn tilde_expands_to_home() {
    let home = std::env::var("HOME").unwrap();
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }

  #[tokio::test]
  async fn one_shot_run_sends_and_prunes() {
    let mut config = in_memory();
    config.ledger_retention_years = Some(1);
    let state = build_state(&config).await.unwrap();

    let user_id = Uuid::new_v4();
    state
      .store
      .add_user(&UserProfile {
        user_id,
        email: "agent@example.com".into(),
        full_name: None,
        company: None,
        markets: vec![],
      })
      .await
      .unwrap();
    state
      .store
      .set_preference(user_id, "christmas", true)
      .await
      .unwrap();
    state
      .store
      .add_contact(NewContact::new(user_id, "ann@example.com"))
      .await
      .unwrap();

    let (_tx, rx) = watch::channel(false);
    let old = run_once(&state, Some("2023-12-25"), false, None, rx.clone())
      .await
      .unwrap();
    assert_eq!(old.succeeded, 1);

    let stats = run_once(&state, Some("2025-12-25"), false, Some(1), rx)
      .await
      .unwrap();
    assert_eq!(stats.succeeded, 1);

    // 2023 falls before the one-year cutoff of 2024.
    let rows = state.store.records(None, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].occasion_year, 2025);
  }

  #[tokio::test]
  async fn one_shot_run_rejects_bad_dates() {
    let state = build_state(&in_memory()).await.unwrap();
    let (_tx, rx) = watch::channel(false);
    assert!(run_once(&state, Some("12-32"), false, None, rx).await.is_err());
  }
}
