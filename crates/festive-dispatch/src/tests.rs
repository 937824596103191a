//! Engine tests against an in-memory SQLite store and scripted transports.

use std::{
  collections::HashSet,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::NaiveDate;
use festive_core::{
  calendar::Calendar,
  contact::{Contact, ContactStatus, NewContact, UserProfile},
  ledger::DispatchKey,
  preference::UserPreference,
  store::{ContactDirectory, DispatchLedger, PreferenceStore, StoreError},
  transport::{MailTransport, MessageId, OutgoingMessage, TransportError},
};
use festive_store_sqlite::SqliteStore;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{DispatchConfig, Dispatcher, Error};

// ─── Fakes ───────────────────────────────────────────────────────────────────

/// Records every accepted message. Can be scripted to reject addresses, to
/// stall, or to trip a cancellation signal.
#[derive(Default)]
struct ScriptedTransport {
  sent:           Mutex<Vec<OutgoingMessage>>,
  reject:         HashSet<String>,
  delay:          Option<Duration>,
  cancel_on_send: Option<watch::Sender<bool>>,
  in_flight:      AtomicUsize,
  peak:           AtomicUsize,
}

impl ScriptedTransport {
  fn rejecting(address: &str) -> Self {
    Self { reject: HashSet::from([address.to_owned()]), ..Default::default() }
  }

  fn stalling(delay: Duration) -> Self { Self { delay: Some(delay), ..Default::default() } }

  fn sent(&self) -> Vec<OutgoingMessage> {
    let mut sent = self.sent.lock().unwrap().clone();
    sent.sort_by(|a, b| a.to.cmp(&b.to));
    sent
  }
}

impl MailTransport for ScriptedTransport {
  async fn send(&self, message: OutgoingMessage) -> Result<MessageId, TransportError> {
    if let Some(cancel) = &self.cancel_on_send {
      let _ = cancel.send(true);
    }
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    if self.reject.contains(&message.to) {
      return Err(TransportError::Rejected(format!("mailbox {} unavailable", message.to)));
    }
    let mut sent = self.sent.lock().unwrap();
    sent.push(message);
    Ok(MessageId(format!("<{}@test.invalid>", sent.len())))
  }
}

#[derive(Debug, thiserror::Error)]
#[error("store unavailable")]
struct Outage {
  systemic: bool,
}

impl StoreError for Outage {
  fn is_systemic(&self) -> bool { self.systemic }
}

/// A preference store whose every call fails.
struct BrokenPreferences {
  systemic: bool,
}

impl PreferenceStore for BrokenPreferences {
  type Error = Outage;

  async fn enabled_users<'a>(&'a self, _occasion_id: &'a str) -> Result<Vec<Uuid>, Outage> {
    Err(Outage { systemic: self.systemic })
  }

  async fn preferences(&self, _user_id: Uuid) -> Result<Vec<UserPreference>, Outage> {
    Err(Outage { systemic: self.systemic })
  }

  async fn set_preference<'a>(
    &'a self,
    _user_id: Uuid,
    _occasion_id: &'a str,
    _enabled: bool,
  ) -> Result<UserPreference, Outage> {
    Err(Outage { systemic: self.systemic })
  }
}

/// Delegates to the SQLite store but cannot list one user's contacts.
struct PartialDirectory {
  inner:  Arc<SqliteStore>,
  broken: Uuid,
}

impl ContactDirectory for PartialDirectory {
  type Error = Outage;

  async fn active_contacts(&self, user_id: Uuid) -> Result<Vec<Contact>, Outage> {
    if user_id == self.broken {
      return Err(Outage { systemic: false });
    }
    self
      .inner
      .active_contacts(user_id)
      .await
      .map_err(|_| Outage { systemic: true })
  }

  async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, Outage> {
    self
      .inner
      .profile(user_id)
      .await
      .map_err(|_| Outage { systemic: true })
  }
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

/// One agent with Christmas enabled, two active contacts (one unnamed) and
/// one inactive contact.
struct Fixture {
  store:   Arc<SqliteStore>,
  agent:   UserProfile,
  named:   Contact,
  unnamed: Contact,
}

async fn fixture() -> Fixture {
  let store = Arc::new(
    SqliteStore::open_in_memory()
      .await
      .expect("in-memory store"),
  );
  let agent = UserProfile {
    user_id:   Uuid::new_v4(),
    email:     "agent@example.com".into(),
    full_name: Some("Sam Agent".into()),
    company:   Some("Maple Homes".into()),
    markets:   vec!["Ottawa".into()],
  };
  store.add_user(&agent).await.unwrap();
  store
    .set_preference(agent.user_id, "christmas", true)
    .await
    .unwrap();

  let named = store
    .add_contact(NewContact::new(agent.user_id, "ann@example.com").named("Ann"))
    .await
    .unwrap();
  let unnamed = store
    .add_contact(NewContact::new(agent.user_id, "bo@example.com"))
    .await
    .unwrap();
  store
    .add_contact(
      NewContact::new(agent.user_id, "cy@example.com").with_status(ContactStatus::Inactive),
    )
    .await
    .unwrap();

  Fixture { store, agent, named, unnamed }
}

fn dispatcher<T: MailTransport + 'static>(
  store: &Arc<SqliteStore>,
  transport: &Arc<T>,
  config: DispatchConfig,
) -> Dispatcher<SqliteStore, SqliteStore, SqliteStore, T> {
  Dispatcher::new(
    Arc::clone(store),
    Arc::clone(store),
    Arc::clone(store),
    Arc::clone(transport),
    Arc::new(Calendar::builtin().unwrap()),
    config,
  )
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn christmas() -> NaiveDate { date(2025, 12, 25) }

// ─── Matching ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn christmas_reaches_active_contacts_only() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let stats = dispatcher(&f.store, &transport, DispatchConfig::default())
    .run(christmas(), false)
    .await
    .unwrap();

  assert_eq!(stats.matched_occasions, vec!["christmas"]);
  assert_eq!(stats.attempted, 2);
  assert_eq!(stats.succeeded, 2);
  assert_eq!(stats.failed, 0);
  assert!(stats.errors.is_empty());

  let to: Vec<_> = transport.sent().into_iter().map(|m| m.to).collect();
  assert_eq!(to, vec!["ann@example.com", "bo@example.com"]);

  let records = f.store.records(Some("christmas"), Some(2025)).await.unwrap();
  assert_eq!(records.len(), 2);
  assert!(records.iter().all(|r| r.is_committed() && r.message_id.is_some()));
}

#[tokio::test]
async fn unmatched_date_is_a_no_op() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let stats = dispatcher(&f.store, &transport, DispatchConfig::default())
    .run(date(2025, 12, 24), false)
    .await
    .unwrap();

  assert!(stats.matched_occasions.is_empty());
  assert_eq!(stats.attempted, 0);
  assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn occasions_sharing_a_date_are_independent() {
  let f = fixture().await;
  let calendar = Calendar::from_toml(
    r#"
    [[occasion]]
    id = "christmas"
    display_name = "Christmas"
    rule = { kind = "fixed", month = 12, day = 25 }
    subject_template = "Merry Christmas"
    body_template = "Hi {{recipient_name}}"

    [[occasion]]
    id = "year_end"
    display_name = "Year End"
    rule = { kind = "fixed", month = 12, day = 25 }
    subject_template = "Thanks for {{year}}"
    body_template = "Hi {{recipient_name}}"
    "#,
  )
  .unwrap();
  f.store
    .set_preference(f.agent.user_id, "year_end", true)
    .await
    .unwrap();

  let transport = Arc::new(ScriptedTransport::default());
  let stats = Dispatcher::new(
    Arc::clone(&f.store),
    Arc::clone(&f.store),
    Arc::clone(&f.store),
    Arc::clone(&transport),
    Arc::new(calendar),
    DispatchConfig::default(),
  )
  .run(christmas(), false)
  .await
  .unwrap();

  assert_eq!(stats.matched_occasions, vec!["christmas", "year_end"]);
  assert_eq!(stats.succeeded, 4);
  assert_eq!(f.store.records(None, Some(2025)).await.unwrap().len(), 4);
}

#[tokio::test]
async fn unresolvable_year_is_a_configuration_error() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  // The lunar new year table does not reach 2050.
  let err = dispatcher(&f.store, &transport, DispatchConfig::default())
    .run(date(2050, 12, 25), false)
    .await
    .unwrap_err();

  assert!(matches!(err, Error::Configuration { year: 2050, .. }));
  assert!(transport.sent().is_empty());
}

// ─── Dedup ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_run_skips_everyone() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let engine = dispatcher(&f.store, &transport, DispatchConfig::default());

  let first = engine.run(christmas(), false).await.unwrap();
  let second = engine.run(christmas(), false).await.unwrap();

  assert_eq!(first.succeeded, 2);
  assert_eq!(second.attempted, 0);
  assert_eq!(second.succeeded, 0);
  assert_eq!(second.skipped_duplicates, first.succeeded);
  assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn overlapping_runs_send_once() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::stalling(Duration::from_millis(20)));
  let a = dispatcher(&f.store, &transport, DispatchConfig::default());
  let b = a.clone();

  let (ra, rb) = tokio::join!(a.run(christmas(), false), b.run(christmas(), false));
  let (ra, rb) = (ra.unwrap(), rb.unwrap());

  assert_eq!(ra.succeeded + rb.succeeded, 2);
  assert_eq!(ra.skipped_duplicates + rb.skipped_duplicates, 2);
  assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn next_year_is_a_fresh_cycle() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let engine = dispatcher(&f.store, &transport, DispatchConfig::default());

  engine.run(christmas(), false).await.unwrap();
  let next = engine.run(date(2026, 12, 25), false).await.unwrap();

  assert_eq!(next.succeeded, 2);
  assert_eq!(next.skipped_duplicates, 0);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_rejected_contact_does_not_stop_the_run() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::rejecting("bo@example.com"));
  let stats = dispatcher(&f.store, &transport, DispatchConfig::default())
    .run(christmas(), false)
    .await
    .unwrap();

  assert_eq!(stats.attempted, 2);
  assert_eq!(stats.succeeded, 1);
  assert_eq!(stats.failed, 1);
  assert_eq!(stats.errors.len(), 1);
  assert_eq!(stats.errors[0].contact_id, Some(f.unnamed.contact_id));
  assert_eq!(stats.errors[0].user_id, Some(f.agent.user_id));

  // The failed key was released, so a healthy retry reaches that contact.
  let healthy = Arc::new(ScriptedTransport::default());
  let retry = dispatcher(&f.store, &healthy, DispatchConfig::default())
    .run(christmas(), false)
    .await
    .unwrap();
  assert_eq!(retry.attempted, 1);
  assert_eq!(retry.succeeded, 1);
  assert_eq!(retry.skipped_duplicates, 1);
  assert_eq!(healthy.sent()[0].to, "bo@example.com");
}

#[tokio::test]
async fn timed_out_sends_fail_and_stay_retryable() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::stalling(Duration::from_secs(30)));
  let config = DispatchConfig { send_timeout_secs: 1, ..Default::default() };
  let stats = dispatcher(&f.store, &transport, config)
    .run(christmas(), false)
    .await
    .unwrap();

  assert_eq!(stats.attempted, 2);
  assert_eq!(stats.failed, 2);
  assert!(stats.errors.iter().all(|e| e.reason.contains("timed out")));

  for contact in [&f.named, &f.unnamed] {
    let key = DispatchKey::new("christmas", contact.contact_id, christmas());
    assert!(!f.store.is_reserved(&key).await.unwrap());
  }
}

#[tokio::test]
async fn systemic_discovery_failure_aborts() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let err = Dispatcher::new(
    Arc::new(BrokenPreferences { systemic: true }),
    Arc::clone(&f.store),
    Arc::clone(&f.store),
    Arc::clone(&transport),
    Arc::new(Calendar::builtin().unwrap()),
    DispatchConfig::default(),
  )
  .run(christmas(), false)
  .await
  .unwrap_err();

  assert!(matches!(err, Error::Discovery { ref occasion_id, .. } if occasion_id == "christmas"));
  assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn isolated_preference_failure_is_recorded() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let stats = Dispatcher::new(
    Arc::new(BrokenPreferences { systemic: false }),
    Arc::clone(&f.store),
    Arc::clone(&f.store),
    Arc::clone(&transport),
    Arc::new(Calendar::builtin().unwrap()),
    DispatchConfig::default(),
  )
  .run(christmas(), false)
  .await
  .unwrap();

  assert_eq!(stats.matched_occasions, vec!["christmas"]);
  assert_eq!(stats.attempted, 0);
  assert_eq!(stats.errors.len(), 1);
  assert_eq!(stats.errors[0].user_id, None);
}

#[tokio::test]
async fn isolated_contact_failure_skips_only_that_user() {
  let f = fixture().await;
  let other = UserProfile {
    user_id:   Uuid::new_v4(),
    email:     "other@example.com".into(),
    full_name: None,
    company:   None,
    markets:   vec![],
  };
  f.store.add_user(&other).await.unwrap();
  f.store
    .set_preference(other.user_id, "christmas", true)
    .await
    .unwrap();
  f.store
    .add_contact(NewContact::new(other.user_id, "dee@example.com"))
    .await
    .unwrap();

  let transport = Arc::new(ScriptedTransport::default());
  let stats = Dispatcher::new(
    Arc::clone(&f.store),
    Arc::new(PartialDirectory { inner: Arc::clone(&f.store), broken: other.user_id }),
    Arc::clone(&f.store),
    Arc::clone(&transport),
    Arc::new(Calendar::builtin().unwrap()),
    DispatchConfig::default(),
  )
  .run(christmas(), false)
  .await
  .unwrap();

  assert_eq!(stats.succeeded, 2);
  assert_eq!(stats.errors.len(), 1);
  assert_eq!(stats.errors[0].user_id, Some(other.user_id));
  assert_eq!(stats.errors[0].contact_id, None);
}

// ─── Pool and cancellation ───────────────────────────────────────────────────

#[tokio::test]
async fn pool_never_exceeds_concurrency() {
  let f = fixture().await;
  for i in 0..6 {
    f.store
      .add_contact(NewContact::new(f.agent.user_id, format!("extra{i}@example.com")))
      .await
      .unwrap();
  }
  let transport = Arc::new(ScriptedTransport::stalling(Duration::from_millis(25)));
  let config = DispatchConfig { concurrency: 2, ..Default::default() };
  let stats = dispatcher(&f.store, &transport, config)
    .run(christmas(), false)
    .await
    .unwrap();

  assert_eq!(stats.succeeded, 8);
  assert!(transport.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn cancelled_before_start_sends_nothing() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let (tx, rx) = watch::channel(true);
  let stats = dispatcher(&f.store, &transport, DispatchConfig::default())
    .run_with_cancel(christmas(), false, rx)
    .await
    .unwrap();
  drop(tx);

  assert!(stats.cancelled);
  assert_eq!(stats.matched_occasions, vec!["christmas"]);
  assert_eq!(stats.attempted, 0);
  assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn cancellation_lets_in_flight_sends_finish() {
  let f = fixture().await;
  let (tx, rx) = watch::channel(false);
  let transport = Arc::new(ScriptedTransport {
    delay: Some(Duration::from_millis(50)),
    cancel_on_send: Some(tx),
    ..Default::default()
  });
  let config = DispatchConfig { concurrency: 1, ..Default::default() };
  let stats = dispatcher(&f.store, &transport, config)
    .run_with_cancel(christmas(), false, rx)
    .await
    .unwrap();

  assert!(stats.cancelled);
  assert_eq!(stats.attempted, 1);
  assert_eq!(stats.succeeded, 1);
  assert_eq!(transport.sent().len(), 1);
  assert_eq!(f.store.records(None, None).await.unwrap().len(), 1);
}

// ─── Dry run and rendering ───────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_plans_without_side_effects() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let engine = dispatcher(&f.store, &transport, DispatchConfig::default());

  let planned = engine.run(christmas(), true).await.unwrap();
  assert!(planned.dry_run);
  assert_eq!(planned.planned, 2);
  assert_eq!(planned.attempted, 0);
  assert!(transport.sent().is_empty());
  assert!(f.store.records(None, None).await.unwrap().is_empty());

  engine.run(christmas(), false).await.unwrap();
  let after = engine.run(christmas(), true).await.unwrap();
  assert_eq!(after.planned, 0);
  assert_eq!(after.skipped_duplicates, 2);
}

#[tokio::test]
async fn messages_are_personalised_and_tagged() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let config = DispatchConfig {
    copy_sender: true,
    default_recipient_name: "friend".into(),
    ..Default::default()
  };
  dispatcher(&f.store, &transport, config)
    .run(christmas(), false)
    .await
    .unwrap();

  let sent = transport.sent();
  let (ann, bo) = (&sent[0], &sent[1]);

  assert_eq!(ann.subject, "🎄 Warm Holiday Wishes from Sam Agent");
  assert!(ann.body.starts_with("Dear Ann,"));
  assert!(ann.body.contains("community in Ottawa. May 2025"));
  assert!(ann.body.contains("Maple Homes"));
  assert_eq!(ann.to_name.as_deref(), Some("Ann"));
  assert!(bo.body.starts_with("Dear friend,"));

  assert_eq!(ann.cc.as_deref(), Some("agent@example.com"));
  assert_eq!(ann.tags, vec!["christmas", "festive", "automated"]);
}

#[tokio::test]
async fn sender_is_not_copied_by_default() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  dispatcher(&f.store, &transport, DispatchConfig::default())
    .run(christmas(), false)
    .await
    .unwrap();

  assert!(transport.sent().iter().all(|m| m.cc.is_none()));
}

#[tokio::test]
async fn stats_serialise_for_the_trigger_response() {
  let f = fixture().await;
  let transport = Arc::new(ScriptedTransport::default());
  let stats = dispatcher(&f.store, &transport, DispatchConfig::default())
    .run(christmas(), false)
    .await
    .unwrap();

  let json = serde_json::to_value(&stats).unwrap();
  assert_eq!(json["matchedOccasions"], serde_json::json!(["christmas"]));
  assert_eq!(json["succeeded"], 2);
  assert_eq!(json["calendarVersion"], Calendar::builtin().unwrap().version());
}
