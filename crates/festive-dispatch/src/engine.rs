use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{Datelike as _, NaiveDate};
use festive_core::{
  calendar::Calendar,
  contact::{Contact, UserProfile},
  ledger::{DispatchKey, Reservation},
  occasion::Occasion,
  stats::{RunStats, SendOutcome},
  store::{ContactDirectory, DispatchLedger, PreferenceStore, StoreError},
  template::{Personalization, render},
  transport::{MailTransport, OutgoingMessage},
};
use tokio::{
  sync::{Semaphore, watch},
  task::{self, JoinSet},
  time,
};
use uuid::Uuid;

use crate::{DispatchConfig, Error, Result};

/// Tags attached to every greeting after the occasion id.
const MESSAGE_TAGS: [&str; 2] = ["festive", "automated"];

/// Identifies the contact a spawned send belongs to.
struct SendJob {
  occasion_id: String,
  user_id:     Uuid,
  contact_id:  Uuid,
}

/// Sends in flight for the current run.
#[derive(Default)]
struct InFlight {
  tasks: JoinSet<SendOutcome>,
  jobs:  HashMap<task::Id, SendJob>,
}

impl InFlight {
  /// Fold sends that have already finished into `stats` without waiting.
  fn reap(&mut self, stats: &mut RunStats) {
    while let Some(joined) = self.tasks.try_join_next_with_id() {
      self.settle(joined, stats);
    }
  }

  /// Wait for every outstanding send and fold its outcome into `stats`.
  async fn drain(&mut self, stats: &mut RunStats) {
    while let Some(joined) = self.tasks.join_next_with_id().await {
      self.settle(joined, stats);
    }
  }

  fn settle(
    &mut self,
    joined: std::result::Result<(task::Id, SendOutcome), task::JoinError>,
    stats: &mut RunStats,
  ) {
    let (id, outcome) = match joined {
      Ok((id, outcome)) => (id, outcome),
      Err(e) => (e.id(), SendOutcome::Failed(format!("send task aborted: {e}"))),
    };
    let Some(job) = self.jobs.remove(&id) else {
      return;
    };
    if let SendOutcome::Failed(reason) = &outcome {
      tracing::warn!(
        occasion = %job.occasion_id,
        user = %job.user_id,
        contact = %job.contact_id,
        %reason,
        "greeting not sent"
      );
    }
    stats.record_outcome(&job.occasion_id, job.user_id, job.contact_id, outcome);
  }
}

/// Outcome of a collaborator lookup after error classification.
enum Lookup<T> {
  Found(T),
  /// Recorded in the stats; move on to the next occasion or user.
  Skipped,
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Runs greeting dispatch for a target date.
///
/// Holds its collaborators behind `Arc` so the HTTP layer and the one-shot
/// binary can share one instance; runs themselves keep no state between
/// calls.
pub struct Dispatcher<P, C, L, T> {
  preferences: Arc<P>,
  contacts:    Arc<C>,
  ledger:      Arc<L>,
  transport:   Arc<T>,
  calendar:    Arc<Calendar>,
  config:      DispatchConfig,
}

impl<P, C, L, T> Clone for Dispatcher<P, C, L, T> {
  fn clone(&self) -> Self {
    Self {
      preferences: Arc::clone(&self.preferences),
      contacts:    Arc::clone(&self.contacts),
      ledger:      Arc::clone(&self.ledger),
      transport:   Arc::clone(&self.transport),
      calendar:    Arc::clone(&self.calendar),
      config:      self.config.clone(),
    }
  }
}

impl<P, C, L, T> Dispatcher<P, C, L, T>
where
  P: PreferenceStore,
  C: ContactDirectory,
  L: DispatchLedger + 'static,
  T: MailTransport + 'static,
{
  pub fn new(
    preferences: Arc<P>,
    contacts: Arc<C>,
    ledger: Arc<L>,
    transport: Arc<T>,
    calendar: Arc<Calendar>,
    config: DispatchConfig,
  ) -> Self {
    Self { preferences, contacts, ledger, transport, calendar, config }
  }

  pub fn calendar(&self) -> &Calendar { &self.calendar }

  pub fn config(&self) -> &DispatchConfig { &self.config }

  /// Run dispatch for `target` to completion.
  pub async fn run(&self, target: NaiveDate, dry_run: bool) -> Result<RunStats> {
    let (_never, cancel) = watch::channel(false);
    self.run_with_cancel(target, dry_run, cancel).await
  }

  /// Run dispatch for `target`, stopping early once `cancel` turns `true`.
  ///
  /// Cancellation stops scheduling new sends. Sends already handed to the
  /// pool run to completion or time out, so no reservation is left half
  /// done, and the returned stats have `cancelled` set.
  pub async fn run_with_cancel(
    &self,
    target: NaiveDate,
    dry_run: bool,
    mut cancel: watch::Receiver<bool>,
  ) -> Result<RunStats> {
    let year = target.year();
    let matched = self
      .calendar
      .matches(target)
      .map_err(|source| Error::Configuration { year, source })?;

    let mut stats = RunStats::new(target, self.calendar.version(), dry_run);
    tracing::info!(
      %target,
      calendar = %self.calendar.version(),
      dry_run,
      matched = matched.len(),
      "dispatch run started"
    );

    let semaphore = Arc::new(Semaphore::new(self.config.permits()));
    let mut in_flight = InFlight::default();

    let outcome = self
      .schedule(&matched, target, &semaphore, &mut in_flight, &mut stats, &mut cancel)
      .await;

    // In-flight sends always finish, even when the run aborts.
    in_flight.drain(&mut stats).await;
    outcome?;

    tracing::info!(
      %target,
      calendar = %stats.calendar_version,
      matched = ?stats.matched_occasions,
      attempted = stats.attempted,
      succeeded = stats.succeeded,
      failed = stats.failed,
      skipped_duplicates = stats.skipped_duplicates,
      planned = stats.planned,
      cancelled = stats.cancelled,
      errors = stats.errors.len(),
      "dispatch run finished"
    );
    Ok(stats)
  }

  /// Walk occasions, users, and contacts, handing each send to the pool.
  async fn schedule(
    &self,
    matched: &[&Occasion],
    target: NaiveDate,
    semaphore: &Arc<Semaphore>,
    in_flight: &mut InFlight,
    stats: &mut RunStats,
    cancel: &mut watch::Receiver<bool>,
  ) -> Result<()> {
    for occasion in matched {
      stats.record_match(&occasion.id);
    }

    for occasion in matched {
      if *cancel.borrow() {
        stats.cancelled = true;
        return Ok(());
      }
      tracing::info!(occasion = %occasion.id, %target, "processing occasion");

      let users = match classify(
        self.preferences.enabled_users(&occasion.id).await,
        occasion,
        None,
        stats,
      )? {
        Lookup::Found(users) => users,
        Lookup::Skipped => continue,
      };

      for user_id in users {
        if *cancel.borrow() {
          stats.cancelled = true;
          return Ok(());
        }

        let Lookup::Found(profile) =
          classify(self.contacts.profile(user_id).await, occasion, Some(user_id), stats)?
        else {
          continue;
        };
        let Lookup::Found(contacts) = classify(
          self.contacts.active_contacts(user_id).await,
          occasion,
          Some(user_id),
          stats,
        )?
        else {
          continue;
        };
        tracing::debug!(
          occasion = %occasion.id,
          user = %user_id,
          contacts = contacts.len(),
          "user contacts discovered"
        );

        for contact in contacts.iter().filter(|c| c.is_eligible()) {
          let key = DispatchKey::new(&occasion.id, contact.contact_id, target);
          if stats.dry_run {
            self.plan(&key, user_id, stats).await;
            continue;
          }
          let message = self.compose(occasion, contact, profile.as_ref(), target.year());

          let permit = tokio::select! {
            biased;
            () = cancelled(cancel) => {
              stats.cancelled = true;
              return Ok(());
            }
            permit = Arc::clone(semaphore).acquire_owned() => permit,
          };
          // The semaphore is never closed.
          let Ok(permit) = permit else {
            return Ok(());
          };
          in_flight.reap(stats);

          let ledger = Arc::clone(&self.ledger);
          let transport = Arc::clone(&self.transport);
          let limit = self.config.send_timeout();
          let handle = in_flight.tasks.spawn(async move {
            let _permit = permit;
            deliver(&*ledger, &*transport, &key, message, limit).await
          });
          in_flight.jobs.insert(handle.id(), SendJob {
            occasion_id: occasion.id.clone(),
            user_id,
            contact_id: contact.contact_id,
          });
        }
      }
    }
    Ok(())
  }

  /// Dry-run stand-in for a send: a read-only ledger check.
  async fn plan(&self, key: &DispatchKey, user_id: Uuid, stats: &mut RunStats) {
    let outcome = match self.ledger.is_reserved(key).await {
      Ok(true) => SendOutcome::Duplicate,
      Ok(false) => SendOutcome::Planned,
      Err(e) => {
        tracing::warn!(occasion = %key.occasion_id, contact = %key.contact_id, error = %e, "ledger check failed");
        stats.record_lookup_failure(&key.occasion_id, Some(user_id), e.to_string());
        return;
      }
    };
    stats.record_outcome(&key.occasion_id, user_id, key.contact_id, outcome);
  }

  /// Render the greeting for one contact.
  fn compose(
    &self,
    occasion: &Occasion,
    contact: &Contact,
    sender: Option<&UserProfile>,
    year: i32,
  ) -> OutgoingMessage {
    let mut values = Personalization::for_contact(contact, sender, &occasion.display_name, year);
    if values
      .recipient_name
      .as_deref()
      .is_none_or(|name| name.trim().is_empty())
    {
      values.recipient_name = Some(self.config.default_recipient_name.clone());
    }

    let mut tags = vec![occasion.id.clone()];
    tags.extend(MESSAGE_TAGS.iter().map(|t| (*t).to_owned()));

    OutgoingMessage {
      to: contact.email.clone(),
      to_name: contact.display_name.clone(),
      subject: render(&occasion.subject_template, &values),
      body: render(&occasion.body_template, &values),
      cc: sender
        .filter(|_| self.config.copy_sender)
        .map(|p| p.email.clone()),
      tags,
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Sort a collaborator result into found, isolated failure, or run-fatal.
fn classify<V, E: StoreError>(
  result: std::result::Result<V, E>,
  occasion: &Occasion,
  user_id: Option<Uuid>,
  stats: &mut RunStats,
) -> Result<Lookup<V>> {
  match result {
    Ok(value) => Ok(Lookup::Found(value)),
    Err(e) if e.is_systemic() => {
      tracing::error!(occasion = %occasion.id, user = ?user_id, error = %e, "discovery failed, aborting run");
      Err(Error::Discovery {
        occasion_id: occasion.id.clone(),
        reason:      e.to_string(),
      })
    }
    Err(e) => {
      tracing::warn!(occasion = %occasion.id, user = ?user_id, error = %e, "lookup failed, skipping");
      stats.record_lookup_failure(&occasion.id, user_id, e.to_string());
      Ok(Lookup::Skipped)
    }
  }
}

/// Resolves once `cancel` reads `true`. Never resolves if the sender is gone
/// without having cancelled.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
  let closed = cancel.wait_for(|c| *c).await.is_err();
  if closed {
    std::future::pending::<()>().await;
  }
}

/// Reserve, send, then commit or release. Runs inside the worker pool.
async fn deliver<L: DispatchLedger, T: MailTransport>(
  ledger: &L,
  transport: &T,
  key: &DispatchKey,
  message: OutgoingMessage,
  limit: Duration,
) -> SendOutcome {
  match ledger.try_reserve(key).await {
    Ok(Reservation::Reserved) => {}
    Ok(Reservation::AlreadyReserved) => return SendOutcome::Duplicate,
    Err(e) => return SendOutcome::Failed(format!("reservation failed: {e}")),
  }

  let sent = match time::timeout(limit, transport.send(message)).await {
    Ok(Ok(message_id)) => Ok(message_id),
    Ok(Err(e)) => Err(e.to_string()),
    Err(_) => Err(format!("send timed out after {}s", limit.as_secs())),
  };

  match sent {
    Ok(message_id) => {
      if let Err(e) = ledger.commit(key, &message_id.0).await {
        // The reservation row still blocks a resend.
        tracing::warn!(
          occasion = %key.occasion_id,
          contact = %key.contact_id,
          error = %e,
          "greeting sent but ledger commit failed"
        );
      }
      tracing::debug!(occasion = %key.occasion_id, contact = %key.contact_id, %message_id, "greeting sent");
      SendOutcome::Sent
    }
    Err(reason) => {
      if let Err(e) = ledger.release(key).await {
        tracing::warn!(
          occasion = %key.occasion_id,
          contact = %key.contact_id,
          error = %e,
          "could not release reservation after failed send"
        );
      }
      SendOutcome::Failed(reason)
    }
  }
}
