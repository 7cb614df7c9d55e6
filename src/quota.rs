//! Per-user generation allowance with a rolling reset window.
//!
//! Each user's record sits behind its own async mutex. A reservation holds
//! that lock from the pre-run check until the post-run decrement, so two
//! requests from the same user run one after the other and can never spend
//! the same allowance twice. Different users do not contend. Reads go through
//! a `watch` snapshot of the last settled record and never take that lock.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, instrument};

use crate::config::QuotaSettings;
use crate::domain::QuotaRecord;
use crate::error::GenerateError;

/// Restore the full allowance once the window has elapsed since the last reset.
pub fn reset_if_stale(record: QuotaRecord, now: DateTime<Utc>, settings: &QuotaSettings) -> QuotaRecord {
  if now - record.last_reset > settings.window() {
    QuotaRecord { remaining: settings.allowance, last_reset: now }
  } else {
    record
  }
}

/// One user's record. `record` is the reservation lock; `published` mirrors
/// the last settled value so readers never wait on a running workflow.
struct QuotaSlot {
  record: Arc<Mutex<QuotaRecord>>,
  published: watch::Sender<QuotaRecord>,
}

impl QuotaSlot {
  fn new(record: QuotaRecord) -> Self {
    let (published, _) = watch::channel(record.clone());
    Self { record: Arc::new(Mutex::new(record)), published }
  }

  fn publish(&self, record: &QuotaRecord) {
    self.published.send_replace(record.clone());
  }
}

#[derive(Clone)]
pub struct QuotaGate {
  settings: QuotaSettings,
  records: Arc<RwLock<HashMap<String, Arc<QuotaSlot>>>>,
}

/// Exclusive claim on one user's quota for the duration of a run.
/// Dropping it without `settle` leaves the record untouched.
pub struct QuotaReservation {
  user_id: String,
  slot: Arc<QuotaSlot>,
  guard: OwnedMutexGuard<QuotaRecord>,
}

impl QuotaReservation {
  pub fn remaining(&self) -> u32 {
    self.guard.remaining
  }

  /// Charge exactly `accepted` items.
  pub fn settle(mut self, accepted: usize) -> QuotaRecord {
    let charge = u32::try_from(accepted).unwrap_or(u32::MAX);
    self.guard.remaining = self.guard.remaining.saturating_sub(charge);
    self.slot.publish(&self.guard);
    info!(target: "quizgen_backend", user_id = %self.user_id, charged = charge, remaining = self.guard.remaining, "Quota settled");
    self.guard.clone()
  }
}

impl QuotaGate {
  pub fn new(settings: QuotaSettings) -> Self {
    Self { settings, records: Arc::new(RwLock::new(HashMap::new())) }
  }

  async fn slot(&self, user_id: &str, now: DateTime<Utc>) -> Arc<QuotaSlot> {
    if let Some(slot) = self.records.read().await.get(user_id) {
      return slot.clone();
    }
    let mut records = self.records.write().await;
    records
      .entry(user_id.to_string())
      .or_insert_with(|| {
        debug!(target: "quizgen_backend", %user_id, "Creating quota record");
        Arc::new(QuotaSlot::new(QuotaRecord { remaining: self.settings.allowance, last_reset: now }))
      })
      .clone()
  }

  /// Lock the user's record, apply the stale reset, and fail when nothing is left.
  #[instrument(level = "info", skip(self))]
  pub async fn check_and_reserve(&self, user_id: &str) -> Result<QuotaReservation, GenerateError> {
    self.check_and_reserve_at(user_id, Utc::now()).await
  }

  pub async fn check_and_reserve_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<QuotaReservation, GenerateError> {
    let slot = self.slot(user_id, now).await;
    let mut guard = slot.record.clone().lock_owned().await;
    let current = reset_if_stale(guard.clone(), now, &self.settings);
    if current != *guard {
      *guard = current;
      slot.publish(&guard);
    }

    if guard.remaining == 0 {
      info!(target: "quizgen_backend", %user_id, "Quota exhausted");
      return Err(GenerateError::QuotaExhausted { user_id: user_id.to_string() });
    }
    debug!(target: "quizgen_backend", %user_id, remaining = guard.remaining, "Quota reserved");
    Ok(QuotaReservation { user_id: user_id.to_string(), slot, guard })
  }

  /// Last settled record for display; never waits on a reservation.
  /// Users without one report a full allowance that is not stored.
  pub async fn peek(&self, user_id: &str) -> QuotaRecord {
    self.peek_at(user_id, Utc::now()).await
  }

  pub async fn peek_at(&self, user_id: &str, now: DateTime<Utc>) -> QuotaRecord {
    let slot = { self.records.read().await.get(user_id).cloned() };
    match slot {
      Some(slot) => {
        let published = slot.published.borrow().clone();
        reset_if_stale(published, now, &self.settings)
      }
      None => QuotaRecord { remaining: self.settings.allowance, last_reset: now },
    }
  }

  #[cfg(test)]
  pub async fn set(&self, user_id: &str, record: QuotaRecord) {
    let slot = self.slot(user_id, record.last_reset).await;
    *slot.record.lock().await = record.clone();
    slot.publish(&record);
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use chrono::Duration as ChronoDuration;

  use super::*;

  fn gate() -> QuotaGate {
    QuotaGate::new(QuotaSettings::default())
  }

  #[test]
  fn reset_only_after_the_window() {
    let settings = QuotaSettings::default();
    let t0 = Utc::now();
    let rec = QuotaRecord { remaining: 3, last_reset: t0 };

    let same = reset_if_stale(rec.clone(), t0 + ChronoDuration::hours(24), &settings);
    assert_eq!(same, rec);

    let later = t0 + ChronoDuration::hours(24) + ChronoDuration::seconds(1);
    let fresh = reset_if_stale(rec, later, &settings);
    assert_eq!(fresh, QuotaRecord { remaining: 50, last_reset: later });
  }

  #[tokio::test]
  async fn new_users_start_with_the_full_allowance() {
    let g = gate();
    assert_eq!(g.peek("alice").await.remaining, 50);
    let r = g.check_and_reserve("alice").await.expect("reserve");
    assert_eq!(r.remaining(), 50);
  }

  #[tokio::test]
  async fn settle_charges_exactly_the_accepted_count() {
    let g = gate();
    let rec = g.check_and_reserve("bob").await.expect("reserve").settle(7);
    assert_eq!(rec.remaining, 43);
    assert_eq!(g.peek("bob").await.remaining, 43);

    let rec = g.check_and_reserve("bob").await.expect("reserve").settle(0);
    assert_eq!(rec.remaining, 43);
  }

  #[tokio::test]
  async fn dropped_reservation_charges_nothing() {
    let g = gate();
    drop(g.check_and_reserve("carol").await.expect("reserve"));
    assert_eq!(g.peek("carol").await.remaining, 50);
  }

  #[tokio::test]
  async fn empty_quota_is_rejected_until_the_window_passes() {
    let g = gate();
    let t0 = Utc::now() - ChronoDuration::hours(1);
    g.set("dave", QuotaRecord { remaining: 0, last_reset: t0 }).await;

    let err = g.check_and_reserve_at("dave", t0 + ChronoDuration::minutes(30)).await.err();
    assert_eq!(err, Some(GenerateError::QuotaExhausted { user_id: "dave".into() }));

    let r = g.check_and_reserve_at("dave", t0 + ChronoDuration::hours(25)).await.expect("reset");
    assert_eq!(r.remaining(), 50);
  }

  #[tokio::test]
  async fn overcharge_saturates_at_zero() {
    let g = gate();
    g.set("erin", QuotaRecord { remaining: 2, last_reset: Utc::now() }).await;
    let rec = g.check_and_reserve("erin").await.expect("reserve").settle(5);
    assert_eq!(rec.remaining, 0);
  }

  #[tokio::test]
  async fn same_user_reservations_are_serialized() {
    let g = gate();
    let first = g.check_and_reserve("frank").await.expect("reserve");

    let g2 = g.clone();
    let waiter = tokio::spawn(async move { g2.check_and_reserve("frank").await.map(|r| r.remaining()) });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    // other users are not blocked
    assert!(g.check_and_reserve("grace").await.is_ok());

    first.settle(10);
    let seen = waiter.await.expect("join").expect("reserve");
    assert_eq!(seen, 40);
  }

  #[tokio::test]
  async fn peek_does_not_wait_for_a_held_reservation() {
    let g = gate();
    g.set("hana", QuotaRecord { remaining: 12, last_reset: Utc::now() }).await;
    let held = g.check_and_reserve("hana").await.expect("reserve");

    let seen = tokio::time::timeout(Duration::from_millis(200), g.peek("hana")).await.expect("peek blocked");
    assert_eq!(seen.remaining, 12);

    held.settle(5);
    assert_eq!(g.peek("hana").await.remaining, 7);
  }

  #[tokio::test]
  async fn peek_reports_a_stale_record_as_reset_without_storing_it() {
    let g = gate();
    let t0 = Utc::now() - ChronoDuration::hours(30);
    g.set("ivan", QuotaRecord { remaining: 0, last_reset: t0 }).await;

    let now = Utc::now();
    assert_eq!(g.peek_at("ivan", now).await, QuotaRecord { remaining: 50, last_reset: now });
    assert_eq!(g.peek_at("ivan", t0).await.remaining, 0);
  }
}
