//! Weekly leaderboard reset.
//!
//! The leaderboard is cleared every Sunday at 00:00 Jakarta civil time (UTC+7,
//! no DST). The task aligns once to the next boundary from the wall clock, then
//! fires every 7 days after that instant. It never fires twice for the same
//! boundary and never fires mid-day: a start on Sunday, even at exactly
//! midnight, waits for the following Sunday.
//!
//! A process that sleeps through one or more boundaries clears once on waking
//! and then realigns to the next boundary from the clock.
//!
//! The task is owned through a [`SchedulerHandle`]; every suspension point
//! observes its cancellation signal.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, Days, FixedOffset, TimeDelta, Utc, Weekday};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, instrument, warn};

use crate::store::DocumentStore;

/// UTC offset of Asia/Jakarta (WIB).
pub const RESET_UTC_OFFSET_SECS: i32 = 7 * 3600;
pub const RESET_WEEKDAY: Weekday = Weekday::Sun;
pub const RESET_INTERVAL_DAYS: i64 = 7;
/// Wait applied after an unexpected error before the loop resumes.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
  #[error("invalid reset timezone offset")]
  InvalidOffset,
  #[error("next reset time is out of range")]
  OutOfRange,
}

pub fn reset_timezone() -> Result<FixedOffset, ScheduleError> {
  FixedOffset::east_opt(RESET_UTC_OFFSET_SECS).ok_or(ScheduleError::InvalidOffset)
}

/// Next reset boundary strictly after `now`, skipping today when today is the
/// reset weekday.
pub fn next_reset_after(now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
  let tz = reset_timezone()?;
  let local = now.with_timezone(&tz);

  let today = local.weekday().num_days_from_monday();
  let target = RESET_WEEKDAY.num_days_from_monday();
  let days_ahead = match (target + 7 - today) % 7 {
    0 => 7,
    n => n,
  };

  let next = local
    .date_naive()
    .checked_add_days(Days::new(u64::from(days_ahead)))
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .and_then(|midnight| midnight.and_local_timezone(tz).single())
    .ok_or(ScheduleError::OutOfRange)?;
  Ok(next.with_timezone(&Utc))
}

/// Boundary one interval after `target`, or `None` when that instant is not
/// in the future (the process slept through it) and the loop must realign.
pub fn advance_after_fire(target: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
  target
    .checked_add_signed(TimeDelta::days(RESET_INTERVAL_DAYS))
    .filter(|next| *next > now)
}

/// Control handle for the running reset task.
pub struct SchedulerHandle {
  cancel: watch::Sender<bool>,
  task: JoinHandle<()>,
}

impl SchedulerHandle {
  /// Signal cancellation and wait for the loop to exit.
  pub async fn stop(self) {
    let _ = self.cancel.send(true);
    if let Err(e) = self.task.await {
      error!(target: "scheduler", error = %e, "Leaderboard reset task ended abnormally");
    }
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }
}

pub struct LeaderboardResetScheduler;

impl LeaderboardResetScheduler {
  /// Spawn the reset loop on the current runtime. `store` is `None` when the
  /// document store is not configured; fires are then logged and skipped.
  pub fn start(store: Option<Arc<dyn DocumentStore>>) -> SchedulerHandle {
    let (cancel, rx) = watch::channel(false);
    let task = tokio::spawn(run(store, rx));
    SchedulerHandle { cancel, task }
  }
}

async fn run(store: Option<Arc<dyn DocumentStore>>, mut cancel: watch::Receiver<bool>) {
  info!(target: "scheduler", offset_secs = RESET_UTC_OFFSET_SECS, weekday = ?RESET_WEEKDAY, "Weekly leaderboard reset loop started");
  let mut next_fire: Option<DateTime<Utc>> = None;

  loop {
    let target = match next_fire.take() {
      Some(t) => t,
      None => match next_reset_after(Utc::now()) {
        Ok(t) => t,
        Err(e) => {
          error!(target: "scheduler", error = %e, "Weekly reset loop error; retrying after backoff");
          if !sleep_or_cancel(ERROR_BACKOFF, &mut cancel).await {
            break;
          }
          continue;
        }
      },
    };

    // A suspended process wakes up late rather than skipping a reset.
    let delay = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    info!(target: "scheduler", delay_secs = delay.as_secs(), next_utc = %target, "Weekly reset scheduled");
    if !sleep_or_cancel(delay, &mut cancel).await {
      break;
    }

    clear_leaderboard(store.as_deref()).await;

    next_fire = advance_after_fire(target, Utc::now());
    if next_fire.is_none() {
      warn!(target: "scheduler", "Next weekly boundary already passed or out of range; realigning from clock");
    }
  }

  info!(target: "scheduler", "Weekly leaderboard reset loop cancelled");
}

#[instrument(level = "info", skip(store), fields(configured = store.is_some()))]
async fn clear_leaderboard(store: Option<&dyn DocumentStore>) {
  let Some(store) = store else {
    info!(target: "scheduler", "Weekly reset: leaderboard store not initialized; skipping");
    return;
  };
  match store.clear_leaderboard().await {
    Ok(removed) => info!(target: "scheduler", removed, "Weekly reset: leaderboard cleared"),
    Err(e) => error!(target: "scheduler", error = %e, "Weekly reset delete failed"),
  }
}

/// Returns `false` when cancelled (or the handle was dropped) before `duration` elapsed.
async fn sleep_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
  if *cancel.borrow() {
    return false;
  }
  tokio::select! {
    _ = tokio::time::sleep(duration) => true,
    _ = cancel.changed() => false,
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::domain::LeaderboardEntry;
  use crate::store::MemoryStore;

  fn wib(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    reset_timezone()
      .unwrap()
      .with_ymd_and_hms(y, m, d, h, min, s)
      .single()
      .unwrap()
      .with_timezone(&Utc)
  }

  #[test]
  fn monday_morning_waits_until_sunday_midnight() {
    // 2024-08-12 is a Monday.
    let now = wib(2024, 8, 12, 10, 0, 0);
    let next = next_reset_after(now).unwrap();
    assert_eq!(next, wib(2024, 8, 18, 0, 0, 0));
    assert_eq!(next - now, TimeDelta::days(5) + TimeDelta::hours(14));
  }

  #[test]
  fn exact_boundary_rolls_a_full_week() {
    let now = wib(2024, 8, 18, 0, 0, 0);
    assert_eq!(next_reset_after(now).unwrap(), wib(2024, 8, 25, 0, 0, 0));
  }

  #[test]
  fn sunday_after_midnight_never_fires_same_day() {
    let now = wib(2024, 8, 18, 0, 5, 0);
    assert_eq!(next_reset_after(now).unwrap(), wib(2024, 8, 25, 0, 0, 0));
  }

  #[test]
  fn saturday_night_fires_at_next_midnight() {
    let now = wib(2024, 8, 17, 23, 59, 59);
    let next = next_reset_after(now).unwrap();
    assert_eq!(next - now, TimeDelta::seconds(1));
  }

  #[test]
  fn boundary_is_computed_in_jakarta_time_not_utc() {
    // Sunday 20:00 UTC is already Monday 03:00 in Jakarta.
    let now = Utc.with_ymd_and_hms(2024, 8, 18, 20, 0, 0).unwrap();
    assert_eq!(next_reset_after(now).unwrap(), wib(2024, 8, 25, 0, 0, 0));
  }

  #[test]
  fn advance_keeps_weekly_cadence() {
    let target = wib(2024, 8, 18, 0, 0, 0);
    let now = target + TimeDelta::seconds(2);
    assert_eq!(advance_after_fire(target, now), Some(wib(2024, 8, 25, 0, 0, 0)));
  }

  #[test]
  fn long_suspension_realigns_instead_of_replaying_missed_weeks() {
    let target = wib(2024, 8, 18, 0, 0, 0);
    let woke_up = wib(2024, 9, 10, 9, 0, 0);
    assert_eq!(advance_after_fire(target, woke_up), None);
    assert_eq!(next_reset_after(woke_up).unwrap(), wib(2024, 9, 15, 0, 0, 0));
  }

  fn entry(email: &str, score: i64) -> LeaderboardEntry {
    LeaderboardEntry {
      id: None,
      email: Some(email.into()),
      name: Some("Peserta".into()),
      score,
      percentage: None,
      total_questions: None,
      difficulty: None,
      time_spent: None,
      date: None,
      created_at: None,
      updated_at: None,
    }
  }

  #[tokio::test(start_paused = true)]
  async fn clears_leaderboard_after_boundary() {
    let store = Arc::new(MemoryStore::default());
    store.insert_leaderboard_entry(entry("a@example.com", 5)).await.unwrap();
    store.insert_leaderboard_entry(entry("b@example.com", 7)).await.unwrap();

    let handle = LeaderboardResetScheduler::start(Some(store.clone() as Arc<dyn DocumentStore>));
    tokio::time::sleep(Duration::from_secs(8 * 24 * 3600)).await;

    assert!(store.leaderboard_by_score().await.unwrap().is_empty());
    assert!(!handle.is_finished());
    handle.stop().await;
  }

  #[tokio::test(start_paused = true)]
  async fn stop_interrupts_the_alignment_sleep() {
    let store = Arc::new(MemoryStore::default());
    store.insert_leaderboard_entry(entry("a@example.com", 5)).await.unwrap();

    let handle = LeaderboardResetScheduler::start(Some(store.clone() as Arc<dyn DocumentStore>));
    tokio::task::yield_now().await;
    handle.stop().await;

    assert_eq!(store.leaderboard_by_score().await.unwrap().len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn runs_without_a_store() {
    let handle = LeaderboardResetScheduler::start(None);
    tokio::time::sleep(Duration::from_secs(15 * 24 * 3600)).await;
    assert!(!handle.is_finished());
    handle.stop().await;
  }
}
