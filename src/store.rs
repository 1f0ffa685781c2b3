//! Submission and leaderboard persistence.
//!
//! `DocumentStore` is the seam between request handling / the reset scheduler
//! and the database. `MongoStore` is the production backend; `MemoryStore`
//! backs tests and local development (`STORE_BACKEND=memory`).
//!
//! The leaderboard upsert is a read-compare-write done by the caller; nothing
//! here makes it atomic, so concurrent submissions for one email can lose an
//! update.

use std::{
  future::{Future, IntoFuture},
  time::Duration,
};

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::{options::ClientOptions, Client, Collection};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::{LeaderboardEntry, Submission};

pub const SUBMISSIONS_COLLECTION: &str = "submissions";
pub const LEADERBOARD_COLLECTION: &str = "leaderboard";

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("invalid document id: {0}")]
  InvalidId(String),
  #[error("store operation timed out after {0:?}")]
  Timeout(Duration),
  #[error("mongodb: {0}")]
  Mongo(#[from] mongodb::error::Error),
  #[error("inserted id was not an ObjectId")]
  UnexpectedId,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
  /// Short backend name for logs.
  fn backend(&self) -> &'static str;

  /// Append a submission; returns the generated id as a hex string.
  async fn insert_submission(&self, submission: Submission) -> Result<String, StoreError>;

  async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError>;

  /// Id of the most recent submission for `email`, by `created_at`.
  async fn latest_submission_id(&self, email: &str) -> Result<Option<String>, StoreError>;

  async fn find_leaderboard_entry(&self, email: &str) -> Result<Option<LeaderboardEntry>, StoreError>;

  async fn insert_leaderboard_entry(&self, entry: LeaderboardEntry) -> Result<String, StoreError>;

  /// Overwrite the score fields of an existing entry (matched by id). Returns
  /// the number of modified documents.
  async fn update_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<u64, StoreError>;

  /// All leaderboard entries, highest score first.
  async fn leaderboard_by_score(&self) -> Result<Vec<LeaderboardEntry>, StoreError>;

  /// Bulk delete of every leaderboard entry; returns how many were removed.
  async fn clear_leaderboard(&self) -> Result<u64, StoreError>;

  /// Release connections. Called once at shutdown.
  async fn close(&self) {}
}

/// Decode leaderboard documents, dropping (and logging) rows that do not map.
pub fn map_leaderboard_rows(docs: Vec<Document>) -> Vec<LeaderboardEntry> {
  docs
    .into_iter()
    .filter_map(|d| {
      let id = d.get_object_id("_id").ok();
      match bson::from_document::<LeaderboardEntry>(d) {
        Ok(entry) => Some(entry),
        Err(e) => {
          warn!(target: "leaderboard", ?id, error = %e, "Skipping unreadable leaderboard row");
          None
        }
      }
    })
    .collect()
}

fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
  ObjectId::parse_str(id.trim()).map_err(|_| StoreError::InvalidId(id.to_string()))
}

// --- MongoDB ---

pub struct MongoStore {
  client: Client,
  submissions: Collection<Submission>,
  leaderboard: Collection<LeaderboardEntry>,
  op_timeout: Duration,
}

impl MongoStore {
  /// Connect and ping. Fails fast (3 s server selection) when the server is unreachable.
  #[instrument(level = "info", skip(uri))]
  pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
    let mut options = ClientOptions::parse(uri).await?;
    options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
    options.connect_timeout = Some(SERVER_SELECTION_TIMEOUT);
    options.app_name = Some("quiz-merdeka-backend".into());

    let client = Client::with_options(options)?;
    let db = client.database(db_name);
    db.run_command(doc! { "ping": 1 }).await?;
    info!(target: "quiz_merdeka", %db_name, "MongoDB: connected and collections initialized");

    Ok(Self {
      submissions: db.collection(SUBMISSIONS_COLLECTION),
      leaderboard: db.collection(LEADERBOARD_COLLECTION),
      client,
      op_timeout: OPERATION_TIMEOUT,
    })
  }

  async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
  where
    F: Future<Output = Result<T, mongodb::error::Error>> + Send,
  {
    tokio::time::timeout(self.op_timeout, fut)
      .await
      .map_err(|_| StoreError::Timeout(self.op_timeout))?
      .map_err(StoreError::from)
  }
}

#[async_trait]
impl DocumentStore for MongoStore {
  fn backend(&self) -> &'static str {
    "mongodb"
  }

  async fn insert_submission(&self, submission: Submission) -> Result<String, StoreError> {
    let res = self.timed(self.submissions.insert_one(submission).into_future()).await?;
    res.inserted_id.as_object_id().map(|oid| oid.to_hex()).ok_or(StoreError::UnexpectedId)
  }

  async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
    let oid = parse_id(id)?;
    self.timed(self.submissions.find_one(doc! { "_id": oid }).into_future()).await
  }

  async fn latest_submission_id(&self, email: &str) -> Result<Option<String>, StoreError> {
    let doc = self
      .timed(
        self
          .submissions
          .find_one(doc! { "email": email })
          .sort(doc! { "created_at": -1 })
          .into_future(),
      )
      .await?;
    Ok(doc.and_then(|d| d.id).map(|oid| oid.to_hex()))
  }

  async fn find_leaderboard_entry(&self, email: &str) -> Result<Option<LeaderboardEntry>, StoreError> {
    self.timed(self.leaderboard.find_one(doc! { "email": email }).into_future()).await
  }

  async fn insert_leaderboard_entry(&self, entry: LeaderboardEntry) -> Result<String, StoreError> {
    let res = self.timed(self.leaderboard.insert_one(entry).into_future()).await?;
    res.inserted_id.as_object_id().map(|oid| oid.to_hex()).ok_or(StoreError::UnexpectedId)
  }

  async fn update_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<u64, StoreError> {
    let Some(id) = entry.id else {
      return Ok(0);
    };
    let update = doc! {
      "$set": {
        "name": entry.name.clone(),
        "score": entry.score,
        "percentage": entry.percentage,
        "totalQuestions": entry.total_questions,
        "difficulty": entry.difficulty.clone(),
        "timeSpent": entry.time_spent,
        "date": entry.date.clone(),
        "updated_at": bson::DateTime::now(),
      }
    };
    let res = self
      .timed(self.leaderboard.update_one(doc! { "_id": id }, update).into_future())
      .await?;
    Ok(res.modified_count)
  }

  async fn leaderboard_by_score(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let raw = self.leaderboard.clone_with_type::<Document>();
    let docs = self
      .timed(async {
        let cursor = raw.find(doc! {}).sort(doc! { "score": -1 }).await?;
        cursor.try_collect::<Vec<_>>().await
      })
      .await?;
    Ok(map_leaderboard_rows(docs))
  }

  async fn clear_leaderboard(&self) -> Result<u64, StoreError> {
    let res = self.timed(self.leaderboard.delete_many(doc! {}).into_future()).await?;
    Ok(res.deleted_count)
  }

  async fn close(&self) {
    self.client.clone().shutdown().await;
    info!(target: "quiz_merdeka", "MongoDB: client shut down");
  }
}

// --- In-memory ---

/// Process-local store with the same semantics as `MongoStore`: ObjectId hex
/// ids, newest-first lookup by email, score-descending leaderboard.
#[derive(Default)]
pub struct MemoryStore {
  submissions: RwLock<Vec<Submission>>,
  leaderboard: RwLock<Vec<LeaderboardEntry>>,
}

#[async_trait]
impl DocumentStore for MemoryStore {
  fn backend(&self) -> &'static str {
    "memory"
  }

  async fn insert_submission(&self, mut submission: Submission) -> Result<String, StoreError> {
    let oid = ObjectId::new();
    submission.id = Some(oid);
    self.submissions.write().await.push(submission);
    Ok(oid.to_hex())
  }

  async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
    let oid = parse_id(id)?;
    let subs = self.submissions.read().await;
    Ok(subs.iter().find(|s| s.id == Some(oid)).cloned())
  }

  async fn latest_submission_id(&self, email: &str) -> Result<Option<String>, StoreError> {
    let subs = self.submissions.read().await;
    Ok(
      subs
        .iter()
        .filter(|s| s.email.as_deref() == Some(email))
        .max_by_key(|s| s.created_at)
        .and_then(|s| s.id)
        .map(|oid| oid.to_hex()),
    )
  }

  async fn find_leaderboard_entry(&self, email: &str) -> Result<Option<LeaderboardEntry>, StoreError> {
    let rows = self.leaderboard.read().await;
    Ok(rows.iter().find(|e| e.email.as_deref() == Some(email)).cloned())
  }

  async fn insert_leaderboard_entry(&self, mut entry: LeaderboardEntry) -> Result<String, StoreError> {
    let oid = ObjectId::new();
    entry.id = Some(oid);
    entry.created_at.get_or_insert_with(bson::DateTime::now);
    self.leaderboard.write().await.push(entry);
    Ok(oid.to_hex())
  }

  async fn update_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<u64, StoreError> {
    let mut rows = self.leaderboard.write().await;
    match rows.iter_mut().find(|e| e.id.is_some() && e.id == entry.id) {
      Some(row) => {
        let created_at = row.created_at;
        *row = entry.clone();
        row.created_at = created_at;
        row.updated_at = Some(bson::DateTime::now());
        Ok(1)
      }
      None => Ok(0),
    }
  }

  async fn leaderboard_by_score(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let mut rows = self.leaderboard.read().await.clone();
    rows.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(rows)
  }

  async fn clear_leaderboard(&self) -> Result<u64, StoreError> {
    let mut rows = self.leaderboard.write().await;
    let removed = rows.len() as u64;
    rows.clear();
    Ok(removed)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeDelta, Utc};

  use super::*;

  fn submission(email: &str, score: i64) -> Submission {
    Submission {
      id: None,
      name: Some("Tester".into()),
      email: Some(email.into()),
      age_group: "remaja".into(),
      question: String::new(),
      answer: None,
      score,
      percentage: score * 10,
      total_questions: 10,
      difficulty: "Mudah".into(),
      time_spent: 30,
      date: "2024-08-17".into(),
      feedback: "ok".into(),
      created_at: Utc::now(),
    }
  }

  fn entry(email: &str, score: i64) -> LeaderboardEntry {
    LeaderboardEntry {
      id: None,
      email: Some(email.into()),
      name: None,
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

  #[tokio::test]
  async fn submission_round_trip_and_bad_ids() {
    let store = MemoryStore::default();
    assert_eq!(store.backend(), "memory");
    let id = store.insert_submission(submission("a@x.id", 7)).await.unwrap();

    let found = store.find_submission(&id).await.unwrap().unwrap();
    assert_eq!(found.score, 7);

    let missing = ObjectId::new().to_hex();
    assert!(store.find_submission(&missing).await.unwrap().is_none());
    assert!(matches!(store.find_submission("not-an-id").await, Err(StoreError::InvalidId(_))));
  }

  #[tokio::test]
  async fn latest_submission_is_newest_by_created_at() {
    let store = MemoryStore::default();
    let mut old = submission("a@x.id", 1);
    old.created_at = Utc::now() - TimeDelta::hours(1);
    let newer = store.insert_submission(submission("a@x.id", 2)).await.unwrap();
    store.insert_submission(old).await.unwrap();
    store.insert_submission(submission("b@x.id", 3)).await.unwrap();

    assert_eq!(store.latest_submission_id("a@x.id").await.unwrap(), Some(newer));
    assert_eq!(store.latest_submission_id("nobody@x.id").await.unwrap(), None);
  }

  #[tokio::test]
  async fn leaderboard_sorts_updates_and_clears() {
    let store = MemoryStore::default();
    store.insert_leaderboard_entry(entry("a@x.id", 3)).await.unwrap();
    store.insert_leaderboard_entry(entry("b@x.id", 9)).await.unwrap();
    store.insert_leaderboard_entry(entry("c@x.id", 5)).await.unwrap();

    let mut a = store.find_leaderboard_entry("a@x.id").await.unwrap().unwrap();
    a.score = 10;
    assert_eq!(store.update_leaderboard_entry(&a).await.unwrap(), 1);

    let scores: Vec<i64> = store.leaderboard_by_score().await.unwrap().iter().map(|e| e.score).collect();
    assert_eq!(scores, [10, 9, 5]);

    assert_eq!(store.clear_leaderboard().await.unwrap(), 3);
    assert!(store.leaderboard_by_score().await.unwrap().is_empty());
  }

  #[test]
  fn unreadable_leaderboard_rows_are_skipped() {
    let docs = vec![
      doc! { "_id": ObjectId::new(), "email": "a@x.id", "score": 9 },
      doc! { "_id": ObjectId::new(), "email": "b@x.id", "score": 4, "created_at": "yesterday" },
      doc! { "_id": ObjectId::new(), "email": null, "score": 2.5 },
    ];
    let rows = map_leaderboard_rows(docs);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].email.as_deref(), Some("a@x.id"));
    assert_eq!(rows[1].email, None);
    assert_eq!(rows[1].score, 2);
  }
}
