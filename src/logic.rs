//! Core request flows, kept apart from the axum handlers so they can be driven
//! directly in tests.
//!
//! Best-effort steps (AI scoring, store writes after the submission insert,
//! result email dispatch, fact/explanation generation) log and degrade instead
//! of failing the request.

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, instrument, warn};

use crate::domain::{DifficultyTier, LeaderboardEntry, Submission};
use crate::error::AppError;
use crate::mail::{
  self, MailGateway, ScoreSummary, SubmitSummary, DEBUG_PAYLOAD_SENDER, RESULT_MAIL_TIMEOUT,
  SUBMIT_MAIL_TIMEOUT, TEST_MAIL_TIMEOUT,
};
use crate::protocol::*;
use crate::questions;
use crate::sampler;
use crate::seeds;
use crate::state::AppState;
use crate::store::DocumentStore;
use crate::util::{is_hyphenated_uuid, round_half_even, take_chars};

pub const BADGE: &str = "🏅 Kemerdekaan!";
pub const CLIENT_SCORED_FEEDBACK: &str = "Hasil dinilai oleh klien";
pub const DEFAULT_AI_FEEDBACK: &str = "Jawabanmu menarik!";
pub const SCORING_FAILED_FEEDBACK: &str = "Jawabanmu disimpan";
const DEFAULT_AGE_GROUP: &str = "remaja";
const DEFAULT_DIFFICULTY: &str = "unknown";
const DEFAULT_RECIPIENT_NAME: &str = "Peserta";
const DEFAULT_EMAIL_BADGE: &str = "Badge Kemerdekaan";
const MAIL_NOT_CONFIGURED: &str = "mail service not configured (set MAILRY_API_URL or MAILRY_SETUP_LINK)";
const SNIPPET_CHARS: usize = 4000;

/// `round_half_even(percentage / 100 * total)`, or `None` when the client did
/// not report a usable result.
pub fn client_score(percentage: Option<i64>, total_questions: Option<i64>) -> Option<i64> {
  match (percentage, total_questions) {
    (Some(p), Some(t)) if t != 0 => Some(round_half_even(p as f64 / 100.0 * t as f64)),
    _ => None,
  }
}

/// Percentage to store when the client sent none.
pub fn derive_percentage(score: i64, total_questions: i64) -> i64 {
  if total_questions != 0 {
    round_half_even(score as f64 / total_questions as f64 * 100.0)
  } else {
    score
  }
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// --- submit ---

#[instrument(level = "info", skip(state, input), fields(has_email = input.email.is_some()))]
pub async fn submit(state: &AppState, input: SubmitIn) -> Result<SubmitOut, AppError> {
  let (score, feedback) = match client_score(input.percentage, input.total_questions) {
    Some(score) => (score, CLIENT_SCORED_FEEDBACK.to_string()),
    None => {
      let question = input.question.as_deref().unwrap_or_default();
      let answer = input.answer.as_deref().unwrap_or_default();
      match state.ai.evaluate(question, answer).await {
        Ok(ev) => (
          round_half_even(ev.score),
          non_blank(ev.feedback).unwrap_or_else(|| DEFAULT_AI_FEEDBACK.to_string()),
        ),
        Err(e) => {
          warn!(target: "quiz_merdeka", error = %e, "AI scoring unavailable; storing with score 0");
          (0, SCORING_FAILED_FEEDBACK.to_string())
        }
      }
    }
  };

  let total_questions = input.total_questions.unwrap_or(0);
  let percentage = input.percentage.unwrap_or_else(|| derive_percentage(score, total_questions));
  let email = non_blank(input.email);

  let submission = Submission {
    id: None,
    name: input.name,
    email: email.clone(),
    age_group: non_blank(input.age_group).unwrap_or_else(|| DEFAULT_AGE_GROUP.to_string()),
    question: input.question.unwrap_or_default(),
    answer: input.answer,
    score,
    percentage,
    total_questions,
    difficulty: non_blank(input.difficulty).unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
    time_spent: input.time_spent.unwrap_or(0),
    date: non_blank(input.date).unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    feedback,
    created_at: Utc::now(),
  };

  let inserted_id = match state.store() {
    Some(store) => match store.insert_submission(submission.clone()).await {
      Ok(id) => {
        info!(target: "quiz_merdeka", %id, "Inserted submission");
        Some(id)
      }
      Err(e) => {
        error!(target: "quiz_merdeka", error = %e, "Failed to insert submission");
        None
      }
    },
    None => {
      warn!(target: "quiz_merdeka", "Store not configured; submission not persisted");
      None
    }
  };

  if let Some(email) = &email {
    if let Some(store) = state.store() {
      record_best_score(store, email, &submission).await;
    }
    if let Some(gateway) = &state.mail {
      dispatch_result_email(state, gateway, email, &submission, inserted_id.as_deref());
    }
  }

  Ok(SubmitOut {
    score: submission.score,
    percentage: submission.percentage,
    feedback: submission.feedback,
    badge: BADGE.to_string(),
    inserted_id,
  })
}

/// Keep the best attempt per email: insert when absent, overwrite only on a
/// strictly higher score.
///
/// Read-compare-write without a lock; two concurrent submissions for the same
/// email can lose the better score.
#[instrument(level = "debug", skip(store, submission))]
pub async fn record_best_score(store: &dyn DocumentStore, email: &str, submission: &Submission) {
  let existing = match store.find_leaderboard_entry(email).await {
    Ok(entry) => entry,
    Err(e) => {
      error!(target: "leaderboard", %email, error = %e, "Error reading leaderboard entry; skipping update");
      return;
    }
  };

  match existing {
    Some(mut entry) => {
      if submission.score <= entry.score {
        info!(target: "leaderboard", %email, best = entry.score, attempt = submission.score, "Leaderboard unchanged");
        return;
      }
      entry.name = submission.name.clone();
      entry.score = submission.score;
      entry.percentage = Some(submission.percentage);
      entry.total_questions = Some(submission.total_questions);
      entry.difficulty = Some(submission.difficulty.clone());
      entry.time_spent = Some(submission.time_spent);
      entry.date = Some(submission.date.clone());
      entry.updated_at = Some(bson::DateTime::now());
      match store.update_leaderboard_entry(&entry).await {
        Ok(modified) => info!(target: "leaderboard", %email, modified, "Updated leaderboard entry"),
        Err(e) => error!(target: "leaderboard", %email, error = %e, "Failed to update leaderboard"),
      }
    }
    None => {
      let entry = LeaderboardEntry {
        id: None,
        email: Some(email.to_string()),
        name: submission.name.clone(),
        score: submission.score,
        percentage: Some(submission.percentage),
        total_questions: Some(submission.total_questions),
        difficulty: Some(submission.difficulty.clone()),
        time_spent: Some(submission.time_spent),
        date: Some(submission.date.clone()),
        created_at: Some(bson::DateTime::now()),
        updated_at: None,
      };
      match store.insert_leaderboard_entry(entry).await {
        Ok(id) => info!(target: "leaderboard", %email, %id, "Inserted leaderboard entry"),
        Err(e) => error!(target: "leaderboard", %email, error = %e, "Failed to insert leaderboard entry"),
      }
    }
  }
}

/// Fire-and-forget result email. Skipped when no valid sender id is configured.
fn dispatch_result_email(
  state: &AppState,
  gateway: &MailGateway,
  email: &str,
  submission: &Submission,
  inserted_id: Option<&str>,
) {
  let Some(sender) = gateway.default_sender().filter(|s| is_hyphenated_uuid(s)) else {
    warn!(target: "mail", "MAILRY_EMAIL_ID missing or not a UUID; result email skipped");
    return;
  };
  let summary = SubmitSummary {
    name: submission.name.as_deref().unwrap_or(DEFAULT_RECIPIENT_NAME),
    percentage: submission.percentage,
    time_spent: submission.time_spent,
    feedback: &submission.feedback,
    badge: BADGE,
  };
  let result_url = inserted_id.map(|id| state.config.result_url(id));
  let msg = mail::submit_result_email(sender.to_string(), email.to_string(), &summary, result_url);

  let gateway = gateway.clone();
  tokio::spawn(async move {
    if let Err(e) = gateway.send(&msg, SUBMIT_MAIL_TIMEOUT).await {
      warn!(target: "mail", error = %e, "Result email after submit failed");
    }
  });
}

// --- email ---

#[instrument(level = "info", skip(state, input, debug))]
pub async fn send_result_email(state: &AppState, input: EmailIn, debug: bool) -> Result<EmailOut, AppError> {
  let gateway = state.mail.as_ref().ok_or_else(|| AppError::ServiceUnavailable(MAIL_NOT_CONFIGURED.into()))?;
  let to = non_blank(input.email).ok_or_else(|| AppError::InvalidInput("missing email".into()))?;
  let sender = gateway.resolve_sender(input.email_id.as_deref())?;

  let mut submission_id = non_blank(input.submission_id);
  if submission_id.is_none() {
    if let Some(store) = state.store() {
      match store.latest_submission_id(&to).await {
        Ok(found) => submission_id = found,
        Err(e) => warn!(target: "mail", error = %e, "Could not look up latest submission for result link"),
      }
    }
  }
  let result_url = submission_id.map(|id| state.config.result_url(&id));

  let name = non_blank(input.name).unwrap_or_else(|| DEFAULT_RECIPIENT_NAME.to_string());
  let badge = non_blank(input.badge).unwrap_or_else(|| DEFAULT_EMAIL_BADGE.to_string());
  let score = input.score.unwrap_or_else(|| "-".into());
  let total = input.total_questions.unwrap_or_else(|| "-".into());
  let percentage = input.percentage.unwrap_or_else(|| "-".into());
  let summary = ScoreSummary { name: &name, score: &score, total: &total, percentage: &percentage, badge: &badge };

  let mut msg = mail::score_email(sender, to, &summary, result_url);
  msg.cc = input.cc.filter(is_present);
  msg.attachments = input.attachments.filter(is_present);

  gateway.send(&msg, RESULT_MAIL_TIMEOUT).await?;

  let debug = debug || input.debug;
  Ok(EmailOut { ok: true, sent_payload: debug.then_some(msg) })
}

/// JSON truthiness for optional passthrough fields.
fn is_present(v: &serde_json::Value) -> bool {
  match v {
    serde_json::Value::Null => false,
    serde_json::Value::Bool(b) => *b,
    serde_json::Value::String(s) => !s.is_empty(),
    serde_json::Value::Array(a) => !a.is_empty(),
    serde_json::Value::Object(o) => !o.is_empty(),
    serde_json::Value::Number(_) => true,
  }
}

// --- submission lookup ---

#[instrument(level = "info", skip(state))]
pub async fn get_submission(state: &AppState, id: &str) -> Result<SubmissionOut, AppError> {
  let store = state.store().ok_or_else(|| AppError::ServiceUnavailable("database unavailable".into()))?;
  let submission = store
    .find_submission(id)
    .await?
    .ok_or_else(|| AppError::NotFound("submission not found".into()))?;
  let id = submission.id.map(|oid| oid.to_hex()).unwrap_or_else(|| id.to_string());
  Ok(SubmissionOut::from_submission(id, submission))
}

// --- AI proxies ---

#[instrument(level = "info", skip(state))]
pub async fn fact(state: &AppState) -> FactOut {
  let fakta = match state.ai.fact(&state.prompts).await {
    Ok(text) => text,
    Err(e) => {
      info!(target: "ai", error = %e, "Serving built-in fact");
      seeds::FALLBACK_FACT.to_string()
    }
  };
  FactOut { fakta }
}

#[instrument(level = "info", skip(state, input))]
pub async fn explain(state: &AppState, input: ExplainIn) -> Result<ExplainOut, AppError> {
  let (Some(question), Some(correct_index)) = (non_blank(input.question), input.correct_index) else {
    return Err(AppError::InvalidInput("missing fields".into()));
  };
  if input.choices.is_empty() {
    return Err(AppError::InvalidInput("missing fields".into()));
  }

  let explanation = match state.ai.explain(&state.prompts, &question, &input.choices, correct_index).await {
    Ok(text) => text,
    Err(e) => {
      info!(target: "ai", error = %e, "Serving built-in explanation");
      let correct = usize::try_from(correct_index).ok().and_then(|i| input.choices.get(i));
      seeds::fallback_explanation(correct.map(String::as_str))
    }
  };
  Ok(ExplainOut { explanation })
}

#[instrument(level = "info", skip(state, input))]
pub async fn chat(state: &AppState, input: ChatIn) -> Result<ChatOut, AppError> {
  let question = non_blank(input.question).ok_or_else(|| AppError::InvalidInput("missing question".into()))?;
  let answer = match state.ai.chat(&state.prompts, &question).await {
    Ok(text) => text,
    Err(e) => {
      info!(target: "ai", error = %e, "Serving built-in chat answer");
      seeds::FALLBACK_CHAT_ANSWER.to_string()
    }
  };
  Ok(ChatOut { answer })
}

// --- leaderboard ---

#[instrument(level = "info", skip(state))]
pub async fn leaderboard(state: &AppState) -> Vec<LeaderboardRow> {
  let Some(store) = state.store() else {
    return Vec::new();
  };
  match store.leaderboard_by_score().await {
    Ok(entries) => ranked(entries),
    Err(e) => {
      error!(target: "leaderboard", error = %e, "Failed to fetch leaderboard");
      Vec::new()
    }
  }
}

// --- mail diagnostics ---

#[instrument(level = "info", skip(state, query))]
pub async fn mail_test(state: &AppState, query: MailTestQuery) -> Result<MailTestOut, AppError> {
  let gateway = state.mail.as_ref().ok_or_else(|| AppError::ServiceUnavailable(MAIL_NOT_CONFIGURED.into()))?;
  let to = non_blank(query.to).ok_or_else(|| AppError::InvalidInput("missing 'to' query parameter".into()))?;
  let requested_sender = non_blank(query.email_id);
  let sender = requested_sender
    .clone()
    .or_else(|| gateway.default_sender().map(str::to_string))
    .ok_or_else(|| {
      AppError::ServiceUnavailable(
        "mail sender not configured: include 'emailId' as query param or set MAILRY_EMAIL_ID env var".into(),
      )
    })?;
  let name = non_blank(query.name).unwrap_or_else(|| DEFAULT_RECIPIENT_NAME.to_string());

  let msg = mail::test_email(sender, to, &name, &state.config.frontend_base);
  let reply = gateway
    .post_raw(&msg, TEST_MAIL_TIMEOUT)
    .await
    .map_err(|e| AppError::UpstreamFailure(format!("failed to call mail service: {e}")))?;
  info!(target: "mail", to = %msg.to, status = reply.status, url = %gateway.endpoint(), "Sent test email");

  let include_payload = requested_sender.as_deref() == Some(DEBUG_PAYLOAD_SENDER);
  Ok(MailTestOut {
    status_code: reply.status,
    ok: reply.is_success(),
    body_snippet: take_chars(&reply.body, SNIPPET_CHARS),
    sent_payload: include_payload.then_some(msg),
  })
}

// --- questions ---

#[instrument(level = "info", skip(state, input), fields(difficulty = ?input.difficulty))]
pub async fn generate_questions(state: &AppState, input: QuestionsIn) -> Result<QuestionsOut, AppError> {
  let tier = DifficultyTier::from_label(input.difficulty.as_deref());

  if state.ai.has_primary() {
    match state.ai.generate_quiz(&state.prompts, tier).await {
      Ok(quiz) => {
        info!(target: "quiz_merdeka", ?tier, count = quiz.questions.len(), source = "ai", "Quiz generated");
        return Ok(quiz.into());
      }
      Err(e) => warn!(target: "quiz_merdeka", ?tier, error = %e, "AI quiz generation failed; sampling local pool"),
    }
  }

  let pool = questions::load_pool(&state.config.soal_dir, tier).await;
  let quiz = sampler::sample(&pool, tier.question_count(), tier.time_minutes(), &mut rand::thread_rng())?;
  info!(target: "quiz_merdeka", ?tier, count = quiz.questions.len(), source = "pool", "Quiz sampled");
  Ok(quiz.into())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::config::Config;
  use crate::store::MemoryStore;

  fn state_with_memory() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let state = AppState::with_store(Config::default(), Some(store.clone() as Arc<dyn DocumentStore>));
    (state, store)
  }

  #[test]
  fn client_score_rounds_half_to_even() {
    assert_eq!(client_score(Some(80), Some(10)), Some(8));
    assert_eq!(client_score(Some(85), Some(10)), Some(8));
    assert_eq!(client_score(Some(95), Some(10)), Some(10));
    assert_eq!(client_score(Some(80), Some(0)), None);
    assert_eq!(client_score(None, Some(10)), None);
  }

  #[test]
  fn percentage_is_derived_from_score() {
    assert_eq!(derive_percentage(3, 4), 75);
    assert_eq!(derive_percentage(3, 0), 3);
  }

  #[tokio::test]
  async fn client_scored_submission_updates_leaderboard_only_when_better() {
    let (state, store) = state_with_memory();
    let first = SubmitIn {
      email: Some("sari@example.com".into()),
      name: Some("Sari".into()),
      percentage: Some(80),
      total_questions: Some(10),
      ..SubmitIn::default()
    };
    let out = submit(&state, first).await.unwrap();
    assert_eq!(out.score, 8);
    assert_eq!(out.feedback, CLIENT_SCORED_FEEDBACK);
    assert_eq!(out.badge, BADGE);
    assert!(out.inserted_id.is_some());

    let worse = SubmitIn {
      email: Some("sari@example.com".into()),
      percentage: Some(50),
      total_questions: Some(10),
      ..SubmitIn::default()
    };
    submit(&state, worse).await.unwrap();
    let board = store.leaderboard_by_score().await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].score, 8);

    let better = SubmitIn {
      email: Some("sari@example.com".into()),
      percentage: Some(100),
      total_questions: Some(10),
      ..SubmitIn::default()
    };
    submit(&state, better).await.unwrap();
    let board = store.leaderboard_by_score().await.unwrap();
    assert_eq!(board[0].score, 10);
    assert!(board[0].updated_at.is_some());
  }

  #[tokio::test]
  async fn unscored_submission_without_ai_gets_zero() {
    let (state, store) = state_with_memory();
    let out = submit(&state, SubmitIn { question: Some("Q".into()), ..SubmitIn::default() }).await.unwrap();
    assert_eq!(out.score, 0);
    assert_eq!(out.percentage, 0);
    assert_eq!(out.feedback, SCORING_FAILED_FEEDBACK);

    let stored = store.find_submission(out.inserted_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.age_group, "remaja");
    assert_eq!(stored.difficulty, "unknown");
    assert!(store.leaderboard_by_score().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn submission_view_maps_store_errors() {
    let (state, _) = state_with_memory();
    assert!(matches!(get_submission(&state, "xyz").await, Err(AppError::InvalidInput(_))));
    assert!(matches!(
      get_submission(&state, "64b7f0c2a1b2c3d4e5f60718").await,
      Err(AppError::NotFound(_))
    ));

    let bare = AppState::with_store(Config::default(), None);
    assert!(matches!(get_submission(&bare, "64b7f0c2a1b2c3d4e5f60718").await, Err(AppError::ServiceUnavailable(_))));
  }

  #[tokio::test]
  async fn explain_validates_and_falls_back() {
    let (state, _) = state_with_memory();
    let missing = ExplainIn { question: Some("Q".into()), choices: vec![], correct_index: Some(0) };
    assert!(matches!(explain(&state, missing).await, Err(AppError::InvalidInput(_))));

    let ok = ExplainIn {
      question: Some("Siapa proklamator?".into()),
      choices: vec!["Sukarno & Hatta".into(), "Sjahrir".into()],
      correct_index: Some(0),
    };
    let out = explain(&state, ok).await.unwrap();
    assert!(out.explanation.contains("'Sukarno & Hatta'"));
  }

  #[tokio::test]
  async fn chat_and_fact_use_builtin_texts_without_ai() {
    let (state, _) = state_with_memory();
    assert!(matches!(chat(&state, ChatIn { question: Some("  ".into()) }).await, Err(AppError::InvalidInput(_))));
    let out = chat(&state, ChatIn { question: Some("Kapan merdeka?".into()) }).await.unwrap();
    assert_eq!(out.answer, seeds::FALLBACK_CHAT_ANSWER);
    assert_eq!(fact(&state).await.fakta, seeds::FALLBACK_FACT);
  }

  #[tokio::test]
  async fn questions_follow_tier_sizes() {
    let (state, _) = state_with_memory();
    let out = generate_questions(&state, QuestionsIn { difficulty: Some("Sulit".into()), ..QuestionsIn::default() })
      .await
      .unwrap();
    assert_eq!(out.total_questions, 20);
    assert_eq!(out.time_minutes, 12);
    assert_eq!(out.questions.len(), 20);
  }

  #[tokio::test]
  async fn email_requires_configured_gateway() {
    let (state, _) = state_with_memory();
    let input = EmailIn { email: Some("a@example.com".into()), ..EmailIn::default() };
    assert!(matches!(send_result_email(&state, input, false).await, Err(AppError::ServiceUnavailable(_))));
  }
}
