//! Request and response bodies for the HTTP API.
//!
//! Inputs are permissive: the frontend has sent several shapes over time, so
//! field aliases are accepted and numbers may arrive as strings. Values that
//! cannot be coerced become absent instead of failing the request.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{LeaderboardEntry, QuestionRecord, SampledQuiz, Submission};
use crate::mail::MailMessage;

/// Integer from a JSON number or numeric string. Floats truncate toward zero;
/// anything else is `None`.
pub fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
  let v = Option::<serde_json::Value>::deserialize(d)?;
  Ok(v.as_ref().and_then(int_from_value))
}

fn int_from_value(v: &serde_json::Value) -> Option<i64> {
  match v {
    serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
    serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
    serde_json::Value::Bool(b) => Some(i64::from(*b)),
    _ => None,
  }
}

/// String from any scalar; numbers and booleans are rendered as text.
pub fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
  let v = Option::<serde_json::Value>::deserialize(d)?;
  Ok(match v {
    Some(serde_json::Value::String(s)) => Some(s),
    Some(serde_json::Value::Number(n)) => Some(n.to_string()),
    Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
    _ => None,
  })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
  let v = Option::<serde_json::Value>::deserialize(d)?;
  Ok(match v {
    Some(serde_json::Value::Bool(b)) => b,
    Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
    Some(serde_json::Value::String(s)) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
    _ => false,
  })
}

// --- /quiz/submit ---

#[derive(Debug, Default, Deserialize)]
pub struct SubmitIn {
  #[serde(default, alias = "nama", deserialize_with = "lenient_string")]
  pub name: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub email: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub difficulty: Option<String>,
  #[serde(
    default,
    rename = "totalQuestions",
    alias = "total_questions",
    alias = "totalquestions",
    deserialize_with = "lenient_int"
  )]
  pub total_questions: Option<i64>,
  #[serde(default, deserialize_with = "lenient_int")]
  pub percentage: Option<i64>,
  #[serde(default, alias = "ageGroup", alias = "agegroup", deserialize_with = "lenient_string")]
  pub age_group: Option<String>,
  #[serde(
    default,
    rename = "timeSpent",
    alias = "time_spent",
    alias = "timespent",
    deserialize_with = "lenient_int"
  )]
  pub time_spent: Option<i64>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub question: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub answer: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
  pub score: i64,
  pub percentage: i64,
  pub feedback: String,
  pub badge: String,
  pub inserted_id: Option<String>,
}

// --- /quiz/email ---

#[derive(Debug, Default, Deserialize)]
pub struct EmailIn {
  #[serde(default, deserialize_with = "lenient_string")]
  pub name: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub email: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub score: Option<String>,
  #[serde(default, rename = "totalQuestions", alias = "total_questions", deserialize_with = "lenient_string")]
  pub total_questions: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub percentage: Option<String>,
  #[serde(default, deserialize_with = "lenient_string")]
  pub badge: Option<String>,
  #[serde(default, rename = "emailId", alias = "email_id", deserialize_with = "lenient_string")]
  pub email_id: Option<String>,
  #[serde(default, alias = "inserted_id", deserialize_with = "lenient_string")]
  pub submission_id: Option<String>,
  #[serde(default)]
  pub cc: Option<serde_json::Value>,
  #[serde(default)]
  pub attachments: Option<serde_json::Value>,
  #[serde(default, deserialize_with = "lenient_bool")]
  pub debug: bool,
}

#[derive(Debug, Serialize)]
pub struct EmailOut {
  pub ok: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sent_payload: Option<MailMessage>,
}

// --- /quiz/submission/:id ---

/// Submission view without the question/answer text.
#[derive(Debug, Serialize)]
pub struct SubmissionOut {
  pub id: String,
  pub name: Option<String>,
  pub email: Option<String>,
  pub score: i64,
  pub percentage: i64,
  #[serde(rename = "totalQuestions")]
  pub total_questions: i64,
  #[serde(rename = "timeSpent")]
  pub time_spent: i64,
  pub difficulty: String,
  pub date: String,
  pub feedback: String,
}

impl SubmissionOut {
  pub fn from_submission(id: String, s: Submission) -> Self {
    Self {
      id,
      name: s.name,
      email: s.email,
      score: s.score,
      percentage: s.percentage,
      total_questions: s.total_questions,
      time_spent: s.time_spent,
      difficulty: s.difficulty,
      date: s.date,
      feedback: s.feedback,
    }
  }
}

// --- AI proxies ---

#[derive(Debug, Serialize)]
pub struct FactOut {
  pub fakta: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExplainIn {
  #[serde(default, deserialize_with = "lenient_string")]
  pub question: Option<String>,
  #[serde(default)]
  pub choices: Vec<String>,
  #[serde(default, deserialize_with = "lenient_int")]
  pub correct_index: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ExplainOut {
  pub explanation: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatIn {
  #[serde(default, deserialize_with = "lenient_string")]
  pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatOut {
  pub answer: String,
}

// --- /quiz/leaderboard ---

#[derive(Debug, Serialize)]
pub struct LeaderboardRow {
  pub rank: usize,
  pub name: Option<String>,
  pub email: Option<String>,
  pub score: i64,
  pub percentage: Option<i64>,
  #[serde(rename = "totalQuestions")]
  pub total_questions: Option<i64>,
  pub difficulty: Option<String>,
  #[serde(rename = "timeSpent")]
  pub time_spent: Option<i64>,
  pub date: Option<String>,
}

/// Ranks start at 1 and follow the given (score-descending) order.
pub fn ranked(entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardRow> {
  entries
    .into_iter()
    .enumerate()
    .map(|(i, e)| LeaderboardRow {
      rank: i + 1,
      name: e.name,
      email: e.email,
      score: e.score,
      percentage: e.percentage,
      total_questions: e.total_questions,
      difficulty: e.difficulty,
      time_spent: e.time_spent,
      date: e.date,
    })
    .collect()
}

// --- /admin/mailry/test ---

#[derive(Debug, Default, Deserialize)]
pub struct MailTestQuery {
  pub to: Option<String>,
  pub name: Option<String>,
  #[serde(rename = "emailId")]
  pub email_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MailTestOut {
  pub status_code: u16,
  pub ok: bool,
  pub body_snippet: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sent_payload: Option<MailMessage>,
}

// --- /quiz/questions ---

#[derive(Debug, Default, Deserialize)]
pub struct QuestionsIn {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub difficulty: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionsOut {
  pub total_questions: usize,
  pub time_minutes: u32,
  pub questions: Vec<QuestionRecord>,
}

impl From<SampledQuiz> for QuestionsOut {
  fn from(q: SampledQuiz) -> Self {
    Self { total_questions: q.total_questions, time_minutes: q.time_minutes, questions: q.questions }
  }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn submit_accepts_aliases_and_string_numbers() {
    let body = r#"{"nama":"Sari","total_questions":"10","percentage":80,"ageGroup":"anak","time_spent":"95"}"#;
    let s: SubmitIn = serde_json::from_str(body).unwrap();
    assert_eq!(s.name.as_deref(), Some("Sari"));
    assert_eq!(s.total_questions, Some(10));
    assert_eq!(s.percentage, Some(80));
    assert_eq!(s.age_group.as_deref(), Some("anak"));
    assert_eq!(s.time_spent, Some(95));
  }

  #[test]
  fn uncoercible_numbers_become_absent() {
    let s: SubmitIn = serde_json::from_str(r#"{"totalQuestions":"sepuluh","percentage":null}"#).unwrap();
    assert_eq!(s.total_questions, None);
    assert_eq!(s.percentage, None);
  }

  #[test]
  fn email_debug_flag_and_ids() {
    let e: EmailIn =
      serde_json::from_str(r#"{"email":"a@b.c","email_id":"x","inserted_id":"abc","debug":true,"score":8}"#).unwrap();
    assert!(e.debug);
    assert_eq!(e.email_id.as_deref(), Some("x"));
    assert_eq!(e.submission_id.as_deref(), Some("abc"));
    assert_eq!(e.score.as_deref(), Some("8"));
  }

  #[test]
  fn leaderboard_ranks_start_at_one() {
    let mk = |email: &str, score| LeaderboardEntry {
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
    };
    let rows = ranked(vec![mk("a@x", 9), mk("b@x", 4)]);
    assert_eq!(rows[0].rank, 1);
    assert_eq!(rows[1].rank, 2);
    assert_eq!(rows[1].email.as_deref(), Some("b@x"));
  }
}
