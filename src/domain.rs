//! Domain models: questions, sampled quizzes, difficulty tiers, and the two
//! document kinds persisted in the store.

use bson::Bson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::util::round_half_even;

/// Number of choices every question is expected to carry.
pub const CHOICES_PER_QUESTION: usize = 4;

/// One multiple-choice question. Serialized in the shape the frontend reads:
/// `{ "question": ..., "choices": [...], "answer": <index> }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionRecord {
  #[serde(rename = "question")]
  pub text: String,
  pub choices: Vec<String>,
  #[serde(rename = "answer")]
  pub correct_index: usize,
}

impl QuestionRecord {
  pub fn new(text: impl Into<String>, choices: &[&str], correct_index: usize) -> Self {
    Self {
      text: text.into(),
      choices: choices.iter().map(|c| c.to_string()).collect(),
      correct_index,
    }
  }

  /// The correct choice value, if the index addresses one.
  pub fn correct_choice(&self) -> Option<&str> {
    self.choices.get(self.correct_index).map(String::as_str)
  }
}

/// Raw shape accepted from pool files and AI output. `answer` may be a number,
/// a numeric string, or garbage; anything unusable lands on index 0.
#[derive(Deserialize)]
struct RawQuestion {
  #[serde(default)]
  question: String,
  #[serde(default)]
  choices: Vec<String>,
  #[serde(default)]
  answer: serde_json::Value,
}

impl<'de> Deserialize<'de> for QuestionRecord {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = RawQuestion::deserialize(deserializer)?;
    let index = match &raw.answer {
      serde_json::Value::Number(n) => n.as_u64().map(|v| v as usize),
      serde_json::Value::String(s) => s.trim().parse::<usize>().ok(),
      _ => None,
    };
    let correct_index = index
      .filter(|i| *i < CHOICES_PER_QUESTION && *i < raw.choices.len())
      .unwrap_or(0);
    Ok(QuestionRecord { text: raw.question, choices: raw.choices, correct_index })
  }
}

/// A generated quiz ready to be sent to the client.
#[derive(Clone, Debug, Serialize)]
pub struct SampledQuiz {
  pub total_questions: usize,
  pub time_minutes: u32,
  pub questions: Vec<QuestionRecord>,
}

/// Difficulty tiers. Each one fixes the quiz length, the suggested time limit,
/// the audience described to the AI, and the pool file it samples from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DifficultyTier {
  Easy,
  Medium,
  Hard,
}

impl DifficultyTier {
  /// Lenient parse from whatever the client sent ("Mudah", "sedang", "SMA", "hard"...).
  pub fn from_label(label: Option<&str>) -> Self {
    let l = label.unwrap_or("Mudah").to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| l.contains(k));
    if has(&["sulit", "sukar", "hard", "dewasa"]) {
      DifficultyTier::Hard
    } else if has(&["sedang", "medium", "smp", "sma"]) {
      DifficultyTier::Medium
    } else {
      DifficultyTier::Easy
    }
  }

  pub fn question_count(self) -> usize {
    match self {
      DifficultyTier::Easy => 10,
      DifficultyTier::Medium => 15,
      DifficultyTier::Hard => 20,
    }
  }

  pub fn time_minutes(self) -> u32 {
    match self {
      DifficultyTier::Easy => 5,
      DifficultyTier::Medium => 8,
      DifficultyTier::Hard => 12,
    }
  }

  pub fn audience(self) -> &'static str {
    match self {
      DifficultyTier::Easy => "anak",
      DifficultyTier::Medium => "remaja",
      DifficultyTier::Hard => "dewasa",
    }
  }

  pub fn pool_file(self) -> &'static str {
    match self {
      DifficultyTier::Easy => "mudah.json",
      DifficultyTier::Medium => "sedang.json",
      DifficultyTier::Hard => "sulit.json",
    }
  }
}

/// Stored quiz attempt. Append-only; the id is assigned by the store.
///
/// Older rows may hold nulls, float scores or non-string answers, so numeric
/// and text fields are read leniently.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
  #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
  pub id: Option<bson::oid::ObjectId>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub name: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub email: Option<String>,
  #[serde(default, deserialize_with = "text_or_empty")]
  pub age_group: String,
  #[serde(default, deserialize_with = "text_or_empty")]
  pub question: String,
  #[serde(default, deserialize_with = "lenient_text")]
  pub answer: Option<String>,
  #[serde(default, deserialize_with = "number_or_zero")]
  pub score: i64,
  #[serde(default, deserialize_with = "number_or_zero")]
  pub percentage: i64,
  #[serde(rename = "totalQuestions", default, deserialize_with = "number_or_zero")]
  pub total_questions: i64,
  #[serde(default, deserialize_with = "text_or_empty")]
  pub difficulty: String,
  #[serde(rename = "timeSpent", default, deserialize_with = "number_or_zero")]
  pub time_spent: i64,
  #[serde(default, deserialize_with = "text_or_empty")]
  pub date: String,
  #[serde(default, deserialize_with = "text_or_empty")]
  pub feedback: String,
  #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
  pub created_at: DateTime<Utc>,
}

/// Best attempt per participant email. Rows written for anonymous submits
/// carry a null email.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaderboardEntry {
  #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
  pub id: Option<bson::oid::ObjectId>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub email: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub name: Option<String>,
  #[serde(default, deserialize_with = "number_or_zero")]
  pub score: i64,
  #[serde(default, deserialize_with = "lenient_number")]
  pub percentage: Option<i64>,
  #[serde(rename = "totalQuestions", default, deserialize_with = "lenient_number")]
  pub total_questions: Option<i64>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub difficulty: Option<String>,
  #[serde(rename = "timeSpent", default, deserialize_with = "lenient_number")]
  pub time_spent: Option<i64>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<bson::DateTime>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<bson::DateTime>,
}

/// Integer from an int, a double (rounded half to even) or a numeric string.
fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
  Ok(match Option::<Bson>::deserialize(d)? {
    Some(Bson::Int32(n)) => Some(i64::from(n)),
    Some(Bson::Int64(n)) => Some(n),
    Some(Bson::Double(f)) if f.is_finite() => Some(round_half_even(f)),
    Some(Bson::String(s)) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(round_half_even),
    _ => None,
  })
}

fn number_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
  Ok(lenient_number(d)?.unwrap_or(0))
}

/// Text from a string or any scalar; null and documents are absent.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
  Ok(match Option::<Bson>::deserialize(d)? {
    Some(Bson::String(s)) => Some(s),
    Some(Bson::Int32(n)) => Some(n.to_string()),
    Some(Bson::Int64(n)) => Some(n.to_string()),
    Some(Bson::Double(f)) => Some(f.to_string()),
    Some(Bson::Boolean(b)) => Some(b.to_string()),
    _ => None,
  })
}

fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(lenient_text(d)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tiers_parse_leniently() {
    assert_eq!(DifficultyTier::from_label(None), DifficultyTier::Easy);
    assert_eq!(DifficultyTier::from_label(Some("Mudah")), DifficultyTier::Easy);
    assert_eq!(DifficultyTier::from_label(Some("SEDANG")), DifficultyTier::Medium);
    assert_eq!(DifficultyTier::from_label(Some("kelas SMA")), DifficultyTier::Medium);
    assert_eq!(DifficultyTier::from_label(Some("Sulit")), DifficultyTier::Hard);
    assert_eq!(DifficultyTier::from_label(Some("dewasa")), DifficultyTier::Hard);
    assert_eq!(DifficultyTier::from_label(Some("whatever")), DifficultyTier::Easy);
  }

  #[test]
  fn question_answer_index_is_coerced() {
    let q: QuestionRecord =
      serde_json::from_str(r#"{"question":"Q","choices":["a","b","c","d"],"answer":"2"}"#).unwrap();
    assert_eq!(q.correct_index, 2);

    let q: QuestionRecord =
      serde_json::from_str(r#"{"question":"Q","choices":["a","b","c","d"],"answer":7}"#).unwrap();
    assert_eq!(q.correct_index, 0);

    let q: QuestionRecord =
      serde_json::from_str(r#"{"question":"Q","choices":["a","b","c","d"]}"#).unwrap();
    assert_eq!(q.correct_index, 0);
    assert_eq!(q.correct_choice(), Some("a"));
  }

  #[test]
  fn question_serializes_in_frontend_shape() {
    let q = QuestionRecord::new("Q", &["a", "b"], 1);
    let v = serde_json::to_value(&q).unwrap();
    assert_eq!(v["question"], "Q");
    assert_eq!(v["answer"], 1);
  }

  #[test]
  fn legacy_leaderboard_rows_are_readable() {
    let row = bson::doc! {
      "email": null,
      "name": "Anon",
      "score": 7.5,
      "percentage": 75,
      "totalQuestions": "10",
      "timeSpent": bson::Bson::Int32(42),
    };
    let e: LeaderboardEntry = bson::from_document(row).unwrap();
    assert_eq!(e.email, None);
    assert_eq!(e.score, 8);
    assert_eq!(e.percentage, Some(75));
    assert_eq!(e.total_questions, Some(10));
    assert_eq!(e.time_spent, Some(42));
    assert_eq!(e.difficulty, None);
  }

  #[test]
  fn legacy_submission_with_raw_answer_is_readable() {
    let row = bson::doc! {
      "name": null,
      "email": null,
      "age_group": null,
      "question": "Siapa proklamator?",
      "answer": 3,
      "score": 6.5,
      "percentage": 65,
      "totalQuestions": 10,
      "difficulty": "unknown",
      "timeSpent": 0,
      "date": "2024-08-17T00:00:00",
      "feedback": "ok",
      "created_at": bson::DateTime::now(),
    };
    let s: Submission = bson::from_document(row).unwrap();
    assert_eq!(s.answer.as_deref(), Some("3"));
    assert_eq!(s.score, 6);
    assert_eq!(s.age_group, "");
    assert_eq!(s.email, None);
  }
}
