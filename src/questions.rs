//! Question pools per difficulty tier.
//!
//! Each tier reads `{SOAL_DIR}/{mudah,sedang,sulit}.json`, shaped
//! `{"questions": [{question, choices, answer}, ...]}`. A missing, unreadable
//! or empty file falls back to the built-in pool.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{DifficultyTier, QuestionRecord};
use crate::seeds;

#[derive(Deserialize)]
struct PoolFile {
  #[serde(default)]
  questions: Vec<QuestionRecord>,
}

/// Parse a pool file body. `None` when it is not valid or holds no questions.
pub fn parse_pool(body: &str) -> Option<Vec<QuestionRecord>> {
  serde_json::from_str::<PoolFile>(body)
    .ok()
    .map(|f| f.questions)
    .filter(|qs| !qs.is_empty())
}

pub async fn load_pool(soal_dir: &Path, tier: DifficultyTier) -> Vec<QuestionRecord> {
  let path = soal_dir.join(tier.pool_file());
  match tokio::fs::read_to_string(&path).await {
    Ok(body) => match parse_pool(&body) {
      Some(questions) => {
        debug!(target: "quiz_merdeka", path = %path.display(), count = questions.len(), "Loaded question pool");
        questions
      }
      None => {
        warn!(target: "quiz_merdeka", path = %path.display(), "Question pool file unusable; using built-in pool");
        seeds::default_pool()
      }
    },
    Err(e) => {
      debug!(target: "quiz_merdeka", path = %path.display(), error = %e, "No question pool file; using built-in pool");
      seeds::default_pool()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_or_broken_pool_is_rejected() {
    assert!(parse_pool("{\"questions\": []}").is_none());
    assert!(parse_pool("[1, 2]").is_none());
    let qs = parse_pool(r#"{"questions":[{"question":"Q","choices":["a","b"],"answer":1}]}"#).unwrap();
    assert_eq!(qs[0].correct_index, 1);
  }

  #[tokio::test]
  async fn missing_directory_uses_builtin_pool() {
    let pool = load_pool(Path::new("/definitely/not/here"), DifficultyTier::Hard).await;
    assert_eq!(pool, seeds::default_pool());
  }

  #[tokio::test]
  async fn tier_file_is_read_from_directory() {
    let dir = std::env::temp_dir().join(format!("quiz-pool-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
      dir.join("sedang.json"),
      r#"{"questions":[{"question":"Kapan Sumpah Pemuda?","choices":["1928","1945","1908","1966"],"answer":0}]}"#,
    )
    .unwrap();

    let pool = load_pool(&dir, DifficultyTier::Medium).await;
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].text, "Kapan Sumpah Pemuda?");

    std::fs::remove_dir_all(&dir).ok();
  }
}
