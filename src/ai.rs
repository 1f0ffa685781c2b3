//! Outbound AI client.
//!
//! Two providers, both optional:
//! - primary: an OpenAI-compatible `/v1/chat/completions` endpoint plus an
//!   `/evaluate` scoring endpoint, enabled by OPENAI_API_KEY;
//! - fallback: a small REST provider with canned `/fakta`, `/explain` and `/chat`
//!   routes, enabled by LUNOS_API_KEY.
//!
//! Every call carries its own timeout. Callers decide what to do on failure;
//! the fixed Indonesian fallback texts live in `seeds`.
//!
//! NOTE: API keys are never logged and reply bodies are truncated in logs.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::{Config, Prompts};
use crate::domain::{DifficultyTier, QuestionRecord, SampledQuiz};
use crate::util::{extract_json_object, fill_template, trunc_for_log};

const CLIENT_UA: &str = "quiz-merdeka-backend/0.1";

pub const FACT_TIMEOUT: Duration = Duration::from_secs(8);
pub const EXPLAIN_TIMEOUT: Duration = Duration::from_secs(8);
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(10);
pub const QUESTIONS_TIMEOUT: Duration = Duration::from_secs(10);
pub const EVALUATE_TIMEOUT: Duration = Duration::from_secs(6);
const FALLBACK_SHORT_TIMEOUT: Duration = Duration::from_secs(6);
const FALLBACK_CHAT_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, thiserror::Error)]
pub enum AiError {
  #[error("AI provider not configured")]
  NotConfigured,
  #[error("AI request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("AI provider HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("AI reply had no usable content")]
  EmptyReply,
  #[error("AI reply could not be parsed: {0}")]
  Decode(String),
}

#[derive(Clone, Debug)]
struct Primary {
  api_key: String,
  base_url: String,
  model: String,
}

#[derive(Clone, Debug)]
struct Fallback {
  api_key: String,
  base_url: String,
}

/// Result of the primary scoring endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Evaluation {
  #[serde(default)]
  pub score: f64,
  #[serde(default)]
  pub feedback: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AiGateway {
  client: reqwest::Client,
  primary: Option<Primary>,
  fallback: Option<Fallback>,
}

impl AiGateway {
  pub fn from_config(cfg: &Config) -> Self {
    let primary = cfg.ai_api_key.as_ref().map(|key| Primary {
      api_key: key.clone(),
      base_url: cfg.ai_base_url.trim_end_matches('/').to_string(),
      model: cfg.ai_model.clone(),
    });
    let fallback = cfg.lunos_api_key.as_ref().map(|key| Fallback {
      api_key: key.clone(),
      base_url: cfg.lunos_base_url.trim_end_matches('/').to_string(),
    });
    info!(
      target: "ai",
      primary = primary.is_some(),
      fallback = fallback.is_some(),
      model = %cfg.ai_model,
      "AI gateway configured"
    );
    Self { client: reqwest::Client::new(), primary, fallback }
  }

  pub fn has_primary(&self) -> bool {
    self.primary.is_some()
  }

  /// Single-turn completion against the primary provider.
  #[instrument(level = "info", skip(self, prompt), fields(prompt_len = prompt.len()))]
  pub async fn complete(
    &self,
    prompt: &str,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
  ) -> Result<String, AiError> {
    let primary = self.primary.as_ref().ok_or(AiError::NotConfigured)?;
    let url = format!("{}/v1/chat/completions", primary.base_url);
    let req = ChatCompletionRequest {
      model: primary.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      max_tokens,
      temperature,
    };

    let started = std::time::Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", primary.api_key))
      .timeout(timeout)
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_provider_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(AiError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "ai", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, "Completion usage");
    }
    let text = body
      .choices
      .into_iter()
      .next()
      .and_then(ChatChoice::into_content)
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .ok_or(AiError::EmptyReply)?;

    info!(target: "ai", elapsed_ms = started.elapsed().as_millis() as u64, reply_len = text.len(), "Completion received");
    Ok(text)
  }

  /// Score a free-text answer with the primary `/evaluate` endpoint.
  #[instrument(level = "info", skip_all)]
  pub async fn evaluate(&self, question: &str, answer: &str) -> Result<Evaluation, AiError> {
    let primary = self.primary.as_ref().ok_or(AiError::NotConfigured)?;
    let url = format!("{}/evaluate", primary.base_url);
    let body = serde_json::json!({
      "question": question,
      "answer": answer,
      "api_key": primary.api_key,
    });
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, CLIENT_UA)
      .timeout(EVALUATE_TIMEOUT)
      .json(&body)
      .send()
      .await?;
    if !res.status().is_success() {
      return Err(AiError::Status { status: res.status().as_u16(), message: "evaluate rejected".into() });
    }
    res.json::<Evaluation>().await.map_err(|e| AiError::Decode(e.to_string()))
  }

  /// A short history fact: primary first, then the fallback provider.
  #[instrument(level = "info", skip_all)]
  pub async fn fact(&self, prompts: &Prompts) -> Result<String, AiError> {
    let mut last = AiError::NotConfigured;
    if self.has_primary() {
      match self.complete(&prompts.fact, 150, 0.7, FACT_TIMEOUT).await {
        Ok(text) => return Ok(text),
        Err(e) => {
          warn!(target: "ai", error = %e, "Primary fact generation failed");
          last = e;
        }
      }
    }
    if let Some(fb) = &self.fallback {
      let url = format!("{}/fakta", fb.base_url);
      let res = self
        .client
        .get(&url)
        .query(&[("api_key", fb.api_key.as_str())])
        .timeout(FALLBACK_SHORT_TIMEOUT)
        .send()
        .await;
      match read_field(res, "fakta").await {
        Ok(text) => return Ok(text),
        Err(e) => {
          warn!(target: "ai", error = %e, "Fallback fact request failed");
          last = e;
        }
      }
    }
    Err(last)
  }

  /// Why `choices[correct_index]` answers `question`.
  #[instrument(level = "info", skip_all, fields(correct_index = correct_index))]
  pub async fn explain(
    &self,
    prompts: &Prompts,
    question: &str,
    choices: &[String],
    correct_index: i64,
  ) -> Result<String, AiError> {
    let mut last = AiError::NotConfigured;
    if self.has_primary() {
      let answer = usize::try_from(correct_index)
        .ok()
        .and_then(|i| choices.get(i))
        .map(String::as_str)
        .unwrap_or_default();
      let prompt = fill_template(&prompts.explain_template, &[("answer", answer), ("question", question)]);
      match self.complete(&prompt, 150, 0.3, EXPLAIN_TIMEOUT).await {
        Ok(text) => return Ok(text),
        Err(e) => {
          warn!(target: "ai", error = %e, "Primary explanation failed");
          last = e;
        }
      }
    }
    if let Some(fb) = &self.fallback {
      let body = serde_json::json!({
        "question": question,
        "choices": choices,
        "correct_index": correct_index,
        "api_key": fb.api_key,
      });
      let res = self
        .client
        .post(format!("{}/explain", fb.base_url))
        .timeout(FALLBACK_SHORT_TIMEOUT)
        .json(&body)
        .send()
        .await;
      match read_field(res, "explanation").await {
        Ok(text) => return Ok(text),
        Err(e) => {
          warn!(target: "ai", error = %e, "Fallback explanation failed");
          last = e;
        }
      }
    }
    Err(last)
  }

  /// Short history Q&A.
  #[instrument(level = "info", skip_all, fields(question_len = question.len()))]
  pub async fn chat(&self, prompts: &Prompts, question: &str) -> Result<String, AiError> {
    let mut last = AiError::NotConfigured;
    if self.has_primary() {
      let prompt = fill_template(&prompts.chat_template, &[("question", question)]);
      match self.complete(&prompt, 300, 0.3, CHAT_TIMEOUT).await {
        Ok(text) => return Ok(text),
        Err(e) => {
          warn!(target: "ai", error = %e, "Primary chat failed");
          last = e;
        }
      }
    }
    if let Some(fb) = &self.fallback {
      let body = serde_json::json!({ "question": question, "api_key": fb.api_key });
      let res = self
        .client
        .post(format!("{}/chat", fb.base_url))
        .timeout(FALLBACK_CHAT_TIMEOUT)
        .json(&body)
        .send()
        .await;
      match read_field(res, "answer").await {
        Ok(text) => return Ok(text),
        Err(e) => {
          warn!(target: "ai", error = %e, "Fallback chat failed");
          last = e;
        }
      }
    }
    Err(last)
  }

  /// Ask the primary provider for a whole quiz as JSON.
  #[instrument(level = "info", skip(self, prompts))]
  pub async fn generate_quiz(&self, prompts: &Prompts, tier: DifficultyTier) -> Result<SampledQuiz, AiError> {
    let count = tier.question_count().to_string();
    let prompt = fill_template(
      &prompts.questions_template,
      &[("count", count.as_str()), ("audience", tier.audience())],
    );
    let reply = self.complete(&prompt, 1200, 0.6, QUESTIONS_TIMEOUT).await?;
    parse_quiz_reply(&reply, tier)
  }
}

/// Parse a model reply into a quiz. Accepts bare JSON or JSON wrapped in prose.
pub fn parse_quiz_reply(reply: &str, tier: DifficultyTier) -> Result<SampledQuiz, AiError> {
  let parsed = serde_json::from_str::<GeneratedQuiz>(reply).or_else(|first| {
    extract_json_object(reply)
      .ok_or_else(|| AiError::Decode(first.to_string()))
      .and_then(|inner| serde_json::from_str::<GeneratedQuiz>(inner).map_err(|e| AiError::Decode(e.to_string())))
  })?;
  if parsed.questions.is_empty() {
    return Err(AiError::EmptyReply);
  }
  Ok(SampledQuiz {
    total_questions: parsed.total_questions.unwrap_or(parsed.questions.len()),
    time_minutes: parsed.time_minutes.unwrap_or(tier.time_minutes()),
    questions: parsed.questions,
  })
}

#[derive(Deserialize)]
struct GeneratedQuiz {
  #[serde(default)]
  total_questions: Option<usize>,
  #[serde(default)]
  time_minutes: Option<u32>,
  #[serde(default)]
  questions: Vec<QuestionRecord>,
}

/// Read one non-empty string field from a fallback-provider JSON reply.
async fn read_field(res: reqwest::Result<reqwest::Response>, field: &str) -> Result<String, AiError> {
  let res = res?;
  if !res.status().is_success() {
    return Err(AiError::Status { status: res.status().as_u16(), message: format!("{field} request rejected") });
  }
  let body: serde_json::Value = res.json().await?;
  body
    .get(field)
    .and_then(|v| v.as_str())
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .ok_or(AiError::EmptyReply)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  max_tokens: u32,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  #[serde(default)]
  message: Option<ChatMessageResp>,
  #[serde(default)]
  text: Option<String>,
}
impl ChatChoice {
  fn into_content(self) -> Option<String> {
    self.message.and_then(|m| m.content).or(self.text)
  }
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
}

/// Pull `error.message` out of an OpenAI-style error body.
fn extract_provider_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
