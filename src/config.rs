//! Runtime configuration: environment variables (optionally from `.env`) plus an
//! optional TOML file with prompt overrides.
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   API_KEY             : static bearer token; unset = auth disabled (dev mode)
//!   MONGODB_URI         : enables the MongoDB store
//!   MONGODB_DB          : database name (default "quiz_merdeka")
//!   STORE_BACKEND       : "mongo" (default) or "memory"
//!   MAILRY_API_URL      : mail send endpoint (preferred)
//!   MAILRY_SETUP_LINK   : legacy name for the same endpoint
//!   MAILRY_API_KEY      : bearer token for the mail provider
//!   MAILRY_EMAIL_ID     : default sender id (UUID)
//!   FRONTEND_BASE       : base URL for result links (default "http://localhost:3000")
//!   OPENAI_API_KEY      : enables the primary AI gateway
//!   AI_BASE_URL         : default "https://api.unli.dev"
//!   AI_MODEL            : default "auto"
//!   LUNOS_API_KEY       : enables the fallback AI provider
//!   LUNOS_BASE_URL      : default "https://api.lunos.tech"
//!   SOAL_DIR            : directory holding mudah.json / sedang.json / sulit.json
//!   CORS_ORIGINS        : comma-separated list of allowed origins
//!   PROMPTS_CONFIG_PATH : TOML file overriding `Prompts`

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_MAILRY_URL: &str = "https://api.mailry.co/ext/inbox/send";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
  Mongo,
  Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
  pub port: u16,
  pub api_key: Option<String>,

  pub store_backend: StoreBackend,
  pub mongodb_uri: Option<String>,
  pub mongodb_db: String,

  pub mailry_api_url: Option<String>,
  pub mailry_setup_link: Option<String>,
  pub mailry_api_key: Option<String>,
  pub mailry_email_id: Option<String>,
  pub frontend_base: String,

  pub ai_api_key: Option<String>,
  pub ai_base_url: String,
  pub ai_model: String,
  pub lunos_api_key: Option<String>,
  pub lunos_base_url: String,

  pub soal_dir: PathBuf,
  pub cors_origins: Vec<String>,
  pub prompts: Prompts,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      port: 3000,
      api_key: None,
      store_backend: StoreBackend::Mongo,
      mongodb_uri: None,
      mongodb_db: "quiz_merdeka".into(),
      mailry_api_url: None,
      mailry_setup_link: None,
      mailry_api_key: None,
      mailry_email_id: None,
      frontend_base: "http://localhost:3000".into(),
      ai_api_key: None,
      ai_base_url: "https://api.unli.dev".into(),
      ai_model: "auto".into(),
      lunos_api_key: None,
      lunos_base_url: "https://api.lunos.tech".into(),
      soal_dir: PathBuf::from("soal"),
      cors_origins: [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:3001",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      prompts: Prompts::default(),
    }
  }
}

/// Non-empty env var, trimmed.
fn env_opt(key: &str) -> Option<String> {
  std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
  pub fn from_env() -> Self {
    let defaults = Self::default();

    let port = env_opt("PORT").and_then(|p| p.parse::<u16>().ok()).unwrap_or(defaults.port);
    let store_backend = match env_opt("STORE_BACKEND").as_deref() {
      Some("memory") => StoreBackend::Memory,
      _ => StoreBackend::Mongo,
    };
    let cors_origins = env_opt("CORS_ORIGINS")
      .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
      .unwrap_or(defaults.cors_origins);
    let prompts = load_prompts_from_env().unwrap_or_default();

    Self {
      port,
      api_key: env_opt("API_KEY"),
      store_backend,
      mongodb_uri: env_opt("MONGODB_URI"),
      mongodb_db: env_opt("MONGODB_DB").unwrap_or(defaults.mongodb_db),
      mailry_api_url: env_opt("MAILRY_API_URL"),
      mailry_setup_link: env_opt("MAILRY_SETUP_LINK"),
      mailry_api_key: env_opt("MAILRY_API_KEY"),
      mailry_email_id: env_opt("MAILRY_EMAIL_ID"),
      frontend_base: env_opt("FRONTEND_BASE").unwrap_or(defaults.frontend_base),
      ai_api_key: env_opt("OPENAI_API_KEY"),
      ai_base_url: env_opt("AI_BASE_URL").unwrap_or(defaults.ai_base_url),
      ai_model: env_opt("AI_MODEL").unwrap_or(defaults.ai_model),
      lunos_api_key: env_opt("LUNOS_API_KEY"),
      lunos_base_url: env_opt("LUNOS_BASE_URL").unwrap_or(defaults.lunos_base_url),
      soal_dir: env_opt("SOAL_DIR").map(PathBuf::from).unwrap_or(defaults.soal_dir),
      cors_origins,
      prompts,
    }
  }

  /// Mail endpoint, if the mail gateway is configured at all.
  pub fn mail_endpoint(&self) -> Option<&str> {
    self.mailry_api_url.as_deref().or(self.mailry_setup_link.as_deref())
  }

  /// `{FRONTEND_BASE}/result?id={id}`
  pub fn result_url(&self, submission_id: &str) -> String {
    format!("{}/result?id={}", self.frontend_base.trim_end_matches('/'), submission_id)
  }
}

/// Prompts sent to the AI gateway. Defaults are Indonesian and tuned for short
/// answers; override any of them in TOML.
///
/// Placeholders: `{answer}`, `{question}`, `{count}`, `{audience}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Prompts {
  pub fact: String,
  pub explain_template: String,
  pub chat_template: String,
  pub questions_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      fact: "Buatkan satu fakta menarik dan singkat tentang sejarah Indonesia (fokus pada kemerdekaan atau peristiwa penting), ditulis dalam bahasa Indonesia, 1-2 kalimat. Jangan sertakan sumber atau penjelasan panjang.".into(),
      explain_template: "Jelaskan secara singkat (1-2 kalimat) mengapa jawaban '{answer}' benar untuk pertanyaan berikut dalam bahasa Indonesia:\n\n{question}\n\nBerikan penjelasan faktual dan mudah dimengerti.".into(),
      chat_template: "Jawab pertanyaan berikut dalam bahasa Indonesia dengan ringkas dan faktual (1-3 kalimat). Topik: sejarah Indonesia (khususnya kemerdekaan dan peristiwa penting).\n\nPertanyaan: {question}\n\nJawaban:".into(),
      questions_template: "Buatkan {count} soal pilihan ganda singkat tentang sejarah Indonesia (campuran topik: kemerdekaan, perang, perjuangan, pahlawan, dan peristiwa penting) yang sesuai untuk {audience}. Setiap soal harus memiliki 4 pilihan, dan jawaban benar direpresentasikan sebagai indeks (0-3). Balas hanya dengan JSON yang memiliki kunci: total_questions, time_minutes, questions. Contoh format: {\"total_questions\":10, \"time_minutes\":5, \"questions\":[{\"question\":\"...\", \"choices\":[\"...\"], \"answer\":0}]}".into(),
    }
  }
}

#[derive(Debug, Deserialize, Default)]
struct PromptsFile {
  #[serde(default)]
  prompts: Prompts,
}

/// Load `Prompts` from PROMPTS_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_prompts_from_env() -> Option<Prompts> {
  let path = env_opt("PROMPTS_CONFIG_PATH")?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_prompts(&s) {
      Ok(p) => {
        info!(target: "quiz_merdeka", %path, "Loaded prompt overrides (TOML)");
        Some(p)
      }
      Err(e) => {
        error!(target: "quiz_merdeka", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quiz_merdeka", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_prompts(toml_src: &str) -> Result<Prompts, toml::de::Error> {
  toml::from_str::<PromptsFile>(toml_src).map(|f| f.prompts)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_other_defaults() {
    let prompts = parse_prompts("[prompts]\nfact = \"Satu fakta saja.\"\n").unwrap();
    assert_eq!(prompts.fact, "Satu fakta saja.");
    assert_eq!(prompts.chat_template, Prompts::default().chat_template);
  }

  #[test]
  fn empty_toml_is_all_defaults() {
    assert_eq!(parse_prompts("").unwrap(), Prompts::default());
  }

  #[test]
  fn result_url_trims_trailing_slash() {
    let cfg = Config { frontend_base: "https://quiz.example/".into(), ..Config::default() };
    assert_eq!(cfg.result_url("abc"), "https://quiz.example/result?id=abc");
  }

  #[test]
  fn api_url_wins_over_setup_link() {
    let cfg = Config {
      mailry_setup_link: Some("https://setup".into()),
      mailry_api_url: Some("https://api".into()),
      ..Config::default()
    };
    assert_eq!(cfg.mail_endpoint(), Some("https://api"));
    assert_eq!(Config::default().mail_endpoint(), None);
  }
}
