//! Mail provider client (Mailry-style JSON API) and the result email bodies.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::{Config, DEFAULT_MAILRY_URL};
use crate::util::{is_hyphenated_uuid, trunc_for_log};

pub const SUBMIT_MAIL_TIMEOUT: Duration = Duration::from_secs(5);
pub const RESULT_MAIL_TIMEOUT: Duration = Duration::from_secs(8);
pub const TEST_MAIL_TIMEOUT: Duration = Duration::from_secs(10);

/// Sender id that asks the test endpoint to echo the payload back.
pub const DEBUG_PAYLOAD_SENDER: &str = "DEBUG_PAYLOAD";
/// Placeholder submission id used for the link in test emails.
const SAMPLE_RESULT_ID: &str = "68ab33514935413af792468b";

const CTA_STYLE: &str = "background:#2563eb;color:#fff;padding:8px 12px;border-radius:6px;text-decoration:none;";
const FONT_STYLE: &str = "font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial; color:#111;";
const SIGNATURE: &str = "Tim Quiz Kemerdekaan";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
  #[error("mail sender not configured or invalid: {0}")]
  InvalidSender(String),
  #[error("mail provider answered {status}")]
  Rejected { status: u16, body: String },
  #[error("mail transport error: {0}")]
  Transport(#[from] reqwest::Error),
}

impl MailError {
  /// Operator-facing message for the HTTP response.
  pub fn remediation_hint(&self) -> String {
    match self {
      MailError::Rejected { status: 404, .. } => format!(
        "Mail service returned 404. The configured endpoint appears to point to a setup/UI page instead of the mail-sending API. \
         Set MAILRY_API_URL to the provider's send endpoint (for example: {DEFAULT_MAILRY_URL}) and set MAILRY_API_KEY with your API key."
      ),
      MailError::Rejected { status: status @ (401 | 403), body } => format!(
        "Mail service rejected the request (status {status}). Check MAILRY_API_KEY and that the provided emailId is valid. Response: {}",
        trunc_for_log(body, 500)
      ),
      MailError::Rejected { status, .. } => format!("failed to send email: status={status}"),
      MailError::Transport(_) => "failed to send email".to_string(),
      MailError::InvalidSender(_) => self.to_string(),
    }
  }
}

/// Payload accepted by the provider.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
  pub email_id: String,
  pub to: String,
  pub subject: String,
  pub html_body: String,
  pub plain_body: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cc: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub attachments: Option<serde_json::Value>,
}

/// Raw provider answer, for the diagnostics endpoint.
#[derive(Clone, Debug)]
pub struct ProviderReply {
  pub status: u16,
  pub body: String,
}

impl ProviderReply {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

#[derive(Clone, Debug)]
pub struct MailGateway {
  client: reqwest::Client,
  endpoint: String,
  api_key: Option<String>,
  default_sender: Option<String>,
}

impl MailGateway {
  /// `None` unless MAILRY_API_URL or MAILRY_SETUP_LINK is set.
  pub fn from_config(cfg: &Config) -> Option<Self> {
    let endpoint = cfg.mail_endpoint()?.to_string();
    if cfg.mailry_api_url.is_none() {
      info!(target: "mail", "Using MAILRY_SETUP_LINK as mail endpoint; prefer MAILRY_API_URL");
    }
    Some(Self {
      client: reqwest::Client::new(),
      endpoint,
      api_key: cfg.mailry_api_key.clone(),
      default_sender: cfg.mailry_email_id.clone(),
    })
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  /// Sender id configured in the environment, unvalidated.
  pub fn default_sender(&self) -> Option<&str> {
    self.default_sender.as_deref()
  }

  /// Pick the request's sender id over the configured one; it must be a UUID.
  pub fn resolve_sender(&self, requested: Option<&str>) -> Result<String, MailError> {
    requested
      .filter(|s| !s.trim().is_empty())
      .or(self.default_sender())
      .filter(|s| is_hyphenated_uuid(s))
      .map(str::to_string)
      .ok_or_else(|| {
        MailError::InvalidSender(
          "include 'emailId' (UUID) in request body or set correct MAILRY_EMAIL_ID env var".into(),
        )
      })
  }

  /// POST the message; any non-2xx is a `Rejected` error.
  #[instrument(level = "info", skip(self, msg), fields(to = %msg.to, subject = %msg.subject))]
  pub async fn send(&self, msg: &MailMessage, timeout: Duration) -> Result<(), MailError> {
    let reply = self.post_raw(msg, timeout).await?;
    if !reply.is_success() {
      error!(
        target: "mail",
        status = reply.status,
        body = %trunc_for_log(&reply.body, 500),
        url = %self.endpoint,
        "Mail send failed"
      );
      return Err(MailError::Rejected { status: reply.status, body: reply.body });
    }
    info!(target: "mail", status = reply.status, "Mail accepted by provider");
    Ok(())
  }

  /// POST the message and hand back whatever the provider said.
  pub async fn post_raw(&self, msg: &MailMessage, timeout: Duration) -> Result<ProviderReply, MailError> {
    let mut req = self
      .client
      .post(&self.endpoint)
      .header(CONTENT_TYPE, "application/json")
      .timeout(timeout)
      .json(msg);
    if let Some(key) = &self.api_key {
      req = req.header(AUTHORIZATION, format!("Bearer {key}"));
    }
    let res = req.send().await?;
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Ok(ProviderReply { status, body })
  }
}

fn cta_html(url: &str) -> String {
  format!("<p><a href=\"{url}\" style=\"{CTA_STYLE}\">Lihat hasil Anda</a></p>")
}

fn wrap_html(inner: &str) -> String {
  format!(
    "<html>\n  <body style=\"{FONT_STYLE}\">\n    <h2 style=\"color:#0f172a\">Hasil Quiz Kemerdekaan</h2>\n{inner}    <hr/>\n    <p>Salam,<br/>{SIGNATURE}</p>\n  </body>\n</html>\n"
  )
}

fn finish_plain(mut lines: Vec<String>, result_url: Option<&str>) -> String {
  if let Some(url) = result_url {
    lines.push(String::new());
    lines.push(format!("Lihat hasil Anda: {url}"));
  }
  lines.extend(["".to_string(), "Salam,".to_string(), SIGNATURE.to_string()]);
  lines.join("\n")
}

/// Figures shown in the email sent right after a submission.
pub struct SubmitSummary<'a> {
  pub name: &'a str,
  pub percentage: i64,
  pub time_spent: i64,
  pub feedback: &'a str,
  pub badge: &'a str,
}

pub fn submit_result_email(sender: String, to: String, s: &SubmitSummary<'_>, result_url: Option<String>) -> MailMessage {
  let mut inner = format!(
    "    <p>Halo {},</p>\n    <p><strong>Skor:</strong> {}%</p>\n    <p><strong>Waktu:</strong> {} detik</p>\n    <p><strong>Feedback:</strong> {}</p>\n    <p><strong>Badge:</strong> {}</p>\n",
    s.name, s.percentage, s.time_spent, s.feedback, s.badge
  );
  if let Some(url) = &result_url {
    inner.push_str(&format!("    {}\n", cta_html(url)));
  }
  let plain = finish_plain(
    vec![
      format!("Halo {},", s.name),
      String::new(),
      format!("Skor: {}%", s.percentage),
      format!("Waktu: {} detik", s.time_spent),
      format!("Feedback: {}", s.feedback),
      "Badge: Kemerdekaan!".to_string(),
    ],
    result_url.as_deref(),
  );
  MailMessage {
    email_id: sender,
    to,
    subject: "Hasil Quiz Kemerdekaan".into(),
    html_body: wrap_html(&inner),
    plain_body: plain,
    result_url,
    cc: None,
    attachments: None,
  }
}

/// Figures for the on-demand result email. Values are shown as the client sent them.
pub struct ScoreSummary<'a> {
  pub name: &'a str,
  pub score: &'a str,
  pub total: &'a str,
  pub percentage: &'a str,
  pub badge: &'a str,
}

pub fn score_email(sender: String, to: String, s: &ScoreSummary<'_>, result_url: Option<String>) -> MailMessage {
  let mut inner = format!(
    "    <p>Halo {},</p>\n    <p>Terima kasih telah menyelesaikan Quiz Kemerdekaan Indonesia.</p>\n    <p><strong>Skor:</strong> {}%</p>\n    <p><strong>Total soal:</strong> {}</p>\n    <p><strong>Badge:</strong> {}</p>\n",
    s.name, s.percentage, s.total, s.badge
  );
  if let Some(url) = &result_url {
    inner.push_str(&format!("    {}\n", cta_html(url)));
  }
  let plain = finish_plain(
    vec![
      format!("Halo {},", s.name),
      String::new(),
      "Terima kasih telah menyelesaikan Quiz Kemerdekaan Indonesia.".to_string(),
      format!("Skor Anda: {} dari {} ({}%).", s.score, s.total, s.percentage),
      format!("Badge: {}", s.badge),
    ],
    result_url.as_deref(),
  );
  MailMessage {
    email_id: sender,
    to,
    subject: format!("Hasil Quiz Kemerdekaan Anda - {}%", s.percentage),
    html_body: wrap_html(&inner),
    plain_body: plain,
    result_url,
    cc: None,
    attachments: None,
  }
}

/// Provider verification email. Carries a sample result link unless the sender
/// is the debug sentinel.
pub fn test_email(sender: String, to: String, name: &str, frontend_base: &str) -> MailMessage {
  let lines = [
    format!("Halo {name},"),
    String::new(),
    "Ini adalah email percobaan dari layanan Quiz Merdeka untuk memverifikasi konfigurasi Mailry.".to_string(),
    String::new(),
    "Jika Anda menerima ini, konfigurasi API Mailry Anda berfungsi.".to_string(),
  ];
  let result_url = (sender != DEBUG_PAYLOAD_SENDER)
    .then(|| format!("{}/result?id={SAMPLE_RESULT_ID}", frontend_base.trim_end_matches('/')));

  let mut html = format!("<div style=\"{FONT_STYLE}\">{}", lines.join("<br/>"));
  if let Some(url) = &result_url {
    html.push_str(&cta_html(url));
  }
  html.push_str(&format!("<hr/><p>Salam,<br/>{SIGNATURE}</p></div>"));

  let mut plain = lines.join("\n");
  if let Some(url) = &result_url {
    plain.push_str(&format!("\n\nLihat hasil Anda: {url}"));
  }

  MailMessage {
    email_id: sender,
    to,
    subject: "[TEST] Verifikasi Mailry - Quiz Merdeka".into(),
    html_body: html,
    plain_body: plain,
    result_url,
    cc: None,
    attachments: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SENDER: &str = "123e4567-e89b-12d3-a456-426614174000";

  fn gateway(default_sender: Option<&str>) -> MailGateway {
    let cfg = Config {
      mailry_api_url: Some("http://127.0.0.1:1/send".into()),
      mailry_email_id: default_sender.map(String::from),
      ..Config::default()
    };
    MailGateway::from_config(&cfg).unwrap()
  }

  #[test]
  fn gateway_requires_an_endpoint() {
    assert!(MailGateway::from_config(&Config::default()).is_none());
  }

  #[test]
  fn sender_from_request_wins_and_must_be_uuid() {
    let gw = gateway(Some(SENDER));
    assert_eq!(gw.resolve_sender(None).unwrap(), SENDER);
    assert!(matches!(gw.resolve_sender(Some("not-a-uuid")), Err(MailError::InvalidSender(_))));
    assert!(gateway(None).resolve_sender(None).is_err());
  }

  #[test]
  fn message_serializes_with_provider_field_names() {
    let msg = test_email(SENDER.into(), "a@example.com".into(), "Budi", "http://localhost:3000/");
    let v = serde_json::to_value(&msg).unwrap();
    assert_eq!(v["emailId"], SENDER);
    assert_eq!(v["resultUrl"], "http://localhost:3000/result?id=68ab33514935413af792468b");
    assert!(v.get("cc").is_none());
    assert!(v["plainBody"].as_str().unwrap().starts_with("Halo Budi,"));
  }

  #[test]
  fn debug_sender_gets_no_sample_link() {
    let msg = test_email(DEBUG_PAYLOAD_SENDER.into(), "a@example.com".into(), "Budi", "http://x");
    assert!(msg.result_url.is_none());
  }

  #[test]
  fn score_email_links_result_once() {
    let summary = ScoreSummary { name: "Sari", score: "8", total: "10", percentage: "80", badge: "🏅" };
    let msg = score_email(SENDER.into(), "s@example.com".into(), &summary, Some("http://x/result?id=1".into()));
    assert_eq!(msg.subject, "Hasil Quiz Kemerdekaan Anda - 80%");
    assert_eq!(msg.plain_body.matches("Lihat hasil Anda").count(), 1);
    assert_eq!(msg.html_body.matches("Lihat hasil Anda").count(), 1);
    assert!(msg.plain_body.contains("Skor Anda: 8 dari 10 (80%)."));
  }

  #[test]
  fn hints_depend_on_status() {
    let hint = MailError::Rejected { status: 403, body: "nope".into() }.remediation_hint();
    assert!(hint.contains("MAILRY_API_KEY") && hint.contains("nope"));
    let hint = MailError::Rejected { status: 500, body: String::new() }.remediation_hint();
    assert_eq!(hint, "failed to send email: status=500");
  }
}
