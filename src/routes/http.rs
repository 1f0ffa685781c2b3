//! HTTP endpoint handlers. Thin wrappers that extract input and forward to `logic`.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::HeaderMap,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::{AppError, Payload};
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

/// Header that asks `/quiz/email` to echo the sent payload.
pub const DEBUG_MAIL_HEADER: &str = "x-debug-mailry";

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip_all)]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Payload(body): Payload<SubmitIn>,
) -> Result<Json<SubmitOut>, AppError> {
  let out = logic::submit(&state, body).await?;
  info!(target: "quiz_merdeka", score = out.score, percentage = out.percentage, inserted = out.inserted_id.is_some(), "HTTP submit handled");
  Ok(Json(out))
}

#[instrument(level = "info", skip_all)]
pub async fn http_email(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Payload(body): Payload<EmailIn>,
) -> Result<Json<EmailOut>, AppError> {
  let debug = headers
    .get(DEBUG_MAIL_HEADER)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v.trim() == "1");
  logic::send_result_email(&state, body, debug).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_submission(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SubmissionOut>, AppError> {
  logic::get_submission(&state, &id).await.map(Json)
}

#[instrument(level = "info", skip_all)]
pub async fn http_fact(State(state): State<Arc<AppState>>) -> Json<FactOut> {
  Json(logic::fact(&state).await)
}

#[instrument(level = "info", skip_all)]
pub async fn http_explain(
  State(state): State<Arc<AppState>>,
  Payload(body): Payload<ExplainIn>,
) -> Result<Json<ExplainOut>, AppError> {
  logic::explain(&state, body).await.map(Json)
}

/// Serves both `/quiz/chat` and `/chat`.
#[instrument(level = "info", skip_all)]
pub async fn http_chat(
  State(state): State<Arc<AppState>>,
  Payload(body): Payload<ChatIn>,
) -> Result<Json<ChatOut>, AppError> {
  logic::chat(&state, body).await.map(Json)
}

#[instrument(level = "info", skip_all)]
pub async fn http_leaderboard(State(state): State<Arc<AppState>>) -> Json<Vec<LeaderboardRow>> {
  let rows = logic::leaderboard(&state).await;
  info!(target: "leaderboard", count = rows.len(), "HTTP leaderboard served");
  Json(rows)
}

#[instrument(level = "info", skip_all)]
pub async fn http_mail_test(
  State(state): State<Arc<AppState>>,
  Query(q): Query<MailTestQuery>,
) -> Result<Json<MailTestOut>, AppError> {
  logic::mail_test(&state, q).await.map(Json)
}

#[instrument(level = "info", skip_all)]
pub async fn http_questions(
  State(state): State<Arc<AppState>>,
  Payload(body): Payload<QuestionsIn>,
) -> Result<Json<QuestionsOut>, AppError> {
  logic::generate_questions(&state, body).await.map(Json)
}
