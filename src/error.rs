//! Application error taxonomy and its mapping onto HTTP responses.
//!
//! Every handler returns `Result<_, AppError>`; component errors convert via `From`
//! so `?` can be used throughout. The body shape is `{"detail": "..."}` to stay
//! compatible with the existing frontend.

use axum::{
  extract::{rejection::JsonRejection, FromRequest, Request},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

use crate::ai::AiError;
use crate::mail::MailError;
use crate::sampler::SamplerError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  /// 400: malformed JSON, missing required field, malformed identifier.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// 401: missing or mismatched bearer token.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  /// 404
  #[error("not found: {0}")]
  NotFound(String),

  /// 502: mail or AI provider answered with a non-success status.
  #[error("upstream failure: {0}")]
  UpstreamFailure(String),

  /// 503: store or mail gateway not configured or unreachable.
  #[error("service unavailable: {0}")]
  ServiceUnavailable(String),

  /// 500
  #[error("internal error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
      AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    let detail = match self {
      AppError::Internal(msg) => {
        error!(target: "quiz_merdeka", %msg, "Internal server error");
        "Internal Server Error".to_string()
      }
      AppError::InvalidInput(msg)
      | AppError::Unauthorized(msg)
      | AppError::NotFound(msg)
      | AppError::UpstreamFailure(msg)
      | AppError::ServiceUnavailable(msg) => msg,
    };
    (status, Json(json!({ "detail": detail }))).into_response()
  }
}

impl From<StoreError> for AppError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::InvalidId(_) => AppError::InvalidInput("invalid id".into()),
      StoreError::Timeout(_) => AppError::ServiceUnavailable("database unavailable".into()),
      other => AppError::Internal(other.to_string()),
    }
  }
}

impl From<MailError> for AppError {
  fn from(err: MailError) -> Self {
    match err {
      MailError::InvalidSender(_) => AppError::ServiceUnavailable(err.to_string()),
      MailError::Rejected { .. } | MailError::Transport(_) => {
        AppError::UpstreamFailure(err.remediation_hint())
      }
    }
  }
}

impl From<AiError> for AppError {
  fn from(err: AiError) -> Self {
    AppError::UpstreamFailure(err.to_string())
  }
}

impl From<SamplerError> for AppError {
  fn from(err: SamplerError) -> Self {
    AppError::Internal(err.to_string())
  }
}

/// JSON body extractor whose rejections surface as `InvalidInput` (400)
/// instead of axum's default 415/422 responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Payload<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = AppError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    match Json::<T>::from_request(req, state).await {
      Ok(Json(value)) => Ok(Payload(value)),
      Err(rejection) => Err(AppError::InvalidInput(rejection_detail(&rejection))),
    }
  }
}

fn rejection_detail(rejection: &JsonRejection) -> String {
  match rejection {
    JsonRejection::JsonSyntaxError(_) => "invalid json".to_string(),
    JsonRejection::MissingJsonContentType(_) => "expected a JSON body".to_string(),
    other => other.body_text(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_follow_the_taxonomy() {
    assert_eq!(AppError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::UpstreamFailure("x".into()).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
      AppError::ServiceUnavailable("x".into()).status(),
      StatusCode::SERVICE_UNAVAILABLE
    );
  }

  #[test]
  fn invalid_store_id_is_a_bad_request() {
    let err: AppError = StoreError::InvalidId("nope".into()).into();
    assert!(matches!(err, AppError::InvalidInput(ref m) if m == "invalid id"));
  }

  #[test]
  fn mail_not_found_carries_endpoint_hint() {
    let err: AppError = MailError::Rejected { status: 404, body: String::new() }.into();
    match err {
      AppError::UpstreamFailure(msg) => assert!(msg.contains("MAILRY_API_URL")),
      other => panic!("unexpected {other:?}"),
    }
  }
}
