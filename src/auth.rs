//! Static bearer-token check for the `/quiz/*` and `/chat` routes.
//!
//! With no API_KEY configured every request passes (development mode); the
//! warning for that is logged once when the state is built.

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::header,
  middleware::Next,
  response::Response,
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

pub const MISSING_HEADER: &str = "Missing or invalid Authorization header";
pub const MISMATCH: &str = "Unauthorized";

/// Token part of a `Bearer <token>` header. The scheme is case-insensitive.
pub fn bearer_token(value: Option<&str>) -> Option<&str> {
  let value = value?;
  let (scheme, rest) = value.split_at_checked(7)?;
  scheme.eq_ignore_ascii_case("bearer ").then(|| rest.trim())
}

/// Compare the request's bearer token with `expected`.
pub fn check(expected: &str, header_value: Option<&str>) -> Result<(), AppError> {
  let token = bearer_token(header_value).ok_or_else(|| AppError::Unauthorized(MISSING_HEADER.into()))?;
  if token != expected {
    return Err(AppError::Unauthorized(MISMATCH.into()));
  }
  Ok(())
}

pub async fn require_api_key(
  State(state): State<Arc<AppState>>,
  req: Request,
  next: Next,
) -> Result<Response, AppError> {
  if let Some(expected) = state.config.api_key.as_deref() {
    let value = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if let Err(e) = check(expected, value) {
      debug!(target: "quiz_merdeka", path = %req.uri().path(), "Rejected request without valid bearer token");
      return Err(e);
    }
  }
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scheme_is_case_insensitive() {
    assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
    assert_eq!(bearer_token(Some("bearer  abc ")), Some("abc"));
    assert_eq!(bearer_token(Some("Basic abc")), None);
    assert_eq!(bearer_token(Some("Bear")), None);
    assert_eq!(bearer_token(None), None);
  }

  #[test]
  fn missing_and_wrong_tokens_have_distinct_messages() {
    assert!(check("s3cret", Some("Bearer s3cret")).is_ok());
    match check("s3cret", None) {
      Err(AppError::Unauthorized(m)) => assert_eq!(m, MISSING_HEADER),
      other => panic!("unexpected {other:?}"),
    }
    match check("s3cret", Some("Bearer nope")) {
      Err(AppError::Unauthorized(m)) => assert_eq!(m, MISMATCH),
      other => panic!("unexpected {other:?}"),
    }
  }
}
