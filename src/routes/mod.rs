//! Router assembly: HTTP endpoints, bearer auth on the quiz API, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::auth::require_api_key;
use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - `/quiz/*` and `/chat` behind the bearer check
/// - `/admin/mailry/test` and `/health` open
/// - CORS for the configured frontend origins (credentials allowed)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let quiz_api = Router::new()
        .route("/quiz/submit", post(http::http_submit))
        .route("/quiz/email", post(http::http_email))
        .route("/quiz/submission/:id", get(http::http_submission))
        .route("/quiz/fakta", get(http::http_fact))
        .route("/quiz/explain", post(http::http_explain))
        .route("/quiz/chat", post(http::http_chat))
        .route("/chat", post(http::http_chat))
        .route("/quiz/leaderboard", get(http::http_leaderboard))
        .route("/quiz/questions", post(http::http_questions))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(quiz_api)
        .route("/admin/mailry/test", get(http::http_mail_test))
        .route("/health", get(http::http_health))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Explicit origin list; malformed entries are skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(target: "quiz_merdeka", origin = %o, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;

    fn router(api_key: Option<&str>) -> Router {
        let config = Config { api_key: api_key.map(String::from), ..Config::default() };
        build_router(Arc::new(AppState::with_store(config, None)))
    }

    #[tokio::test]
    async fn protected_route_rejects_missing_token() {
        let res = router(Some("k"))
            .oneshot(Request::get("/quiz/fakta").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["detail"], crate::auth::MISSING_HEADER);
    }

    #[tokio::test]
    async fn submit_needs_token_only_when_key_is_set() {
        let submit = || {
            Request::post("/quiz/submit")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"percentage":50,"totalQuestions":4}"#))
                .unwrap()
        };
        let res = router(Some("k")).oneshot(submit()).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = router(None).oneshot(submit()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn leaderboard_without_store_is_empty() {
        let res = router(None)
            .oneshot(Request::get("/quiz/leaderboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_cors_grant() {
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/quiz/submit")
            .header("origin", "https://evil.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let res = router(Some("k")).oneshot(req).await.unwrap();
        assert!(res.headers().get("access-control-allow-origin").is_none());
    }
}
