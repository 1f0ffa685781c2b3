//! Tracing subscriber setup.
//!
//! - LOG_LEVEL holds EnvFilter directives, e.g. "debug" or
//!   "info,quiz_merdeka=debug,scheduler=debug,tower_http=info".
//! - LOG_FORMAT picks "pretty" (default) or "json".
//!
//! Module-specific targets in use: `quiz_merdeka`, `scheduler`, `leaderboard`,
//! `mail`, `ai`. TraceLayer adds the per-request spans on top.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,quiz_merdeka=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
