//! Quiz Merdeka backend: an Indonesian-history quiz API.
//!
//! - axum HTTP API under `/quiz/*` (bearer-token protected when API_KEY is set)
//! - MongoDB (or in-memory) persistence of submissions and a best-score leaderboard
//! - weekly leaderboard reset every Sunday 00:00 Asia/Jakarta
//! - optional AI providers for scoring, facts, explanations, chat and quiz generation
//! - optional Mailry-style mail provider for result emails

pub mod ai;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod logic;
pub mod mail;
pub mod protocol;
pub mod questions;
pub mod routes;
pub mod sampler;
pub mod scheduler;
pub mod seeds;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
