//! Quiz Merdeka backend binary.
//!
//! Configuration comes from the environment (see `config`); LOG_LEVEL and
//! LOG_FORMAT control tracing output.

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{error, info};

use quiz_merdeka::{build_router, scheduler::LeaderboardResetScheduler, telemetry, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  dotenvy::dotenv().ok();
  telemetry::init_tracing();
  let config = Config::from_env();

  let port = config.port;
  let state = Arc::new(AppState::from_config(config).await);
  let reset_task = LeaderboardResetScheduler::start(state.store.clone());

  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "quiz_merdeka", %addr, "HTTP server listening");

  let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

  reset_task.stop().await;
  if let Some(store) = state.store() {
    store.close().await;
  }
  info!(target: "quiz_merdeka", "Shutdown complete");
  served?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "quiz_merdeka", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "quiz_merdeka", "Shutdown signal received");
}
