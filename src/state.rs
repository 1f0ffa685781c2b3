//! Shared application state: configuration, prompts, and the optional
//! collaborators (document store, AI gateway, mail gateway).
//!
//! Every collaborator may be absent. Handlers check for presence and degrade or
//! answer 503, so the process starts even when MongoDB or the mail provider are
//! not configured.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::ai::AiGateway;
use crate::config::{Config, Prompts, StoreBackend};
use crate::mail::MailGateway;
use crate::store::{DocumentStore, MemoryStore, MongoStore};

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<Config>,
  pub prompts: Prompts,
  pub store: Option<Arc<dyn DocumentStore>>,
  pub ai: AiGateway,
  pub mail: Option<MailGateway>,
}

impl AppState {
  /// Build state from config, connecting the store. A store that cannot be
  /// reached is logged and left out.
  #[instrument(level = "info", skip_all)]
  pub async fn from_config(config: Config) -> Self {
    let store = connect_store(&config).await;
    Self::with_store(config, store)
  }

  /// Build state around an already constructed store (or none).
  pub fn with_store(config: Config, store: Option<Arc<dyn DocumentStore>>) -> Self {
    let ai = AiGateway::from_config(&config);
    let mail = MailGateway::from_config(&config);
    match &mail {
      Some(m) => info!(target: "quiz_merdeka", endpoint = %m.endpoint(), "Mail gateway enabled"),
      None => info!(target: "quiz_merdeka", "Mail gateway disabled (no MAILRY_API_URL / MAILRY_SETUP_LINK)"),
    }
    match &store {
      Some(s) => info!(target: "quiz_merdeka", backend = s.backend(), "Document store ready"),
      None => info!(target: "quiz_merdeka", "Running without a document store"),
    }
    if config.api_key.is_none() {
      warn!(target: "quiz_merdeka", "API_KEY not set; bearer authentication is DISABLED (development mode)");
    }
    Self { prompts: config.prompts.clone(), config: Arc::new(config), store, ai, mail }
  }

  pub fn store(&self) -> Option<&dyn DocumentStore> {
    self.store.as_deref()
  }
}

async fn connect_store(config: &Config) -> Option<Arc<dyn DocumentStore>> {
  match config.store_backend {
    StoreBackend::Memory => {
      info!(target: "quiz_merdeka", "Using in-memory document store");
      Some(Arc::new(MemoryStore::default()))
    }
    StoreBackend::Mongo => {
      let Some(uri) = config.mongodb_uri.as_deref() else {
        warn!(target: "quiz_merdeka", "MONGODB_URI not set; submissions and leaderboard are disabled");
        return None;
      };
      match MongoStore::connect(uri, &config.mongodb_db).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
          error!(target: "quiz_merdeka", error = %e, "MongoDB connection failed; continuing without a store");
          None
        }
      }
    }
  }
}
