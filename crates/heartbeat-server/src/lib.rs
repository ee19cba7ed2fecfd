//! HTTP server for the Heartbeat match feed.
//!
//! Serves the `/auth` routes of the bundled identity provider and mounts the
//! [`heartbeat_api`] router under `/api` behind bearer-token middleware.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router, middleware,
  routing::{get, post},
};
use heartbeat_api::{ApiState, api_router};
use heartbeat_core::{account::AccountStore, store::MatchStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{LocalIdentity, require_session};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `HEARTBEAT_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Lifetime of an issued session token.
  pub session_ttl_secs: i64,
  /// Default `/api/feed` batch size. Unset returns every candidate.
  pub feed_batch_size:  Option<usize>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".to_string(),
      port:             8080,
      store_path:       PathBuf::from("~/.local/share/heartbeat/heartbeat.db"),
      session_ttl_secs: 30 * 24 * 60 * 60,
      feed_batch_size:  None,
    }
  }
}

impl ServerConfig {
  pub fn session_ttl(&self) -> chrono::Duration { chrono::Duration::seconds(self.session_ttl_secs) }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub identity: Arc<LocalIdentity<S>>,
  pub config:   Arc<ServerConfig>,
}

impl<S> AppState<S>
where
  S: AccountStore + MatchStore,
{
  pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
    let identity = LocalIdentity::new(Arc::clone(&store), config.session_ttl());
    Self { store, identity: Arc::new(identity), config: Arc::new(config) }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      identity: Arc::clone(&self.identity),
      config:   Arc::clone(&self.config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: AccountStore + MatchStore + 'static,
{
  let api = api_router(ApiState {
    store:           Arc::clone(&state.store),
    feed_batch_size: state.config.feed_batch_size,
  })
  .layer(middleware::from_fn_with_state(state.clone(), require_session::<S>));

  Router::new()
    .route("/auth/sign-up",  post(handlers::sign_up::<S>))
    .route("/auth/sign-in",  post(handlers::sign_in::<S>))
    .route("/auth/sign-out", post(handlers::sign_out::<S>))
    .route("/auth/session",  get(handlers::session))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ───────────────────────────────────────────────────────
