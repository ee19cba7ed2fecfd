//! JSON REST API for the Heartbeat match feed.
//!
//! Exposes an axum [`Router`] backed by any
//! [`heartbeat_core::store::MatchStore`]. Authentication is the caller's
//! responsibility: the caller must attach a [`Viewer`] request extension
//! naming the signed-in user before a request reaches these handlers.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", heartbeat_api::api_router(state))
//! ```

pub mod decisions;
pub mod error;
pub mod feed;
pub mod matches;
pub mod profiles;

use std::sync::Arc;

use axum::{
  Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::get,
};
use heartbeat_core::{profile::UserId, store::MatchStore};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state for every API handler.
pub struct ApiState<S> {
  pub store:           Arc<S>,
  /// Default number of candidates per `/feed` call; `None` returns all.
  pub feed_batch_size: Option<usize>,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, feed_batch_size: None } }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), feed_batch_size: self.feed_batch_size }
  }
}

// ─── Viewer ──────────────────────────────────────────────────────────────────

/// The authenticated user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer(pub UserId);

impl<St: Send + Sync> FromRequestParts<St> for Viewer {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _: &St) -> Result<Self, Self::Rejection> {
    parts.extensions.get::<Viewer>().cloned().ok_or(ApiError::Unauthorized)
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: MatchStore + 'static,
{
  Router::new()
    // Profiles
    .route("/profiles/me", get(profiles::get_me::<S>).put(profiles::put_me::<S>))
    .route("/profiles/{id}", get(profiles::get_one::<S>))
    // Feed
    .route("/feed", get(feed::handler::<S>))
    // Decisions
    .route("/decisions", get(decisions::list::<S>).post(decisions::create::<S>))
    // Messaging
    .route("/matches", get(matches::list::<S>))
    .with_state(state)
}
