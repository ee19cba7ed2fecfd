//! Handler for `GET /feed`: the viewer's next batch of candidates.

use axum::{
  Json,
  extract::{Query, State},
};
use heartbeat_core::{feed::select_batch, profile::Profile, store::MatchStore};
use serde::Deserialize;

use crate::{ApiState, Viewer, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct FeedParams {
  /// Overrides the server's default batch size.
  pub limit: Option<usize>,
}

/// `GET /feed[?limit=<n>]`
///
/// Newest profiles first, never the viewer's own, never one already decided
/// on. An exhausted feed is an empty array.
pub async fn handler<S: MatchStore>(
  State(state): State<ApiState<S>>,
  Viewer(viewer): Viewer,
  Query(params): Query<FeedParams>,
) -> Result<Json<Vec<Profile>>, ApiError> {
  let limit = params.limit.or(state.feed_batch_size);
  let candidates = select_batch(state.store.as_ref(), &viewer, limit).await?;
  Ok(Json(candidates))
}
