//! Handler for `GET /matches`: the messaging screen's list of mutual
//! matches.

use axum::{Json, extract::State};
use heartbeat_core::store::{MatchStore, MatchedProfile};

use crate::{ApiState, Viewer, error::ApiError};

/// `GET /matches`
pub async fn list<S: MatchStore>(
  State(state): State<ApiState<S>>,
  Viewer(viewer): Viewer,
) -> Result<Json<Vec<MatchedProfile>>, ApiError> {
  let matches = state.store.matches_for(&viewer).await.map_err(ApiError::store)?;
  Ok(Json(matches))
}
