//! Handlers for `/decisions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/decisions` | The viewer's decisions, oldest first |
//! | `POST` | `/decisions` | Body: `{"target":"<id>","outcome":"liked"}`; 409 if already decided, 503 if the store is busy |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use heartbeat_core::{
  decision::{Decision, Outcome},
  feed::record_decision,
  profile::UserId,
  store::MatchStore,
};
use serde::Deserialize;

use crate::{ApiState, Viewer, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /decisions`
pub async fn list<S: MatchStore>(
  State(state): State<ApiState<S>>,
  Viewer(viewer): Viewer,
) -> Result<Json<Vec<Decision>>, ApiError> {
  let decisions = state.store.decisions_by(&viewer).await.map_err(ApiError::store)?;
  Ok(Json(decisions))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  /// Validated in the handler so a blank id is a JSON 400.
  pub target:  String,
  pub outcome: Outcome,
}

/// `POST /decisions`
///
/// 400 if the viewer has no profile yet, 404 if the target has none.
pub async fn create<S: MatchStore>(
  State(state): State<ApiState<S>>,
  Viewer(viewer): Viewer,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let target = UserId::new(body.target)?;

  if state.store.get_profile(&viewer).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::BadRequest(
      "create your profile before deciding on others".to_string(),
    ));
  }
  if state.store.get_profile(&target).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::NotFound(format!("profile {target} not found")));
  }

  let decision = record_decision(state.store.as_ref(), &viewer, &target, body.outcome).await?;
  Ok((StatusCode::CREATED, Json(decision)))
}
