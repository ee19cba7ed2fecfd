//! Handlers for `/profiles` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/profiles/me` | The viewer's own profile |
//! | `PUT`  | `/profiles/me` | Body: [`ProfileUpdate`]; replaces every editable field |
//! | `GET`  | `/profiles/{id}` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
};
use heartbeat_core::{
  profile::{Profile, ProfileUpdate, UserId},
  store::MatchStore,
};

use crate::{ApiState, Viewer, error::ApiError};

// ─── Own profile ─────────────────────────────────────────────────────────────

/// `GET /profiles/me`
pub async fn get_me<S: MatchStore>(
  State(state): State<ApiState<S>>,
  Viewer(viewer): Viewer,
) -> Result<Json<Profile>, ApiError> {
  let profile = state
    .store
    .get_profile(&viewer)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("profile {viewer} not found")))?;
  Ok(Json(profile))
}

/// `PUT /profiles/me`: owner-only edit. Creates the profile if registration
/// did not.
pub async fn put_me<S: MatchStore>(
  State(state): State<ApiState<S>>,
  Viewer(viewer): Viewer,
  Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
  let update = update.validate()?;
  let profile = state
    .store
    .upsert_profile(&viewer, update)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(%viewer, "profile updated");
  Ok(Json(profile))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /profiles/{id}`
pub async fn get_one<S: MatchStore>(
  State(state): State<ApiState<S>>,
  _viewer: Viewer,
  Path(id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
  let id = UserId::new(id)?;
  let profile = state
    .store
    .get_profile(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("profile {id} not found")))?;
  Ok(Json(profile))
}
