//! Handlers for the `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/sign-up`  | Body: `{"email","password","name"}`; 201 + session |
//! | `POST` | `/auth/sign-in`  | Body: `{"email","password"}`; session |
//! | `POST` | `/auth/sign-out` | Bearer; 204 |
//! | `GET`  | `/auth/session`  | Bearer; the current session |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use heartbeat_core::{
  account::AccountStore,
  session::{Credentials, IdentityProvider, Session},
  store::MatchStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::Error};

// ─── Sign up ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignUpBody {
  pub email:    String,
  pub password: String,
  /// Display name for the new profile.
  pub name:     String,
}

/// `POST /auth/sign-up`
pub async fn sign_up<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SignUpBody>,
) -> Result<impl IntoResponse, Error>
where
  S: AccountStore + MatchStore + 'static,
{
  let credentials = Credentials::new(&body.email, &body.password)?;
  let session = state.identity.sign_up(&credentials, &body.name).await?;
  Ok((StatusCode::CREATED, Json(session)))
}

// ─── Sign in ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignInBody {
  pub email:    String,
  pub password: String,
}

/// `POST /auth/sign-in`
pub async fn sign_in<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SignInBody>,
) -> Result<Json<Session>, Error>
where
  S: AccountStore + MatchStore + 'static,
{
  // A malformed email or short password can never match an account.
  let credentials =
    Credentials::new(&body.email, &body.password).map_err(|_| Error::InvalidCredentials)?;
  let session = state.identity.sign_in(&credentials).await?;
  Ok(Json(session))
}

// ─── Sign out ────────────────────────────────────────────────────────────────

/// `POST /auth/sign-out`
pub async fn sign_out<S>(
  State(state): State<AppState<S>>,
  Authenticated(session): Authenticated,
) -> Result<StatusCode, Error>
where
  S: AccountStore + MatchStore + 'static,
{
  state.identity.sign_out(&session).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// `GET /auth/session`
pub async fn session(Authenticated(session): Authenticated) -> Json<Session> { Json(session) }
