//! The bundled email/password identity provider, and the bearer-token
//! extractor and middleware that guard the API.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, header, request::Parts},
  middleware::Next,
  response::Response,
};
use chrono::Utc;
use heartbeat_api::Viewer;
use heartbeat_core::{
  account::{AccountStore, SessionRecord},
  error::Classify,
  profile::{NewProfile, UserId, validate_name},
  session::{Credentials, IdentityProvider, Session},
  store::MatchStore,
};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::{AppState, error::Error};

// ─── Tokens ──────────────────────────────────────────────────────────────────

const TOKEN_BYTES: usize = 32;

/// A fresh random bearer token, hex-encoded.
pub fn generate_token() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// The form a token is stored in.
pub fn hash_token(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

// ─── Provider ────────────────────────────────────────────────────────────────

/// Email/password accounts with opaque, expiring session tokens, kept in the
/// same store as the profiles.
pub struct LocalIdentity<S> {
  store:       Arc<S>,
  session_ttl: chrono::Duration,
}

impl<S> LocalIdentity<S>
where
  S: AccountStore + MatchStore,
{
  pub fn new(store: Arc<S>, session_ttl: chrono::Duration) -> Self { Self { store, session_ttl } }

  async fn issue_session(&self, user_id: UserId) -> Result<Session, Error> {
    let token = generate_token();
    let now = Utc::now();
    let record = SessionRecord {
      token_hash: hash_token(&token),
      user_id:    user_id.clone(),
      created_at: now,
      expires_at: now + self.session_ttl,
    };
    let expires_at = record.expires_at;
    self.store.insert_session(record).await.map_err(Error::store)?;
    Ok(Session { user_id, access_token: token, expires_at })
  }
}

impl<S> IdentityProvider for LocalIdentity<S>
where
  S: AccountStore + MatchStore,
{
  type Error = Error;

  async fn sign_up(&self, credentials: &Credentials, display_name: &str) -> Result<Session, Error> {
    validate_name(display_name)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(credentials.password.as_bytes(), &salt)?
      .to_string();

    let account = match self.store.create_account(&credentials.email, &hash).await {
      Ok(account) => account,
      Err(e) if e.is_conflict() => return Err(Error::EmailTaken(credentials.email.clone())),
      Err(e) => return Err(Error::store(e)),
    };
    tracing::info!(user_id = %account.user_id, "account created");

    let profile = NewProfile::new(account.user_id.clone(), display_name)?;
    if let Err(e) = self.store.create_profile(profile).await {
      // An account without a profile cannot swipe, so undo the registration.
      if let Err(rollback) = self.store.delete_account(&account.user_id).await {
        tracing::warn!(user_id = %account.user_id, error = %rollback, "account rollback failed");
      }
      return Err(Error::store(e));
    }

    self.issue_session(account.user_id).await
  }

  async fn sign_in(&self, credentials: &Credentials) -> Result<Session, Error> {
    let account = self
      .store
      .find_account(&credentials.email)
      .await
      .map_err(Error::store)?
      .ok_or(Error::InvalidCredentials)?;

    let parsed = PasswordHash::new(&account.password_hash)?;
    Argon2::default()
      .verify_password(credentials.password.as_bytes(), &parsed)
      .map_err(|_| Error::InvalidCredentials)?;

    tracing::info!(user_id = %account.user_id, "signed in");
    self.issue_session(account.user_id).await
  }

  async fn sign_out(&self, session: &Session) -> Result<(), Error> {
    let removed = self
      .store
      .delete_session(&hash_token(&session.access_token))
      .await
      .map_err(Error::store)?;
    tracing::info!(user_id = %session.user_id, removed, "signed out");
    Ok(())
  }

  async fn resolve(&self, token: &str) -> Result<Option<Session>, Error> {
    let token_hash = hash_token(token);
    let Some(record) = self.store.find_session(&token_hash).await.map_err(Error::store)? else {
      return Ok(None);
    };

    if record.is_expired_at(Utc::now()) {
      tracing::debug!(user_id = %record.user_id, "session expired");
      self.store.delete_session(&token_hash).await.map_err(Error::store)?;
      return Ok(None);
    }

    Ok(Some(Session {
      user_id:      record.user_id,
      access_token: token.to_owned(),
      expires_at:   record.expires_at,
    }))
  }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// Present in a handler means the request carried a live session token.
pub struct Authenticated(pub Session);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: AccountStore + MatchStore + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers).ok_or(Error::Unauthorized)?;
    let session = state.identity.resolve(token).await?.ok_or(Error::Unauthorized)?;
    Ok(Authenticated(session))
  }
}

/// Middleware for `/api`: resolve the bearer token and attach the
/// [`Viewer`] the API handlers act for.
pub async fn require_session<S>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error>
where
  S: AccountStore + MatchStore + 'static,
{
  let token = bearer_token(req.headers()).ok_or(Error::Unauthorized)?.to_owned();
  let session = state.identity.resolve(&token).await?.ok_or(Error::Unauthorized)?;
  req.extensions_mut().insert(Viewer(session.user_id));
  Ok(next.run(req).await)
}
