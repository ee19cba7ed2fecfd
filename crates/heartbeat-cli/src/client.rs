//! Async HTTP client wrapping the Heartbeat JSON API.
//!
//! [`ApiClient`] is both the CLI's [`IdentityProvider`] and its
//! [`FeedBackend`], so the session cache and the candidate feed from
//! `heartbeat-core` run unchanged on top of it.

use std::time::Duration;

use anyhow::Context as _;
use heartbeat_core::{
  decision::{Decision, NewDecision, Outcome},
  error::{Classify, ErrorClass},
  feed::{FeedBackend, FeedError},
  profile::{Profile, ProfileUpdate, UserId},
  session::{Credentials, IdentityProvider, Session},
  store::MatchedProfile,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("server returned {status}: {message}")]
  Status { status: StatusCode, message: String },
}

impl ClientError {
  pub fn status(&self) -> Option<StatusCode> {
    match self {
      Self::Http(e) => e.status(),
      Self::Status { status, .. } => Some(*status),
    }
  }
}

impl Classify for ClientError {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Http(e) if e.is_connect() || e.is_timeout() => ErrorClass::Transient,
      Self::Status { status, .. } => match *status {
        StatusCode::CONFLICT => ErrorClass::Conflict,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
          ErrorClass::Transient
        }
        _ => ErrorClass::Permanent,
      },
      Self::Http(_) => ErrorClass::Permanent,
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Async HTTP client for the Heartbeat server.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  /// Turn a non-2xx response into [`ClientError::Status`], taking the
  /// message from the server's `{"error": ...}` body when there is one.
  async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let message = resp
      .json::<serde_json::Value>()
      .await
      .ok()
      .and_then(|body| body["error"].as_str().map(str::to_owned))
      .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_owned());
    Err(ClientError::Status { status, message })
  }

  async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
    let resp = Self::check(req.send().await?).await?;
    Ok(resp.json().await?)
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  /// `GET /api/profiles/me`
  pub async fn own_profile(&self, session: &Session) -> Result<Profile, ClientError> {
    let req = self.client.get(self.url("/api/profiles/me")).bearer_auth(&session.access_token);
    self.fetch(req).await
  }

  /// `PUT /api/profiles/me`
  pub async fn update_profile(
    &self,
    session: &Session,
    update: &ProfileUpdate,
  ) -> Result<Profile, ClientError> {
    let req = self
      .client
      .put(self.url("/api/profiles/me"))
      .bearer_auth(&session.access_token)
      .json(update);
    self.fetch(req).await
  }

  /// `GET /api/profiles/{id}`
  pub async fn profile(&self, session: &Session, id: &UserId) -> Result<Profile, ClientError> {
    let req = self
      .client
      .get(self.url(&format!("/api/profiles/{id}")))
      .bearer_auth(&session.access_token);
    self.fetch(req).await
  }

  // ── Feed ──────────────────────────────────────────────────────────────────

  /// `GET /api/feed[?limit=<n>]`
  pub async fn feed(
    &self,
    session: &Session,
    limit: Option<usize>,
  ) -> Result<Vec<Profile>, ClientError> {
    let mut req = self.client.get(self.url("/api/feed")).bearer_auth(&session.access_token);
    if let Some(limit) = limit {
      req = req.query(&[("limit", limit)]);
    }
    self.fetch(req).await
  }

  /// `POST /api/decisions`
  pub async fn decide(
    &self,
    session: &Session,
    target: &UserId,
    outcome: Outcome,
  ) -> Result<Decision, ClientError> {
    let req = self
      .client
      .post(self.url("/api/decisions"))
      .bearer_auth(&session.access_token)
      .json(&json!({ "target": target, "outcome": outcome }));
    self.fetch(req).await
  }

  /// `GET /api/matches`
  pub async fn matches(&self, session: &Session) -> Result<Vec<MatchedProfile>, ClientError> {
    let req = self.client.get(self.url("/api/matches")).bearer_auth(&session.access_token);
    self.fetch(req).await
  }
}

// ─── IdentityProvider ────────────────────────────────────────────────────────

impl IdentityProvider for ApiClient {
  type Error = ClientError;

  async fn sign_up(&self, credentials: &Credentials, display_name: &str) -> Result<Session, ClientError> {
    let req = self.client.post(self.url("/auth/sign-up")).json(&json!({
      "email": credentials.email,
      "password": credentials.password,
      "name": display_name,
    }));
    self.fetch(req).await
  }

  async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ClientError> {
    let req = self.client.post(self.url("/auth/sign-in")).json(&json!({
      "email": credentials.email,
      "password": credentials.password,
    }));
    self.fetch(req).await
  }

  async fn sign_out(&self, session: &Session) -> Result<(), ClientError> {
    let resp = self
      .client
      .post(self.url("/auth/sign-out"))
      .bearer_auth(&session.access_token)
      .send()
      .await?;
    // Already revoked or expired server-side.
    if resp.status() == StatusCode::UNAUTHORIZED {
      return Ok(());
    }
    Self::check(resp).await?;
    Ok(())
  }

  async fn resolve(&self, token: &str) -> Result<Option<Session>, ClientError> {
    let resp = self.client.get(self.url("/auth/session")).bearer_auth(token).send().await?;
    if resp.status() == StatusCode::UNAUTHORIZED {
      return Ok(None);
    }
    Ok(Some(Self::check(resp).await?.json().await?))
  }
}

// ─── FeedBackend ─────────────────────────────────────────────────────────────

impl FeedBackend for ApiClient {
  type Error = ClientError;

  async fn load_candidates(
    &self,
    session: &Session,
    limit: Option<usize>,
  ) -> Result<Vec<Profile>, FeedError<ClientError>> {
    self.feed(session, limit).await.map_err(FeedError::Fetch)
  }

  async fn submit_decision(
    &self,
    session: &Session,
    target: &UserId,
    outcome: Outcome,
  ) -> Result<Decision, FeedError<ClientError>> {
    // Checked locally first so an invalid swipe never reaches the network.
    NewDecision::new(session.user_id.clone(), target.clone(), outcome)?;
    match self.decide(session, target, outcome).await {
      Ok(decision) => Ok(decision),
      Err(e) if e.is_conflict() => Err(FeedError::Duplicate(e)),
      Err(e) => Err(FeedError::Persist(e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use heartbeat_core::{feed::CandidateFeed, session::SessionManager};
  use heartbeat_server::{AppState, ServerConfig};
  use heartbeat_store_sqlite::SqliteStore;

  use super::*;

  async fn spawn_server() -> String {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let state = AppState::new(Arc::new(store), ServerConfig::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, heartbeat_server::router(state)).await.unwrap();
    });
    format!("http://{addr}")
  }

  fn creds(email: &str) -> Credentials { Credentials::new(email, "secret1").unwrap() }

  fn status(status: StatusCode) -> ClientError {
    ClientError::Status { status, message: String::new() }
  }

  #[test]
  fn status_classification() {
    assert_eq!(status(StatusCode::CONFLICT).class(), ErrorClass::Conflict);
    assert_eq!(status(StatusCode::SERVICE_UNAVAILABLE).class(), ErrorClass::Transient);
    assert_eq!(status(StatusCode::BAD_REQUEST).class(), ErrorClass::Permanent);
    assert_eq!(status(StatusCode::UNAUTHORIZED).status(), Some(StatusCode::UNAUTHORIZED));
  }

  #[tokio::test]
  async fn refused_connection_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(format!("http://{addr}")).unwrap();
    let err = client.resolve("token").await.unwrap_err();
    assert!(err.is_transient(), "{err}");
  }

  #[tokio::test]
  async fn session_lifecycle_over_http() {
    let client = ApiClient::new(spawn_server().await).unwrap();
    let manager = SessionManager::new(client);

    let session = manager.sign_up(&creds("ada@example.com"), "Ada").await.unwrap();
    assert_eq!(manager.current_session(), Some(session.clone()));

    let restored = manager.restore(&session.access_token).await.unwrap();
    assert_eq!(restored.map(|s| s.user_id), Some(session.user_id.clone()));

    let profile = manager.provider().own_profile(&session).await.unwrap();
    assert_eq!(profile.name, "Ada");

    manager.sign_out().await.unwrap();
    assert!(manager.current_session().is_none());
    assert_eq!(manager.restore(&session.access_token).await.unwrap(), None);

    let err = manager.sign_in(&Credentials::new("ada@example.com", "wrong-1").unwrap()).await;
    assert_eq!(err.unwrap_err().status(), Some(StatusCode::UNAUTHORIZED));
  }

  #[tokio::test]
  async fn candidate_feed_over_http() {
    let client = ApiClient::new(spawn_server().await).unwrap();
    let ada = client.sign_up(&creds("ada@example.com"), "Ada").await.unwrap();
    let grace = client.sign_up(&creds("grace@example.com"), "Grace").await.unwrap();
    let alan = client.sign_up(&creds("alan@example.com"), "Alan").await.unwrap();

    let (mut feed, _cancel) = CandidateFeed::new(client.clone(), ada.clone());
    let loaded: Vec<UserId> = feed.load().await.unwrap().iter().map(|p| p.id.clone()).collect();
    assert_eq!(loaded, [alan.user_id.clone(), grace.user_id.clone()]);

    feed.decide(&alan.user_id, Outcome::Liked).await.unwrap();
    assert_eq!(feed.current().map(|p| &p.id), Some(&grace.user_id));

    // The server rejects a second decision, and the feed drops the card.
    let dup = client.submit_decision(&ada, &alan.user_id, Outcome::Disliked).await;
    assert!(matches!(dup, Err(FeedError::Duplicate(_))));

    let on_self = feed.decide(&ada.user_id, Outcome::Liked).await;
    assert!(matches!(on_self, Err(FeedError::Invalid(_))));

    feed.decide(&grace.user_id, Outcome::Disliked).await.unwrap();
    assert!(feed.is_empty());
    assert!(feed.load().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn profile_edit_and_lookup() {
    let client = ApiClient::new(spawn_server().await).unwrap();
    let ada = client.sign_up(&creds("ada@example.com"), "Ada").await.unwrap();
    let grace = client.sign_up(&creds("grace@example.com"), "Grace").await.unwrap();

    let mut update = ProfileUpdate::from_profile(&client.own_profile(&grace).await.unwrap());
    update.bio = "Compilers".into();
    update.interests = vec!["navy".into()];
    let edited = client.update_profile(&grace, &update).await.unwrap();
    assert_eq!(edited.bio, "Compilers");

    let seen = client.profile(&ada, &grace.user_id).await.unwrap();
    assert_eq!(seen, edited);

    let missing = client.profile(&ada, &UserId::new("nobody").unwrap()).await.unwrap_err();
    assert_eq!(missing.status(), Some(StatusCode::NOT_FOUND));
    assert!(client.matches(&ada).await.unwrap().is_empty());
  }
}
