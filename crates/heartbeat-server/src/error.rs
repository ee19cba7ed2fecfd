//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use heartbeat_core::error::Classify;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("email already registered: {0}")]
  EmailTaken(String),

  #[error("{0}")]
  Invalid(#[from] heartbeat_core::Error),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),

  /// Busy or locked; the request may succeed if repeated.
  #[error("store unavailable: {0}")]
  Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    if e.is_transient() {
      Self::Unavailable(Box::new(e))
    } else {
      Self::Store(Box::new(e))
    }
  }
}

impl From<argon2::password_hash::Error> for Error {
  fn from(e: argon2::password_hash::Error) -> Self { Self::PasswordHash(e.to_string()) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Unauthorized | Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
      Error::EmailTaken(_) => StatusCode::CONFLICT,
      Error::Invalid(_) => StatusCode::BAD_REQUEST,
      Error::Unavailable(_) => {
        tracing::warn!(error = %self, "store unavailable");
        StatusCode::SERVICE_UNAVAILABLE
      }
      Error::PasswordHash(_) | Error::Store(_) => {
        tracing::error!(error = %self, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    match status {
      StatusCode::UNAUTHORIZED => {
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Bearer realm=\"heartbeat\""),
        );
      }
      StatusCode::SERVICE_UNAVAILABLE => {
        res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
      }
      _ => {}
    }
    res
  }
}
