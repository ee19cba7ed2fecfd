//! Error type for `heartbeat-store-sqlite`.

use heartbeat_core::{
  error::{Classify, ErrorClass},
  profile::UserId,
};
use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] heartbeat_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("profile already exists: {0}")]
  DuplicateProfile(UserId),

  #[error("decision by {user} on {target} already recorded")]
  DuplicateDecision { user: UserId, target: UserId },

  #[error("email already registered: {0}")]
  DuplicateEmail(String),

  /// A decision named a user with no profile row.
  #[error("no profile for {user} or {target}")]
  UnknownProfile { user: UserId, target: UserId },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::DuplicateProfile(_) | Self::DuplicateDecision { .. } | Self::DuplicateEmail(_) => {
        ErrorClass::Conflict
      }
      Self::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
        if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
      {
        ErrorClass::Transient
      }
      _ => ErrorClass::Permanent,
    }
  }
}

/// The kind of constraint a failed statement violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
  Unique,
  ForeignKey,
  Other,
}

pub(crate) fn violated_constraint(err: &tokio_rusqlite::Error) -> Option<Constraint> {
  let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)) = err else {
    return None;
  };
  if e.code != ErrorCode::ConstraintViolation {
    return None;
  }
  Some(match e.extended_code {
    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Constraint::Unique,
    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Constraint::ForeignKey,
    _ => Constraint::Other,
  })
}
