//! Error types for `heartbeat-core`.

use thiserror::Error;

use crate::decision::Outcome;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user id must not be empty")]
  EmptyUserId,

  #[error("a user cannot decide on their own profile")]
  SelfDecision,

  #[error("outcome {0} cannot be recorded by a swipe")]
  UnrecordableOutcome(Outcome),

  #[error("unknown outcome: {0:?}")]
  UnknownOutcome(String),

  #[error("display name must not be empty")]
  EmptyName,

  #[error("age must be a positive integer")]
  InvalidAge,

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  #[error("password must be at least {0} characters")]
  PasswordTooShort(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// How a failed store or back-end call should be treated by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// Worth retrying: the service was busy, locked, or unreachable.
  Transient,
  /// The write collided with an existing row (e.g. a second decision for the
  /// same pair).
  Conflict,
  /// Anything else. Retrying the same call will fail the same way.
  Permanent,
}

/// Implemented by every storage and transport error so the feed pipeline can
/// decide between retrying, treating a write as already done, or giving up.
pub trait Classify {
  fn class(&self) -> ErrorClass;

  fn is_transient(&self) -> bool { self.class() == ErrorClass::Transient }

  fn is_conflict(&self) -> bool { self.class() == ErrorClass::Conflict }
}
