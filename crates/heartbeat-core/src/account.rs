//! Accounts and server-side session records, backing the bundled
//! email/password identity provider.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{error::Classify, profile::UserId};

/// A registered login. `email` is stored normalised (see
/// [`crate::session::Credentials`]).
#[derive(Debug, Clone)]
pub struct Account {
  pub user_id:       UserId,
  pub email:         String,
  /// PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// An issued session. Only a hash of the bearer token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
  pub token_hash: String,
  pub user_id:    UserId,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }
}

/// Storage for accounts and sessions.
///
/// `create_account` must refuse an email that is already registered with a
/// [`Conflict`](crate::error::ErrorClass::Conflict)-class error.
pub trait AccountStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  /// Register a new account under a freshly minted user id.
  fn create_account<'a>(
    &'a self,
    email: &'a str,
    password_hash: &'a str,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + 'a;

  /// Look an account up by its normalised email.
  fn find_account<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  /// Remove an account and its sessions. Returns `true` if it existed.
  fn delete_account<'a>(
    &'a self,
    user_id: &'a UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn insert_session(
    &self,
    record: SessionRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns the record regardless of expiry; callers check
  /// [`SessionRecord::is_expired_at`].
  fn find_session<'a>(
    &'a self,
    token_hash: &'a str,
  ) -> impl Future<Output = Result<Option<SessionRecord>, Self::Error>> + Send + 'a;

  /// Returns `true` if a session was removed.
  fn delete_session<'a>(
    &'a self,
    token_hash: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
