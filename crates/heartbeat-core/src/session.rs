//! Sessions, the identity-provider abstraction, and the process-wide session
//! cache.
//!
//! A [`Session`] is an explicit value: every feed and profile call takes the
//! session it acts for. [`SessionManager`] is the one place that remembers
//! the current session; it is refreshed through the provider calls it wraps
//! and notifies subscribers on every change.

use std::{
  future::Future,
  sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicU64, Ordering},
  },
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, profile::UserId};

// ─── Session ─────────────────────────────────────────────────────────────────

/// An authenticated session, as handed out by an [`IdentityProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub user_id:      UserId,
  /// Opaque bearer token.
  pub access_token: String,
  pub expires_at:   DateTime<Utc>,
}

impl Session {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Email/password pair for sign-up and sign-in.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
  pub email:    String,
  pub password: String,
}

impl Credentials {
  pub const MIN_PASSWORD_LEN: usize = 6;

  /// Normalise the email (trimmed, lowercased) and check both fields.
  pub fn new(email: &str, password: &str) -> Result<Self> {
    let email = email.trim().to_lowercase();
    let valid = email
      .split_once('@')
      .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid || email.chars().any(char::is_whitespace) {
      return Err(Error::InvalidEmail(email));
    }
    if password.chars().count() < Self::MIN_PASSWORD_LEN {
      return Err(Error::PasswordTooShort(Self::MIN_PASSWORD_LEN));
    }
    Ok(Self { email, password: password.to_owned() })
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("email", &self.email)
      .field("password", &"<redacted>")
      .finish()
  }
}

// ─── Provider ────────────────────────────────────────────────────────────────

/// An identity service: the server's email/password provider, or the HTTP
/// client talking to it.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Register and sign in. `display_name` seeds the new profile.
  fn sign_up<'a>(
    &'a self,
    credentials: &'a Credentials,
    display_name: &'a str,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + 'a;

  fn sign_in<'a>(
    &'a self,
    credentials: &'a Credentials,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + 'a;

  /// Revoke `session`'s token.
  fn sign_out<'a>(
    &'a self,
    session: &'a Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Look a bearer token up. `None` if it is unknown, revoked or expired.
  fn resolve<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + 'a;
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
  SignedIn(Session),
  SignedOut,
}

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Shared {
  current:     Mutex<Option<Session>>,
  subscribers: Mutex<Vec<(u64, Callback)>>,
  next_id:     AtomicU64,
}

impl Shared {
  fn set(&self, session: Option<Session>) {
    let event = match &session {
      Some(s) => SessionEvent::SignedIn(s.clone()),
      None => SessionEvent::SignedOut,
    };
    *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session;

    // Callbacks run outside the lock so they may call back into the manager.
    let callbacks: Vec<Callback> = self
      .subscribers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(_, cb)| Arc::clone(cb))
      .collect();
    for cb in callbacks {
      cb(&event);
    }
  }
}

/// Keeps a session-change callback registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  shared: Weak<Shared>,
  id:     u64,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(shared) = self.shared.upgrade() {
      shared
        .subscribers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|(id, _)| *id != self.id);
    }
  }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// Wraps an [`IdentityProvider`] with the cached current session.
pub struct SessionManager<P> {
  provider: P,
  shared:   Arc<Shared>,
}

impl<P: IdentityProvider> SessionManager<P> {
  pub fn new(provider: P) -> Self { Self { provider, shared: Arc::default() } }

  pub fn provider(&self) -> &P { &self.provider }

  /// The cached session, unless it has expired.
  pub fn current_session(&self) -> Option<Session> {
    self
      .shared
      .current
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
      .filter(|s| !s.is_expired_at(Utc::now()))
  }

  /// Register `callback` for every subsequent session change.
  pub fn subscribe(
    &self,
    callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
  ) -> Subscription {
    let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
    self
      .shared
      .subscribers
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push((id, Arc::new(callback)));
    Subscription { shared: Arc::downgrade(&self.shared), id }
  }

  pub async fn sign_up(
    &self,
    credentials: &Credentials,
    display_name: &str,
  ) -> Result<Session, P::Error> {
    let session = self.provider.sign_up(credentials, display_name).await?;
    tracing::info!(user_id = %session.user_id, "signed up");
    self.shared.set(Some(session.clone()));
    Ok(session)
  }

  pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, P::Error> {
    let session = self.provider.sign_in(credentials).await?;
    tracing::info!(user_id = %session.user_id, "signed in");
    self.shared.set(Some(session.clone()));
    Ok(session)
  }

  /// Re-validate a previously issued token and cache the result.
  ///
  /// An unknown or expired token clears the cache.
  pub async fn restore(&self, token: &str) -> Result<Option<Session>, P::Error> {
    let session = self.provider.resolve(token).await?;
    match &session {
      Some(s) => tracing::debug!(user_id = %s.user_id, "session restored"),
      None => tracing::debug!("stored session is no longer valid"),
    }
    self.shared.set(session.clone());
    Ok(session)
  }

  /// Invalidate the cached session, then revoke it with the provider.
  ///
  /// The cache is cleared even if revocation fails.
  pub async fn sign_out(&self) -> Result<(), P::Error> {
    let previous = self
      .shared
      .current
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    self.shared.set(None);

    if let Some(session) = previous {
      tracing::info!(user_id = %session.user_id, "signing out");
      self.provider.sign_out(&session).await?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;

  #[derive(Debug, thiserror::Error)]
  #[error("provider rejected the request")]
  struct Rejected;

  /// Accepts one password and issues one fixed token.
  struct FixedProvider {
    revoked: Mutex<bool>,
  }

  impl FixedProvider {
    fn new() -> Self { Self { revoked: Mutex::new(false) } }

    fn session() -> Session {
      Session {
        user_id:      UserId::new("u1").unwrap(),
        access_token: "token-1".into(),
        expires_at:   Utc::now() + chrono::Duration::hours(1),
      }
    }
  }

  impl IdentityProvider for FixedProvider {
    type Error = Rejected;

    async fn sign_up(&self, c: &Credentials, _: &str) -> Result<Session, Rejected> {
      self.sign_in(c).await
    }

    async fn sign_in(&self, c: &Credentials) -> Result<Session, Rejected> {
      if c.password == "secret1" { Ok(Self::session()) } else { Err(Rejected) }
    }

    async fn sign_out(&self, _: &Session) -> Result<(), Rejected> {
      *self.revoked.lock().unwrap() = true;
      Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<Session>, Rejected> {
      let revoked = *self.revoked.lock().unwrap();
      Ok((token == "token-1" && !revoked).then(Self::session))
    }
  }

  fn creds(password: &str) -> Credentials {
    Credentials { email: "ada@example.com".into(), password: password.into() }
  }

  #[test]
  fn credentials_are_normalised_and_checked() {
    let c = Credentials::new("  Ada@Example.COM ", "secret1").unwrap();
    assert_eq!(c.email, "ada@example.com");
    assert!(matches!(Credentials::new("nope", "secret1"), Err(Error::InvalidEmail(_))));
    assert!(matches!(Credentials::new("@example.com", "secret1"), Err(Error::InvalidEmail(_))));
    assert!(matches!(Credentials::new("a@b.c", "12345"), Err(Error::PasswordTooShort(6))));
    assert!(!format!("{c:?}").contains("secret1"));
  }

  #[tokio::test]
  async fn sign_in_caches_and_notifies() {
    let manager = SessionManager::new(FixedProvider::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = manager.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

    assert!(manager.current_session().is_none());
    let session = manager.sign_in(&creds("secret1")).await.unwrap();

    assert_eq!(manager.current_session(), Some(session.clone()));
    assert_eq!(*seen.lock().unwrap(), [SessionEvent::SignedIn(session)]);
  }

  #[tokio::test]
  async fn failed_sign_in_leaves_cache_alone() {
    let manager = SessionManager::new(FixedProvider::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let _sub = manager.subscribe(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(manager.sign_in(&creds("wrong-password")).await.is_err());
    assert!(manager.current_session().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn sign_out_invalidates_cache_and_revokes() {
    let manager = SessionManager::new(FixedProvider::new());
    manager.sign_in(&creds("secret1")).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = manager.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

    manager.sign_out().await.unwrap();
    assert!(manager.current_session().is_none());
    assert_eq!(*seen.lock().unwrap(), [SessionEvent::SignedOut]);

    // The revoked token no longer restores.
    assert_eq!(manager.restore("token-1").await.unwrap(), None);
  }

  #[tokio::test]
  async fn restore_refreshes_cache() {
    let manager = SessionManager::new(FixedProvider::new());
    let restored = manager.restore("token-1").await.unwrap();
    assert!(restored.is_some());
    assert_eq!(manager.current_session(), restored);

    assert_eq!(manager.restore("bogus").await.unwrap(), None);
    assert!(manager.current_session().is_none());
  }

  #[tokio::test]
  async fn dropped_subscription_stops_notifications() {
    let manager = SessionManager::new(FixedProvider::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sub = manager.subscribe(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    manager.sign_in(&creds("secret1")).await.unwrap();
    drop(sub);
    manager.sign_out().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn expiry_is_inclusive() {
    let now = Utc::now();
    let session = Session {
      user_id:      UserId::new("u1").unwrap(),
      access_token: "t".into(),
      expires_at:   now,
    };
    assert!(session.is_expired_at(now));
    assert!(!session.is_expired_at(now - chrono::Duration::seconds(1)));
  }
}
