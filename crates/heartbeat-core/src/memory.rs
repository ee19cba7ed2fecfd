//! In-memory store implementation.
//!
//! Implements both [`MatchStore`] and [`AccountStore`] with the same
//! uniqueness and reference rules as the SQLite backend: one profile per id,
//! one decision per pair, one account per email, and a decision only between
//! two existing profiles. Useful for tests and for running the server
//! without a database file.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use thiserror::Error;

use crate::{
  account::{Account, AccountStore, SessionRecord},
  decision::{Decision, NewDecision, Outcome},
  error::{Classify, ErrorClass},
  profile::{NewProfile, Profile, ProfileUpdate, UserId},
  store::{MatchStore, MatchedProfile, ProfileQuery},
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("profile already exists: {0}")]
  DuplicateProfile(UserId),

  #[error("decision by {user} on {target} already recorded")]
  DuplicateDecision { user: UserId, target: UserId },

  #[error("email already registered: {0}")]
  DuplicateEmail(String),

  #[error("no profile for {user} or {target}")]
  UnknownProfile { user: UserId, target: UserId },
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::UnknownProfile { .. } => ErrorClass::Permanent,
      _ => ErrorClass::Conflict,
    }
  }
}

#[derive(Default)]
struct State {
  profiles:  BTreeMap<UserId, Profile>,
  /// Insertion order is creation order.
  decisions: Vec<Decision>,
  accounts:  HashMap<String, Account>,
  sessions:  HashMap<String, SessionRecord>,
}

/// A process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl MatchStore for MemoryStore {
  type Error = Error;

  async fn get_profile(&self, id: &UserId) -> Result<Option<Profile>, Error> {
    Ok(self.state().profiles.get(id).cloned())
  }

  async fn create_profile(&self, input: NewProfile) -> Result<Profile, Error> {
    let mut state = self.state();
    if state.profiles.contains_key(&input.id) {
      return Err(Error::DuplicateProfile(input.id));
    }
    let profile = input.into_profile();
    state.profiles.insert(profile.id.clone(), profile.clone());
    Ok(profile)
  }

  async fn upsert_profile(&self, id: &UserId, update: ProfileUpdate) -> Result<Profile, Error> {
    let now = Utc::now();
    let mut state = self.state();
    let profile = match state.profiles.get_mut(id) {
      Some(existing) => {
        existing.apply(update, now);
        existing.clone()
      }
      None => {
        let created = Profile::from_update(id.clone(), update, now);
        state.profiles.insert(id.clone(), created.clone());
        created
      }
    };
    Ok(profile)
  }

  async fn candidate_profiles(&self, query: &ProfileQuery) -> Result<Vec<Profile>, Error> {
    let state = self.state();
    let mut profiles: Vec<Profile> = state
      .profiles
      .values()
      .filter(|p| !query.exclusion.excludes(&p.id))
      .cloned()
      .collect();
    profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    if let Some(limit) = query.limit {
      profiles.truncate(limit);
    }
    Ok(profiles)
  }

  async fn decisions_by(&self, user_id: &UserId) -> Result<Vec<Decision>, Error> {
    Ok(
      self
        .state()
        .decisions
        .iter()
        .filter(|d| d.user_id == *user_id)
        .cloned()
        .collect(),
    )
  }

  async fn insert_decision(&self, input: NewDecision) -> Result<Decision, Error> {
    let mut state = self.state();
    if !state.profiles.contains_key(&input.user_id) || !state.profiles.contains_key(&input.target_id) {
      return Err(Error::UnknownProfile { user: input.user_id, target: input.target_id });
    }
    let taken = state
      .decisions
      .iter()
      .any(|d| d.user_id == input.user_id && d.target_id == input.target_id);
    if taken {
      return Err(Error::DuplicateDecision { user: input.user_id, target: input.target_id });
    }
    let decision = input.into_decision(Utc::now());
    state.decisions.push(decision.clone());
    Ok(decision)
  }

  async fn matches_for(&self, user_id: &UserId) -> Result<Vec<MatchedProfile>, Error> {
    let state = self.state();
    let mut matches: Vec<MatchedProfile> = state
      .decisions
      .iter()
      .filter(|d| d.user_id == *user_id && d.outcome == Outcome::Matched)
      .filter_map(|d| {
        let profile = state.profiles.get(&d.target_id)?;
        Some(MatchedProfile {
          decision_id: d.decision_id,
          profile_id:  profile.id.clone(),
          name:        profile.name.clone(),
          avatar_url:  profile.avatar_url.clone(),
          matched_at:  d.created_at,
        })
      })
      .collect();
    matches.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
    Ok(matches)
  }
}

impl AccountStore for MemoryStore {
  type Error = Error;

  async fn create_account(&self, email: &str, password_hash: &str) -> Result<Account, Error> {
    let mut state = self.state();
    if state.accounts.contains_key(email) {
      return Err(Error::DuplicateEmail(email.to_owned()));
    }
    let account = Account {
      user_id:       UserId::generate(),
      email:         email.to_owned(),
      password_hash: password_hash.to_owned(),
      created_at:    Utc::now(),
    };
    state.accounts.insert(email.to_owned(), account.clone());
    Ok(account)
  }

  async fn find_account(&self, email: &str) -> Result<Option<Account>, Error> {
    Ok(self.state().accounts.get(email).cloned())
  }

  async fn delete_account(&self, user_id: &UserId) -> Result<bool, Error> {
    let mut state = self.state();
    let before = state.accounts.len();
    state.accounts.retain(|_, account| account.user_id != *user_id);
    state.sessions.retain(|_, session| session.user_id != *user_id);
    Ok(state.accounts.len() < before)
  }

  async fn insert_session(&self, record: SessionRecord) -> Result<(), Error> {
    self.state().sessions.insert(record.token_hash.clone(), record);
    Ok(())
  }

  async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, Error> {
    Ok(self.state().sessions.get(token_hash).cloned())
  }

  async fn delete_session(&self, token_hash: &str) -> Result<bool, Error> {
    Ok(self.state().sessions.remove(token_hash).is_some())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id(s: &str) -> UserId { UserId::new(s).unwrap() }

  #[tokio::test]
  async fn upsert_creates_then_updates() {
    let store = MemoryStore::new();
    let update = ProfileUpdate { name: "Ada".into(), age: Some(30), ..Default::default() };
    let created = store.upsert_profile(&id("u1"), update.clone()).await.unwrap();
    assert_eq!(created.age, Some(30));

    let edit = ProfileUpdate { age: Some(31), ..update };
    let updated = store.upsert_profile(&id("u1"), edit).await.unwrap();
    assert_eq!(updated.age, Some(31));
    assert_eq!(updated.created_at, created.created_at);
  }

  #[tokio::test]
  async fn registration_profile_is_unique() {
    let store = MemoryStore::new();
    store.create_profile(NewProfile::new(id("u1"), "Ada").unwrap()).await.unwrap();
    let again = store.create_profile(NewProfile::new(id("u1"), "Ada").unwrap()).await;
    assert!(matches!(again, Err(Error::DuplicateProfile(_))));
  }

  #[tokio::test]
  async fn matches_join_the_other_profile() {
    let store = MemoryStore::new();
    store.create_profile(NewProfile::new(id("u1"), "Ada").unwrap()).await.unwrap();
    store.create_profile(NewProfile::new(id("p1"), "Grace").unwrap()).await.unwrap();
    store.create_profile(NewProfile::new(id("p2"), "Alan").unwrap()).await.unwrap();
    store
      .insert_decision(NewDecision { user_id: id("u1"), target_id: id("p1"), outcome: Outcome::Matched })
      .await
      .unwrap();
    store
      .insert_decision(NewDecision { user_id: id("u1"), target_id: id("p2"), outcome: Outcome::Liked })
      .await
      .unwrap();

    let matches = store.matches_for(&id("u1")).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].profile_id, id("p1"));
    assert_eq!(matches[0].name, "Grace");
  }

  #[tokio::test]
  async fn decisions_need_both_profiles() {
    let store = MemoryStore::new();
    store.create_profile(NewProfile::new(id("u1"), "Ada").unwrap()).await.unwrap();

    let ghost_target = store
      .insert_decision(NewDecision { user_id: id("u1"), target_id: id("p9"), outcome: Outcome::Liked })
      .await;
    assert!(matches!(ghost_target, Err(Error::UnknownProfile { .. })));

    let ghost_viewer = store
      .insert_decision(NewDecision { user_id: id("p9"), target_id: id("u1"), outcome: Outcome::Liked })
      .await
      .unwrap_err();
    assert_eq!(ghost_viewer.class(), ErrorClass::Permanent);
    assert!(store.state().decisions.is_empty());
  }

  #[tokio::test]
  async fn deleting_an_account_drops_its_sessions() {
    let store = MemoryStore::new();
    let account = store.create_account("ada@example.com", "hash").await.unwrap();
    let now = Utc::now();
    store
      .insert_session(SessionRecord {
        token_hash: "abc".into(),
        user_id:    account.user_id.clone(),
        created_at: now,
        expires_at: now + chrono::Duration::days(1),
      })
      .await
      .unwrap();

    assert!(store.delete_account(&account.user_id).await.unwrap());
    assert!(!store.delete_account(&account.user_id).await.unwrap());
    assert!(store.find_account("ada@example.com").await.unwrap().is_none());
    assert!(store.find_session("abc").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn accounts_and_sessions() {
    let store = MemoryStore::new();
    let account = store.create_account("ada@example.com", "hash").await.unwrap();
    assert!(matches!(
      store.create_account("ada@example.com", "other").await,
      Err(Error::DuplicateEmail(_))
    ));
    let found = store.find_account("ada@example.com").await.unwrap().unwrap();
    assert_eq!(found.user_id, account.user_id);

    let now = Utc::now();
    let record = SessionRecord {
      token_hash: "abc".into(),
      user_id:    account.user_id,
      created_at: now,
      expires_at: now + chrono::Duration::days(1),
    };
    store.insert_session(record.clone()).await.unwrap();
    assert_eq!(store.find_session("abc").await.unwrap(), Some(record));
    assert!(store.delete_session("abc").await.unwrap());
    assert!(!store.delete_session("abc").await.unwrap());
    assert_eq!(store.find_session("abc").await.unwrap(), None);
  }
}
