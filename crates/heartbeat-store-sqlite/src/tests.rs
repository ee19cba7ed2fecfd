//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeZone, Utc};
use heartbeat_core::{
  account::{AccountStore, SessionRecord},
  decision::{NewDecision, Outcome},
  error::{Classify, ErrorClass},
  feed::{FeedError, record_decision, select_batch, select_candidates},
  profile::{NewProfile, ProfileUpdate, UserId},
  store::{Exclusion, MatchStore, ProfileQuery},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn id(s: &str) -> UserId { UserId::new(s).unwrap() }

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

async fn seed(s: &SqliteStore, profile_id: &str, created: DateTime<Utc>) {
  let mut input = NewProfile::new(id(profile_id), profile_id).unwrap();
  input.created_at = created;
  s.create_profile(input).await.unwrap();
}

fn ids(profiles: &[heartbeat_core::profile::Profile]) -> Vec<&str> {
  profiles.iter().map(|p| p.id.as_str()).collect()
}

async fn scenario() -> SqliteStore {
  let s = store().await;
  seed(&s, "p1", at(10, 0)).await;
  seed(&s, "u1", at(10, 5)).await;
  seed(&s, "p3", at(10, 10)).await;
  s
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_profile() {
  let s = store().await;
  let created = s
    .create_profile(NewProfile::new(id("u1"), "Ada").unwrap())
    .await
    .unwrap();

  let fetched = s.get_profile(&id("u1")).await.unwrap().unwrap();
  assert_eq!(fetched, created);
  assert_eq!(fetched.name, "Ada");
  assert!(fetched.interests.is_empty());
  assert_eq!(fetched.age, None);
}

#[tokio::test]
async fn get_profile_missing_returns_none() {
  let s = store().await;
  assert!(s.get_profile(&id("nobody")).await.unwrap().is_none());
}

#[tokio::test]
async fn create_profile_twice_is_a_conflict() {
  let s = store().await;
  s.create_profile(NewProfile::new(id("u1"), "Ada").unwrap()).await.unwrap();
  let err = s
    .create_profile(NewProfile::new(id("u1"), "Ada").unwrap())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateProfile(_)));
  assert_eq!(err.class(), ErrorClass::Conflict);
}

#[tokio::test]
async fn upsert_updates_fields_and_keeps_created_at() {
  let s = store().await;
  seed(&s, "u1", at(10, 0)).await;

  let update = ProfileUpdate {
    name:       "Ada L.".into(),
    age:        Some(36),
    location:   "London".into(),
    bio:        "Analyst".into(),
    avatar_url: Some("https://example.com/a.png".into()),
    interests:  vec!["engines".into(), "poetry".into()],
  };
  let updated = s.upsert_profile(&id("u1"), update).await.unwrap();

  assert_eq!(updated.created_at, at(10, 0));
  assert!(updated.updated_at > updated.created_at);
  assert_eq!(updated.age, Some(36));
  assert_eq!(updated.interests, ["engines", "poetry"]);
  assert_eq!(s.get_profile(&id("u1")).await.unwrap(), Some(updated));
}

#[tokio::test]
async fn upsert_creates_missing_profile() {
  let s = store().await;
  let update = ProfileUpdate { name: "Grace".into(), ..Default::default() };
  let created = s.upsert_profile(&id("p9"), update).await.unwrap();
  assert_eq!(created.created_at, created.updated_at);
  assert!(s.get_profile(&id("p9")).await.unwrap().is_some());
}

// ─── Candidates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn candidates_newest_first_without_self() {
  let s = scenario().await;
  let query = ProfileQuery { exclusion: Exclusion::for_viewer(id("u1"), []), limit: None };
  let profiles = s.candidate_profiles(&query).await.unwrap();
  assert_eq!(ids(&profiles), ["p3", "p1"]);
}

#[tokio::test]
async fn candidates_exclude_decided_set() {
  let s = scenario().await;
  seed(&s, "p4", at(10, 20)).await;
  let query = ProfileQuery {
    exclusion: Exclusion::for_viewer(id("u1"), [id("p4"), id("p1")]),
    limit:     None,
  };
  let profiles = s.candidate_profiles(&query).await.unwrap();
  assert_eq!(ids(&profiles), ["p3"]);
}

#[tokio::test]
async fn candidates_tie_break_on_id() {
  let s = store().await;
  seed(&s, "b", at(9, 0)).await;
  seed(&s, "a", at(9, 0)).await;
  seed(&s, "c", at(9, 0)).await;
  let query = ProfileQuery { exclusion: Exclusion::for_viewer(id("v"), []), limit: None };
  assert_eq!(ids(&s.candidate_profiles(&query).await.unwrap()), ["a", "b", "c"]);
}

#[tokio::test]
async fn candidates_respect_limit() {
  let s = scenario().await;
  let batch = select_batch(&s, &id("u1"), Some(1)).await.unwrap();
  assert_eq!(ids(&batch), ["p3"]);
}

// ─── Feed over SQLite ────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_select_record_reselect() {
  let s = scenario().await;
  let u1 = id("u1");

  assert_eq!(ids(&select_candidates(&s, &u1).await.unwrap()), ["p3", "p1"]);
  let decision = record_decision(&s, &u1, &id("p3"), Outcome::Liked).await.unwrap();
  assert_eq!(decision.outcome, Outcome::Liked);
  assert_eq!(ids(&select_candidates(&s, &u1).await.unwrap()), ["p1"]);

  record_decision(&s, &u1, &id("p1"), Outcome::Disliked).await.unwrap();
  assert!(select_candidates(&s, &u1).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_decision_is_rejected_by_the_database() {
  let s = scenario().await;
  let u1 = id("u1");
  record_decision(&s, &u1, &id("p1"), Outcome::Liked).await.unwrap();

  let again = record_decision(&s, &u1, &id("p1"), Outcome::Disliked).await;
  assert!(matches!(again, Err(FeedError::Duplicate(Error::DuplicateDecision { .. }))));

  let decisions = s.decisions_by(&u1).await.unwrap();
  assert_eq!(decisions.len(), 1);
  assert_eq!(decisions[0].outcome, Outcome::Liked);
}

#[tokio::test]
async fn decision_on_unknown_profile_fails() {
  let s = scenario().await;
  let err = s
    .insert_decision(NewDecision { user_id: id("u1"), target_id: id("ghost"), outcome: Outcome::Liked })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownProfile { .. }));
  assert_eq!(err.class(), ErrorClass::Permanent);
}

#[tokio::test]
async fn decisions_by_is_oldest_first_and_per_user() {
  let s = scenario().await;
  record_decision(&s, &id("u1"), &id("p3"), Outcome::Liked).await.unwrap();
  record_decision(&s, &id("u1"), &id("p1"), Outcome::Disliked).await.unwrap();
  record_decision(&s, &id("p1"), &id("u1"), Outcome::Liked).await.unwrap();

  let targets: Vec<_> = s
    .decisions_by(&id("u1"))
    .await
    .unwrap()
    .into_iter()
    .map(|d| d.target_id)
    .collect();
  assert_eq!(targets, [id("p3"), id("p1")]);
}

#[tokio::test]
async fn matches_join_profile_and_ignore_likes() {
  let s = scenario().await;
  s.upsert_profile(
    &id("p3"),
    ProfileUpdate {
      name:       "Grace".into(),
      avatar_url: Some("https://example.com/g.png".into()),
      ..Default::default()
    },
  )
  .await
  .unwrap();
  s.insert_decision(NewDecision { user_id: id("u1"), target_id: id("p3"), outcome: Outcome::Matched })
    .await
    .unwrap();
  record_decision(&s, &id("u1"), &id("p1"), Outcome::Liked).await.unwrap();

  let matches = s.matches_for(&id("u1")).await.unwrap();
  assert_eq!(matches.len(), 1);
  assert_eq!(matches[0].profile_id, id("p3"));
  assert_eq!(matches[0].name, "Grace");
  assert_eq!(matches[0].avatar_url.as_deref(), Some("https://example.com/g.png"));

  // Matched profiles are also out of the feed.
  assert!(select_candidates(&s, &id("u1")).await.unwrap().is_empty());
}

// ─── Accounts & sessions ─────────────────────────────────────────────────────

#[tokio::test]
async fn account_roundtrip_and_unique_email() {
  let s = store().await;
  let account = s.create_account("ada@example.com", "$argon2id$stub").await.unwrap();

  let found = s.find_account("ada@example.com").await.unwrap().unwrap();
  assert_eq!(found.user_id, account.user_id);
  assert_eq!(found.password_hash, "$argon2id$stub");
  assert_eq!(found.created_at, account.created_at);
  assert!(s.find_account("grace@example.com").await.unwrap().is_none());

  let err = s.create_account("ada@example.com", "other").await.unwrap_err();
  assert!(matches!(err, Error::DuplicateEmail(_)));
  assert!(err.is_conflict());
}

#[tokio::test]
async fn sessions_insert_find_delete() {
  let s = store().await;
  let account = s.create_account("ada@example.com", "hash").await.unwrap();
  let record = SessionRecord {
    token_hash: "deadbeef".into(),
    user_id:    account.user_id,
    created_at: at(10, 0),
    expires_at: at(11, 0),
  };
  s.insert_session(record.clone()).await.unwrap();

  assert_eq!(s.find_session("deadbeef").await.unwrap(), Some(record.clone()));
  assert!(record.is_expired_at(at(11, 0)));

  assert!(s.delete_session("deadbeef").await.unwrap());
  assert!(!s.delete_session("deadbeef").await.unwrap());
  assert!(s.find_session("deadbeef").await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_an_account_removes_its_sessions() {
  let s = store().await;
  let account = s.create_account("ada@example.com", "hash").await.unwrap();
  s.insert_session(SessionRecord {
    token_hash: "deadbeef".into(),
    user_id:    account.user_id.clone(),
    created_at: at(10, 0),
    expires_at: at(11, 0),
  })
  .await
  .unwrap();

  assert!(s.delete_account(&account.user_id).await.unwrap());
  assert!(!s.delete_account(&account.user_id).await.unwrap());
  assert!(s.find_account("ada@example.com").await.unwrap().is_none());
  assert!(s.find_session("deadbeef").await.unwrap().is_none());

  // The email is free again.
  s.create_account("ada@example.com", "hash").await.unwrap();
}

#[tokio::test]
async fn reopening_a_file_keeps_data() {
  let dir = std::env::temp_dir().join(format!("heartbeat-test-{}", uuid::Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("heartbeat.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    seed(&s, "u1", at(10, 0)).await;
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.get_profile(&id("u1")).await.unwrap().is_some());

  std::fs::remove_dir_all(&dir).unwrap();
}
