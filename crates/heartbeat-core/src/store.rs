//! The `MatchStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `heartbeat-store-sqlite`, or [`crate::memory::MemoryStore`]). The feed
//! pipeline and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::{collections::BTreeSet, future::Future};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  decision::{Decision, NewDecision},
  error::Classify,
  profile::{NewProfile, Profile, ProfileUpdate, UserId},
};

// ─── Exclusion ───────────────────────────────────────────────────────────────

/// The ids a candidate query must leave out.
///
/// A viewer with no prior decisions is a distinct case so that no backend is
/// ever handed an empty "not in" list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
  /// Only the viewer's own profile.
  SelfOnly(UserId),
  /// The viewer plus every profile they have already decided on. `decided`
  /// is never empty and never contains `viewer`.
  SelfAnd {
    viewer:  UserId,
    decided: BTreeSet<UserId>,
  },
}

impl Exclusion {
  pub fn for_viewer(viewer: UserId, decided: impl IntoIterator<Item = UserId>) -> Self {
    let decided: BTreeSet<UserId> = decided.into_iter().filter(|id| *id != viewer).collect();
    if decided.is_empty() {
      Self::SelfOnly(viewer)
    } else {
      Self::SelfAnd { viewer, decided }
    }
  }

  pub fn viewer(&self) -> &UserId {
    match self {
      Self::SelfOnly(viewer) | Self::SelfAnd { viewer, .. } => viewer,
    }
  }

  /// The decided-on ids, excluding the viewer. Empty for [`Self::SelfOnly`].
  pub fn decided(&self) -> impl Iterator<Item = &UserId> {
    let decided = match self {
      Self::SelfOnly(_) => None,
      Self::SelfAnd { decided, .. } => Some(decided),
    };
    decided.into_iter().flatten()
  }

  pub fn excludes(&self, id: &UserId) -> bool {
    match self {
      Self::SelfOnly(viewer) => viewer == id,
      Self::SelfAnd { viewer, decided } => viewer == id || decided.contains(id),
    }
  }
}

/// Parameters for [`MatchStore::candidate_profiles`].
#[derive(Debug, Clone)]
pub struct ProfileQuery {
  pub exclusion: Exclusion,
  /// Maximum number of profiles to return; `None` returns all of them.
  pub limit:     Option<usize>,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A `matched` decision joined with the other profile, for the messages
/// screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedProfile {
  pub decision_id: Uuid,
  pub profile_id:  UserId,
  pub name:        String,
  pub avatar_url:  Option<String>,
  pub matched_at:  DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the persistence service holding profiles and decisions.
///
/// Decisions are insert-only. A backend must refuse a second decision for
/// the same (user, target) pair with an error whose [`Classify::class`] is
/// [`Conflict`](crate::error::ErrorClass::Conflict).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait MatchStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Retrieve a profile by id. Returns `None` if not found.
  fn get_profile<'a>(
    &'a self,
    id: &'a UserId,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + 'a;

  /// Persist the registration-time profile.
  fn create_profile(
    &self,
    input: NewProfile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Replace the owner-editable fields of `id`'s profile, creating the
  /// profile if it does not exist yet. `update` is expected to be validated.
  fn upsert_profile<'a>(
    &'a self,
    id: &'a UserId,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + 'a;

  /// Every profile not excluded by `query`, newest `created_at` first, ties
  /// broken by ascending id.
  fn candidate_profiles<'a>(
    &'a self,
    query: &'a ProfileQuery,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + 'a;

  // ── Decisions ─────────────────────────────────────────────────────────

  /// All decisions made by `user_id`, oldest first.
  fn decisions_by<'a>(
    &'a self,
    user_id: &'a UserId,
  ) -> impl Future<Output = Result<Vec<Decision>, Self::Error>> + Send + 'a;

  /// Record a decision. The `created_at` timestamp is set by the store.
  fn insert_decision(
    &self,
    input: NewDecision,
  ) -> impl Future<Output = Result<Decision, Self::Error>> + Send + '_;

  /// `user_id`'s decisions with outcome `matched`, newest first, joined with
  /// the matched profile.
  fn matches_for<'a>(
    &'a self,
    user_id: &'a UserId,
  ) -> impl Future<Output = Result<Vec<MatchedProfile>, Self::Error>> + Send + 'a;
}
