//! Decisions: one viewer's verdict on one other profile.
//!
//! A decision is written once per (deciding user, target) pair and never
//! updated. Swipes produce `liked` or `disliked`; `matched` rows come from
//! outside this flow and are only ever read here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, profile::UserId};

/// The verdict stored in a decision row.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
  Liked,
  Disliked,
  Matched,
}

impl Outcome {
  /// Whether a swipe may produce this outcome.
  pub fn is_recordable(self) -> bool { matches!(self, Self::Liked | Self::Disliked) }

  /// Parse the stored column value.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownOutcome(s.to_owned()))
  }
}

/// A persisted decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
  pub decision_id: Uuid,
  /// The user who swiped.
  pub user_id:     UserId,
  /// The profile that was swiped on.
  pub target_id:   UserId,
  pub outcome:     Outcome,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::MatchStore::insert_decision`].
///
/// [`NewDecision::new`] applies the swipe rules. The fields stay public so
/// that whatever reconciles mutual likes can write `matched` rows directly.
#[derive(Debug, Clone)]
pub struct NewDecision {
  pub user_id:   UserId,
  pub target_id: UserId,
  pub outcome:   Outcome,
}

impl NewDecision {
  pub fn new(user_id: UserId, target_id: UserId, outcome: Outcome) -> Result<Self> {
    if user_id == target_id {
      return Err(Error::SelfDecision);
    }
    if !outcome.is_recordable() {
      return Err(Error::UnrecordableOutcome(outcome));
    }
    Ok(Self { user_id, target_id, outcome })
  }

  pub fn into_decision(self, created_at: DateTime<Utc>) -> Decision {
    Decision {
      decision_id: Uuid::new_v4(),
      user_id: self.user_id,
      target_id: self.target_id,
      outcome: self.outcome,
      created_at,
    }
  }
}
