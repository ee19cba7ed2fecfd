//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with microsecond precision.
//! Interests are stored as compact JSON. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use heartbeat_core::{
  account::{Account, SessionRecord},
  decision::{Decision, Outcome},
  profile::{Profile, UserId},
  store::MatchedProfile,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── UserId ──────────────────────────────────────────────────────────────────

pub fn decode_user_id(s: String) -> Result<UserId> { Ok(UserId::try_from(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the columns hold, so a value returned
/// from a write equals the value read back later.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Interests ───────────────────────────────────────────────────────────────

pub fn encode_interests(interests: &[String]) -> Result<String> {
  Ok(serde_json::to_string(interests)?)
}

pub fn decode_interests(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const PROFILE_COLUMNS: &str =
  "id, name, age, location, bio, avatar_url, interests, created_at, updated_at";

/// Raw values read directly from a `profiles` row, in [`PROFILE_COLUMNS`]
/// order.
pub struct RawProfile {
  pub id:         String,
  pub name:       String,
  pub age:        Option<u32>,
  pub location:   String,
  pub bio:        String,
  pub avatar_url: Option<String>,
  pub interests:  String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      age:        row.get(2)?,
      location:   row.get(3)?,
      bio:        row.get(4)?,
      avatar_url: row.get(5)?,
      interests:  row.get(6)?,
      created_at: row.get(7)?,
      updated_at: row.get(8)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      id:         decode_user_id(self.id)?,
      name:       self.name,
      age:        self.age,
      location:   self.location,
      bio:        self.bio,
      avatar_url: self.avatar_url,
      interests:  decode_interests(&self.interests)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const DECISION_COLUMNS: &str = "decision_id, user_id, matched_user_id, status, created_at";

/// Raw strings read directly from a `matches` row.
pub struct RawDecision {
  pub decision_id:     String,
  pub user_id:         String,
  pub matched_user_id: String,
  pub status:          String,
  pub created_at:      String,
}

impl RawDecision {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      decision_id:     row.get(0)?,
      user_id:         row.get(1)?,
      matched_user_id: row.get(2)?,
      status:          row.get(3)?,
      created_at:      row.get(4)?,
    })
  }

  pub fn into_decision(self) -> Result<Decision> {
    Ok(Decision {
      decision_id: decode_uuid(&self.decision_id)?,
      user_id:     decode_user_id(self.user_id)?,
      target_id:   decode_user_id(self.matched_user_id)?,
      outcome:     Outcome::parse(&self.status)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// A `matched` decision joined with the other profile.
pub struct RawMatch {
  pub decision_id: String,
  pub profile_id:  String,
  pub name:        String,
  pub avatar_url:  Option<String>,
  pub matched_at:  String,
}

impl RawMatch {
  pub fn into_matched(self) -> Result<MatchedProfile> {
    Ok(MatchedProfile {
      decision_id: decode_uuid(&self.decision_id)?,
      profile_id:  decode_user_id(self.profile_id)?,
      name:        self.name,
      avatar_url:  self.avatar_url,
      matched_at:  decode_dt(&self.matched_at)?,
    })
  }
}

pub struct RawAccount {
  pub user_id:       String,
  pub email:         String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawAccount {
  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      user_id:       decode_user_id(self.user_id)?,
      email:         self.email,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSession {
  pub token_hash: String,
  pub user_id:    String,
  pub created_at: String,
  pub expires_at: String,
}

impl RawSession {
  pub fn into_record(self) -> Result<SessionRecord> {
    Ok(SessionRecord {
      token_hash: self.token_hash,
      user_id:    decode_user_id(self.user_id)?,
      created_at: decode_dt(&self.created_at)?,
      expires_at: decode_dt(&self.expires_at)?,
    })
  }
}
