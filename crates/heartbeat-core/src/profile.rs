//! Profiles, the public face of a user in the match feed.
//!
//! A profile is created at registration with only a display name, and from
//! then on is edited exclusively by its owner. Profiles are never deleted.

use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque user identity, as issued by the identity provider.
///
/// The only structural guarantee is that it is not empty; ids arriving over
/// the wire are validated on deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Result<Self> {
    let id = id.into();
    if id.trim().is_empty() {
      return Err(Error::EmptyUserId);
    }
    Ok(Self(id))
  }

  /// Mint a fresh random identity.
  pub fn generate() -> Self { Self::from(Uuid::new_v4()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<Uuid> for UserId {
  fn from(id: Uuid) -> Self { Self(id.hyphenated().to_string()) }
}

impl TryFrom<String> for UserId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl FromStr for UserId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}

impl From<UserId> for String {
  fn from(id: UserId) -> Self { id.0 }
}

impl AsRef<str> for UserId {
  fn as_ref(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// A user's profile as shown on a match card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:         UserId,
  pub name:       String,
  /// Unset until the owner fills it in.
  pub age:        Option<u32>,
  pub location:   String,
  pub bio:        String,
  pub avatar_url: Option<String>,
  /// Short tags; trimmed, non-empty, no duplicates (case-insensitive).
  pub interests:  Vec<String>,
  /// Candidate ordering key. Never changes after creation.
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Profile {
  /// A profile that exists only because its owner edited it before a
  /// registration row was written.
  pub fn from_update(id: UserId, update: ProfileUpdate, now: DateTime<Utc>) -> Self {
    Self {
      id,
      name: update.name,
      age: update.age,
      location: update.location,
      bio: update.bio,
      avatar_url: update.avatar_url,
      interests: update.interests,
      created_at: now,
      updated_at: now,
    }
  }

  /// Overwrite every owner-editable field. `id` and `created_at` are kept.
  pub fn apply(&mut self, update: ProfileUpdate, now: DateTime<Utc>) {
    self.name = update.name;
    self.age = update.age;
    self.location = update.location;
    self.bio = update.bio;
    self.avatar_url = update.avatar_url;
    self.interests = update.interests;
    self.updated_at = now;
  }
}

// ─── NewProfile ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::MatchStore::create_profile`], written once at
/// registration.
#[derive(Debug, Clone)]
pub struct NewProfile {
  pub id:         UserId,
  pub name:       String,
  pub created_at: DateTime<Utc>,
}

impl NewProfile {
  pub fn new(id: UserId, name: &str) -> Result<Self> {
    let name = validate_name(name)?;
    Ok(Self { id, name, created_at: Utc::now() })
  }

  pub fn into_profile(self) -> Profile {
    Profile {
      id:         self.id,
      name:       self.name,
      age:        None,
      location:   String::new(),
      bio:        String::new(),
      avatar_url: None,
      interests:  Vec::new(),
      created_at: self.created_at,
      updated_at: self.created_at,
    }
  }
}

// ─── ProfileUpdate ───────────────────────────────────────────────────────────

/// The owner-editable fields of a profile. An update replaces all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
  pub name:       String,
  #[serde(default)]
  pub age:        Option<u32>,
  #[serde(default)]
  pub location:   String,
  #[serde(default)]
  pub bio:        String,
  #[serde(default)]
  pub avatar_url: Option<String>,
  #[serde(default)]
  pub interests:  Vec<String>,
}

impl ProfileUpdate {
  /// Start an update from the profile's current values.
  pub fn from_profile(profile: &Profile) -> Self {
    Self {
      name:       profile.name.clone(),
      age:        profile.age,
      location:   profile.location.clone(),
      bio:        profile.bio.clone(),
      avatar_url: profile.avatar_url.clone(),
      interests:  profile.interests.clone(),
    }
  }

  /// Check and normalise the update before it is written.
  ///
  /// The name is trimmed and must be non-empty, an age of zero is rejected,
  /// a blank avatar URL becomes `None`, and interests are normalised with
  /// [`normalize_interests`].
  pub fn validate(self) -> Result<Self> {
    let name = validate_name(&self.name)?;
    if self.age == Some(0) {
      return Err(Error::InvalidAge);
    }
    let avatar_url = self
      .avatar_url
      .map(|url| url.trim().to_owned())
      .filter(|url| !url.is_empty());

    Ok(Self {
      name,
      age: self.age,
      location: self.location.trim().to_owned(),
      bio: self.bio.trim().to_owned(),
      avatar_url,
      interests: normalize_interests(self.interests),
    })
  }
}

/// Trim a display name and reject it if nothing is left.
pub fn validate_name(name: &str) -> Result<String> {
  let name = name.trim();
  if name.is_empty() {
    return Err(Error::EmptyName);
  }
  Ok(name.to_owned())
}

// ─── Interests ───────────────────────────────────────────────────────────────

/// Split a comma-separated interest list as typed into the profile editor.
pub fn parse_interests(input: &str) -> Vec<String> {
  normalize_interests(input.split(','))
}

/// Trim, drop blanks, and de-duplicate case-insensitively, keeping the first
/// spelling and the original order.
pub fn normalize_interests<I, T>(interests: I) -> Vec<String>
where
  I: IntoIterator<Item = T>,
  T: AsRef<str>,
{
  let mut seen = HashSet::new();
  interests
    .into_iter()
    .filter_map(|raw| {
      let tag = raw.as_ref().trim();
      (!tag.is_empty() && seen.insert(tag.to_lowercase())).then(|| tag.to_owned())
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn user_id_rejects_blank() {
    assert!(matches!(UserId::new(""), Err(Error::EmptyUserId)));
    assert!(matches!(UserId::new("   "), Err(Error::EmptyUserId)));
    assert_eq!(UserId::new("u1").unwrap().as_str(), "u1");
  }

  #[test]
  fn user_id_deserialisation_is_validated() {
    let ok: UserId = serde_json::from_str("\"p1\"").unwrap();
    assert_eq!(ok.as_str(), "p1");
    assert!(serde_json::from_str::<UserId>("\"\"").is_err());
  }

  #[test]
  fn interests_are_split_trimmed_and_deduplicated() {
    let tags = parse_interests(" hiking, Jazz ,, jazz, cooking ,");
    assert_eq!(tags, ["hiking", "Jazz", "cooking"]);
  }

  #[test]
  fn update_validation_normalises_fields() {
    let update = ProfileUpdate {
      name:       "  Ada  ".into(),
      age:        Some(31),
      location:   " Lisbon ".into(),
      bio:        String::new(),
      avatar_url: Some("  ".into()),
      interests:  vec!["chess".into(), " Chess".into()],
    }
    .validate()
    .unwrap();

    assert_eq!(update.name, "Ada");
    assert_eq!(update.location, "Lisbon");
    assert_eq!(update.avatar_url, None);
    assert_eq!(update.interests, ["chess"]);
  }

  #[test]
  fn update_rejects_zero_age_and_blank_name() {
    let zero = ProfileUpdate { name: "Ada".into(), age: Some(0), ..Default::default() };
    assert!(matches!(zero.validate(), Err(Error::InvalidAge)));

    let blank = ProfileUpdate { name: " ".into(), ..Default::default() };
    assert!(matches!(blank.validate(), Err(Error::EmptyName)));
  }

  #[test]
  fn apply_keeps_identity_and_creation_time() {
    let created = NewProfile::new(UserId::new("u1").unwrap(), "Ada").unwrap();
    let created_at = created.created_at;
    let mut profile = created.into_profile();

    let later = created_at + chrono::Duration::minutes(5);
    profile.apply(
      ProfileUpdate { name: "Ada L.".into(), age: Some(36), ..Default::default() },
      later,
    );

    assert_eq!(profile.id.as_str(), "u1");
    assert_eq!(profile.name, "Ada L.");
    assert_eq!(profile.created_at, created_at);
    assert_eq!(profile.updated_at, later);
  }
}
