//! [`SqliteStore`]: the SQLite implementation of [`MatchStore`] and
//! [`AccountStore`].

use std::path::Path;

use chrono::SubsecRound as _;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use heartbeat_core::{
  account::{Account, AccountStore, SessionRecord},
  decision::{Decision, NewDecision},
  profile::{NewProfile, Profile, ProfileUpdate, UserId},
  store::{Exclusion, MatchStore, MatchedProfile, ProfileQuery},
};

use crate::{
  Error, Result,
  encode::{
    DECISION_COLUMNS, PROFILE_COLUMNS, RawAccount, RawDecision, RawMatch, RawProfile,
    RawSession, encode_dt, encode_interests, encode_uuid, now,
  },
  error::{Constraint, violated_constraint},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Heartbeat store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_profile(&self, id: String) -> Result<Option<Profile>> {
    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            rusqlite::params![id],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }
}

// ─── MatchStore impl ─────────────────────────────────────────────────────────

impl MatchStore for SqliteStore {
  type Error = Error;

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn get_profile(&self, id: &UserId) -> Result<Option<Profile>> {
    self.fetch_profile(id.as_str().to_owned()).await
  }

  async fn create_profile(&self, mut input: NewProfile) -> Result<Profile> {
    input.created_at = input.created_at.trunc_subsecs(6);
    let profile = input.into_profile();

    let id_str        = profile.id.as_str().to_owned();
    let name          = profile.name.clone();
    let interests_str = encode_interests(&profile.interests)?;
    let created_str   = encode_dt(profile.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (id, name, interests, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![id_str, name, interests_str, created_str],
        )?;
        Ok(())
      })
      .await;

    match inserted {
      Ok(()) => Ok(profile),
      Err(e) if violated_constraint(&e) == Some(Constraint::Unique) => {
        Err(Error::DuplicateProfile(profile.id))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn upsert_profile(&self, id: &UserId, update: ProfileUpdate) -> Result<Profile> {
    let id_str        = id.as_str().to_owned();
    let interests_str = encode_interests(&update.interests)?;
    let now_str       = encode_dt(now());

    let raw: RawProfile = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO profiles (
             id, name, age, location, bio, avatar_url, interests, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
           ON CONFLICT (id) DO UPDATE SET
             name       = excluded.name,
             age        = excluded.age,
             location   = excluded.location,
             bio        = excluded.bio,
             avatar_url = excluded.avatar_url,
             interests  = excluded.interests,
             updated_at = excluded.updated_at",
          rusqlite::params![
            id_str,
            update.name,
            update.age,
            update.location,
            update.bio,
            update.avatar_url,
            interests_str,
            now_str,
          ],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
          rusqlite::params![id_str],
          RawProfile::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_profile()
  }

  async fn candidate_profiles(&self, query: &ProfileQuery) -> Result<Vec<Profile>> {
    let viewer_str = query.exclusion.viewer().as_str().to_owned();
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val = query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let decided_json = match &query.exclusion {
      Exclusion::SelfOnly(_) => None,
      Exclusion::SelfAnd { .. } => {
        let decided: Vec<&str> = query.exclusion.decided().map(UserId::as_str).collect();
        Some(serde_json::to_string(&decided)?)
      }
    };

    let raws: Vec<RawProfile> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(decided) = decided_json {
          let mut stmt = conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             WHERE id != ?1
               AND id NOT IN (SELECT value FROM json_each(?2))
             ORDER BY created_at DESC, id ASC
             LIMIT ?3"
          ))?;
          stmt
            .query_map(rusqlite::params![viewer_str, decided, limit_val], RawProfile::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             WHERE id != ?1
             ORDER BY created_at DESC, id ASC
             LIMIT ?2"
          ))?;
          stmt
            .query_map(rusqlite::params![viewer_str, limit_val], RawProfile::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfile::into_profile).collect()
  }

  // ── Decisions ─────────────────────────────────────────────────────────────

  async fn decisions_by(&self, user_id: &UserId) -> Result<Vec<Decision>> {
    let user_str = user_id.as_str().to_owned();

    let raws: Vec<RawDecision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DECISION_COLUMNS} FROM matches
           WHERE user_id = ?1
           ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawDecision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDecision::into_decision).collect()
  }

  async fn insert_decision(&self, input: NewDecision) -> Result<Decision> {
    let decision = input.into_decision(now());

    let id_str      = encode_uuid(decision.decision_id);
    let user_str    = decision.user_id.as_str().to_owned();
    let target_str  = decision.target_id.as_str().to_owned();
    let status_str  = decision.outcome.as_ref().to_owned();
    let created_str = encode_dt(decision.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO matches (decision_id, user_id, matched_user_id, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, user_str, target_str, status_str, created_str],
        )?;
        Ok(())
      })
      .await;

    match inserted {
      Ok(()) => Ok(decision),
      Err(e) => Err(match violated_constraint(&e) {
        Some(Constraint::Unique) => Error::DuplicateDecision {
          user:   decision.user_id,
          target: decision.target_id,
        },
        Some(Constraint::ForeignKey) => Error::UnknownProfile {
          user:   decision.user_id,
          target: decision.target_id,
        },
        _ => e.into(),
      }),
    }
  }

  async fn matches_for(&self, user_id: &UserId) -> Result<Vec<MatchedProfile>> {
    let user_str = user_id.as_str().to_owned();

    let raws: Vec<RawMatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT m.decision_id, p.id, p.name, p.avatar_url, m.created_at
           FROM matches m
           JOIN profiles p ON p.id = m.matched_user_id
           WHERE m.user_id = ?1 AND m.status = 'matched'
           ORDER BY m.created_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], |row| {
            Ok(RawMatch {
              decision_id: row.get(0)?,
              profile_id:  row.get(1)?,
              name:        row.get(2)?,
              avatar_url:  row.get(3)?,
              matched_at:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMatch::into_matched).collect()
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  type Error = Error;

  async fn create_account(&self, email: &str, password_hash: &str) -> Result<Account> {
    let account = Account {
      user_id:       UserId::from(Uuid::new_v4()),
      email:         email.to_owned(),
      password_hash: password_hash.to_owned(),
      created_at:    now(),
    };

    let id_str      = account.user_id.as_str().to_owned();
    let email_str   = account.email.clone();
    let hash_str    = account.password_hash.clone();
    let created_str = encode_dt(account.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO accounts (user_id, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, email_str, hash_str, created_str],
        )?;
        Ok(())
      })
      .await;

    match inserted {
      Ok(()) => Ok(account),
      Err(e) if violated_constraint(&e) == Some(Constraint::Unique) => {
        Err(Error::DuplicateEmail(account.email))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn find_account(&self, email: &str) -> Result<Option<Account>> {
    let email_str = email.to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, email, password_hash, created_at FROM accounts WHERE email = ?1",
            rusqlite::params![email_str],
            |row| {
              Ok(RawAccount {
                user_id:       row.get(0)?,
                email:         row.get(1)?,
                password_hash: row.get(2)?,
                created_at:    row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn delete_account(&self, user_id: &UserId) -> Result<bool> {
    let id_str = user_id.as_str().to_owned();

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sessions WHERE user_id = ?1", rusqlite::params![id_str])?;
        let removed = tx.execute("DELETE FROM accounts WHERE user_id = ?1", rusqlite::params![id_str])?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    if removed > 0 {
      tracing::info!(%user_id, "account deleted");
    }
    Ok(removed > 0)
  }

  async fn insert_session(&self, record: SessionRecord) -> Result<()> {
    let hash_str    = record.token_hash;
    let user_str    = String::from(record.user_id);
    let created_str = encode_dt(record.created_at);
    let expires_str = encode_dt(record.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![hash_str, user_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
    let hash_str = token_hash.to_owned();

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT token_hash, user_id, created_at, expires_at
             FROM sessions WHERE token_hash = ?1",
            rusqlite::params![hash_str],
            |row| {
              Ok(RawSession {
                token_hash: row.get(0)?,
                user_id:    row.get(1)?,
                created_at: row.get(2)?,
                expires_at: row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_record).transpose()
  }

  async fn delete_session(&self, token_hash: &str) -> Result<bool> {
    let hash_str = token_hash.to_owned();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM sessions WHERE token_hash = ?1", rusqlite::params![hash_str])?)
      })
      .await?;
    if removed > 0 {
      tracing::debug!("session deleted");
    }
    Ok(removed > 0)
  }
}
