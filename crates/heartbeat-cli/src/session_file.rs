//! On-disk cache of the signed-in session, so a token survives between CLI
//! invocations.

use std::{
  fs, io,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use heartbeat_core::session::{Session, SessionEvent};

/// A JSON file holding at most one [`Session`].
#[derive(Debug, Clone)]
pub struct SessionFile {
  path: PathBuf,
}

impl SessionFile {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  pub fn path(&self) -> &Path { &self.path }

  /// `None` if no session has been saved.
  pub fn load(&self) -> Result<Option<Session>> {
    let raw = match fs::read_to_string(&self.path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => {
        return Err(e).with_context(|| format!("reading session file {}", self.path.display()));
      }
    };
    let session = serde_json::from_str(&raw)
      .with_context(|| format!("parsing session file {}", self.path.display()))?;
    Ok(Some(session))
  }

  pub fn save(&self, session: &Session) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(session).context("serialising session")?;
    fs::write(&self.path, raw)
      .with_context(|| format!("writing session file {}", self.path.display()))
  }

  /// Remove the file. Missing is fine.
  pub fn clear(&self) -> Result<()> {
    match fs::remove_file(&self.path) {
      Err(e) if e.kind() != io::ErrorKind::NotFound => {
        Err(e).with_context(|| format!("removing session file {}", self.path.display()))
      }
      _ => Ok(()),
    }
  }

  /// Mirror a session change onto disk. Failures are logged, not raised,
  /// since this runs inside a session-change callback.
  pub fn apply(&self, event: &SessionEvent) {
    let result = match event {
      SessionEvent::SignedIn(session) => self.save(session),
      SessionEvent::SignedOut => self.clear(),
    };
    if let Err(e) = result {
      tracing::warn!(error = format!("{e:#}"), "failed to update session file");
    }
  }
}
