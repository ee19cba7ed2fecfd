//! `heartbeat`: command-line client for the Heartbeat match feed.
//!
//! # Usage
//!
//! ```text
//! heartbeat register ada@example.com --name Ada
//! heartbeat swipe
//! heartbeat --url http://localhost:8080 matches
//! heartbeat --config ~/.config/heartbeat/config.toml profile show
//! ```

mod client;
mod session_file;
mod swipe;

use std::{
  io::{self, Write},
  path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client::ApiClient;
use heartbeat_core::{
  decision::Outcome,
  feed::{CandidateFeed, FeedError},
  profile::{Profile, ProfileUpdate, UserId, parse_interests},
  session::{Credentials, Session, SessionManager},
};
use reqwest::StatusCode;
use serde::Deserialize;
use session_file::SessionFile;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:8080";
const DEFAULT_SESSION_FILE: &str = "~/.local/share/heartbeat/session.json";

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "heartbeat", version, about = "Command-line client for the Heartbeat match feed")]
struct Args {
  /// Path to a TOML config file (url, session_file).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the heartbeat server (default: http://localhost:8080).
  #[arg(long, env = "HEARTBEAT_URL")]
  url: Option<String>,

  /// Where the signed-in session is kept between runs.
  #[arg(long, env = "HEARTBEAT_SESSION_FILE", value_name = "FILE")]
  session_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create an account and sign in.
  Register {
    email:    String,
    /// Display name shown on your card.
    #[arg(long)]
    name:     String,
    /// Read from stdin when omitted.
    #[arg(long, env = "HEARTBEAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
  },
  /// Sign in to an existing account.
  Login {
    email:    String,
    /// Read from stdin when omitted.
    #[arg(long, env = "HEARTBEAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
  },
  /// Revoke the stored session.
  Logout,
  /// Show who is signed in.
  Whoami,
  /// List the current candidates, newest first.
  Feed {
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Like a profile.
  Like { id: UserId },
  /// Dislike a profile.
  Dislike { id: UserId },
  /// Go through the feed one card at a time.
  Swipe {
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Show or edit profiles.
  #[command(subcommand)]
  Profile(ProfileCommand),
  /// List your matches.
  Matches,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
  /// Show your profile, or someone else's.
  Show { id: Option<UserId> },
  /// Change fields of your profile. Unset flags keep their current value.
  Edit(EditArgs),
}

#[derive(clap::Args, Debug)]
struct EditArgs {
  #[arg(long)]
  name:       Option<String>,
  #[arg(long)]
  age:        Option<u32>,
  #[arg(long)]
  location:   Option<String>,
  #[arg(long)]
  bio:        Option<String>,
  /// An empty value removes the avatar.
  #[arg(long)]
  avatar_url: Option<String>,
  /// Comma-separated, e.g. "hiking, jazz".
  #[arg(long)]
  interests:  Option<String>,
}

impl EditArgs {
  fn apply(self, update: &mut ProfileUpdate) {
    if let Some(name) = self.name {
      update.name = name;
    }
    if let Some(age) = self.age {
      update.age = Some(age);
    }
    if let Some(location) = self.location {
      update.location = location;
    }
    if let Some(bio) = self.bio {
      update.bio = bio;
    }
    if let Some(url) = self.avatar_url {
      update.avatar_url = Some(url);
    }
    if let Some(interests) = self.interests {
      update.interests = parse_interests(&interests);
    }
  }
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:          Option<String>,
  #[serde(default)]
  session_file: Option<PathBuf>,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override the config file, which overrides defaults.
  let base_url = args.url.or(file_cfg.url).unwrap_or_else(|| DEFAULT_URL.to_string());
  let session_path = args
    .session_file
    .or(file_cfg.session_file)
    .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));
  let session_file = SessionFile::new(expand_tilde(&session_path));

  let manager = SessionManager::new(ApiClient::new(base_url)?);
  let _persist = {
    let file = session_file.clone();
    manager.subscribe(move |event| file.apply(event))
  };

  run(args.command, &manager, &session_file).await
}

async fn run(
  command: Command,
  manager: &SessionManager<ApiClient>,
  session_file: &SessionFile,
) -> Result<()> {
  let client = manager.provider();
  match command {
    Command::Register { email, name, password } => {
      let credentials = Credentials::new(&email, &read_password(password)?)?;
      let session = manager.sign_up(&credentials, &name).await?;
      println!("Welcome, {}! Signed in as {}.", name.trim(), session.user_id);
    }

    Command::Login { email, password } => {
      let credentials = Credentials::new(&email, &read_password(password)?)?;
      let session = manager.sign_in(&credentials).await?;
      println!("Signed in as {}.", session.user_id);
    }

    Command::Logout => {
      if let Some(stored) = session_file.load()?
        && manager.restore(&stored.access_token).await?.is_some()
      {
        manager.sign_out().await?;
      }
      println!("Signed out.");
    }

    Command::Whoami => {
      let session = require_session(manager, session_file).await?;
      let name = match client.own_profile(&session).await {
        Ok(profile) => profile.name,
        Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => "(no profile yet)".to_string(),
        Err(e) => return Err(e.into()),
      };
      println!("{name} ({})", session.user_id);
      println!("session expires {}", session.expires_at.format("%Y-%m-%d %H:%M UTC"));
    }

    Command::Feed { limit } => {
      let session = require_session(manager, session_file).await?;
      let (feed, _cancel) = CandidateFeed::new(client.clone(), session);
      let mut feed = feed.with_batch_size(limit);
      let candidates = feed.load().await?;
      if candidates.is_empty() {
        println!("No more profiles right now. Check back later.");
      }
      for profile in candidates {
        println!("{}\n  id: {}\n", swipe::render_card(profile), profile.id);
      }
    }

    Command::Like { id } => decide(manager, session_file, id, Outcome::Liked).await?,
    Command::Dislike { id } => decide(manager, session_file, id, Outcome::Disliked).await?,

    Command::Swipe { limit } => {
      let session = require_session(manager, session_file).await?;
      let (feed, cancel) = CandidateFeed::new(client.clone(), session);
      let mut feed = feed.with_batch_size(limit);
      let signal = cancel.signal();
      tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
          cancel.cancel();
        }
      });

      let stdin = tokio::io::BufReader::new(tokio::io::stdin());
      let summary = swipe::run(&mut feed, stdin, &mut io::stdout(), signal).await?;
      println!("\nLiked {}, disliked {}.", summary.liked, summary.disliked);
    }

    Command::Profile(ProfileCommand::Show { id }) => {
      let session = require_session(manager, session_file).await?;
      let profile = match id {
        Some(id) => client.profile(&session, &id).await?,
        None => client.own_profile(&session).await?,
      };
      print_profile(&profile);
    }

    Command::Profile(ProfileCommand::Edit(edit)) => {
      let session = require_session(manager, session_file).await?;
      let mut update = match client.own_profile(&session).await {
        Ok(profile) => ProfileUpdate::from_profile(&profile),
        Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => ProfileUpdate::default(),
        Err(e) => return Err(e.into()),
      };
      edit.apply(&mut update);
      let update = update.validate()?;
      let profile = client.update_profile(&session, &update).await?;
      print_profile(&profile);
    }

    Command::Matches => {
      let session = require_session(manager, session_file).await?;
      let matches = client.matches(&session).await?;
      if matches.is_empty() {
        println!("No matches yet.");
      }
      for m in matches {
        println!("{}  ({})  matched {}", m.name, m.profile_id, m.matched_at.format("%Y-%m-%d"));
      }
    }
  }
  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Restore the stored session with the server. Errors if there is none.
async fn require_session(
  manager: &SessionManager<ApiClient>,
  session_file: &SessionFile,
) -> Result<Session> {
  let stored = session_file
    .load()?
    .context("not signed in; run `heartbeat login` first")?;
  if stored.is_expired_at(Utc::now()) {
    session_file.clear()?;
    bail!("session expired; run `heartbeat login` again");
  }
  manager
    .restore(&stored.access_token)
    .await?
    .context("session is no longer valid; run `heartbeat login` again")
}

async fn decide(
  manager: &SessionManager<ApiClient>,
  session_file: &SessionFile,
  target: UserId,
  outcome: Outcome,
) -> Result<()> {
  let session = require_session(manager, session_file).await?;
  let (mut feed, _cancel) = CandidateFeed::new(manager.provider().clone(), session);
  match feed.decide(&target, outcome).await {
    Ok(_) => println!("Recorded {outcome} on {target}."),
    Err(FeedError::Duplicate(_)) => bail!("you already decided on {target}"),
    Err(e) => return Err(e.into()),
  }
  Ok(())
}

fn print_profile(profile: &Profile) {
  println!("{}", swipe::render_card(profile));
  println!("  id: {}", profile.id);
  if let Some(url) = &profile.avatar_url {
    println!("  avatar: {url}");
  }
}

fn read_password(given: Option<String>) -> Result<String> {
  if let Some(password) = given {
    return Ok(password);
  }
  eprint!("Password: ");
  io::stderr().flush()?;
  let mut line = String::new();
  io::stdin().read_line(&mut line).context("reading password")?;
  Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
