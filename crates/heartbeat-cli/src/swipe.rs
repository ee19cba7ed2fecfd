//! The interactive `swipe` loop: show the top card, read a choice, record it.

use std::io::Write;

use anyhow::Result;
use heartbeat_core::{
  decision::Outcome,
  feed::{CandidateFeed, FeedBackend, FeedError},
  profile::Profile,
  retry::CancelSignal,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

// ─── Input ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Decide(Outcome),
  Quit,
}

/// Parse one line of swipe input. Case and surrounding whitespace are
/// ignored.
pub fn parse_command(line: &str) -> Option<Command> {
  match line.trim().to_ascii_lowercase().as_str() {
    "l" | "like" | "y" => Some(Command::Decide(Outcome::Liked)),
    "d" | "dislike" | "n" => Some(Command::Decide(Outcome::Disliked)),
    "q" | "quit" => Some(Command::Quit),
    _ => None,
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// A plain-text match card.
pub fn render_card(profile: &Profile) -> String {
  let mut card = match profile.age {
    Some(age) => format!("{}, {age}", profile.name),
    None => profile.name.clone(),
  };
  if !profile.location.is_empty() {
    card.push_str(&format!("\n  {}", profile.location));
  }
  if !profile.bio.is_empty() {
    card.push_str(&format!("\n  {}", profile.bio));
  }
  if !profile.interests.is_empty() {
    card.push_str(&format!("\n  likes: {}", profile.interests.join(", ")));
  }
  card
}

// ─── Loop ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
  pub liked:     usize,
  pub disliked:  usize,
  pub cancelled: bool,
}

/// Run the swipe loop until the feed is empty, the user quits, input ends,
/// or `cancel` fires.
///
/// The feed is loaded first if it holds no candidates. A failed decision
/// leaves the card on top so it can be tried again.
pub async fn run<B, R, W>(
  feed: &mut CandidateFeed<B>,
  input: R,
  out: &mut W,
  mut cancel: CancelSignal,
) -> Result<Summary>
where
  B: FeedBackend,
  R: AsyncBufRead + Unpin,
  W: Write,
{
  let mut summary = Summary::default();
  if feed.is_empty() {
    match feed.load().await {
      Err(FeedError::Cancelled) => return Ok(Summary { cancelled: true, ..summary }),
      other => other?,
    };
  }

  let mut lines = input.lines();
  loop {
    let Some(profile) = feed.current().cloned() else {
      writeln!(out, "No more profiles right now. Check back later.")?;
      break;
    };
    writeln!(out, "\n{}", render_card(&profile))?;
    write!(out, "[l]ike  [d]islike  [q]uit > ")?;
    out.flush()?;

    let read = tokio::select! {
      biased;
      _ = cancel.cancelled() => None,
      line = lines.next_line() => Some(line?),
    };
    let Some(read) = read else {
      summary.cancelled = true;
      break;
    };
    let Some(line) = read else { break };

    let outcome = match parse_command(&line) {
      Some(Command::Decide(outcome)) => outcome,
      Some(Command::Quit) => break,
      None => {
        writeln!(out, "Unrecognised choice {:?}.", line.trim())?;
        continue;
      }
    };

    match feed.decide(&profile.id, outcome).await {
      Ok(_) if outcome == Outcome::Liked => summary.liked += 1,
      Ok(_) => summary.disliked += 1,
      Err(FeedError::Duplicate(_)) => {
        writeln!(out, "You already decided on {}, moving on.", profile.name)?;
      }
      Err(FeedError::Cancelled) => {
        summary.cancelled = true;
        break;
      }
      Err(e) => writeln!(out, "Could not save your choice ({e}). Try again.")?,
    }
  }
  Ok(summary)
}
