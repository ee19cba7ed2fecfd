//! The match feed: candidate selection and swipe decisions.
//!
//! [`select_candidates`] and [`record_decision`] are the two store-level
//! operations. [`CandidateFeed`] is the per-screen state built on top of
//! them: it holds the current candidate batch in memory, removes a
//! candidate only once its decision is confirmed, and retries or cancels
//! the calls it makes.

use std::{future::Future, sync::Arc};

use thiserror::Error;

use crate::{
  decision::{Decision, NewDecision, Outcome},
  error::{Classify, ErrorClass},
  profile::{Profile, UserId},
  retry::{CancelHandle, CancelSignal, RetryError, RetryPolicy, retry},
  session::Session,
  store::{Exclusion, MatchStore, ProfileQuery},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure of a feed operation. `E` is the store or transport error.
#[derive(Debug, Error)]
pub enum FeedError<E> {
  /// Decisions or profiles could not be read.
  #[error("failed to fetch candidates: {0}")]
  Fetch(#[source] E),

  /// The decision could not be written.
  #[error("failed to record decision: {0}")]
  Persist(#[source] E),

  /// A decision for this (viewer, target) pair already exists.
  #[error("decision already recorded: {0}")]
  Duplicate(#[source] E),

  #[error(transparent)]
  Invalid(#[from] crate::Error),

  #[error("cancelled")]
  Cancelled,
}

impl<E: Classify> Classify for FeedError<E> {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Fetch(e) | Self::Persist(e) => e.class(),
      Self::Duplicate(_) => ErrorClass::Conflict,
      Self::Invalid(_) | Self::Cancelled => ErrorClass::Permanent,
    }
  }
}

impl<E> From<RetryError<FeedError<E>>> for FeedError<E> {
  fn from(e: RetryError<FeedError<E>>) -> Self {
    match e {
      RetryError::Failed(e) => e,
      RetryError::Cancelled => Self::Cancelled,
    }
  }
}

// ─── Candidate Selector ──────────────────────────────────────────────────────

/// Every profile `viewer` has not decided on yet, newest first.
pub async fn select_candidates<S: MatchStore>(
  store: &S,
  viewer: &UserId,
) -> Result<Vec<Profile>, FeedError<S::Error>> {
  select_batch(store, viewer, None).await
}

/// [`select_candidates`], capped at `limit` profiles.
///
/// An empty vector means the viewer has seen everyone; it is not an error.
pub async fn select_batch<S: MatchStore>(
  store: &S,
  viewer: &UserId,
  limit: Option<usize>,
) -> Result<Vec<Profile>, FeedError<S::Error>> {
  let decisions = store.decisions_by(viewer).await.map_err(FeedError::Fetch)?;
  let decided = decisions.len();

  let decided_ids = decisions.into_iter().map(|d| d.target_id);
  let query = ProfileQuery { exclusion: Exclusion::for_viewer(viewer.clone(), decided_ids), limit };
  let candidates = store.candidate_profiles(&query).await.map_err(FeedError::Fetch)?;

  tracing::debug!(%viewer, decided, candidates = candidates.len(), "selected candidates");
  Ok(candidates)
}

// ─── Decision Recorder ───────────────────────────────────────────────────────

/// Persist `viewer`'s verdict on `target`.
///
/// Only `liked` and `disliked` are accepted, and never on oneself. A second
/// decision for the same pair is refused with [`FeedError::Duplicate`].
pub async fn record_decision<S: MatchStore>(
  store: &S,
  viewer: &UserId,
  target: &UserId,
  outcome: Outcome,
) -> Result<Decision, FeedError<S::Error>> {
  let input = NewDecision::new(viewer.clone(), target.clone(), outcome)?;
  match store.insert_decision(input).await {
    Ok(decision) => {
      tracing::info!(%viewer, %target, %outcome, "decision recorded");
      Ok(decision)
    }
    Err(e) if e.is_conflict() => Err(FeedError::Duplicate(e)),
    Err(e) => Err(FeedError::Persist(e)),
  }
}

// ─── Back-end abstraction ────────────────────────────────────────────────────

/// Where a [`CandidateFeed`] loads candidates from and sends decisions to.
///
/// Implemented for any shared [`MatchStore`] (server side, tests) and by the
/// HTTP client (CLI). Every call carries the session it acts for.
pub trait FeedBackend: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  fn load_candidates<'a>(
    &'a self,
    session: &'a Session,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Profile>, FeedError<Self::Error>>> + Send + 'a;

  fn submit_decision<'a>(
    &'a self,
    session: &'a Session,
    target: &'a UserId,
    outcome: Outcome,
  ) -> impl Future<Output = Result<Decision, FeedError<Self::Error>>> + Send + 'a;
}

impl<S: MatchStore> FeedBackend for Arc<S> {
  type Error = S::Error;

  async fn load_candidates(
    &self,
    session: &Session,
    limit: Option<usize>,
  ) -> Result<Vec<Profile>, FeedError<S::Error>> {
    select_batch(self.as_ref(), &session.user_id, limit).await
  }

  async fn submit_decision(
    &self,
    session: &Session,
    target: &UserId,
    outcome: Outcome,
  ) -> Result<Decision, FeedError<S::Error>> {
    record_decision(self.as_ref(), &session.user_id, target, outcome).await
  }
}

// ─── CandidateFeed ───────────────────────────────────────────────────────────

/// The in-memory candidate set for one viewer session.
///
/// `decide` takes `&mut self`, so a feed cannot have two decisions in flight.
pub struct CandidateFeed<B> {
  backend:    B,
  session:    Session,
  candidates: Vec<Profile>,
  policy:     RetryPolicy,
  batch_size: Option<usize>,
  cancel:     CancelSignal,
}

impl<B: FeedBackend> CandidateFeed<B> {
  /// An empty, not yet loaded feed, plus the handle that cancels its
  /// in-flight calls.
  pub fn new(backend: B, session: Session) -> (Self, CancelHandle) {
    let (handle, cancel) = CancelSignal::pair();
    let feed = Self {
      backend,
      session,
      candidates: Vec::new(),
      policy: RetryPolicy::default(),
      batch_size: None,
      cancel,
    };
    (feed, handle)
  }

  pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
    self.batch_size = batch_size;
    self
  }

  pub fn session(&self) -> &Session { &self.session }

  pub fn candidates(&self) -> &[Profile] { &self.candidates }

  /// The card currently on top.
  pub fn current(&self) -> Option<&Profile> { self.candidates.first() }

  pub fn is_empty(&self) -> bool { self.candidates.is_empty() }

  /// Replace the candidate set with a fresh batch.
  ///
  /// On failure the previous candidates are kept.
  pub async fn load(&mut self) -> Result<&[Profile], FeedError<B::Error>> {
    let (backend, session, batch) = (&self.backend, &self.session, self.batch_size);
    let fresh = retry(&self.policy, &mut self.cancel, move || {
      backend.load_candidates(session, batch)
    })
    .await?;

    self.candidates = fresh;
    Ok(&self.candidates)
  }

  /// Record a decision on `target` and, once it is confirmed, drop `target`
  /// from the candidate set.
  ///
  /// A [`FeedError::Duplicate`] also drops it, since a decision for the pair
  /// is already stored. Every other failure leaves the set untouched.
  pub async fn decide(
    &mut self,
    target: &UserId,
    outcome: Outcome,
  ) -> Result<Decision, FeedError<B::Error>> {
    let (backend, session) = (&self.backend, &self.session);
    let result = retry(&self.policy, &mut self.cancel, move || {
      backend.submit_decision(session, target, outcome)
    })
    .await
    .map_err(FeedError::from);

    match &result {
      Ok(_) => self.remove(target),
      Err(FeedError::Duplicate(_)) => {
        tracing::warn!(%target, "decision already stored, dropping candidate");
        self.remove(target);
      }
      Err(e) => tracing::warn!(%target, error = %e, "decision not recorded"),
    }
    result
  }

  fn remove(&mut self, target: &UserId) { self.candidates.retain(|p| p.id != *target); }
}
