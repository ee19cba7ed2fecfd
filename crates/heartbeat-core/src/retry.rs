//! Bounded retry with exponential backoff, and the cancellation signal that
//! can cut it short.

use std::{future::Future, time::Duration};

use tokio::sync::watch;

use crate::error::Classify;

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How often, and how patiently, a transient failure is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts including the first. `1` disables retrying.
  pub max_attempts: u32,
  /// Delay before the second attempt.
  pub base_delay:   Duration,
  /// Growth factor applied to the delay after every further failure.
  pub multiplier:   f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay:   Duration::from_millis(200),
      multiplier:   2.0,
    }
  }
}

impl RetryPolicy {
  /// A single attempt, no retries.
  pub fn none() -> Self { Self { max_attempts: 1, ..Self::default() } }

  /// Delay after `attempts` failed attempts (1-indexed):
  /// `base_delay * multiplier^(attempts - 1)`.
  pub fn next_delay(&self, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
    let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
  }
}

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Signals cancellation to the paired [`CancelSignal`].
///
/// Dropping the handle without calling [`CancelHandle::cancel`] does not
/// cancel anything.
#[derive(Debug, Clone)]
pub struct CancelHandle {
  tx: watch::Sender<bool>,
}

impl CancelHandle {
  pub fn cancel(&self) { self.tx.send_replace(true); }

  /// Another signal observing this handle.
  pub fn signal(&self) -> CancelSignal { CancelSignal { rx: self.tx.subscribe() } }
}

/// The receiving side of a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
  rx: watch::Receiver<bool>,
}

impl CancelSignal {
  pub fn pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
  }

  /// A signal that never fires.
  pub fn never() -> Self { Self::pair().1 }

  pub fn is_cancelled(&self) -> bool { *self.rx.borrow() }

  /// Resolves once cancellation is requested; pends forever if the handle is
  /// dropped first.
  pub async fn cancelled(&mut self) {
    loop {
      if *self.rx.borrow_and_update() {
        return;
      }
      if self.rx.changed().await.is_err() {
        std::future::pending::<()>().await;
      }
    }
  }
}

// ─── Runner ──────────────────────────────────────────────────────────────────

/// Why [`retry`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
  /// The last attempt failed with a non-transient error, or attempts ran out.
  Failed(E),
  Cancelled,
}

/// Run `op` until it succeeds, fails permanently, exhausts
/// `policy.max_attempts`, or `cancel` fires. Only errors whose class is
/// transient are retried.
pub async fn retry<T, E, F, Fut>(
  policy: &RetryPolicy,
  cancel: &mut CancelSignal,
  mut op: F,
) -> Result<T, RetryError<E>>
where
  E: Classify + std::fmt::Display,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
{
  let mut attempts = 0;
  loop {
    if cancel.is_cancelled() {
      return Err(RetryError::Cancelled);
    }
    attempts += 1;

    let result = tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(RetryError::Cancelled),
      r = op() => r,
    };

    let err = match result {
      Ok(value) => return Ok(value),
      Err(err) => err,
    };

    if !err.is_transient() || attempts >= policy.max_attempts {
      return Err(RetryError::Failed(err));
    }

    let delay = policy.next_delay(attempts);
    tracing::warn!(attempt = attempts, ?delay, error = %err, "transient failure, retrying");

    tokio::select! {
      biased;
      _ = cancel.cancelled() => return Err(RetryError::Cancelled),
      _ = tokio::time::sleep(delay) => {}
    }
  }
}
