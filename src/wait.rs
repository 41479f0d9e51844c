//! Bounded polling until a remote write becomes observable.
//!
//! The remote API is eventually consistent: a read issued right after a
//! write may still return the old record, or none at all. Every
//! reconciler blocks on [`until`] after a write, with a policy that says
//! how long to wait, how often to poll and how many consecutive "done"
//! observations count as settled.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// What a single poll saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    Pending,
    Done(T),
}

/// A failed poll. Transient failures count as a pending observation;
/// permanent ones abort the wait immediately.
#[derive(Debug)]
pub enum PollError<E> {
    Transient(E),
    Permanent(E),
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError<E> {
    #[error("still pending after {elapsed:?} ({polls} polls)")]
    TimedOut {
        elapsed: Duration,
        polls: u32,
        last_error: Option<E>,
    },
    #[error("aborted: {0}")]
    Aborted(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub min_interval: Duration,
    /// Consecutive "done" observations required before the wait succeeds.
    pub required_consecutive: u32,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, min_interval: Duration) -> Self {
        Self {
            timeout,
            min_interval,
            required_consecutive: 1,
        }
    }

    pub fn consecutive(mut self, n: u32) -> Self {
        self.required_consecutive = n.max(1);
        self
    }
}

/// Polls `check` until it reports done `required_consecutive` times in a
/// row. The first poll happens immediately; later ones are spaced by at
/// least `min_interval`. The bound also covers a poll that is still in
/// flight. Returns the value of the final observation.
pub async fn until<F, Fut, T, E>(policy: &WaitPolicy, mut check: F) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<T>, PollError<E>>>,
{
    let required = policy.required_consecutive.max(1);
    let start = Instant::now();
    let mut polls: u32 = 0;
    let mut consecutive: u32 = 0;
    let mut last_error = None;

    loop {
        polls += 1;
        // A poll stuck in flight must not outlive the bound.
        let remaining = policy.timeout.saturating_sub(start.elapsed());
        let Ok(outcome) = tokio::time::timeout(remaining, check()).await else {
            let elapsed = start.elapsed();
            tracing::warn!("gave up after {elapsed:?} with poll {polls} still in flight");
            return Err(WaitError::TimedOut {
                elapsed,
                polls,
                last_error,
            });
        };
        match outcome {
            Ok(Observation::Done(value)) => {
                consecutive += 1;
                tracing::debug!("poll {polls}: done ({consecutive}/{required})");
                if consecutive >= required {
                    return Ok(value);
                }
            }
            Ok(Observation::Pending) => {
                tracing::debug!("poll {polls}: pending");
                consecutive = 0;
            }
            Err(PollError::Transient(e)) => {
                tracing::debug!("poll {polls}: transient failure");
                consecutive = 0;
                last_error = Some(e);
            }
            Err(PollError::Permanent(e)) => return Err(WaitError::Aborted(e)),
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            tracing::warn!("gave up after {elapsed:?} and {polls} polls");
            return Err(WaitError::TimedOut {
                elapsed,
                polls,
                last_error,
            });
        }
        tokio::time::sleep(policy.min_interval).await;
    }
}
