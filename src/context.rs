//! Deadline and cancellation context.
//!
//! Every operation takes a [`Context`] as its first argument. A context carries
//! an optional deadline and a cancellation token; [`Context::run`] races the
//! wrapped future against both.

use crate::error::{DbError, DbResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation scope for one or more database operations.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Context {
    /// A context that never expires and is only cancelled explicitly.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// Derive a context whose deadline is the earlier of the current one and
    /// `now + timeout`. Cancelling the parent cancels the child.
    pub fn timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        Self {
            deadline: Some(match self.deadline {
                Some(existing) if existing < candidate => existing,
                _ => candidate,
            }),
            token: self.token.child_token(),
        }
    }

    /// Derive a child context that can be cancelled without affecting this one.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Time left until the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the context is already cancelled or past its deadline.
    pub fn check(&self, operation: &str) -> DbResult<()> {
        if self.token.is_cancelled() {
            return Err(DbError::cancelled(operation));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(DbError::deadline_exceeded(operation));
            }
        }
        Ok(())
    }

    /// Run `fut` until it completes, the context is cancelled or the deadline
    /// passes, whichever comes first.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        self.check(operation)?;

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(DbError::cancelled(operation)),
            _ = expired => Err(DbError::deadline_exceeded(operation)),
            result = fut => result,
        }
    }
}
