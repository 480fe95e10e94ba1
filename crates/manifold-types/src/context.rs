//! Request-scoped cancellation and deadlines.
//!
//! A [`Context`] travels with every round trip to an external collaborator
//! (resource lookups, registry header queries). It pairs a
//! [`CancellationToken`] with an optional deadline; [`Context::run`] races a
//! future against both.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context-bound operation did not complete.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// A context driven by an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now.
    ///
    /// An earlier deadline already set on `self` is kept.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    /// Derive a child context: cancelling `self` cancels the child, not the
    /// other way round.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.token.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        self.check()?;
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ContextError::Cancelled),
            _ = expiry => Err(ContextError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_runs_to_completion() {
        let ctx = Context::background();
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let ctx = Context::background();
        ctx.cancel();
        let out = ctx.run(async { 7 }).await;
        assert_eq!(out, Err(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn deadline_interrupts_slow_future() {
        let ctx = Context::with_timeout(Duration::from_millis(10));
        let out = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(out, Err(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancelling_parent_cancels_child() {
        let parent = Context::background();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
        assert_eq!(child.check(), Err(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn timeout_keeps_earlier_deadline() {
        let short = Context::with_timeout(Duration::from_millis(5));
        let first = short.deadline().unwrap();
        let widened = short.timeout(Duration::from_secs(60));
        assert_eq!(widened.deadline(), Some(first));
    }
}
