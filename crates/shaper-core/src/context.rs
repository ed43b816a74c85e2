//! Deadline and cancellation for suspending calls.
//!
//! A `CallContext` is handed to every metrics query and quota apply. The
//! long-lived loop context carries only the shutdown signal; each tick
//! derives a child with a deadline shorter than the tick cadence.

use std::future::{Future, pending};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a call bounded by a [`CallContext`] did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline plus cancellation signal, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl CallContext {
    /// A context that never expires and is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled once `true` is sent on the shutdown channel.
    pub fn with_shutdown(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            deadline: None,
            shutdown: Some(shutdown),
        }
    }

    /// Derive a child that expires after `timeout`, or at the parent's
    /// deadline if that comes first. Cancellation is inherited. A timeout
    /// too large to represent leaves the parent's deadline in force.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(candidate)) => Some(parent.min(candidate)),
            (parent, candidate) => parent.or(candidate),
        };
        Self {
            deadline,
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// The reason this context is already done, if it is.
    pub fn err(&self) -> Option<Interrupted> {
        if self.is_cancelled() {
            return Some(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(Interrupted::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. The future is dropped on interruption.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if let Some(reason) = self.err() {
            return Err(reason);
        }

        let mut shutdown = self.shutdown.clone();
        let cancelled = async move {
            match shutdown.as_mut() {
                Some(rx) => {
                    // A dropped sender can never cancel us.
                    let closed = rx.wait_for(|stop| *stop).await.is_err();
                    if closed {
                        pending::<()>().await;
                    }
                }
                None => pending::<()>().await,
            }
        };

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(Interrupted::Cancelled),
            _ = expired => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
