//! The quota applier capability.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use shaper_core::{CallContext, Interrupted, TargetAllocation};

/// Errors returned by a [`QuotaApplier`].
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The environment refused the allocation.
    #[error("{0}")]
    Rejected(String),

    #[error("write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl ApplyError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Boxed future returned by [`QuotaApplier::apply`].
pub type ApplyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ApplyError>> + Send + 'a>>;

/// Enacts a target CPU allocation on the governed resource.
pub trait QuotaApplier: Send + Sync {
    fn apply<'a>(&'a self, ctx: &'a CallContext, target: &'a TargetAllocation) -> ApplyFuture<'a>;
}

impl<T: QuotaApplier + ?Sized> QuotaApplier for Arc<T> {
    fn apply<'a>(&'a self, ctx: &'a CallContext, target: &'a TargetAllocation) -> ApplyFuture<'a> {
        (**self).apply(ctx, target)
    }
}

impl<T: QuotaApplier + ?Sized> QuotaApplier for Box<T> {
    fn apply<'a>(&'a self, ctx: &'a CallContext, target: &'a TargetAllocation) -> ApplyFuture<'a> {
        (**self).apply(ctx, target)
    }
}
