//! The metrics source capability.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use shaper_core::{CallContext, ResourceId, UtilizationSample};

use crate::error::MetricsError;

/// Boxed future returned by [`MetricsSource::query_p95_cpu`].
pub type MetricsFuture<'a> =
    Pin<Box<dyn Future<Output = Result<UtilizationSample, MetricsError>> + Send + 'a>>;

/// Produces the p95 CPU utilization sample for a resource.
///
/// Implementations must honour `ctx`: an expired or cancelled context
/// aborts the call with [`MetricsError::Interrupted`].
pub trait MetricsSource: Send + Sync {
    fn query_p95_cpu<'a>(
        &'a self,
        ctx: &'a CallContext,
        resource: &'a ResourceId,
    ) -> MetricsFuture<'a>;
}

impl<T: MetricsSource + ?Sized> MetricsSource for Arc<T> {
    fn query_p95_cpu<'a>(
        &'a self,
        ctx: &'a CallContext,
        resource: &'a ResourceId,
    ) -> MetricsFuture<'a> {
        (**self).query_p95_cpu(ctx, resource)
    }
}

impl<T: MetricsSource + ?Sized> MetricsSource for Box<T> {
    fn query_p95_cpu<'a>(
        &'a self,
        ctx: &'a CallContext,
        resource: &'a ResourceId,
    ) -> MetricsFuture<'a> {
        (**self).query_p95_cpu(ctx, resource)
    }
}
