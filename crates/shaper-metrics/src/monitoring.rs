//! Cloud monitoring metrics source.
//!
//! Issues a p95 aggregation of `CpuUtilization` for one instance over a
//! fixed trailing window and reports the most recent datapoint. The
//! credentialed [`MonitoringClient`] is built by the host process and
//! injected; nothing in this module knows how to authenticate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::debug;

use shaper_core::{CallContext, ResourceId, UtilizationSample};

use crate::error::{MetricsError, MetricsResult};
use crate::source::{MetricsFuture, MetricsSource};

/// Metric namespace populated by the compute instance agent.
pub const CPU_NAMESPACE: &str = "oci_computeagent";

const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);
const DEFAULT_RESOLUTION: Duration = Duration::from_secs(60);

/// A summarize-metrics request as the provider expects it.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringQuery {
    pub namespace: String,
    pub compartment_id: String,
    /// Provider query language expression.
    pub query: String,
    pub start: SystemTime,
    pub end: SystemTime,
    pub resolution: Duration,
}

/// One aggregated datapoint. Values are percentages (0–100).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricDatapoint {
    pub timestamp: SystemTime,
    pub value: f64,
}

/// Boxed future returned by [`MonitoringClient::summarize_metrics`].
pub type DatapointsFuture<'a> =
    Pin<Box<dyn Future<Output = MetricsResult<Vec<MetricDatapoint>>> + Send + 'a>>;

/// Credentialed access to the provider's monitoring API.
///
/// Implementations translate provider failures into
/// [`MetricsError::Backend`] or [`MetricsError::Transport`] and return an
/// empty vector when the window holds no data.
pub trait MonitoringClient: Send + Sync {
    fn summarize_metrics<'a>(
        &'a self,
        ctx: &'a CallContext,
        query: &'a MonitoringQuery,
    ) -> DatapointsFuture<'a>;
}

/// Metrics source backed by the provider's monitoring service.
pub struct MonitoringMetricsSource {
    client: Option<Arc<dyn MonitoringClient>>,
    compartment_id: String,
    window: Duration,
    resolution: Duration,
}

impl MonitoringMetricsSource {
    /// Create a source for the given compartment. Until a client is set
    /// with [`with_client`](Self::with_client) every query fails with
    /// [`MetricsError::NotInitialized`].
    pub fn new(compartment_id: impl Into<String>) -> Self {
        Self {
            client: None,
            compartment_id: compartment_id.into(),
            window: DEFAULT_WINDOW,
            resolution: DEFAULT_RESOLUTION,
        }
    }

    /// Set the credentialed client.
    pub fn with_client(mut self, client: Arc<dyn MonitoringClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Override the trailing window (default 5m).
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Override the aggregation resolution (default 1m).
    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution;
        self
    }

    /// Build the query for `resource` over the window ending at `end`.
    pub fn build_query(&self, resource: &ResourceId, end: SystemTime) -> MonitoringQuery {
        let start = end.checked_sub(self.window).unwrap_or(SystemTime::UNIX_EPOCH);
        MonitoringQuery {
            namespace: CPU_NAMESPACE.to_string(),
            compartment_id: self.compartment_id.clone(),
            query: format!(
                "CpuUtilization[{}]{{resourceId = \"{}\"}}.percentile(0.95)",
                format_interval(self.resolution),
                escape_string_literal(resource.as_str())
            ),
            start,
            end,
            resolution: self.resolution,
        }
    }
}

impl MetricsSource for MonitoringMetricsSource {
    fn query_p95_cpu<'a>(
        &'a self,
        ctx: &'a CallContext,
        resource: &'a ResourceId,
    ) -> MetricsFuture<'a> {
        Box::pin(async move {
            let client = self.client.as_ref().ok_or(MetricsError::NotInitialized)?;
            let query = self.build_query(resource, SystemTime::now());

            let points = ctx.run(client.summarize_metrics(ctx, &query)).await??;
            let latest = points
                .iter()
                .max_by_key(|p| p.timestamp)
                .ok_or(MetricsError::NoData)?;

            debug!(
                %resource,
                points = points.len(),
                percent = latest.value,
                "monitoring query complete"
            );
            Ok::<_, MetricsError>(UtilizationSample::from_percent(latest.value))
        })
    }
}

/// Escape `raw` for use inside a double-quoted query-language string.
fn escape_string_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render a resolution the way the query language spells intervals.
fn format_interval(d: Duration) -> String {
    let secs = d.as_secs().max(1);
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Canned client that records the last query it saw.
    struct FakeClient {
        reply: Mutex<Option<MetricsResult<Vec<MetricDatapoint>>>>,
        seen: Mutex<Option<MonitoringQuery>>,
        delay: Duration,
    }

    impl FakeClient {
        fn replying(reply: MetricsResult<Vec<MetricDatapoint>>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(None),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok(Vec::new()))),
                seen: Mutex::new(None),
                delay,
            })
        }
    }

    impl MonitoringClient for FakeClient {
        fn summarize_metrics<'a>(
            &'a self,
            _ctx: &'a CallContext,
            query: &'a MonitoringQuery,
        ) -> DatapointsFuture<'a> {
            Box::pin(async move {
                *self.seen.lock().unwrap() = Some(query.clone());
                tokio::time::sleep(self.delay).await;
                self.reply.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
            })
        }
    }

    fn point(offset_secs: u64, value: f64) -> MetricDatapoint {
        MetricDatapoint {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + offset_secs),
            value,
        }
    }

    #[tokio::test]
    async fn without_client_is_not_initialized() {
        let source = MonitoringMetricsSource::new("ocid1.compartment.oc1..x");
        let err = source
            .query_p95_cpu(&CallContext::background(), &ResourceId::from("inst"))
            .await
            .unwrap_err();
        assert!(matches!(err, MetricsError::NotInitialized));
    }

    #[tokio::test]
    async fn reports_latest_point_as_fraction() {
        let client = FakeClient::replying(Ok(vec![point(0, 10.0), point(120, 63.0), point(60, 20.0)]));
        let source = MonitoringMetricsSource::new("comp").with_client(client.clone());

        let sample = source
            .query_p95_cpu(&CallContext::background(), &ResourceId::from("inst-1"))
            .await
            .unwrap();
        assert!((sample.value() - 0.63).abs() < 1e-9);

        let seen = client.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.namespace, CPU_NAMESPACE);
        assert_eq!(seen.compartment_id, "comp");
        assert_eq!(
            seen.query,
            "CpuUtilization[1m]{resourceId = \"inst-1\"}.percentile(0.95)"
        );
        assert_eq!(seen.end.duration_since(seen.start).unwrap(), DEFAULT_WINDOW);
    }

    #[tokio::test]
    async fn empty_window_is_no_data() {
        let source = MonitoringMetricsSource::new("comp").with_client(FakeClient::replying(Ok(vec![])));
        let err = source
            .query_p95_cpu(&CallContext::background(), &ResourceId::from("inst"))
            .await
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[tokio::test]
    async fn backend_errors_pass_through() {
        let client = FakeClient::replying(Err(MetricsError::backend(429, "TooManyRequests")));
        let source = MonitoringMetricsSource::new("comp").with_client(client);
        let err = source
            .query_p95_cpu(&CallContext::background(), &ResourceId::from("inst"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TooManyRequests"));
    }

    #[tokio::test]
    async fn deadline_aborts_slow_client() {
        let source = MonitoringMetricsSource::new("comp").with_client(FakeClient::slow(Duration::from_secs(5)));
        let ctx = CallContext::background().child_with_timeout(Duration::from_millis(20));
        let err = source
            .query_p95_cpu(&ctx, &ResourceId::from("inst"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MetricsError::Interrupted(shaper_core::Interrupted::DeadlineExceeded)
        ));
    }

    #[test]
    fn custom_window_and_resolution() {
        let source = MonitoringMetricsSource::new("comp")
            .with_window(Duration::from_secs(3600))
            .with_resolution(Duration::from_secs(300));
        let end = SystemTime::UNIX_EPOCH + Duration::from_secs(10_000);
        let q = source.build_query(&ResourceId::from("i"), end);
        assert_eq!(q.start, SystemTime::UNIX_EPOCH + Duration::from_secs(6_400));
        assert!(q.query.starts_with("CpuUtilization[5m]"));
    }

    #[test]
    fn quotes_in_resource_id_are_escaped() {
        let source = MonitoringMetricsSource::new("comp");
        let q = source.build_query(&ResourceId::from(r#"inst"} || x\"#), SystemTime::UNIX_EPOCH);
        assert_eq!(
            q.query,
            r#"CpuUtilization[1m]{resourceId = "inst\"} || x\\"}.percentile(0.95)"#
        );
    }

    #[test]
    fn format_interval_units() {
        assert_eq!(format_interval(Duration::from_secs(60)), "1m");
        assert_eq!(format_interval(Duration::from_secs(7200)), "2h");
        assert_eq!(format_interval(Duration::from_secs(45)), "45s");
        assert_eq!(format_interval(Duration::ZERO), "1s");
    }
}
