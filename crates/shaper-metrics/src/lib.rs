//! shaper-metrics — utilization signal acquisition.
//!
//! A [`MetricsSource`] answers one question: what was the p95 CPU
//! utilization of a resource over the trailing window ending now?
//!
//! # Implementations
//!
//! ```text
//! MetricsSource
//!   ├── MonitoringMetricsSource  (cloud monitoring, injected MonitoringClient)
//!   └── HttpMetricsSource        (GET <endpoint>?resource=<id> → {"value": f})
//! ```
//!
//! # Errors
//!
//! Callers must be able to tell "no signal yet" from "signal acquisition
//! broken": the former is [`MetricsError::NoData`], everything else is a
//! real failure. A source built without a transport fails with
//! [`MetricsError::NotInitialized`] instead of panicking.

pub mod error;
pub mod http_json;
pub mod monitoring;
pub mod source;

pub use error::{MAX_BODY_BYTES, MetricsError, MetricsResult};
pub use http_json::HttpMetricsSource;
pub use monitoring::{
    CPU_NAMESPACE, DatapointsFuture, MetricDatapoint, MonitoringClient, MonitoringMetricsSource,
    MonitoringQuery,
};
pub use source::{MetricsFuture, MetricsSource};
