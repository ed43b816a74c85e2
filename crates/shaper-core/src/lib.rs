//! shaper-core — shared types for the cpushaper feedback loop.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! ```text
//! ResourceId ──▶ MetricsSource ──▶ UtilizationSample
//!                                        │
//!                                        ▼
//!                                   Estimator ──▶ TargetAllocation ──▶ QuotaApplier
//! ```
//!
//! Utilization is always a fraction of the instance's total CPU
//! capacity (`0.0..=1.0`). Allocations are always in CPU cores.
//!
//! [`CallContext`] carries the deadline and cancellation signal that
//! every suspending call in a tick must honour.

pub mod context;
pub mod duration;
pub mod error;
pub mod types;

pub use context::{CallContext, Interrupted};
pub use duration::parse_duration;
pub use error::ConfigError;
pub use types::*;
