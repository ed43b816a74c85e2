//! shaper-controller — the feedback loop.
//!
//! # Architecture
//!
//! ```text
//! Controller (one tokio task, ticks strictly sequential)
//!   ├── per tick: CallContext with tick_timeout
//!   │   ├── MetricsSource::query_p95_cpu  → LastError
//!   │   ├── Estimator::estimate           → LastEstimatorError
//!   │   └── QuotaApplier::apply           → LastEstimatorError
//!   ├── FailureTracker (consecutive failures → Degraded)
//!   └── publishes StatusSnapshot once per tick
//!
//! ControllerHandle (Clone, read-only) ← status readers
//! ```
//!
//! # States
//!
//! `Initializing` until the first tick completes, then `Sampling`.
//! `degraded_threshold` consecutive failed ticks move to `Degraded`; the
//! first clean tick moves back. Shutdown moves to `Stopped` for good.
//! A tick that only reports "no data yet" neither counts as a failure
//! nor as a recovery.

pub mod applier;
pub mod controller;
pub mod status;
pub mod tracker;

pub use applier::{ApplyError, ApplyFuture, QuotaApplier};
pub use controller::{Controller, ControllerConfig};
pub use status::{ControllerHandle, ControllerStatus, PipelineError, StatusSnapshot};
pub use tracker::{FailureTracker, TickOutcome};
