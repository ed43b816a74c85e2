//! The controller's read contract.
//!
//! The loop publishes one immutable [`StatusSnapshot`] per tick. Readers
//! take the lock only long enough to clone it, so a slow tick never
//! blocks a status request and a reader never sees a half-written tick.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use shaper_core::{ControllerState, TargetAllocation};
use shaper_estimator::EstimateError;
use shaper_metrics::MetricsError;

use crate::applier::ApplyError;

/// A failure on the allocation path: estimating or applying.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Estimate(#[from] EstimateError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Everything a status reader may see, captured at the end of one tick.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub state: ControllerState,
    /// Outcome of the last metrics query; `None` on success.
    pub last_error: Option<Arc<MetricsError>>,
    /// Outcome of the last estimate/apply; `None` on success or when the
    /// tick never got that far.
    pub last_estimator_error: Option<Arc<PipelineError>>,
    /// Last allocation the applier accepted.
    pub last_applied: Option<TargetAllocation>,
    pub consecutive_failures: u32,
}

/// Read-only view of a controller.
pub trait ControllerStatus: Send + Sync {
    /// A consistent copy of the latest published tick.
    fn snapshot(&self) -> StatusSnapshot;

    fn state(&self) -> ControllerState {
        self.snapshot().state
    }

    fn last_error(&self) -> Option<Arc<MetricsError>> {
        self.snapshot().last_error
    }

    fn last_estimator_error(&self) -> Option<Arc<PipelineError>> {
        self.snapshot().last_estimator_error
    }
}

/// Cloneable handle onto a controller's published status.
#[derive(Debug, Clone, Default)]
pub struct ControllerHandle {
    shared: Arc<RwLock<StatusSnapshot>>,
}

impl ControllerHandle {
    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        *self.shared.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

impl ControllerStatus for ControllerHandle {
    fn snapshot(&self) -> StatusSnapshot {
        self.shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
