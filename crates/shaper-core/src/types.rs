//! Domain types shared by the metrics, estimator, and controller crates.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Resource ───────────────────────────────────────────────────────

/// Opaque identifier of the instance being measured and shaped.
///
/// Passed through unchanged from configuration to the metrics backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Samples ────────────────────────────────────────────────────────

/// p95 CPU utilization over the trailing window, as a fraction of the
/// instance's total capacity.
///
/// Construction does not validate; the estimator rejects structurally
/// invalid values (negative, NaN, infinite).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtilizationSample(f64);

impl UtilizationSample {
    pub fn new(fraction: f64) -> Self {
        Self(fraction)
    }

    /// Build a sample from a 0–100 percentage.
    pub fn from_percent(percent: f64) -> Self {
        Self(percent / 100.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether the sample can be fed to an estimator at all.
    pub fn is_well_formed(self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }
}

impl fmt::Display for UtilizationSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

// ── Allocations ────────────────────────────────────────────────────

/// Which configured bound, if any, a target was clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampBound {
    Min,
    Max,
}

/// A CPU allocation the estimator wants applied, in cores.
///
/// Carries the inputs that produced it so a log line or error can
/// explain the decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetAllocation {
    /// Allocation in CPU cores (always positive).
    pub cores: f64,
    /// The raw sample fed to the estimator this tick.
    pub sample: UtilizationSample,
    /// Smoothed utilization after this sample was folded in.
    pub smoothed: f64,
    /// Set when the raw estimate fell outside the configured range.
    pub clamped: Option<ClampBound>,
    /// Set when the dead-band suppressed a small move and the previous
    /// target was reissued.
    pub reissued: bool,
}

impl TargetAllocation {
    /// Allocation in millicores, rounded to the nearest integer.
    pub fn millicores(&self) -> u64 {
        (self.cores * 1000.0).round().max(0.0) as u64
    }
}

impl fmt::Display for TargetAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} cores", self.cores)
    }
}

// ── Controller lifecycle ───────────────────────────────────────────

/// Coarse lifecycle of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControllerState {
    /// No tick has completed yet.
    #[default]
    Initializing,
    /// Steady state.
    Sampling,
    /// Too many consecutive failed ticks; the last good allocation is held.
    Degraded,
    /// The loop was shut down. Terminal.
    Stopped,
}

impl ControllerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Sampling => "Sampling",
            Self::Degraded => "Degraded",
            Self::Stopped => "Stopped",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Stopped
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
