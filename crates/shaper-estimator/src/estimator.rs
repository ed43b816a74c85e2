//! Moving average, clamp, and dead-band.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use shaper_core::{ClampBound, ConfigError, TargetAllocation, UtilizationSample};

/// Errors raised while estimating. Out-of-range samples are not errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("invalid utilization sample: {0}")]
    InvalidSample(f64),

    /// The moving average stopped being a finite number. The average is
    /// reset; the next sample seeds it again.
    #[error("smoothing state diverged; average reset")]
    Diverged,
}

/// Policy knobs for the estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Weight of the newest sample in the moving average (0, 1].
    pub smoothing: f64,
    /// Relative change below which the previous target is reissued [0, 1).
    pub dead_band: f64,
    /// Lowest allocation ever emitted, in cores.
    pub min_cores: f64,
    /// Highest allocation ever emitted, in cores.
    pub max_cores: f64,
    /// Total CPU capacity the utilization fraction refers to, in cores.
    pub capacity_cores: f64,
    /// Multiplier applied on top of observed demand.
    pub headroom: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.5,
            dead_band: 0.05,
            min_cores: 0.1,
            max_cores: 1.0,
            capacity_cores: 1.0,
            headroom: 1.2,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(ConfigError::new("smoothing", "must be in (0, 1]"));
        }
        if !(self.dead_band >= 0.0 && self.dead_band < 1.0) {
            return Err(ConfigError::new("dead_band", "must be in [0, 1)"));
        }
        if !(self.min_cores > 0.0 && self.min_cores.is_finite()) {
            return Err(ConfigError::new("min_cores", "must be positive"));
        }
        if !(self.max_cores >= self.min_cores && self.max_cores.is_finite()) {
            return Err(ConfigError::new("max_cores", "must be at least min_cores"));
        }
        if !(self.capacity_cores > 0.0 && self.capacity_cores.is_finite()) {
            return Err(ConfigError::new("capacity_cores", "must be positive"));
        }
        if !(self.headroom > 0.0 && self.headroom.is_finite()) {
            return Err(ConfigError::new("headroom", "must be positive"));
        }
        Ok(())
    }
}

/// Stateful estimator. Owned by the control loop; not shared.
#[derive(Debug, Clone)]
pub struct Estimator {
    config: EstimatorConfig,
    /// Exponentially weighted moving average of samples.
    smoothed: Option<f64>,
    /// Last target that was successfully applied.
    committed: Option<f64>,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            smoothed: None,
            committed: None,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Current moving average, if any sample has been seen.
    pub fn smoothed(&self) -> Option<f64> {
        self.smoothed
    }

    /// Current dead-band reference, in cores.
    pub fn committed(&self) -> Option<f64> {
        self.committed
    }

    /// Fold `sample` into the average and compute this tick's target.
    pub fn estimate(&mut self, sample: UtilizationSample) -> Result<TargetAllocation, EstimateError> {
        if !sample.is_well_formed() {
            return Err(EstimateError::InvalidSample(sample.value()));
        }

        let value = sample.value();
        let smoothed = match self.smoothed {
            Some(prev) => prev + self.config.smoothing * (value - prev),
            None => value,
        };
        if !smoothed.is_finite() {
            warn!(sample = value, "moving average diverged, resetting");
            self.smoothed = None;
            return Err(EstimateError::Diverged);
        }
        self.smoothed = Some(smoothed);

        let raw = smoothed * self.config.capacity_cores * self.config.headroom;
        let target = |cores, clamped, reissued| TargetAllocation {
            cores,
            sample,
            smoothed,
            clamped,
            reissued,
        };

        if raw < self.config.min_cores {
            return Ok(target(self.config.min_cores, Some(ClampBound::Min), false));
        }
        if raw > self.config.max_cores {
            return Ok(target(self.config.max_cores, Some(ClampBound::Max), false));
        }

        if let Some(prev) = self.committed
            && (raw - prev).abs() < self.config.dead_band * prev
        {
            debug!(raw, committed = prev, "within dead-band, reissuing previous target");
            return Ok(target(prev, None, true));
        }

        Ok(target(raw, None, false))
    }

    /// Record that `target` was applied; it becomes the dead-band reference.
    pub fn commit(&mut self, target: &TargetAllocation) {
        self.committed = Some(target.cores);
    }
}
