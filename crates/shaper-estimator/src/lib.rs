//! shaper-estimator — turns a noisy p95 signal into a stable CPU target.
//!
//! # Algorithm
//!
//! ```text
//! smoothed = first sample, then smoothed + smoothing * (sample - smoothed)
//! raw      = smoothed * capacity_cores * headroom
//!
//! if raw < min_cores:  target = min_cores               (clamped)
//! if raw > max_cores:  target = max_cores               (clamped)
//! if |raw - committed| < dead_band * committed:
//!                      target = committed               (reissued)
//! else:                target = raw
//! ```
//!
//! `committed` is the last target the controller managed to apply. A
//! target that failed to apply never becomes the dead-band reference,
//! while the smoothing state always absorbs the sample.

pub mod estimator;

pub use estimator::{EstimateError, Estimator, EstimatorConfig};
