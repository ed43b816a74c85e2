//! shaperd — the cpushaper daemon.
//!
//! Loads `shaperd.toml`, builds the metrics source, estimator, and quota
//! applier, runs the controller loop, and serves its status over HTTP.

pub mod applier;
pub mod config;
pub mod daemon;

pub use config::ShaperConfig;
pub use daemon::serve;
