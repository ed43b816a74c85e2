//! Consecutive-failure tracking and the controller state machine.

use tracing::{info, warn};

use shaper_core::ControllerState;

/// How a tick ended, as far as degradation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Both channels came back clean.
    Clean,
    /// The backend had nothing to report yet. Neither failure nor recovery.
    NoData,
    /// Either channel failed.
    Failed,
}

/// Tracks consecutive failed ticks and derives the lifecycle state.
#[derive(Debug)]
pub struct FailureTracker {
    state: ControllerState,
    consecutive_failures: u32,
    /// Failed ticks in a row before `Degraded`.
    threshold: u32,
}

impl FailureTracker {
    /// `threshold` is clamped to at least one.
    pub fn new(threshold: u32) -> Self {
        Self {
            state: ControllerState::Initializing,
            consecutive_failures: 0,
            threshold: threshold.max(1),
        }
    }

    /// Record a completed tick and return the new state.
    pub fn record(&mut self, outcome: TickOutcome) -> ControllerState {
        if self.state.is_terminal() {
            return self.state;
        }

        match outcome {
            TickOutcome::Clean => self.consecutive_failures = 0,
            TickOutcome::Failed => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1)
            }
            TickOutcome::NoData => {}
        }

        let next = if self.consecutive_failures >= self.threshold {
            ControllerState::Degraded
        } else {
            ControllerState::Sampling
        };

        match (self.state, next) {
            (ControllerState::Degraded, ControllerState::Degraded) => {}
            (_, ControllerState::Degraded) => warn!(
                failures = self.consecutive_failures,
                threshold = self.threshold,
                "controller degraded, holding last allocation"
            ),
            (ControllerState::Degraded, _) => info!("controller recovered"),
            (ControllerState::Initializing, _) => info!("first tick complete, sampling"),
            _ => {}
        }

        self.state = next;
        self.state
    }

    /// Enter the terminal state.
    pub fn stop(&mut self) -> ControllerState {
        self.state = ControllerState::Stopped;
        self.state
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
