//! shaper-api — HTTP status surface for the cpushaper controller.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | any | `/status` | Controller state and the last error on each channel |
//!
//! The handler holds nothing but a read-only [`ControllerStatus`]; every
//! request reads one published snapshot and never waits on a tick.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::any;
use shaper_controller::ControllerStatus;

pub use handlers::{StatusBody, status_handler};

/// Shared state for the status handler. `None` until a controller is
/// wired in; requests then get `503`.
#[derive(Clone, Default)]
pub struct StatusState {
    pub controller: Option<Arc<dyn ControllerStatus>>,
}

impl StatusState {
    pub fn new(controller: Arc<dyn ControllerStatus>) -> Self {
        Self {
            controller: Some(controller),
        }
    }
}

/// Build the status router.
pub fn status_router(state: StatusState) -> Router {
    Router::new()
        .route("/status", any(handlers::status_handler))
        .with_state(state)
}
