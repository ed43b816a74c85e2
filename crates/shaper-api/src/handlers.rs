//! Status handler.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use shaper_controller::{ControllerStatus, StatusSnapshot};

use crate::StatusState;

/// Wire shape of a status response. Error fields are empty strings when
/// the channel last succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub state: String,
    pub oci_error: String,
    pub estimator_error: String,
}

impl From<&StatusSnapshot> for StatusBody {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            state: snapshot.state.to_string(),
            oci_error: snapshot
                .last_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            estimator_error: snapshot
                .last_estimator_error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// any /status
pub async fn status_handler(State(state): State<StatusState>) -> Response {
    let Some(controller) = state.controller else {
        return (StatusCode::SERVICE_UNAVAILABLE, "controller unavailable").into_response();
    };
    json_response(&StatusBody::from(&controller.snapshot()))
}

fn json_response<T: Serialize>(body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode status");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
