//! Producer submission endpoint.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use esplot_core::{Payload, PayloadError};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::AppState;

/// Why a submission was refused.
#[derive(Error, Debug)]
pub enum IngressError {
    #[error("{0}")]
    Payload(#[from] PayloadError),

    #[error("unreadable submission: {0}")]
    Unreadable(#[from] BytesRejection),

    #[error("broadcast hub is not running")]
    HubClosed,
}

impl IngressError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Payload(PayloadError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Payload(_) => StatusCode::BAD_REQUEST,
            Self::Unreadable(rejection) => rejection.status(),
            Self::HubClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// POST /new - Accept one rendering and hand it to the hub.
///
/// Returns as soon as the hub has the payload; delivery to viewers happens
/// afterwards.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, IngressError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let payload = body
        .map_err(IngressError::from)
        .and_then(|body| {
            Payload::from_submission(body, content_type, state.config.max_payload_bytes)
                .map_err(IngressError::from)
        })
        .inspect_err(|e| warn!(error = %e, "Rejected plot submission"))?;

    let bytes = payload.len();
    state
        .hub
        .broadcast(payload)
        .await
        .map_err(|_| IngressError::HubClosed)?;

    info!(bytes, "Received plot, broadcasting to viewers");
    Ok(StatusCode::OK)
}
