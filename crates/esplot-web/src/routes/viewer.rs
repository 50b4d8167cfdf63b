//! Viewer page route handler.
//!
//! Serves the embedded viewer page, which connects to `/websocket` and
//! displays every plot it receives.

use axum::response::{Html, IntoResponse};

const VIEWER_HTML: &str = include_str!("../../../../assets/web/index.html");

/// GET / - Serve the viewer page.
pub async fn index() -> impl IntoResponse {
    Html(VIEWER_HTML)
}
