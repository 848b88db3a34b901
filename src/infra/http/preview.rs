//! Editor shell, isolated preview page and its event stream.

use axum::{
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::application::stream::frame_stream;

use super::HttpState;

/// Runs the preview with scripts and dialogs but without same-origin access.
pub const PREVIEW_CSP: &str = "sandbox allow-scripts allow-modals allow-popups";

/// The last fully written preview document, served as an isolated page.
pub async fn preview_page(State(state): State<HttpState>) -> Response {
    let html = state
        .surface
        .last_written()
        .map(|html| html.to_string())
        .unwrap_or_default();

    let mut response = (StatusCode::OK, html).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(PREVIEW_CSP));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

pub async fn preview_events(State(state): State<HttpState>) -> Response {
    frame_stream(state.surface.subscribe())
}
