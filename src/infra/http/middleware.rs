use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Echoed on every response so the editor can quote it when something fails.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if response.status().is_success() || response.status().is_redirection() {
        debug!(
            target = "printcss::http::response",
            status,
            method = %method,
            path,
            elapsed_ms,
            request_id,
            "request served"
        );
        return response;
    }

    // Drained here so the report never reaches the client.
    let report = response.extensions_mut().remove::<ErrorReport>();
    let source = report.as_ref().map_or("unknown", |report| report.source);
    let chain = report.map(|report| report.messages).unwrap_or_default();
    let detail = chain.first().map_or("no diagnostic available", String::as_str);

    if response.status().is_server_error() {
        error!(
            target = "printcss::http::response",
            status,
            method = %method,
            path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id,
            "request failed"
        );
    } else {
        warn!(
            target = "printcss::http::response",
            status,
            method = %method,
            path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id,
            "rejected request"
        );
    }

    response
}
