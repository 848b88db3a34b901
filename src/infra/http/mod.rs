mod api;
mod error;
mod middleware;
mod preview;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage};
pub use preview::PREVIEW_CSP;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::application::{preview::BroadcastSurface, session::Session};
use crate::infra::assets;

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub session: Arc<Session>,
    pub surface: Arc<BroadcastSurface>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(assets::serve_index))
        .route("/static/{*path}", get(assets::serve_assets))
        .route("/preview", get(preview::preview_page))
        .route("/preview/events", get(preview::preview_events))
        .route("/api/sources", get(api::get_sources).put(api::put_sources))
        .route("/api/sources/{kind}", put(api::put_source))
        .route("/api/preview/reload", post(api::reload_preview))
        .route("/api/preview/viewport", post(api::viewport_changed))
        .route("/api/export", get(api::export_sources))
        .route("/api/import", post(api::import_sources))
        .route("/api/templates", get(api::list_templates))
        .route("/api/templates/{name}", post(api::load_template))
        .route("/api/tools", get(api::list_tools))
        .route("/api/tools/selected", put(api::select_tool))
        .route(
            "/api/conversion",
            get(api::conversion_status)
                .post(api::start_conversion)
                .delete(api::close_conversion),
        )
        .route("/api/conversion/pdf", get(api::conversion_pdf))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
