//! Editor shell, scripts and stylesheets compiled into the binary.

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, File, include_dir};

use crate::application::error::ErrorReport;

static EDITOR_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

const INDEX_PAGE: &str = "index.html";
const PREVIEW_CHROME_STYLESHEET: &str = "preview_chrome.css";

pub async fn serve_assets(Path(path): Path<String>) -> Response {
    serve("infra::assets::serve_assets", &path)
}

/// The editor shell served at `/`.
pub async fn serve_index() -> Response {
    serve("infra::assets::serve_index", INDEX_PAGE)
}

/// Screen-only styling appended to every preview pass.
pub fn preview_chrome_css() -> &'static str {
    EDITOR_ASSETS
        .get_file(PREVIEW_CHROME_STYLESHEET)
        .and_then(File::contents_utf8)
        .unwrap_or_default()
}

fn serve(source: &'static str, path: &str) -> Response {
    match lookup(path) {
        Some(file) => asset_response(path, file),
        None => {
            let mut response = StatusCode::NOT_FOUND.into_response();
            ErrorReport::from_message(
                source,
                StatusCode::NOT_FOUND,
                format!("no embedded asset at `{path}`"),
            )
            .attach(&mut response);
            response
        }
    }
}

/// Only flat, relative file names resolve; anything that could climb out of the bundle is refused.
fn lookup(path: &str) -> Option<&'static File<'static>> {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') || path.split('/').any(|part| part == "..") {
        return None;
    }
    EDITOR_ASSETS.get_file(path)
}

fn asset_response(path: &str, file: &'static File<'static>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut response = Response::new(Body::from(Bytes::from_static(file.contents())));

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    // The shell and its scripts change with every build; always revalidate.
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
