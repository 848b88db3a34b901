use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use httpmock::MockServer;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use printcss_playground::application::{
    compose::PreviewAssets,
    preview::{BroadcastSurface, ComposePolicy, PreviewTarget},
    session::{Session, SessionOptions},
    templates::TemplateLibrary,
};
use printcss_playground::domain::document::SourceDocument;
use printcss_playground::infra::{
    backend::HttpBackend,
    http::{HttpState, PREVIEW_CSP, build_router},
};

const PAGINATION_URL: &str = "https://cdn.example.com/paged.polyfill.js";

struct Harness {
    app: Router,
    session: Arc<Session>,
    surface: Arc<BroadcastSurface>,
    _templates: tempfile::TempDir,
}

fn harness(server: &MockServer) -> Harness {
    let templates_dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        templates_dir.path().join("invoice.json"),
        r#"{"title":"Invoice","category":"Business","works_best_with":["weasyprint"],
            "html":"<h1>Invoice</h1>","css":"@page { size: A4 }","javascript":""}"#,
    )
    .expect("write template");
    let templates = TemplateLibrary::load_dir(templates_dir.path()).expect("templates");

    let url = Url::parse(&server.base_url()).expect("url");
    let backend = Arc::new(HttpBackend::new(&url).expect("backend"));
    let target = Arc::new(PreviewTarget::new(
        PreviewAssets {
            pagination_script_url: PAGINATION_URL.into(),
            chrome_stylesheet: ".pagedjs_page { background: white }".into(),
        },
        ComposePolicy::Direct,
    ));
    let surface = Arc::new(BroadcastSurface::new());
    target.mount(surface.clone());

    let session = Arc::new(Session::new(
        backend,
        target,
        templates,
        SessionOptions {
            quiet_period: Duration::ZERO,
            initial: SourceDocument::new("<p>start</p>", "p { color: red }", ""),
            ..SessionOptions::default()
        },
    ));

    Harness {
        app: build_router(HttpState {
            session: Arc::clone(&session),
            surface: Arc::clone(&surface),
        }),
        session,
        surface,
        _templates: templates_dir,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: impl Into<Body>) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .expect("request should build");
    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

async fn wait_for_terminal(app: &Router) -> Value {
    for _ in 0..200 {
        let view = body_json(send(app, Method::GET, "/api/conversion", Body::empty()).await).await;
        if view["status"] != "pending" {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("conversion never finished");
}

#[tokio::test]
async fn edit_is_served_as_sandboxed_preview() {
    let server = MockServer::start();
    let h = harness(&server);

    let response = send(&h.app, Method::PUT, "/api/sources/html", "<h1>Hello</h1>").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&h.app, Method::GET, "/preview", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_SECURITY_POLICY],
        PREVIEW_CSP
    );
    let html = String::from_utf8(body_bytes(response).await).expect("utf8");
    assert!(html.contains("<h1>Hello</h1>"));
    assert!(html.contains("p { color: red }"));
    assert!(html.contains(PAGINATION_URL));
}

#[tokio::test]
async fn viewport_change_rerenders_the_preview() {
    let server = MockServer::start();
    let h = harness(&server);
    let before = h.surface.current().pass;

    let response = send(&h.app, Method::POST, "/api/preview/viewport", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let frame = h.surface.current();
    assert_eq!(frame.pass, before + 1);
    assert!(frame.html.as_deref().is_some_and(|html| html.contains("<p>start</p>")));
}

#[tokio::test]
async fn unknown_source_kind_is_rejected() {
    let server = MockServer::start();
    let h = harness(&server);

    let response = send(&h.app, Method::PUT, "/api/sources/xml", "<x/>").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn export_is_an_attachment_with_all_three_buffers() {
    let server = MockServer::start();
    let h = harness(&server);

    let response = send(&h.app, Method::GET, "/api/export", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("header")
        .to_string();
    assert!(disposition.contains("printcss_saved_code.json"));
    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({"html": "<p>start</p>", "css": "p { color: red }", "js": ""})
    );
}

#[tokio::test]
async fn import_defaults_missing_fields_and_rejects_garbage() {
    let server = MockServer::start();
    let h = harness(&server);

    let response = send(
        &h.app,
        Method::POST,
        "/api/import",
        r#"{"html":"<p>imported</p>","css":"h1{}"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"html": "<p>imported</p>", "css": "h1{}", "js": ""})
    );

    let response = send(&h.app, Method::POST, "/api/import", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "malformed_document");
    assert_eq!(h.session.document().markup, "<p>imported</p>");
}

#[tokio::test]
async fn templates_are_listed_and_loaded() {
    let server = MockServer::start();
    let h = harness(&server);

    let listing = body_json(send(&h.app, Method::GET, "/api/templates", Body::empty()).await).await;
    assert_eq!(listing[0]["name"], "invoice");
    assert_eq!(listing[0]["works_best_with"], json!(["weasyprint"]));

    let response = send(&h.app, Method::POST, "/api/templates/invoice", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["html"], "<h1>Invoice</h1>");

    let response = send(&h.app, Method::POST, "/api/templates/missing", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tools_listing_reports_discovery() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/supported_tools");
        then.status(200).body(r#"["pagedjs","weasyprint"]"#);
    });
    let h = harness(&server);
    h.session.start().await.expect("fetch task");

    let tools = body_json(send(&h.app, Method::GET, "/api/tools", Body::empty()).await).await;
    assert_eq!(
        tools,
        json!({"tools": ["pagedjs", "weasyprint"], "selected": "pagedjs", "loaded": true})
    );

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/tools/selected")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"tool":"weasyprint"}"#))
        .expect("request");
    let response = h.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"selected": "weasyprint"}));
}

#[tokio::test]
async fn conversion_round_trip_serves_the_pdf() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/generate_pdf")
            .body_includes("weasyprint")
            .body_includes("<p>start</p>");
        then.status(200)
            .header("content-type", "application/pdf")
            .body("%PDF-1.7 weasy");
    });
    let h = harness(&server);

    let response = send(
        &h.app,
        Method::POST,
        "/api/conversion",
        r#"{"tool":"weasyprint"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["tool"], "weasyprint");

    let view = wait_for_terminal(&h.app).await;
    assert_eq!(view["status"], "succeeded");
    assert_eq!(view["resource"]["tool"], "weasyprint");
    mock.assert();

    let response = send(&h.app, Method::GET, "/api/conversion/pdf", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(body_bytes(response).await, b"%PDF-1.7 weasy");

    let response = send(&h.app, Method::DELETE, "/api/conversion", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&h.app, Method::GET, "/api/conversion/pdf", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn remote_failure_is_reported_with_body_text() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/generate_pdf");
        then.status(500).body("render failed");
    });
    let h = harness(&server);

    let response = send(&h.app, Method::POST, "/api/conversion", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let view = wait_for_terminal(&h.app).await;
    assert_eq!(view["status"], "failed");
    assert_eq!(view["tool"], "pagedjs");
    assert_eq!(
        view["error"],
        json!({
            "statusCode": 500,
            "message": "Internal Server Error",
            "bodyText": "render failed"
        })
    );
    assert!(view["resource"].is_null());

    let response = send(&h.app, Method::GET, "/api/conversion/pdf", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn editor_shell_and_assets_are_embedded() {
    let server = MockServer::start();
    let h = harness(&server);

    let response = send(&h.app, Method::GET, "/", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).expect("utf8");
    assert!(html.contains("preview-frame"));

    let response = send(&h.app, Method::GET, "/static/editor.js", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let script = String::from_utf8(body_bytes(response).await).expect("utf8");
    // Buffer updates go through the single-flight queue, never a bare fetch per keystroke.
    assert!(script.contains("queueEdit(editor.dataset.kind, editor.value)"));
    assert!(script.contains("await editsSent();\n    await json(\"/api/conversion\""));

    let response = send(&h.app, Method::GET, "/static/../Cargo.toml", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
