use std::path::Path;

use assert_cmd::Command;
use httpmock::MockServer;
use predicates::{prelude::PredicateBooleanExt, str::contains};

const DOCUMENT: &str = r#"{"html":"<h1>Hello print</h1>","css":"@page { size: A4 }","js":""}"#;

fn playground() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("printcss-playground"));
    cmd.env_remove("PRINTCSS_CONFIG_FILE")
        .env("PRINTCSS__LOGGING__LEVEL", "warn");
    cmd
}

fn write_document(dir: &Path) -> String {
    let path = dir.join("printcss_saved_code.json");
    std::fs::write(&path, DOCUMENT).expect("write document");
    path.to_string_lossy().into_owned()
}

#[test]
fn convert_writes_the_pdf_from_the_service() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/generate_pdf")
            .body_includes("vivliostyle")
            .body_includes("<h1>Hello print</h1>");
        then.status(200)
            .header("content-type", "application/pdf")
            .body("%PDF-1.7 cli");
    });

    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_document(dir.path());
    let output = dir.path().join("out.pdf");

    playground()
        .env("PRINTCSS__BACKEND__URL", server.base_url())
        .args(["convert", "--input", input.as_str(), "--tool", "vivliostyle"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(contains("rendered by vivliostyle"));

    mock.assert();
    assert_eq!(std::fs::read(&output).expect("pdf"), b"%PDF-1.7 cli");
}

#[test]
fn convert_failure_exits_nonzero_with_remote_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/generate_pdf");
        then.status(500).body("render failed");
    });

    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_document(dir.path());
    let output = dir.path().join("out.pdf");

    playground()
        .args(["convert", "--backend-url", server.base_url().as_str()])
        .args(["--input", input.as_str()])
        .arg("--output")
        .arg(&output)
        .assert()
        .failure()
        .stderr(contains("status 500"))
        .stderr(contains("render failed"));

    assert!(!output.exists());
}

#[test]
fn tools_marks_the_default() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/supported_tools");
        then.status(200).body(r#"["pagedjs","weasyprint"]"#);
    });

    playground()
        .args(["tools", "--backend-url", server.base_url().as_str()])
        .assert()
        .success()
        .stdout(contains("pagedjs (default)"))
        .stdout(contains("weasyprint"));
}

#[test]
fn compose_export_has_no_pagination_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_document(dir.path());

    playground()
        .args(["compose", "--input", input.as_str()])
        .assert()
        .success()
        .stdout(contains("<h1>Hello print</h1>"))
        .stdout(contains("@page { size: A4 }"))
        .stdout(contains("paged.polyfill").not());
}

#[test]
fn compose_preview_includes_pagination_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_document(dir.path());

    playground()
        .env(
            "PRINTCSS__PREVIEW__PAGINATION_SCRIPT_URL",
            "https://cdn.example.com/paged.polyfill.js",
        )
        .args(["compose", "--target", "preview", "--input", input.as_str()])
        .assert()
        .success()
        .stdout(contains("https://cdn.example.com/paged.polyfill.js"));
}

#[test]
fn malformed_document_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ nope").expect("write");

    playground()
        .arg("compose")
        .arg("--input")
        .arg(&path)
        .assert()
        .failure();
}
