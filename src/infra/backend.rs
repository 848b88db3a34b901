//! reqwest adapter for the remote conversion service.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client, Response, StatusCode, Url,
    header::CONTENT_TYPE,
    multipart::{Form, Part},
};
use tracing::{debug, warn};

use crate::application::remote::{BackendError, ConversionBackend};
use crate::domain::types::ToolId;

const SUPPORTED_TOOLS_PATH: &str = "supported_tools";
const GENERATE_PDF_PATH: &str = "generate_pdf";
const INPUT_FILE_FIELD: &str = "input_file";
const TOOL_FIELD: &str = "tool";
const INPUT_FILE_NAME: &str = "index.html";
const INPUT_FILE_MIME: &str = "text/html";

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &Url) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(BackendError::transport)?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &Url) -> Self {
        let mut base = base_url.clone();
        // Keep any path prefix when joining endpoint names.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { client, base }
    }

    pub fn user_agent() -> &'static str {
        concat!("printcss-playground/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base.join(path).map_err(BackendError::Url)
    }

    async fn error_from_response(resp: Response) -> BackendError {
        let status = resp.status();
        let body = read_body_text(resp).await;
        BackendError::remote(status.as_u16(), reason_phrase(status), body)
    }
}

#[async_trait]
impl ConversionBackend for HttpBackend {
    async fn supported_tools(&self) -> Result<Vec<ToolId>, BackendError> {
        let url = self.url(SUPPORTED_TOOLS_PATH)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(BackendError::transport)?;
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }

        let bytes = resp.bytes().await.map_err(BackendError::transport)?;
        let names: Vec<String> = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Decode(format!("failed to parse tool list: {e}")))?;

        Ok(names
            .into_iter()
            .filter_map(|name| match ToolId::new(name) {
                Ok(tool) => Some(tool),
                Err(err) => {
                    warn!(target = "printcss::backend", error = %err, "ignoring blank tool id");
                    None
                }
            })
            .collect())
    }

    async fn generate_pdf(&self, html: String, tool: &ToolId) -> Result<Bytes, BackendError> {
        let url = self.url(GENERATE_PDF_PATH)?;
        let part = Part::bytes(html.into_bytes())
            .file_name(INPUT_FILE_NAME)
            .mime_str(INPUT_FILE_MIME)
            .map_err(BackendError::transport)?;
        let form = Form::new()
            .part(INPUT_FILE_FIELD, part)
            .text(TOOL_FIELD, tool.to_string());

        debug!(target = "printcss::backend", tool = %tool, url = %url, "posting document");
        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(BackendError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::error_from_response(resp).await);
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = content_type.filter(|ct| !is_pdf_content_type(ct)) {
            let body = read_body_text(resp).await;
            return Err(BackendError::UnexpectedContentType {
                status: status.as_u16(),
                content_type,
                body,
            });
        }

        resp.bytes().await.map_err(BackendError::transport)
    }
}

/// `application/pdf` and `application/octet-stream` are accepted.
fn is_pdf_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/pdf" || essence == "application/octet-stream"
}

fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// Read an error body as text; empty or unreadable bodies become `None`.
async fn read_body_text(resp: Response) -> Option<String> {
    match resp.bytes().await {
        Ok(bytes) if !bytes.is_empty() => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Ok(_) => None,
        Err(err) => {
            debug!(target = "printcss::backend", error = %err, "failed to read response body");
            None
        }
    }
}
