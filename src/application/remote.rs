//! Trait describing the remote conversion service adapter.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::types::ToolId;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("remote tool responded with status {status}")]
    Remote {
        status: u16,
        reason: String,
        body: Option<String>,
    },
    #[error("remote tool responded with unexpected content type `{content_type}`")]
    UnexpectedContentType {
        status: u16,
        content_type: String,
        body: Option<String>,
    },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn remote(status: u16, reason: impl Into<String>, body: Option<String>) -> Self {
        Self::Remote {
            status,
            reason: reason.into(),
            body,
        }
    }
}

/// The two endpoints of the conversion service.
#[async_trait]
pub trait ConversionBackend: Send + Sync {
    /// `GET /supported_tools`.
    async fn supported_tools(&self) -> Result<Vec<ToolId>, BackendError>;

    /// `POST /generate_pdf` with the composed document as `index.html`.
    async fn generate_pdf(&self, html: String, tool: &ToolId) -> Result<Bytes, BackendError>;
}
