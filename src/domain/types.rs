//! Shared value types for the conversion pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Tool used when nothing else was selected.
pub const DEFAULT_TOOL: &str = "pagedjs";

/// Opaque identifier of a remote PDF engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("tool identifier must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ToolId {
    fn default() -> Self {
        Self(DEFAULT_TOOL.to_string())
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ToolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Pending,
    Succeeded,
    Failed,
}

impl ConversionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionStatus::Pending => "pending",
            ConversionStatus::Succeeded => "succeeded",
            ConversionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ConversionStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_id_trims_and_rejects_blank() {
        assert_eq!(ToolId::new("  weasyprint ").map(|t| t.0).ok(), Some("weasyprint".into()));
        assert!(ToolId::new("   ").is_err());
    }

    #[test]
    fn tool_id_serializes_as_plain_string() {
        let tool = ToolId::new("vivliostyle").expect("tool");
        assert_eq!(serde_json::to_string(&tool).expect("json"), "\"vivliostyle\"");
        let back: ToolId = serde_json::from_str("\"prince\"").expect("parse");
        assert_eq!(back.as_str(), "prince");
    }

    #[test]
    fn default_tool_is_well_known() {
        assert_eq!(ToolId::default().as_str(), DEFAULT_TOOL);
    }
}
