//! Source document triple and its export file format.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::{DomainError, ParseError};

/// Suggested filename when exporting the three buffers.
pub const EXPORT_FILE_NAME: &str = "printcss_saved_code.json";

const DEFAULT_MARKUP: &str = "<!-- Enter your HTML here -->";
const DEFAULT_STYLE: &str = "/* Enter your CSS here */";
const DEFAULT_SCRIPT: &str = "// Enter your JavaScript here";

/// The three editable sources. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub markup: String,
    pub style: String,
    pub script: String,
}

impl SourceDocument {
    pub fn new(
        markup: impl Into<String>,
        style: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            style: style.into(),
            script: script.into(),
        }
    }

    /// A document with all three buffers empty.
    pub fn empty() -> Self {
        Self::new("", "", "")
    }

    pub fn field(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Markup => &self.markup,
            SourceKind::Style => &self.style,
            SourceKind::Script => &self.script,
        }
    }

    pub fn field_mut(&mut self, kind: SourceKind) -> &mut String {
        match kind {
            SourceKind::Markup => &mut self.markup,
            SourceKind::Style => &mut self.style,
            SourceKind::Script => &mut self.script,
        }
    }

    /// Encode as the canonical export object `{"html", "css", "js"}`.
    pub fn to_export_bytes(&self) -> Result<Vec<u8>, ParseError> {
        let file = ExportFile {
            html: Some(self.markup.clone()),
            css: Some(self.style.clone()),
            js: Some(self.script.clone()),
        };
        Ok(serde_json::to_vec_pretty(&file)?)
    }

    /// Decode an export object. Missing or `null` keys become empty buffers.
    pub fn from_export_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let file: ExportFile = serde_json::from_slice(bytes)?;
        Ok(file.into())
    }
}

impl Default for SourceDocument {
    fn default() -> Self {
        Self::new(DEFAULT_MARKUP, DEFAULT_STYLE, DEFAULT_SCRIPT)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportFile {
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    css: Option<String>,
    #[serde(default)]
    js: Option<String>,
}

impl From<ExportFile> for SourceDocument {
    fn from(file: ExportFile) -> Self {
        Self {
            markup: file.html.unwrap_or_default(),
            style: file.css.unwrap_or_default(),
            script: file.js.unwrap_or_default(),
        }
    }
}

/// Which of the three buffers an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Markup,
    Style,
    Script,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Markup, SourceKind::Style, SourceKind::Script];

    /// Key used in the export file.
    pub fn export_key(self) -> &'static str {
        match self {
            SourceKind::Markup => "html",
            SourceKind::Style => "css",
            SourceKind::Script => "js",
        }
    }

    /// Conventional file name inside a watched source directory.
    pub fn file_name(self) -> &'static str {
        match self {
            SourceKind::Markup => "index.html",
            SourceKind::Style => "style.css",
            SourceKind::Script => "script.js",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.file_name() == name)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.export_key())
    }
}

impl FromStr for SourceKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" | "markup" => Ok(SourceKind::Markup),
            "css" | "style" => Ok(SourceKind::Style),
            "js" | "javascript" | "script" => Ok(SourceKind::Script),
            other => Err(DomainError::validation(format!(
                "unknown source kind `{other}`"
            ))),
        }
    }
}
