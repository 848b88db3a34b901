//! Starter templates loaded from a directory of JSON files.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{document::SourceDocument, error::ParseError};
use crate::infra::error::InfraError;

/// Template payload as published by the template collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub works_best_with: Option<Vec<String>>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub javascript: String,
}

impl Template {
    /// Parse a template file. Templates without a title are rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let template: Template = serde_json::from_slice(bytes)?;
        if template.title.trim().is_empty() {
            return Err(ParseError::MissingTitle);
        }
        Ok(template)
    }

    pub fn document(&self) -> SourceDocument {
        SourceDocument::new(
            self.html.clone(),
            self.css.clone(),
            self.javascript.clone(),
        )
    }
}

/// Listing entry without the sources.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub title: String,
    pub category: Option<String>,
    pub works_best_with: Vec<String>,
}

#[derive(Debug, Default)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, Template>,
}

impl TemplateLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`, keyed by file stem. Invalid entries are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, InfraError> {
        let mut templates = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let bytes = std::fs::read(&path)?;
            match Template::from_slice(&bytes) {
                Ok(template) => {
                    templates.insert(name.to_string(), template);
                }
                Err(err) => warn!(
                    target = "printcss::templates",
                    path = %path.display(),
                    error = %err,
                    "skipping invalid template"
                ),
            }
        }

        info!(
            target = "printcss::templates",
            dir = %dir.display(),
            count = templates.len(),
            "templates loaded"
        );
        Ok(Self {
            templates,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn summaries(&self) -> Vec<TemplateSummary> {
        self.templates
            .iter()
            .map(|(name, template)| TemplateSummary {
                name: name.clone(),
                title: template.title.clone(),
                category: template.category.clone(),
                works_best_with: template.works_best_with.clone().unwrap_or_default(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_maps_javascript_to_script() {
        let template = Template::from_slice(
            br#"{"title":"Invoice","category":"Business","works_best_with":["weasyprint"],
                "html":"<h1>Invoice</h1>","css":"@page{size:A4}","javascript":"print()"}"#,
        )
        .expect("template");
        assert_eq!(
            template.document(),
            SourceDocument::new("<h1>Invoice</h1>", "@page{size:A4}", "print()")
        );
    }

    #[test]
    fn template_without_title_is_rejected() {
        let err = Template::from_slice(br#"{"title":"  ","html":"x"}"#).expect_err("no title");
        assert!(matches!(err, ParseError::MissingTitle));
        assert!(Template::from_slice(br#"{"html":"x"}"#).is_err());
    }

    #[test]
    fn load_dir_skips_invalid_and_non_json_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("book.json"),
            r#"{"title":"Book","html":"<p>b</p>"}"#,
        )
        .expect("write");
        std::fs::write(dir.path().join("broken.json"), "{").expect("write");
        std::fs::write(dir.path().join("untitled.json"), r#"{"html":"x"}"#).expect("write");
        std::fs::write(dir.path().join("book.png"), [0u8, 1, 2]).expect("write");

        let library = TemplateLibrary::load_dir(dir.path()).expect("library");
        assert_eq!(library.len(), 1);
        let book = library.get("book").expect("book");
        assert_eq!(book.document().script, "");
        assert_eq!(library.summaries()[0].works_best_with, Vec::<String>::new());
    }
}
