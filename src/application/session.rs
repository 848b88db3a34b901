//! Editing session: the sources, the live preview and the conversion view.
//!
//! Every mutation of the sources goes through here so that the preview is
//! rescheduled after it. The session also remembers which tool is selected
//! and whether the conversion view is open.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{
    conversion::{ConversionOrchestrator, ConversionView, PdfResource},
    preview::PreviewTarget,
    remote::ConversionBackend,
    scheduler::RenderScheduler,
    store::SourceStore,
    templates::TemplateLibrary,
    tools::ToolRegistry,
};
use crate::domain::{
    document::{SourceDocument, SourceKind},
    error::{DomainError, ParseError},
    types::ToolId,
};
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::session";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub quiet_period: Duration,
    pub default_tool: ToolId,
    pub initial: SourceDocument,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            quiet_period: super::scheduler::DEFAULT_QUIET_PERIOD,
            default_tool: ToolId::default(),
            initial: SourceDocument::default(),
        }
    }
}

#[derive(Debug)]
struct ViewState {
    selected_tool: ToolId,
    conversion_open: bool,
}

/// Tool picker contents.
#[derive(Debug, Clone, Serialize)]
pub struct ToolsView {
    pub tools: Vec<ToolId>,
    pub selected: ToolId,
    pub loaded: bool,
}

pub struct Session {
    store: SourceStore,
    scheduler: RenderScheduler,
    orchestrator: Arc<ConversionOrchestrator>,
    registry: Arc<ToolRegistry>,
    templates: TemplateLibrary,
    view: Mutex<ViewState>,
    // Held from a buffer write until the scheduler has seen its snapshot.
    edits: Mutex<()>,
}

impl Session {
    pub fn new(
        backend: Arc<dyn ConversionBackend>,
        target: Arc<PreviewTarget>,
        templates: TemplateLibrary,
        options: SessionOptions,
    ) -> Self {
        Self {
            store: SourceStore::new(options.initial),
            scheduler: RenderScheduler::new(target, options.quiet_period),
            orchestrator: Arc::new(ConversionOrchestrator::new(Arc::clone(&backend))),
            registry: Arc::new(ToolRegistry::new(backend)),
            templates,
            view: Mutex::new(ViewState {
                selected_tool: options.default_tool,
                conversion_open: false,
            }),
            edits: Mutex::new(()),
        }
    }

    /// Kick off tool discovery and paint the first preview.
    pub fn start(&self) -> JoinHandle<()> {
        let fetch = self.registry.spawn_fetch();
        self.scheduler.reload(&self.store.get());
        fetch
    }

    pub fn shutdown(&self) {
        self.scheduler.cancel();
        self.orchestrator.reset();
        self.scheduler.target().unmount();
    }

    pub fn document(&self) -> SourceDocument {
        self.store.get()
    }

    pub fn store(&self) -> &SourceStore {
        &self.store
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn orchestrator(&self) -> &Arc<ConversionOrchestrator> {
        &self.orchestrator
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    /// Editor change event for one buffer.
    pub fn edit(&self, kind: SourceKind, text: impl Into<String>) {
        let _ordered = mutex_lock(&self.edits, SOURCE, "edit");
        let document = self.store.set(kind, text);
        self.scheduler.on_change(document);
    }

    pub fn replace_all(&self, document: SourceDocument) {
        let _ordered = mutex_lock(&self.edits, SOURCE, "replace_all");
        let document = self.store.replace_all(document);
        self.scheduler.on_change(document);
    }

    pub fn export(&self) -> Result<Vec<u8>, ParseError> {
        self.store.serialize()
    }

    /// Replace the sources from an export file. A malformed file leaves them as they were.
    pub fn import(&self, bytes: &[u8]) -> Result<SourceDocument, ParseError> {
        let _ordered = mutex_lock(&self.edits, SOURCE, "import");
        let document = self.store.import(bytes)?;
        self.scheduler.on_change(document.clone());
        Ok(document)
    }

    pub fn load_template(&self, name: &str) -> Result<SourceDocument, DomainError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| DomainError::not_found("template"))?;
        let document = template.document();
        info!(
            target = "printcss::session",
            template = name,
            title = %template.title,
            "template loaded"
        );
        self.replace_all(document.clone());
        Ok(document)
    }

    /// The preview area changed size (fullscreen toggle); paginated layout must be redone.
    pub fn viewport_changed(&self) {
        let _ordered = mutex_lock(&self.edits, SOURCE, "viewport_changed");
        self.scheduler.on_change(self.store.get());
    }

    pub fn reload(&self) {
        let _ordered = mutex_lock(&self.edits, SOURCE, "reload");
        self.scheduler.reload(&self.store.get());
    }

    pub fn selected_tool(&self) -> ToolId {
        mutex_lock(&self.view, SOURCE, "selected_tool")
            .selected_tool
            .clone()
    }

    pub fn is_conversion_open(&self) -> bool {
        mutex_lock(&self.view, SOURCE, "is_conversion_open").conversion_open
    }

    /// Change the selected tool. With the conversion view open a new job starts
    /// right away and its generation is returned.
    pub fn select_tool(&self, tool: ToolId) -> Option<u64> {
        let open = {
            let mut view = mutex_lock(&self.view, SOURCE, "select_tool");
            view.selected_tool = tool.clone();
            view.conversion_open
        };
        debug!(target = "printcss::session", tool = %tool, open, "tool selected");
        open.then(|| self.orchestrator.convert(self.store.get(), tool))
    }

    /// Open the conversion view and start a job with `tool` or the selected tool.
    /// Returns the job's generation and the tool it runs with.
    pub fn request_conversion(&self, tool: Option<ToolId>) -> (u64, ToolId) {
        let tool = {
            let mut view = mutex_lock(&self.view, SOURCE, "request_conversion");
            if let Some(tool) = tool {
                view.selected_tool = tool;
            }
            view.conversion_open = true;
            view.selected_tool.clone()
        };
        let generation = self.orchestrator.convert(self.store.get(), tool.clone());
        (generation, tool)
    }

    pub fn close_conversion(&self) {
        mutex_lock(&self.view, SOURCE, "close_conversion").conversion_open = false;
        self.orchestrator.reset();
    }

    pub fn conversion_view(&self) -> ConversionView {
        self.orchestrator.view()
    }

    pub fn displayed_pdf(&self) -> Option<PdfResource> {
        self.orchestrator.displayed()
    }

    pub fn tools_view(&self) -> ToolsView {
        ToolsView {
            tools: self.registry.tools(),
            selected: self.selected_tool(),
            loaded: self.registry.is_loaded(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}
