//! Sandboxed render target.
//!
//! Every pass rebuilds the whole preview document from the current sources and
//! replaces the content of the mounted [`RenderSurface`].

use std::sync::{Arc, Mutex};

use metrics::counter;
use serde::Deserialize;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, trace};

use super::compose::{ComposeTarget, PreviewAssets, compose};
use crate::domain::document::SourceDocument;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::preview";

/// An isolated, script-capable surface that shows one composed document at a time.
pub trait RenderSurface: Send + Sync {
    /// Drop whatever the surface currently shows.
    fn clear(&self, pass: u64);
    /// Show `html` as the complete content of the surface.
    fn write(&self, pass: u64, html: Arc<str>);
}

/// How a pass replaces the previous document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComposePolicy {
    /// Clear and write in the same call.
    Direct,
    /// Clear, yield one scheduler tick, then write unless superseded.
    #[default]
    Deferred,
}

impl ComposePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ComposePolicy::Direct => "direct",
            ComposePolicy::Deferred => "deferred",
        }
    }
}

impl std::str::FromStr for ComposePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ComposePolicy::Direct),
            "deferred" => Ok(ComposePolicy::Deferred),
            other => Err(format!("unknown compose policy `{other}`")),
        }
    }
}

/// Latest pass number and the deferred write belonging to it.
#[derive(Default)]
struct PassState {
    pass: u64,
    pending_write: Option<JoinHandle<()>>,
}

pub struct PreviewTarget {
    assets: PreviewAssets,
    policy: ComposePolicy,
    surface: Mutex<Option<Arc<dyn RenderSurface>>>,
    passes: Arc<Mutex<PassState>>,
}

impl PreviewTarget {
    /// Create an unmounted target. Renders are ignored until [`mount`](Self::mount).
    pub fn new(assets: PreviewAssets, policy: ComposePolicy) -> Self {
        Self {
            assets,
            policy,
            surface: Mutex::new(None),
            passes: Arc::new(Mutex::new(PassState::default())),
        }
    }

    pub fn mount(&self, surface: Arc<dyn RenderSurface>) {
        *mutex_lock(&self.surface, SOURCE, "mount") = Some(surface);
    }

    pub fn unmount(&self) {
        self.abort_pending_write();
        *mutex_lock(&self.surface, SOURCE, "unmount") = None;
    }

    pub fn is_mounted(&self) -> bool {
        mutex_lock(&self.surface, SOURCE, "is_mounted").is_some()
    }

    /// Number of passes started so far.
    pub fn passes(&self) -> u64 {
        mutex_lock(&self.passes, SOURCE, "passes").pass
    }

    /// Replace the surface content with a freshly composed document.
    ///
    /// Returns the pass number, or `None` when no surface is mounted yet.
    /// Numbering, clearing and scheduling the write happen under one lock, and
    /// a deferred write takes the same lock, so a later pass always wins.
    pub fn render(&self, document: &SourceDocument) -> Option<u64> {
        let surface = mutex_lock(&self.surface, SOURCE, "render").clone();
        let Some(surface) = surface else {
            trace!(target = "printcss::preview", "render skipped: surface not mounted");
            return None;
        };

        let html: Arc<str> = compose(document, ComposeTarget::Preview(&self.assets)).into();

        let mut state = mutex_lock(&self.passes, SOURCE, "render");
        state.pass += 1;
        let pass = state.pass;
        if let Some(previous) = state.pending_write.take() {
            previous.abort();
        }

        counter!("printcss_preview_render_total").increment(1);
        debug!(
            target = "printcss::preview",
            pass,
            policy = self.policy.as_str(),
            bytes = html.len(),
            "preview pass"
        );

        surface.clear(pass);
        match (self.policy, tokio::runtime::Handle::try_current()) {
            (ComposePolicy::Deferred, Ok(runtime)) => {
                let passes = Arc::clone(&self.passes);
                state.pending_write = Some(runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    let state = mutex_lock(&passes, SOURCE, "deferred_write");
                    if state.pass == pass {
                        surface.write(pass, html);
                    }
                }));
            }
            _ => surface.write(pass, html),
        }

        Some(pass)
    }

    fn abort_pending_write(&self) {
        if let Some(handle) = mutex_lock(&self.passes, SOURCE, "abort").pending_write.take() {
            handle.abort();
        }
    }
}

impl Drop for PreviewTarget {
    fn drop(&mut self) {
        self.abort_pending_write();
    }
}

/// One state of a [`BroadcastSurface`]: `html` is `None` right after a clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub pass: u64,
    pub html: Option<Arc<str>>,
}

/// Surface backed by a watch channel; the HTTP layer streams it to browsers.
pub struct BroadcastSurface {
    frames: watch::Sender<PreviewFrame>,
    last_written: Mutex<Option<Arc<str>>>,
}

impl BroadcastSurface {
    pub fn new() -> Self {
        let (frames, _) = watch::channel(PreviewFrame {
            pass: 0,
            html: None,
        });
        Self {
            frames,
            last_written: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewFrame> {
        self.frames.subscribe()
    }

    pub fn current(&self) -> PreviewFrame {
        self.frames.borrow().clone()
    }

    /// Most recent fully written document, ignoring a clear in progress.
    pub fn last_written(&self) -> Option<Arc<str>> {
        mutex_lock(&self.last_written, SOURCE, "last_written").clone()
    }
}

impl Default for BroadcastSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for BroadcastSurface {
    fn clear(&self, pass: u64) {
        self.frames.send_replace(PreviewFrame { pass, html: None });
    }

    fn write(&self, pass: u64, html: Arc<str>) {
        *mutex_lock(&self.last_written, SOURCE, "write") = Some(Arc::clone(&html));
        self.frames.send_replace(PreviewFrame {
            pass,
            html: Some(html),
        });
    }
}
