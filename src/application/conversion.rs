//! Conversion orchestrator.
//!
//! Jobs are not serialized: several requests may be in flight, but only the
//! job carrying the current generation may change what is displayed. A
//! completion from an older generation is dropped on arrival.

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use bytes::Bytes;
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::compose::{ComposeTarget, compose};
use super::remote::{BackendError, ConversionBackend};
use crate::domain::{
    document::SourceDocument,
    types::{ConversionStatus, ToolId},
};
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::conversion";

/// Status shown to the user: an HTTP code, or a label for non-HTTP failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorStatus {
    Code(u16),
    Label(String),
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorStatus::Code(code) => write!(f, "{code}"),
            ErrorStatus::Label(label) => f.write_str(label),
        }
    }
}

/// Failure surfaced verbatim to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub status_code: ErrorStatus,
    pub message: String,
    pub body_text: Option<String>,
}

impl From<&BackendError> for ErrorDetail {
    fn from(err: &BackendError) -> Self {
        match err {
            BackendError::Transport(message) => ErrorDetail {
                status_code: ErrorStatus::Label("network".into()),
                message: message.clone(),
                body_text: None,
            },
            BackendError::Remote {
                status,
                reason,
                body,
            } => ErrorDetail {
                status_code: ErrorStatus::Code(*status),
                message: reason.clone(),
                body_text: body.clone(),
            },
            BackendError::UnexpectedContentType { status, body, .. } => ErrorDetail {
                status_code: ErrorStatus::Code(*status),
                message: err.to_string(),
                body_text: body.clone(),
            },
            BackendError::Decode(_) => ErrorDetail {
                status_code: ErrorStatus::Label("decode".into()),
                message: err.to_string(),
                body_text: None,
            },
            BackendError::Url(_) => ErrorDetail {
                status_code: ErrorStatus::Label("configuration".into()),
                message: err.to_string(),
                body_text: None,
            },
        }
    }
}

/// A PDF held in memory for display.
#[derive(Debug, Clone)]
pub struct PdfResource {
    pub id: Uuid,
    pub generation: u64,
    pub tool: ToolId,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub generation: u64,
    pub snapshot: SourceDocument,
    pub tool: ToolId,
    pub status: ConversionStatus,
    pub result: Option<PdfResource>,
    pub error: Option<ErrorDetail>,
}

/// Serializable view of the current job for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionView {
    pub generation: u64,
    pub tool: Option<ToolId>,
    pub status: Option<ConversionStatus>,
    pub error: Option<ErrorDetail>,
    pub resource: Option<ResourceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceInfo {
    pub id: Uuid,
    pub tool: ToolId,
    pub bytes: usize,
}

#[derive(Debug, Default)]
struct State {
    generation: u64,
    job: Option<ConversionJob>,
    displayed: Option<PdfResource>,
}

fn release(previous: Option<PdfResource>, reason: &'static str) {
    if let Some(previous) = previous {
        debug!(
            target = "printcss::conversion",
            resource_id = %previous.id,
            generation = previous.generation,
            bytes = previous.bytes.len(),
            reason,
            "released pdf resource"
        );
    }
}

pub struct ConversionOrchestrator {
    backend: Arc<dyn ConversionBackend>,
    state: Mutex<State>,
}

impl ConversionOrchestrator {
    pub fn new(backend: Arc<dyn ConversionBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(State::default()),
        }
    }

    /// Start a job on a background task and return its generation.
    ///
    /// Any job still in flight is superseded, not cancelled.
    pub fn convert(self: &Arc<Self>, document: SourceDocument, tool: ToolId) -> u64 {
        let generation = self.begin(document.clone(), tool.clone());

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let this = Arc::clone(self);
                runtime.spawn(async move {
                    // The outcome is already recorded in the job state.
                    let _outcome = this.run(generation, document, tool).await;
                });
            }
            Err(err) => {
                self.complete(
                    generation,
                    Err(ErrorDetail {
                        status_code: ErrorStatus::Label("runtime".into()),
                        message: format!("no async runtime available: {err}"),
                        body_text: None,
                    }),
                );
            }
        }

        generation
    }

    /// Run a job to completion on the calling task.
    ///
    /// The returned job reflects this request's own outcome even if a newer
    /// job superseded it meanwhile.
    pub async fn convert_and_wait(&self, document: SourceDocument, tool: ToolId) -> ConversionJob {
        let generation = self.begin(document.clone(), tool.clone());
        let outcome = self.run(generation, document.clone(), tool.clone()).await;
        let (status, result, error) = match outcome {
            Ok(resource) => (ConversionStatus::Succeeded, Some(resource), None),
            Err(detail) => (ConversionStatus::Failed, None, Some(detail)),
        };
        ConversionJob {
            generation,
            snapshot: document,
            tool,
            status,
            result,
            error,
        }
    }

    /// Return to idle. In-flight completions are discarded and the displayed PDF is released.
    pub fn reset(&self) {
        let mut state = mutex_lock(&self.state, SOURCE, "reset");
        state.generation += 1;
        state.job = None;
        release(state.displayed.take(), "reset");
    }

    pub fn generation(&self) -> u64 {
        mutex_lock(&self.state, SOURCE, "generation").generation
    }

    /// The current job, with its result attached when it succeeded.
    pub fn current_job(&self) -> Option<ConversionJob> {
        let state = mutex_lock(&self.state, SOURCE, "current_job");
        state.job.clone()
    }

    pub fn displayed(&self) -> Option<PdfResource> {
        mutex_lock(&self.state, SOURCE, "displayed").displayed.clone()
    }

    pub fn view(&self) -> ConversionView {
        let state = mutex_lock(&self.state, SOURCE, "view");
        ConversionView {
            generation: state.generation,
            tool: state.job.as_ref().map(|job| job.tool.clone()),
            status: state.job.as_ref().map(|job| job.status),
            error: state.job.as_ref().and_then(|job| job.error.clone()),
            resource: state.displayed.as_ref().map(|resource| ResourceInfo {
                id: resource.id,
                tool: resource.tool.clone(),
                bytes: resource.bytes.len(),
            }),
        }
    }

    fn begin(&self, snapshot: SourceDocument, tool: ToolId) -> u64 {
        let mut state = mutex_lock(&self.state, SOURCE, "begin");
        state.generation += 1;
        let generation = state.generation;
        state.job = Some(ConversionJob {
            generation,
            snapshot,
            tool: tool.clone(),
            status: ConversionStatus::Pending,
            result: None,
            error: None,
        });
        counter!("printcss_conversion_started_total").increment(1);
        info!(
            target = "printcss::conversion",
            generation,
            tool = %tool,
            "conversion requested"
        );
        generation
    }

    async fn run(
        &self,
        generation: u64,
        document: SourceDocument,
        tool: ToolId,
    ) -> Result<PdfResource, ErrorDetail> {
        let html = compose(&document, ComposeTarget::Export);
        let started = Instant::now();
        let reply = self.backend.generate_pdf(html, &tool).await;
        histogram!("printcss_conversion_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        let outcome = match reply {
            Ok(bytes) => Ok(PdfResource {
                id: Uuid::new_v4(),
                generation,
                tool,
                bytes,
            }),
            Err(err) => {
                warn!(
                    target = "printcss::conversion",
                    generation,
                    error = %err,
                    "conversion request failed"
                );
                Err(ErrorDetail::from(&err))
            }
        };
        self.complete(generation, outcome.clone());
        outcome
    }

    fn complete(&self, generation: u64, outcome: Result<PdfResource, ErrorDetail>) {
        let mut state = mutex_lock(&self.state, SOURCE, "complete");
        if state.generation != generation {
            counter!("printcss_conversion_discarded_total").increment(1);
            info!(
                target = "printcss::conversion",
                generation,
                current = state.generation,
                "conversion result discarded"
            );
            return;
        }

        let State { job, displayed, .. } = &mut *state;
        let Some(job) = job.as_mut() else {
            return;
        };

        match outcome {
            Ok(resource) => {
                counter!("printcss_conversion_succeeded_total").increment(1);
                info!(
                    target = "printcss::conversion",
                    generation,
                    tool = %resource.tool,
                    bytes = resource.bytes.len(),
                    "conversion succeeded"
                );
                job.status = ConversionStatus::Succeeded;
                job.result = Some(resource.clone());
                job.error = None;
                release(displayed.replace(resource), "superseded");
            }
            Err(detail) => {
                counter!("printcss_conversion_failed_total").increment(1);
                job.status = ConversionStatus::Failed;
                job.result = None;
                job.error = Some(detail);
                release(displayed.take(), "current job failed");
            }
        }
    }
}
