//! Registry of conversion tools advertised by the remote service.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::remote::ConversionBackend;
use crate::domain::types::ToolId;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::tools";

#[derive(Debug, Default)]
struct RegistryState {
    tools: Vec<ToolId>,
    loaded: bool,
    last_error: Option<String>,
}

pub struct ToolRegistry {
    backend: Arc<dyn ConversionBackend>,
    state: Mutex<RegistryState>,
}

impl ToolRegistry {
    pub fn new(backend: Arc<dyn ConversionBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Query the remote service. On failure the set stays empty and the error is only logged.
    pub async fn fetch_tools(&self) -> Vec<ToolId> {
        let result = self.backend.supported_tools().await;
        let mut state = mutex_lock(&self.state, SOURCE, "fetch_tools");
        state.loaded = true;
        match result {
            Ok(tools) => {
                info!(
                    target = "printcss::tools",
                    count = tools.len(),
                    "supported tools loaded"
                );
                state.tools = tools;
                state.last_error = None;
            }
            Err(err) => {
                warn!(
                    target = "printcss::tools",
                    error = %err,
                    "failed to load supported tools"
                );
                state.tools.clear();
                state.last_error = Some(err.to_string());
            }
        }
        state.tools.clone()
    }

    /// Fetch in the background so startup never waits on the remote service.
    pub fn spawn_fetch(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.fetch_tools().await;
        })
    }

    pub fn tools(&self) -> Vec<ToolId> {
        mutex_lock(&self.state, SOURCE, "tools").tools.clone()
    }

    pub fn is_loaded(&self) -> bool {
        mutex_lock(&self.state, SOURCE, "is_loaded").loaded
    }

    pub fn last_error(&self) -> Option<String> {
        mutex_lock(&self.state, SOURCE, "last_error").last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::application::remote::BackendError;

    struct StaticBackend(Result<Vec<&'static str>, &'static str>);

    #[async_trait]
    impl ConversionBackend for StaticBackend {
        async fn supported_tools(&self) -> Result<Vec<ToolId>, BackendError> {
            match &self.0 {
                Ok(names) => names
                    .iter()
                    .map(|name| ToolId::new(*name).map_err(|e| BackendError::Decode(e.to_string())))
                    .collect(),
                Err(message) => Err(BackendError::transport(message)),
            }
        }

        async fn generate_pdf(&self, _html: String, _tool: &ToolId) -> Result<Bytes, BackendError> {
            Err(BackendError::transport("unused"))
        }
    }

    #[tokio::test]
    async fn registry_starts_empty_and_loads_tools() {
        let registry = Arc::new(ToolRegistry::new(Arc::new(StaticBackend(Ok(vec![
            "pagedjs",
            "weasyprint",
        ])))));
        assert!(!registry.is_loaded());
        assert!(registry.tools().is_empty());

        registry.spawn_fetch().await.expect("fetch task");
        assert!(registry.is_loaded());
        assert_eq!(
            registry.tools(),
            vec![
                ToolId::new("pagedjs").expect("tool"),
                ToolId::new("weasyprint").expect("tool")
            ]
        );
    }

    #[tokio::test]
    async fn registry_failure_leaves_set_empty() {
        let registry = ToolRegistry::new(Arc::new(StaticBackend(Err("connection refused"))));
        let tools = registry.fetch_tools().await;
        assert!(tools.is_empty());
        assert!(registry.is_loaded());
        assert!(
            registry
                .last_error()
                .is_some_and(|err| err.contains("connection refused"))
        );
    }
}
