//! Source buffer store.
//!
//! Owns the current [`SourceDocument`]. Every other component works on
//! cloned snapshots obtained through [`SourceStore::get`].

use std::sync::Mutex;

use tracing::{debug, warn};

use crate::domain::{
    document::{SourceDocument, SourceKind},
    error::ParseError,
};
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::store";

#[derive(Debug, Default)]
pub struct SourceStore {
    document: Mutex<SourceDocument>,
}

impl SourceStore {
    pub fn new(initial: SourceDocument) -> Self {
        Self {
            document: Mutex::new(initial),
        }
    }

    pub fn get(&self) -> SourceDocument {
        mutex_lock(&self.document, SOURCE, "get").clone()
    }

    /// Update exactly one buffer and return the resulting document.
    /// This is the only write path for interactive edits.
    pub fn set(&self, kind: SourceKind, text: impl Into<String>) -> SourceDocument {
        let text = text.into();
        debug!(
            target = "printcss::store",
            kind = %kind,
            len = text.len(),
            "source buffer updated"
        );
        let mut document = mutex_lock(&self.document, SOURCE, "set");
        *document.field_mut(kind) = text;
        document.clone()
    }

    /// Replace all three buffers at once (template load, import).
    pub fn replace_all(&self, document: SourceDocument) -> SourceDocument {
        *mutex_lock(&self.document, SOURCE, "replace_all") = document.clone();
        document
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        self.get().to_export_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<SourceDocument, ParseError> {
        SourceDocument::from_export_bytes(bytes)
    }

    /// Deserialize and replace everything. A malformed payload is logged and
    /// leaves the current buffers untouched.
    pub fn import(&self, bytes: &[u8]) -> Result<SourceDocument, ParseError> {
        match Self::deserialize(bytes) {
            Ok(document) => Ok(self.replace_all(document)),
            Err(err) => {
                warn!(
                    target = "printcss::store",
                    error = %err,
                    bytes = bytes.len(),
                    "import rejected; keeping current sources"
                );
                Err(err)
            }
        }
    }
}
