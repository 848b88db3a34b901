//! Feeds writes to `index.html`, `style.css` and `script.js` in a directory into the session.

use std::{path::Path, sync::Arc};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::application::session::Session;
use crate::domain::document::SourceKind;

use super::error::InfraError;

/// Keeps the OS watcher alive together with the task draining its events.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl SourceWatcher {
    /// Load the files already present, then follow changes.
    pub async fn start(dir: &Path, session: Arc<Session>) -> Result<Self, InfraError> {
        let loaded = load_initial(dir, &session).await?;
        info!(
            target = "printcss::watch",
            dir = %dir.display(),
            loaded,
            "watching source directory"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver only goes away on shutdown.
            let _ = tx.send(res);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let task = tokio::spawn(async move {
            while let Some(res) = rx.recv().await {
                match res {
                    Ok(event) if is_write(&event.kind) => {
                        for path in &event.paths {
                            if let Err(err) = sync_file(&session, path).await {
                                warn!(
                                    target = "printcss::watch",
                                    path = %path.display(),
                                    error = %err,
                                    "failed to read changed source"
                                );
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(target = "printcss::watch", error = %err, "watch error"),
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for SourceWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Read every known source file in `dir` into the session. Missing files are skipped.
pub async fn load_initial(dir: &Path, session: &Session) -> Result<usize, InfraError> {
    let mut loaded = 0;
    for kind in SourceKind::ALL {
        let path = dir.join(kind.file_name());
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                session.store().set(kind, text);
                loaded += 1;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    if loaded > 0 {
        session.reload();
    }
    Ok(loaded)
}

/// Push the contents of `path` into its buffer when it maps to one and the text changed.
pub async fn sync_file(session: &Session, path: &Path) -> Result<Option<SourceKind>, InfraError> {
    let Some(kind) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(SourceKind::from_file_name)
    else {
        return Ok(None);
    };

    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        // Editors that save by rename briefly leave no file behind.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if session.document().field(kind) == text {
        return Ok(None);
    }

    debug!(target = "printcss::watch", kind = %kind, bytes = text.len(), "source changed on disk");
    session.edit(kind, text);
    Ok(Some(kind))
}
