//! Debounced render scheduling.
//!
//! A single pending timer is kept. Every change aborts it and arms a new one;
//! when a timer survives its quiet period it renders the latest snapshot once.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::preview::PreviewTarget;
use crate::domain::document::SourceDocument;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::scheduler";

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(250);

pub struct RenderScheduler {
    target: Arc<PreviewTarget>,
    quiet_period: Duration,
    latest: Arc<Mutex<Option<SourceDocument>>>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl RenderScheduler {
    /// A zero `quiet_period` renders synchronously on every change.
    pub fn new(target: Arc<PreviewTarget>, quiet_period: Duration) -> Self {
        Self {
            target,
            quiet_period,
            latest: Arc::new(Mutex::new(None)),
            pending: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &Arc<PreviewTarget> {
        &self.target
    }

    /// Record a change and restart the quiet period.
    pub fn on_change(&self, document: SourceDocument) {
        if self.quiet_period.is_zero() {
            self.cancel();
            self.target.render(&document);
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!(
                    target = "printcss::scheduler",
                    "no async runtime; rendering immediately"
                );
                self.cancel();
                self.target.render(&document);
                return;
            }
        };

        *mutex_lock(&self.latest, SOURCE, "on_change") = Some(document);

        let mut pending = mutex_lock(&self.pending, SOURCE, "on_change");
        if let Some(previous) = pending.take() {
            previous.abort();
            trace!(target = "printcss::scheduler", "superseded pending render");
        }

        let latest = Arc::clone(&self.latest);
        let target = Arc::clone(&self.target);
        let quiet_period = self.quiet_period;
        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            let snapshot = mutex_lock(&latest, SOURCE, "expire").take();
            if let Some(document) = snapshot {
                target.render(&document);
            }
        }));
    }

    /// Render right now, dropping any pending timer.
    pub fn reload(&self, document: &SourceDocument) {
        self.cancel();
        self.target.render(document);
    }

    /// Abort the pending timer, if any. The aborted timer never renders.
    pub fn cancel(&self) {
        if let Some(previous) = mutex_lock(&self.pending, SOURCE, "cancel").take() {
            previous.abort();
        }
        mutex_lock(&self.latest, SOURCE, "cancel").take();
    }

    pub fn is_pending(&self) -> bool {
        mutex_lock(&self.pending, SOURCE, "is_pending")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::preview::{
        ComposePolicy,
        testing::{RecordingSurface, assets},
    };

    fn setup(quiet_ms: u64) -> (RenderScheduler, Arc<RecordingSurface>) {
        let target = Arc::new(PreviewTarget::new(assets(), ComposePolicy::Direct));
        let surface = Arc::new(RecordingSurface::default());
        target.mount(surface.clone());
        (
            RenderScheduler::new(target, Duration::from_millis(quiet_ms)),
            surface,
        )
    }

    fn doc(markup: &str) -> SourceDocument {
        SourceDocument::new(markup, "p{color:red}", "")
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    // Timers arm on first poll, so let spawned tasks run before moving the clock.
    async fn advance_ms(ms: u64) {
        settle().await;
        tokio::time::advance(Duration::from_millis(ms)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn edits_within_window_render_once_with_final_state() {
        let (scheduler, surface) = setup(250);

        scheduler.on_change(doc("<p>hi</p>"));
        advance_ms(100).await;
        scheduler.on_change(doc("<p>hi there</p>"));
        advance_ms(100).await;
        scheduler.on_change(doc("<p>hi there, reader</p>"));

        advance_ms(249).await;
        assert!(surface.writes().is_empty());
        assert!(scheduler.is_pending());

        advance_ms(2).await;
        let writes = surface.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains("<p>hi there, reader</p>"));
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn separate_windows_render_separately() {
        let (scheduler, surface) = setup(250);

        scheduler.on_change(doc("<p>one</p>"));
        advance_ms(300).await;
        scheduler.on_change(doc("<p>two</p>"));
        advance_ms(300).await;

        let writes = surface.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].contains("<p>one</p>"));
        assert!(writes[1].contains("<p>two</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn reload_renders_synchronously_and_cancels_timer() {
        let (scheduler, surface) = setup(250);

        scheduler.on_change(doc("<p>pending</p>"));
        scheduler.reload(&doc("<p>now</p>"));
        assert_eq!(surface.writes().len(), 1);

        advance_ms(500).await;
        let writes = surface.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains("<p>now</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (scheduler, surface) = setup(250);
        scheduler.on_change(doc("<p>x</p>"));
        scheduler.cancel();
        advance_ms(1_000).await;
        assert!(surface.writes().is_empty());
    }

    #[test]
    fn zero_quiet_period_renders_immediately() {
        let (scheduler, surface) = setup(0);
        scheduler.on_change(doc("<p>a</p>"));
        scheduler.on_change(doc("<p>b</p>"));
        assert_eq!(surface.writes().len(), 2);
    }
}
