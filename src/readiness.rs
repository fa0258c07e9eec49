use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace};

use crate::apps::{AppProfile, Readiness};
use crate::commands::ReceiverCommand;
use crate::gate::EventGate;
use crate::models::AppStatus;
use crate::receiver::ReceiverHandle;
use crate::CastError;

/// Tracks whether one target app is running and able to take commands.
#[derive(Debug)]
pub struct AppReadinessTracker {
    app_id: String,
    readiness: Readiness,
    force_launch: bool,
    ready: EventGate,
    closed: AtomicBool,
}

impl AppReadinessTracker {
    /// Pre-signalled when the target is already the active app, unless the
    /// app reports readiness through its status text: an id match alone says
    /// nothing about those.
    pub fn new(app: &AppProfile, current: &AppStatus) -> Self {
        let ready = EventGate::seeded(|| {
            app.readiness == Readiness::AppId && current.app_id.as_deref() == Some(&app.app_id)
        });
        Self {
            app_id: app.app_id.clone(),
            readiness: app.readiness,
            force_launch: app.force_launch,
            ready,
            closed: AtomicBool::new(false),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_set()
    }

    fn is_ready_in(&self, status: &AppStatus) -> bool {
        let id_matches = status.app_id.as_deref() == Some(self.app_id.as_str());
        match self.readiness {
            Readiness::AppId => id_matches,
            Readiness::StatusText(sentinel) => {
                id_matches && status.status_text.as_deref() == Some(sentinel)
            }
        }
    }

    pub(crate) fn on_app_status(&self, status: &AppStatus) {
        let ready = self.is_ready_in(status);
        trace!(app_id = %self.app_id, ready, "App status update");
        self.ready.set_to(ready);
    }

    /// The transport is gone. Wakes any launch in progress.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.ready.signal();
    }

    /// Start the target app unless it is already ready, then wait for it
    /// without a timeout. Only a transport failure ends the wait early.
    pub async fn launch(&self, receiver: &dyn ReceiverHandle) -> Result<(), CastError> {
        self.check_open()?;
        if self.ready.is_set() && !self.force_launch {
            debug!(app_id = %self.app_id, "App already ready");
            return Ok(());
        }

        if self.force_launch {
            self.ready.clear();
        }
        let mark = self.ready.mark();
        info!(app_id = %self.app_id, force = self.force_launch, "Launching app");
        receiver
            .send(ReceiverCommand::Launch {
                app_id: self.app_id.clone(),
                force: self.force_launch,
            })
            .await?;

        self.ready.wait_from(mark, None).await;
        self.check_open()?;
        info!(app_id = %self.app_id, "App ready");
        Ok(())
    }

    fn check_open(&self) -> Result<(), CastError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CastError::Transport(format!(
                "connection lost while waiting for app {}",
                self.app_id
            )))
        } else {
            Ok(())
        }
    }
}
