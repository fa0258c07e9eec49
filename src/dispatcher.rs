// Single consumer of the receiver's notification stream. Applies every event
// to the trackers; the transport itself knows nothing about gates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::apps::AppProfile;
use crate::events::ReceiverEvent;
use crate::models::AppStatus;
use crate::playback::PlaybackStateTracker;
use crate::readiness::AppReadinessTracker;
use crate::receiver::ReceiverHandle;

#[derive(Debug)]
struct Trackers {
    playback: Arc<PlaybackStateTracker>,
    readiness: Mutex<Vec<Arc<AppReadinessTracker>>>,
    closed: AtomicBool,
}

impl Trackers {
    fn readiness(&self) -> MutexGuard<'_, Vec<Arc<AppReadinessTracker>>> {
        self.readiness.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_app_status(&self, status: &AppStatus) {
        for tracker in self.readiness().iter() {
            tracker.on_app_status(status);
        }
        self.playback.on_app_changed(status.app_id.clone());
    }

    fn close(&self) {
        let readiness = self.readiness();
        self.closed.store(true, Ordering::SeqCst);
        for tracker in readiness.iter() {
            tracker.close();
        }
        self.playback.close();
    }
}

/// Owns the notification task feeding one controller's trackers.
pub struct StatusDispatcher {
    receiver: Arc<dyn ReceiverHandle>,
    trackers: Arc<Trackers>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusDispatcher {
    /// Subscribe to `receiver` and start applying its events. The playback
    /// tracker is seeded from the receiver's current status. Must be called
    /// from within a tokio runtime.
    pub fn spawn(receiver: Arc<dyn ReceiverHandle>) -> Self {
        // Subscribe before taking the snapshot so nothing falls in between.
        let events = receiver.subscribe();
        let app = receiver.app_status();
        let playback = Arc::new(PlaybackStateTracker::new(
            receiver.media_status(),
            app.app_id.clone(),
        ));
        let trackers = Arc::new(Trackers {
            playback,
            readiness: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(Self::run(
            receiver.clone(),
            events,
            trackers.clone(),
            shutdown.clone(),
        ));

        Self {
            receiver,
            trackers,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn playback(&self) -> Arc<PlaybackStateTracker> {
        self.trackers.playback.clone()
    }

    /// Create a readiness tracker for `app` and start routing app status to
    /// it. Seeding and registration happen under the routing lock.
    pub fn track_app(&self, app: &AppProfile) -> Arc<AppReadinessTracker> {
        let mut readiness = self.trackers.readiness();
        let tracker = Arc::new(AppReadinessTracker::new(app, &self.receiver.app_status()));
        if self.trackers.closed.load(Ordering::SeqCst) {
            tracker.close();
        } else {
            readiness.push(tracker.clone());
        }
        tracker
    }

    pub fn untrack(&self, tracker: &Arc<AppReadinessTracker>) {
        self.trackers
            .readiness()
            .retain(|t| !Arc::ptr_eq(t, tracker));
    }

    async fn run(
        receiver: Arc<dyn ReceiverHandle>,
        mut events: broadcast::Receiver<ReceiverEvent>,
        trackers: Arc<Trackers>,
        shutdown: Arc<Notify>,
    ) {
        info!("Status dispatcher started.");
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.notified() => {
                    debug!("Status dispatcher received shutdown notification.");
                    break;
                }
                event = events.recv() => event,
            };

            match event {
                Ok(ReceiverEvent::AppStatus(status)) => {
                    trace!(app_id = ?status.app_id, text = ?status.status_text, "App status");
                    trackers.apply_app_status(&status);
                }
                Ok(ReceiverEvent::MediaStatus(status)) => {
                    trackers.playback.on_media_status(status);
                }
                Ok(ReceiverEvent::MdxSessionStatus { .. }) => {
                    // Consumed by the queue client on its own subscription.
                }
                Ok(ReceiverEvent::Disconnected) | Err(RecvError::Closed) => {
                    warn!("Receiver connection lost, closing trackers.");
                    break;
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Status dispatcher lagged, re-syncing from receiver.");
                    trackers.apply_app_status(&receiver.app_status());
                    trackers.playback.on_media_status(receiver.media_status());
                }
            }
        }
        // Nothing feeds the trackers any more; fail their waits instead of
        // leaving them parked forever.
        trackers.close();
        info!("Status dispatcher finished.");
    }

    /// Stop the notification task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.shutdown.notify_one();
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Status dispatcher task did not finish cleanly");
            }
        }
    }
}

impl Drop for StatusDispatcher {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}
