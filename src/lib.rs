mod apps;
pub use apps::{
    idle_by_player_state, idle_without_media_namespace, is_inactive, never_idle, AppProfile,
    IdlePredicate, Readiness, BACKDROP_APP_ID, DASHCAST_APP_ID, DASHCAST_READY_TEXT,
    DEFAULT_MEDIA_RECEIVER_ID, MEDIA_NAMESPACE, YOUTUBE_APP_ID,
};
mod commands;
pub use commands::{MediaLoad, QueueCommand, ReceiverCommand};
mod dispatcher;
pub use dispatcher::StatusDispatcher;
mod error;
pub use error::CastError;
mod events;
pub use events::ReceiverEvent;
mod gate;
pub use gate::EventGate;
mod lounge;
pub use lounge::{LoungeConfig, QueueProtocolClient};
mod models;
pub use models::{
    AppStatus, CastInfo, MediaStatus, PhaseSet, PlaybackPhase, Screen, ScreensResponse,
    StreamType,
};
mod playback;
pub use playback::PlaybackStateTracker;
mod readiness;
pub use readiness::AppReadinessTracker;
mod receiver;
pub use receiver::{event_channel, ReceiverHandle, StreamResolver, YoutubeIdResolver};
pub mod settings;
mod state;
pub use state::{QueueSession, QueueState};
mod utils;
pub use utils::{extract_session_fields, extract_session_token, extract_video_id, SessionFields};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use settings::SETTINGS;

/// Drives one app on an already-connected receiver: launches it, checks
/// it is in a state worth controlling, and forwards playback and queue
/// commands to it.
///
/// Status notifications are consumed by a background [`StatusDispatcher`]
/// task, so a controller must be created inside a tokio runtime.
///
/// # Logging
///
/// This library uses the `tracing` crate for logging. To enable logs, you'll need to
/// initialize a tracing subscriber in your application.
///
/// Example using `tracing_subscriber`:
/// ```no_run
/// use tracing::Level;
/// use tracing_subscriber::FmtSubscriber;
///
/// // Create a subscriber with the desired log level
/// let subscriber = FmtSubscriber::builder()
///     .with_max_level(Level::DEBUG) // Set to DEBUG, INFO, WARN, or ERROR
///     .finish();
///
/// // Initialize the global subscriber
/// tracing::subscriber::set_global_default(subscriber)
///     .expect("Failed to set tracing subscriber");
/// ```
///
/// The log levels control what information is displayed:
/// - `TRACE`: Every status notification and gate transition
/// - `DEBUG`: Lounge requests, queue state changes, status refreshes
/// - `INFO`: App launches, session bootstrap and teardown
/// - `WARN`: Rejected queue mutations, lagging notifications, ignored teardown failures
/// - `ERROR`: Failed bootstraps and mutations that failed after recovery
pub struct SessionController {
    receiver: Arc<dyn ReceiverHandle>,
    app: AppProfile,
    dispatcher: StatusDispatcher,
    readiness: Arc<AppReadinessTracker>,
    playback: Arc<PlaybackStateTracker>,
    queue: Option<QueueProtocolClient>,
    resolver: Box<dyn StreamResolver>,
}

impl SessionController {
    pub fn new(receiver: Arc<dyn ReceiverHandle>, app: AppProfile) -> Result<Self, CastError> {
        Self::with_lounge_config(receiver, app, LoungeConfig::default())
    }

    /// Like [`SessionController::new`], with explicit lounge endpoint settings
    /// for queue-capable apps.
    pub fn with_lounge_config(
        receiver: Arc<dyn ReceiverHandle>,
        app: AppProfile,
        config: LoungeConfig,
    ) -> Result<Self, CastError> {
        let dispatcher = StatusDispatcher::spawn(receiver.clone());
        let playback = dispatcher.playback();
        let readiness = dispatcher.track_app(&app);
        let queue = if app.queue_capable {
            Some(QueueProtocolClient::new(
                receiver.clone(),
                playback.clone(),
                config,
            )?)
        } else {
            None
        };
        debug!(app = %app.name, app_id = %app.app_id, "Session controller created");

        Ok(Self {
            receiver,
            app,
            dispatcher,
            readiness,
            playback,
            queue,
            resolver: Box::new(YoutubeIdResolver),
        })
    }

    pub fn with_resolver(mut self, resolver: Box<dyn StreamResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn app(&self) -> &AppProfile {
        &self.app
    }

    pub fn playback(&self) -> Arc<PlaybackStateTracker> {
        self.playback.clone()
    }

    pub fn queue_client(&self) -> Option<&QueueProtocolClient> {
        self.queue.as_ref()
    }

    // --- Preparation ---

    /// Make sure the target app is running and ready for commands.
    pub async fn prepare_for_playback(&self) -> Result<(), CastError> {
        self.readiness.launch(self.receiver.as_ref()).await
    }

    /// Make sure something is playing that can be controlled.
    pub async fn prepare_for_control(&self) -> Result<(), CastError> {
        self.check_active()?;
        self.refresh_status().await?;
        // Right after an app becomes active some receivers publish only half
        // of the content fields. One more round settles them.
        if self.playback.status().is_partial() {
            debug!("Media status incomplete, refreshing once more");
            self.refresh_status().await?;
        }

        let app_status = self.receiver.app_status();
        let media = self.playback.status();
        if self.active_profile(&app_status).is_idle(&app_status, &media) {
            return Err(CastError::precondition("Nothing is currently playing"));
        }
        Ok(())
    }

    /// Like [`SessionController::prepare_for_control`] without the idle check.
    pub async fn prepare_for_info(&self) -> Result<(), CastError> {
        self.check_active()?;
        self.refresh_status().await
    }

    fn check_active(&self) -> Result<(), CastError> {
        if is_inactive(&self.receiver.app_status()) {
            Err(CastError::precondition("Receiver is inactive"))
        } else {
            Ok(())
        }
    }

    /// Idle rules belong to whichever app is in front, which need not be ours.
    fn active_profile(&self, status: &AppStatus) -> AppProfile {
        match status.app_id.as_deref() {
            Some(id) if id == self.app.app_id => self.app.clone(),
            Some(id) => AppProfile::lookup(id, false).unwrap_or_else(|_| AppProfile::custom(id, id)),
            None => AppProfile::default_receiver(),
        }
    }

    async fn refresh_status(&self) -> Result<(), CastError> {
        let since = self.playback.updates();
        self.receiver.send(ReceiverCommand::GetMediaStatus).await?;
        if !self
            .playback
            .wait_for_update(since, SETTINGS.status_refresh_timeout)
            .await
        {
            debug!("No media status within the refresh timeout");
        }
        Ok(())
    }

    // --- Playback control ---

    pub async fn play(&self) -> Result<(), CastError> {
        self.receiver.send(ReceiverCommand::Play).await
    }

    pub async fn pause(&self) -> Result<(), CastError> {
        self.receiver.send(ReceiverCommand::Pause).await
    }

    /// Seek to `position` seconds. Live and unknown-length streams refuse.
    pub async fn seek(&self, position: f64) -> Result<(), CastError> {
        if !self.playback.status().is_seekable() {
            return Err(CastError::NotSeekable);
        }
        self.receiver
            .send(ReceiverCommand::Seek { position })
            .await
    }

    pub async fn rewind(&self, seconds: f64) -> Result<(), CastError> {
        let current = self.playback.status().current_time;
        self.seek((current - seconds).max(0.0)).await
    }

    pub async fn ffwd(&self, seconds: f64) -> Result<(), CastError> {
        let current = self.playback.status().current_time;
        self.seek(current + seconds).await
    }

    /// Jump to the end of the current stream.
    pub async fn skip(&self) -> Result<(), CastError> {
        let status = self.playback.status();
        match status.duration {
            Some(duration) if status.is_seekable() => self.seek(duration).await,
            _ => Err(CastError::NotSeekable),
        }
    }

    pub async fn volume(&self, level: f64) -> Result<(), CastError> {
        let level = level.clamp(0.0, 1.0);
        self.receiver
            .send(ReceiverCommand::SetVolume { level })
            .await
    }

    pub async fn volume_up(&self, delta: f64) -> Result<(), CastError> {
        let level = self.receiver.app_status().volume_level;
        self.volume(level + delta).await
    }

    pub async fn volume_down(&self, delta: f64) -> Result<(), CastError> {
        let level = self.receiver.app_status().volume_level;
        self.volume(level - delta).await
    }

    /// Stop the running app.
    ///
    /// With `idle_only` nothing happens unless the player is idle, so a late
    /// failure never tears down somebody else's session. With `force` a
    /// neutral app is launched first, as some apps ignore stop requests in
    /// certain states.
    pub async fn kill(&self, idle_only: bool, force: bool) -> Result<(), CastError> {
        let phase = self.playback.phase();
        if idle_only && !matches!(phase, PlaybackPhase::Idle | PlaybackPhase::Unknown) {
            debug!(%phase, "Not idle, leaving the app running");
            return Ok(());
        }

        if let Some(queue) = &self.queue {
            queue.terminate().await;
        }

        if force {
            let fallback = AppProfile::default_receiver();
            let tracker = self.dispatcher.track_app(&fallback);
            let launched = tracker.launch(self.receiver.as_ref()).await;
            self.dispatcher.untrack(&tracker);
            launched?;
        }

        info!(app_id = ?self.receiver.active_app_id(), "Stopping app");
        self.receiver.send(ReceiverCommand::Stop).await
    }

    // --- Waits & info ---

    /// Wait until the phase is one of `phases`, or with `invert` none of
    /// them. Returns `Ok(false)` on timeout.
    pub async fn wait_for<S: AsRef<str>>(
        &self,
        phases: &[S],
        invert: bool,
        timeout: Option<Duration>,
    ) -> Result<bool, CastError> {
        self.playback.wait_for(phases, invert, false, timeout).await
    }

    /// Block until the current item stops buffering or playing. Fails if it
    /// already has.
    pub async fn wait_for_playback_end(&self) -> Result<(), CastError> {
        let active: PhaseSet = [PlaybackPhase::Buffering, PlaybackPhase::Playing]
            .into_iter()
            .collect();
        self.playback
            .wait_for_set(active, true, true, None)
            .await
            .map(|_| ())
    }

    pub fn cast_info(&self) -> CastInfo {
        CastInfo::from_status(&self.receiver.app_status(), &self.playback.status())
    }

    /// Load a media URL. Queue-capable apps take video ids through
    /// [`SessionController::play_video`] instead.
    pub async fn play_media(&self, media: MediaLoad) -> Result<(), CastError> {
        if self.app.queue_capable {
            return Err(CastError::precondition(format!(
                "App \"{}\" plays videos by id, use play_video",
                self.app.name
            )));
        }
        info!(content_id = %media.content_id, "Loading media");
        self.receiver.send(ReceiverCommand::Load(media)).await
    }

    // --- Queue ---

    fn queue(&self) -> Result<&QueueProtocolClient, CastError> {
        self.queue.as_ref().ok_or_else(|| {
            CastError::precondition(format!(
                "App \"{}\" does not support queueing",
                self.app.name
            ))
        })
    }

    pub async fn add(&self, source: &str) -> Result<(), CastError> {
        let queue = self.queue()?;
        queue.add(&self.resolver.resolve(source)?).await
    }

    pub async fn add_next(&self, source: &str) -> Result<(), CastError> {
        let queue = self.queue()?;
        queue.add_next(&self.resolver.resolve(source)?).await
    }

    pub async fn remove(&self, source: &str) -> Result<(), CastError> {
        let queue = self.queue()?;
        queue.remove(&self.resolver.resolve(source)?).await
    }

    pub async fn clear(&self) -> Result<(), CastError> {
        self.queue()?.clear().await
    }

    pub async fn play_video(&self, source: &str) -> Result<(), CastError> {
        let queue = self.queue()?;
        queue.play_video(&self.resolver.resolve(source)?).await
    }

    pub async fn play_playlist<S: AsRef<str>>(&self, sources: &[S]) -> Result<(), CastError> {
        let queue = self.queue()?;
        let ids = sources
            .iter()
            .map(|source| self.resolver.resolve(source.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        queue.play_playlist(&ids).await
    }

    // --- Lifecycle ---

    /// Tear down the queue session and stop consuming notifications.
    pub async fn shutdown(&self) {
        if let Some(queue) = &self.queue {
            queue.terminate().await;
        }
        self.dispatcher.shutdown().await;
        info!(app = %self.app.name, "Session controller shut down");
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("app", &self.app.name)
            .field("app_id", &self.app.app_id)
            .field("ready", &self.readiness.is_ready())
            .field("phase", &self.playback.phase())
            .field("queue", &self.queue)
            .finish()
    }
}
