// Boundaries to the collaborators this crate drives but does not own:
// the connected receiver and the source-to-video-id resolver.

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::commands::ReceiverCommand;
use crate::events::ReceiverEvent;
use crate::models::{AppStatus, MediaStatus};
use crate::settings::SETTINGS;
use crate::utils::extract_video_id;
use crate::CastError;

/// An already-connected receiver. Discovery, address caching and the cast
/// transport itself live behind this trait.
pub trait ReceiverHandle: Send + Sync {
    /// Last receiver status seen by the transport.
    fn app_status(&self) -> AppStatus;

    /// Last media status seen by the transport.
    fn media_status(&self) -> MediaStatus;

    /// Subscribe to status notifications. Every subscriber sees every event
    /// published after the call.
    fn subscribe(&self) -> broadcast::Receiver<ReceiverEvent>;

    /// Send a command. A dead connection fails with `CastError::Transport`.
    fn send(&self, command: ReceiverCommand) -> BoxFuture<'_, Result<(), CastError>>;

    fn active_app_id(&self) -> Option<String> {
        self.app_status().app_id
    }
}

/// Event channel for transport implementations, sized from the
/// `EVENT_BUFFER_CAPACITY` setting.
pub fn event_channel() -> broadcast::Sender<ReceiverEvent> {
    let (tx, _) = broadcast::channel(SETTINGS.event_buffer_capacity);
    tx
}

/// Turns a user-supplied source into the video id used in queue payloads.
pub trait StreamResolver: Send + Sync {
    fn resolve(&self, source: &str) -> Result<String, CastError>;
}

/// Accepts bare video ids and the common YouTube URL shapes.
#[derive(Debug, Default, Clone, Copy)]
pub struct YoutubeIdResolver;

impl StreamResolver for YoutubeIdResolver {
    fn resolve(&self, source: &str) -> Result<String, CastError> {
        extract_video_id(source).ok_or_else(|| {
            CastError::precondition(format!("\"{}\" is not a YouTube video id or url", source))
        })
    }
}
