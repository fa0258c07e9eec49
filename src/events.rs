use crate::models::{AppStatus, MediaStatus};

// Typed messages published by the receiver's notification transport
#[derive(Debug, Clone)]
pub enum ReceiverEvent {
    /// Receiver status: active app, status text, volume.
    AppStatus(AppStatus),
    /// Media status of the active app.
    MediaStatus(MediaStatus),
    /// Reply to `ReceiverCommand::GetMdxSessionStatus` from the YouTube app.
    MdxSessionStatus { screen_id: String },
    /// The connection to the receiver is gone.
    Disconnected,
}

impl ReceiverEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ReceiverEvent::AppStatus(_) => "receiverStatus",
            ReceiverEvent::MediaStatus(_) => "mediaStatus",
            ReceiverEvent::MdxSessionStatus { .. } => "mdxSessionStatus",
            ReceiverEvent::Disconnected => "disconnected",
        }
    }
}
