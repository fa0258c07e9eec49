#![allow(dead_code)]

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use cast_lounge_rs::{
    event_channel, AppStatus, CastError, MediaStatus, PlaybackPhase, ReceiverCommand, ReceiverEvent,
    ReceiverHandle, StreamType,
};

#[derive(Default)]
struct FakeState {
    app: AppStatus,
    media: MediaStatus,
    /// Status text an app publishes when launched.
    launch_text: HashMap<String, String>,
    screen_id: Option<String>,
    hold_launches: bool,
}

/// In-memory receiver. Commands are recorded and answered with the status
/// notifications a real device would publish.
pub struct FakeReceiver {
    state: Mutex<FakeState>,
    events: broadcast::Sender<ReceiverEvent>,
    sent: Mutex<Vec<ReceiverCommand>>,
    connected: AtomicBool,
}

impl FakeReceiver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            events: event_channel(),
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        })
    }

    /// A receiver already running `app_id` with `phase` media.
    pub fn running(app_id: &str, phase: PlaybackPhase) -> Arc<Self> {
        let fake = Self::new();
        {
            let mut state = fake.state.lock().unwrap();
            state.app = app(app_id);
            state.media = media(phase);
        }
        fake
    }

    pub fn handle(self: &Arc<Self>) -> Arc<dyn ReceiverHandle> {
        self.clone()
    }

    pub fn set_launch_text(&self, app_id: &str, text: &str) {
        self.state
            .lock()
            .unwrap()
            .launch_text
            .insert(app_id.to_string(), text.to_string());
    }

    pub fn set_screen_id(&self, screen_id: &str) {
        self.state.lock().unwrap().screen_id = Some(screen_id.to_string());
    }

    /// Record launches without publishing the resulting app status.
    pub fn hold_launches(&self) {
        self.state.lock().unwrap().hold_launches = true;
    }

    pub fn sent(&self) -> Vec<ReceiverCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self, name: &str) -> usize {
        self.sent().iter().filter(|c| c.name() == name).count()
    }

    pub fn push_app(&self, status: AppStatus) {
        self.state.lock().unwrap().app = status.clone();
        let _ = self.events.send(ReceiverEvent::AppStatus(status));
    }

    pub fn push_media(&self, status: MediaStatus) {
        self.state.lock().unwrap().media = status.clone();
        let _ = self.events.send(ReceiverEvent::MediaStatus(status));
    }

    pub fn push_phase(&self, phase: PlaybackPhase) {
        let mut status = self.state.lock().unwrap().media.clone();
        status.player_state = phase;
        self.push_media(status);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(ReceiverEvent::Disconnected);
    }

    fn launch(&self, app_id: &str) {
        let status = {
            let state = self.state.lock().unwrap();
            if state.hold_launches {
                return;
            }
            AppStatus {
                app_id: Some(app_id.to_string()),
                status_text: state.launch_text.get(app_id).cloned(),
                volume_level: state.app.volume_level,
                ..Default::default()
            }
        };
        self.push_app(status);
    }
}

impl ReceiverHandle for FakeReceiver {
    fn app_status(&self) -> AppStatus {
        self.state.lock().unwrap().app.clone()
    }

    fn media_status(&self) -> MediaStatus {
        self.state.lock().unwrap().media.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<ReceiverEvent> {
        self.events.subscribe()
    }

    fn send(&self, command: ReceiverCommand) -> BoxFuture<'_, Result<(), CastError>> {
        Box::pin(async move {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(CastError::Transport("fake receiver disconnected".to_string()));
            }
            self.sent.lock().unwrap().push(command.clone());

            match command {
                ReceiverCommand::Launch { app_id, .. } => self.launch(&app_id),
                ReceiverCommand::Stop => self.push_app(AppStatus::default()),
                ReceiverCommand::GetMediaStatus => {
                    let media = self.media_status();
                    self.push_media(media);
                }
                ReceiverCommand::GetMdxSessionStatus => {
                    let screen_id = self.state.lock().unwrap().screen_id.clone();
                    if let Some(screen_id) = screen_id {
                        let _ = self
                            .events
                            .send(ReceiverEvent::MdxSessionStatus { screen_id });
                    }
                }
                ReceiverCommand::SetVolume { level } => {
                    let mut status = self.app_status();
                    status.volume_level = level;
                    self.push_app(status);
                }
                _ => {}
            }
            Ok(())
        })
    }
}

pub fn app(app_id: &str) -> AppStatus {
    AppStatus {
        app_id: Some(app_id.to_string()),
        volume_level: 0.5,
        ..Default::default()
    }
}

pub fn media(phase: PlaybackPhase) -> MediaStatus {
    MediaStatus {
        player_state: phase,
        ..Default::default()
    }
}

/// A buffered two-minute video, 30 seconds in.
pub fn seekable_media(phase: PlaybackPhase) -> MediaStatus {
    MediaStatus {
        player_state: phase,
        content_id: Some("dQw4w9WgXcQ".to_string()),
        content_type: Some("video/mp4".to_string()),
        stream_type: Some(StreamType::Buffered),
        duration: Some(120.0),
        current_time: 30.0,
        title: Some("Test Video".to_string()),
        ..Default::default()
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
