use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CastError;

/// The five playback phases a receiver reports through media status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlaybackPhase {
    Idle,
    Buffering,
    Playing,
    Paused,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PlaybackPhase {
    pub const ALL: [PlaybackPhase; 5] = [
        PlaybackPhase::Unknown,
        PlaybackPhase::Idle,
        PlaybackPhase::Buffering,
        PlaybackPhase::Playing,
        PlaybackPhase::Paused,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackPhase::Unknown => "UNKNOWN",
            PlaybackPhase::Idle => "IDLE",
            PlaybackPhase::Buffering => "BUFFERING",
            PlaybackPhase::Playing => "PLAYING",
            PlaybackPhase::Paused => "PAUSED",
        }
    }

    fn bit(self) -> u8 {
        match self {
            PlaybackPhase::Unknown => 1,
            PlaybackPhase::Idle => 1 << 1,
            PlaybackPhase::Buffering => 1 << 2,
            PlaybackPhase::Playing => 1 << 3,
            PlaybackPhase::Paused => 1 << 4,
        }
    }
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackPhase {
    type Err = CastError;

    /// Phase names are matched exactly; anything else is a malformed wait.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlaybackPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| CastError::InvalidWait(format!("unknown playback phase \"{}\"", s)))
    }
}

/// A subset of the five phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseSet(u8);

impl PhaseSet {
    const FULL: u8 = 0b1_1111;

    pub fn empty() -> Self {
        PhaseSet(0)
    }

    pub fn all() -> Self {
        PhaseSet(Self::FULL)
    }

    pub fn contains(self, phase: PlaybackPhase) -> bool {
        self.0 & phase.bit() != 0
    }

    pub fn insert(&mut self, phase: PlaybackPhase) {
        self.0 |= phase.bit();
    }

    /// Every phase of the domain that is not in `self`.
    pub fn complement(self) -> Self {
        PhaseSet(!self.0 & Self::FULL)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = PlaybackPhase> {
        PlaybackPhase::ALL
            .into_iter()
            .filter(move |phase| self.contains(*phase))
    }

    /// Parse phase names, failing on the first unrecognised one.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, CastError> {
        let mut set = PhaseSet::empty();
        for name in names {
            set.insert(name.as_ref().parse()?);
        }
        Ok(set)
    }
}

impl FromIterator<PlaybackPhase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = PlaybackPhase>>(iter: I) -> Self {
        let mut set = PhaseSet::empty();
        for phase in iter {
            set.insert(phase);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamType {
    Buffered,
    Live,
    #[serde(other)]
    Other,
}

/// Receiver-level status: which app is in front and the device volume.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppStatus {
    pub app_id: Option<String>,
    pub status_text: Option<String>,
    /// Message namespaces the running app supports.
    pub namespaces: Vec<String>,
    pub volume_level: f64,
    pub volume_muted: bool,
}

impl AppStatus {
    pub fn supports_namespace(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|ns| ns == namespace)
    }
}

/// Media status as last reported by the running app. Replaced wholesale on
/// every notification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaStatus {
    pub player_state: PlaybackPhase,
    pub content_id: Option<String>,
    pub content_type: Option<String>,
    pub stream_type: Option<StreamType>,
    pub duration: Option<f64>,
    pub current_time: f64,
    pub title: Option<String>,
    pub thumb: Option<String>,
}

impl MediaStatus {
    /// A finite duration on a buffered (non-live) stream.
    pub fn is_seekable(&self) -> bool {
        let finite = self.duration.is_some_and(|d| d.is_finite() && d > 0.0);
        finite && self.stream_type == Some(StreamType::Buffered)
    }

    /// Whether the loaded content is audio or video. Custom apps use content
    /// types like "application/dash+xml", so only images are excluded.
    pub fn is_audiovideo(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.split('/').next().is_some_and(|major| major != "image"),
            None => false,
        }
    }

    /// Some receivers publish a status with only one of the content fields
    /// right after an app becomes active. Both arrive together once settled.
    pub fn is_partial(&self) -> bool {
        self.content_id.is_some() != self.content_type.is_some()
    }
}

/// Snapshot of what is playing, for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CastInfo {
    pub title: Option<String>,
    pub content_id: Option<String>,
    pub thumb: Option<String>,
    pub current_time: Option<f64>,
    pub duration: Option<f64>,
    pub remaining: Option<f64>,
    pub progress: Option<u8>,
    pub player_state: Option<PlaybackPhase>,
    pub volume_level: u8,
}

impl CastInfo {
    pub fn from_status(app: &AppStatus, media: &MediaStatus) -> Self {
        let mut info = CastInfo {
            title: media.title.clone(),
            content_id: media.content_id.clone(),
            thumb: media.thumb.clone(),
            volume_level: (app.volume_level.clamp(0.0, 1.0) * 100.0).round() as u8,
            ..Default::default()
        };

        if media.is_seekable() {
            let duration = media.duration.unwrap_or_default();
            let current = media.current_time;
            info.current_time = Some(current);
            info.duration = Some(duration);
            info.remaining = Some(duration - current);
            info.progress = Some(((current / duration) * 100.0).clamp(0.0, 100.0) as u8);
        }

        if media.is_audiovideo() {
            info.player_state = Some(media.player_state);
        }
        info
    }
}

// Response types for lounge API calls
#[derive(Debug, Deserialize)]
pub struct Screen {
    pub name: Option<String>,
    #[serde(rename = "screenId")]
    pub screen_id: String,
    #[serde(rename = "loungeToken")]
    pub lounge_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ScreensResponse {
    pub screens: Vec<Screen>,
}
