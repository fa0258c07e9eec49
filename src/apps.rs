// Catalogue of receiver apps and the per-family rules for readiness and idleness.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::models::{AppStatus, MediaStatus, PlaybackPhase};
use crate::CastError;

pub const DEFAULT_MEDIA_RECEIVER_ID: &str = "CC1AD845";
pub const YOUTUBE_APP_ID: &str = "233637DE";
pub const DASHCAST_APP_ID: &str = "84912283";
/// Idle screen shown when nothing runs on the receiver.
pub const BACKDROP_APP_ID: &str = "E8C28D3C";

pub const MEDIA_NAMESPACE: &str = "urn:x-cast:com.google.cast.media";
/// Status text DashCast publishes once it accepts commands.
pub const DASHCAST_READY_TEXT: &str = "Application ready";

lazy_static! {
    static ref APP_ID_RE: Regex = Regex::new(r"^[0-9A-F]{8}$").unwrap();
}

/// Decides whether an app counts as idle given the current statuses.
pub type IdlePredicate = fn(&AppStatus, &MediaStatus) -> bool;

/// IDLE or UNKNOWN player state means nothing is playing.
pub fn idle_by_player_state(_app: &AppStatus, media: &MediaStatus) -> bool {
    matches!(
        media.player_state,
        PlaybackPhase::Idle | PlaybackPhase::Unknown
    )
}

/// For apps that never populate the phase fields while running.
pub fn never_idle(_app: &AppStatus, _media: &MediaStatus) -> bool {
    false
}

/// An app without the media namespace cannot be playing anything; otherwise
/// fall back to the player state.
pub fn idle_without_media_namespace(app: &AppStatus, media: &MediaStatus) -> bool {
    !app.supports_namespace(MEDIA_NAMESPACE) || idle_by_player_state(app, media)
}

/// How an app announces that it can take commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Ready as soon as it is the active app.
    AppId,
    /// Active several seconds before it is usable; ready only once the status
    /// text equals the given sentinel.
    StatusText(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppProfile {
    pub name: String,
    pub app_id: String,
    pub readiness: Readiness,
    pub idle: IdlePredicate,
    pub queue_capable: bool,
    /// Relaunch even when already active.
    pub force_launch: bool,
}

impl AppProfile {
    pub fn default_receiver() -> Self {
        Self {
            name: "default".to_string(),
            app_id: DEFAULT_MEDIA_RECEIVER_ID.to_string(),
            readiness: Readiness::AppId,
            idle: idle_by_player_state,
            queue_capable: false,
            force_launch: false,
        }
    }

    pub fn youtube() -> Self {
        Self {
            name: "youtube".to_string(),
            app_id: YOUTUBE_APP_ID.to_string(),
            readiness: Readiness::AppId,
            idle: idle_by_player_state,
            queue_capable: true,
            force_launch: false,
        }
    }

    pub fn dashcast() -> Self {
        Self {
            name: "dashcast".to_string(),
            app_id: DASHCAST_APP_ID.to_string(),
            readiness: Readiness::StatusText(DASHCAST_READY_TEXT),
            idle: never_idle,
            queue_capable: false,
            // Becomes unresponsive once a page is loaded.
            force_launch: true,
        }
    }

    /// A profile for an app outside the catalogue, using the default rules.
    pub fn custom(name: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_id: app_id.into(),
            ..Self::default_receiver()
        }
    }

    pub fn with_idle(mut self, idle: IdlePredicate) -> Self {
        self.idle = idle;
        self
    }

    fn catalogue() -> [AppProfile; 2] {
        [Self::youtube(), Self::dashcast()]
    }

    /// Resolve an app by id (eight upper-case hex digits) or by name.
    /// Unknown apps map to the default receiver unless `strict` is set.
    pub fn lookup(id_or_name: &str, strict: bool) -> Result<Self, CastError> {
        if id_or_name == "default" || id_or_name == DEFAULT_MEDIA_RECEIVER_ID {
            return Ok(Self::default_receiver());
        }

        let by_id = APP_ID_RE.is_match(id_or_name);
        let found = Self::catalogue().into_iter().find(|app| {
            if by_id {
                app.app_id == id_or_name
            } else {
                app.name == id_or_name
            }
        });

        match found {
            Some(app) => Ok(app),
            None if strict => Err(CastError::precondition(format!(
                "App \"{}\" not found",
                id_or_name
            ))),
            None => {
                warn!(app = id_or_name, "Unknown app, using the default receiver");
                Ok(Self::default_receiver())
            }
        }
    }

    pub fn is_idle(&self, app: &AppStatus, media: &MediaStatus) -> bool {
        (self.idle)(app, media)
    }
}

/// Whether the receiver is running nothing at all.
pub fn is_inactive(app: &AppStatus) -> bool {
    match app.app_id.as_deref() {
        None | Some("") => true,
        Some(id) => id == BACKDROP_APP_ID,
    }
}
