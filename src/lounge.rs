// Client for the YouTube Lounge queue protocol.
//
// There is no formal session API: a session is assembled by asking the
// receiver for its screen id, scraping a session token from a watch page,
// trading both for a lounge token and finally opening a playlist. Every
// queue mutation afterwards carries an offset the server tracks on its side;
// when a mutation is rejected the whole session is rebuilt once and the
// mutation retried once.

use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::commands::{QueueCommand, ReceiverCommand};
use crate::events::ReceiverEvent;
use crate::models::{PhaseSet, PlaybackPhase, ScreensResponse};
use crate::playback::PlaybackStateTracker;
use crate::receiver::ReceiverHandle;
use crate::settings::SETTINGS;
use crate::state::{QueueSession, QueueState};
use crate::utils::{extract_session_fields, extract_session_token, SessionFields};
use crate::CastError;

const BIND_PATH: &str = "/api/lounge/bc/bind";
const LOUNGE_TOKEN_PATH: &str = "/api/lounge/pairing/get_lounge_token_batch";
const EXPIRED_LOUNGE_TOKEN: &str = "Expired lounge id token";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const STEP_SCREEN_ID: &str = "screen id";
const STEP_WATCH_PAGE: &str = "watch page";
const STEP_LOUNGE_TOKEN: &str = "lounge token";
const STEP_SET_PLAYLIST: &str = "set playlist";
const STEP_RETRY: &str = "retry after rebuild";

/// Connection settings for the lounge endpoints.
#[derive(Debug, Clone)]
pub struct LoungeConfig {
    pub base_url: String,
    pub device_name: String,
    pub device_id: String,
    pub client: Option<Arc<Client>>,
}

impl Default for LoungeConfig {
    fn default() -> Self {
        Self {
            base_url: SETTINGS.lounge_base_url.clone(),
            device_name: SETTINGS.device_name.clone(),
            device_id: Uuid::new_v4().to_string(),
            client: None,
        }
    }
}

impl LoungeConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    pub fn with_client(mut self, client: Arc<Client>) -> Self {
        self.client = Some(client);
        self
    }
}

/// `params` value of playlist requests. Field order is part of the wire format.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistParams<'a> {
    video_id: &'a str,
    current_time: u32,
    current_index: u32,
}

impl<'a> PlaylistParams<'a> {
    fn json(video_id: &'a str) -> Result<String, CastError> {
        Ok(serde_json::to_string(&PlaylistParams {
            video_id,
            current_time: 5,
            current_index: 0,
        })?)
    }
}

#[derive(Debug, Default)]
struct Inner {
    session: Option<QueueSession>,
    /// Locally tracked queue, reset from the receiver on every bootstrap.
    queue: Vec<String>,
    /// Video the current session was bootstrapped with.
    seed_video_id: Option<String>,
}

/// Queue controller for the YouTube receiver app.
///
/// Mutating calls are serialised internally, but the lounge server only
/// accepts one writer per session: several clients mutating the same
/// session concurrently is not supported.
pub struct QueueProtocolClient {
    client: Arc<Client>,
    config: LoungeConfig,
    receiver: Arc<dyn ReceiverHandle>,
    playback: Arc<PlaybackStateTracker>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<QueueState>,
    rid: AtomicU32,
}

impl QueueProtocolClient {
    pub fn new(
        receiver: Arc<dyn ReceiverHandle>,
        playback: Arc<PlaybackStateTracker>,
        config: LoungeConfig,
    ) -> Result<Self, CastError> {
        let client = match config.client.clone() {
            Some(client) => client,
            None => Arc::new(
                Client::builder()
                    .timeout(SETTINGS.request_timeout)
                    .connect_timeout(SETTINGS.request_timeout)
                    .build()?,
            ),
        };
        let (state_tx, _) = watch::channel(QueueState::NoSession);

        Ok(Self {
            client,
            config,
            receiver,
            playback,
            inner: Mutex::new(Inner::default()),
            state_tx,
            rid: AtomicU32::new(rand::random_range(10_000..100_000)),
        })
    }

    pub fn state(&self) -> QueueState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn state_receiver(&self) -> watch::Receiver<QueueState> {
        self.state_tx.subscribe()
    }

    pub async fn session(&self) -> Option<QueueSession> {
        self.inner.lock().await.session.clone()
    }

    pub async fn queue(&self) -> Vec<String> {
        self.inner.lock().await.queue.clone()
    }

    fn set_state(&self, state: QueueState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Queue session state changed");
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn watch_url(&self, video_id: &str) -> String {
        format!("{}/watch?v={}", self.config.base_url, video_id)
    }

    fn next_rid(&self) -> String {
        self.rid.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn post(&self, path: &str, referer_video: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .header(ORIGIN, format!("{}/", self.config.base_url))
            .header(REFERER, self.watch_url(referer_video))
    }

    /// Query parameters shared by every bind request.
    fn bind_params(&self, lounge_token: &str) -> Vec<(&'static str, String)> {
        vec![
            ("device", "REMOTE_CONTROL".to_string()),
            ("id", self.config.device_id.clone()),
            ("name", self.config.device_name.clone()),
            ("mdx-version", "3".to_string()),
            ("loungeIdToken", lounge_token.to_string()),
            ("VER", "8".to_string()),
            ("v", "2".to_string()),
            ("t", "1".to_string()),
            ("ui", "1".to_string()),
            ("RID", self.next_rid()),
            ("CVER", "1".to_string()),
        ]
    }

    // --- Bootstrap ---

    /// Make sure a session is Active, bootstrapping with `video_id` if not.
    pub async fn start_session(&self, video_id: &str) -> Result<(), CastError> {
        let mut inner = self.inner.lock().await;
        self.ensure_session(&mut inner, video_id).await
    }

    async fn ensure_session(&self, inner: &mut Inner, video_id: &str) -> Result<(), CastError> {
        if inner.session.is_some() {
            return Ok(());
        }
        self.bootstrap(inner, video_id).await
    }

    async fn bootstrap(&self, inner: &mut Inner, video_id: &str) -> Result<(), CastError> {
        self.set_state(QueueState::Bootstrapping);
        inner.session = None;
        inner.queue.clear();
        inner.seed_video_id = Some(video_id.to_string());
        info!(video_id, "Bootstrapping queue session");

        match self.build_session(video_id).await {
            Ok(session) => {
                info!(
                    screen_id = %session.screen_id,
                    playlist_id = ?session.playlist_id,
                    base_video_id = ?session.base_video_id,
                    "Queue session established"
                );
                inner.queue = session.base_video_id.iter().cloned().collect();
                inner.session = Some(session);
                self.set_state(QueueState::Active);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Queue session bootstrap failed");
                self.set_state(QueueState::NoSession);
                Err(e)
            }
        }
    }

    async fn build_session(&self, video_id: &str) -> Result<QueueSession, CastError> {
        let screen_id = self.request_screen_id().await?;
        let session_token = self
            .fetch_session_token(video_id)
            .await
            .map_err(|e| e.during(STEP_WATCH_PAGE))?;
        let lounge_token = self
            .fetch_lounge_token(&screen_id, &session_token, video_id)
            .await
            .map_err(|e| e.during(STEP_LOUNGE_TOKEN))?;
        let fields = self
            .set_playlist(&lounge_token, video_id)
            .await
            .map_err(|e| e.during(STEP_SET_PLAYLIST))?;
        let (sid, gsession_id) = fields.required().map_err(|missing| {
            CastError::bootstrap(STEP_SET_PLAYLIST, format!("{} missing from response", missing))
        })?;

        Ok(QueueSession {
            screen_id,
            session_token,
            lounge_token,
            sid,
            gsession_id,
            offset: 0,
            base_video_id: fields.first_video_id,
            playlist_id: fields.playlist_id,
        })
    }

    /// Ask the receiver's YouTube app for its session status and wait for the
    /// screen id it carries. Unbounded: only a lost connection ends it.
    async fn request_screen_id(&self) -> Result<String, CastError> {
        let mut events = self.receiver.subscribe();
        self.receiver
            .send(ReceiverCommand::GetMdxSessionStatus)
            .await?;

        loop {
            match events.recv().await {
                Ok(ReceiverEvent::MdxSessionStatus { screen_id }) => {
                    if screen_id.is_empty() {
                        return Err(CastError::bootstrap(STEP_SCREEN_ID, "receiver sent an empty screen id"));
                    }
                    debug!(%screen_id, "Received screen id");
                    return Ok(screen_id);
                }
                Ok(ReceiverEvent::Disconnected) | Err(RecvError::Closed) => {
                    return Err(CastError::Transport(
                        "connection lost while waiting for the screen id".to_string(),
                    ));
                }
                Ok(other) => trace!(event = other.event_type(), "Skipping event while waiting for screen id"),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Missed receiver events while waiting for screen id");
                }
            }
        }
    }

    async fn fetch_session_token(&self, video_id: &str) -> Result<String, CastError> {
        let response = self.client.get(self.watch_url(video_id)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CastError::bootstrap(STEP_WATCH_PAGE, format!("HTTP {}", status)));
        }
        let page = response.text().await?;
        extract_session_token(&page)
            .ok_or_else(|| CastError::bootstrap(STEP_WATCH_PAGE, "no session token in page"))
    }

    async fn fetch_lounge_token(
        &self,
        screen_id: &str,
        session_token: &str,
        video_id: &str,
    ) -> Result<String, CastError> {
        let form = [("screen_ids", screen_id), ("session_token", session_token)];
        let response = self
            .post(LOUNGE_TOKEN_PATH, video_id)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // The screen id comes straight from the receiver; a 401 here
            // means the scraped session token is no good.
            return Err(CastError::bootstrap(
                STEP_LOUNGE_TOKEN,
                "session token is stale or invalid (HTTP 401)",
            ));
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CastError::bootstrap(
                STEP_LOUNGE_TOKEN,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let screens: ScreensResponse = serde_json::from_str(&body)?;
        screens
            .screens
            .into_iter()
            .next()
            .map(|screen| screen.lounge_token)
            .ok_or_else(|| CastError::bootstrap(STEP_LOUNGE_TOKEN, "no screens returned"))
    }

    /// Open a playlist starting at `video_id` and scrape the session fields
    /// from the response.
    async fn set_playlist(&self, lounge_token: &str, video_id: &str) -> Result<SessionFields, CastError> {
        let mut params = self.bind_params(lounge_token);
        params.push(("method", "setPlaylist".to_string()));
        params.push(("params", PlaylistParams::json(video_id)?));
        debug!(video_id, "Sending set playlist request");

        let response = self
            .post(BIND_PATH, video_id)
            .query(&params)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body("count=0")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::UNAUTHORIZED && body.contains(EXPIRED_LOUNGE_TOKEN) {
            return Err(CastError::bootstrap(STEP_SET_PLAYLIST, "lounge token expired"));
        }
        if !status.is_success() {
            return Err(CastError::bootstrap(STEP_SET_PLAYLIST, format!("HTTP {}", status)));
        }
        Ok(extract_session_fields(&body))
    }

    // --- Steady state ---

    async fn wait_until_not_buffering(&self) -> Result<(), CastError> {
        let buffering: PhaseSet = [PlaybackPhase::Buffering].into_iter().collect();
        if self.playback.phase() == PlaybackPhase::Buffering {
            debug!("Receiver is buffering, holding queue mutation");
        }
        self.playback
            .wait_for_set(buffering, true, false, None)
            .await
            .map(|_| ())
    }

    /// POST one delta request. Any non-2xx answer means the server no longer
    /// accepts this session.
    async fn post_mutation(
        &self,
        session: &QueueSession,
        command: &QueueCommand,
        offset: u32,
    ) -> Result<(), CastError> {
        let referer = session
            .base_video_id
            .as_deref()
            .or(command.video_id())
            .unwrap_or_default();
        let mut params = self.bind_params(&session.lounge_token);
        params.push(("SID", session.sid.clone()));
        params.push(("gsessionid", session.gsession_id.clone()));
        let body = serde_urlencoded::to_string(command.form_fields(offset))?;
        debug!(command = command.name(), offset, "Sending queue mutation");

        let response = self
            .post(BIND_PATH, referer)
            .query(&params)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        warn!(%status, body = %text, command = command.name(), "Queue mutation rejected");
        Err(CastError::StaleSession(status.as_u16()))
    }

    /// Apply one mutation against the Active session, with the single
    /// rebuild-and-retry recovery.
    async fn mutate(&self, inner: &mut Inner, command: QueueCommand) -> Result<(), CastError> {
        let guarded = command.video_id().is_some();

        let session = inner
            .session
            .clone()
            .ok_or_else(|| CastError::precondition("No queue session"))?;
        if guarded {
            self.wait_until_not_buffering().await?;
        }
        let first = self
            .post_mutation(&session, &command, session.next_offset())
            .await;
        let failure = match first {
            Ok(()) => {
                self.commit(inner, &command);
                return Ok(());
            }
            Err(e) => e,
        };

        // The server state is now the source of truth: fresh tokens, offset
        // back to zero, nothing replayed.
        warn!(error = %failure, command = command.name(), "Rebuilding queue session");
        self.set_state(QueueState::Expired);
        let seed = session
            .base_video_id
            .clone()
            .or_else(|| command.video_id().map(str::to_string))
            .or_else(|| inner.seed_video_id.clone())
            .ok_or_else(|| CastError::bootstrap(STEP_RETRY, "no video to rebuild the session with"))?;
        self.bootstrap(inner, &seed).await?;

        let session = inner
            .session
            .clone()
            .ok_or_else(|| CastError::bootstrap(STEP_RETRY, "session missing after rebuild"))?;
        if guarded {
            self.wait_until_not_buffering().await?;
        }
        match self
            .post_mutation(&session, &command, session.next_offset())
            .await
        {
            Ok(()) => {
                self.commit(inner, &command);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, command = command.name(), "Queue mutation failed after rebuild");
                inner.session = None;
                inner.queue.clear();
                self.set_state(QueueState::NoSession);
                Err(CastError::bootstrap(STEP_RETRY, e.to_string()))
            }
        }
    }

    fn commit(&self, inner: &mut Inner, command: &QueueCommand) {
        if let Some(session) = inner.session.as_mut() {
            session.commit();
            trace!(offset = session.offset, "Offset committed");
        }
        match command {
            QueueCommand::AddVideo { video_id } => inner.queue.push(video_id.clone()),
            QueueCommand::InsertVideo { video_id } => {
                let now_playing = self.playback.status().content_id;
                let at = now_playing
                    .and_then(|current| inner.queue.iter().position(|v| *v == current))
                    .map(|i| i + 1)
                    .unwrap_or_else(|| inner.queue.len().min(1));
                inner.queue.insert(at, video_id.clone());
            }
            QueueCommand::RemoveVideo { video_id } => inner.queue.retain(|v| v != video_id),
            QueueCommand::ClearPlaylist => inner.queue.clear(),
        }
    }

    /// Append a video to the end of the queue.
    pub async fn add(&self, video_id: &str) -> Result<(), CastError> {
        let mut inner = self.inner.lock().await;
        Self::reject_duplicate(&inner, video_id)?;
        self.wait_until_not_buffering().await?;
        self.ensure_session(&mut inner, video_id).await?;
        Self::reject_duplicate(&inner, video_id)?;
        self.mutate(
            &mut inner,
            QueueCommand::AddVideo {
                video_id: video_id.to_string(),
            },
        )
        .await
    }

    /// Queue a video to play right after the current one.
    pub async fn add_next(&self, video_id: &str) -> Result<(), CastError> {
        let mut inner = self.inner.lock().await;
        Self::reject_duplicate(&inner, video_id)?;
        self.wait_until_not_buffering().await?;
        self.ensure_session(&mut inner, video_id).await?;
        Self::reject_duplicate(&inner, video_id)?;
        self.mutate(
            &mut inner,
            QueueCommand::InsertVideo {
                video_id: video_id.to_string(),
            },
        )
        .await
    }

    /// Remove a video from the live queue. Needs an Active session: a fresh
    /// bootstrap would replace the receiver's playlist first.
    pub async fn remove(&self, video_id: &str) -> Result<(), CastError> {
        let mut inner = self.inner.lock().await;
        if inner.session.is_none() {
            return Err(CastError::precondition("No queue session to remove from"));
        }
        if !inner.queue.iter().any(|v| v == video_id) {
            return Err(CastError::precondition(format!(
                "Video \"{}\" is not in the queue",
                video_id
            )));
        }
        self.wait_until_not_buffering().await?;
        self.mutate(
            &mut inner,
            QueueCommand::RemoveVideo {
                video_id: video_id.to_string(),
            },
        )
        .await
    }

    pub async fn clear(&self) -> Result<(), CastError> {
        let mut inner = self.inner.lock().await;
        if inner.session.is_none() {
            let seed = inner
                .seed_video_id
                .clone()
                .ok_or_else(|| CastError::precondition("No queue session to clear"))?;
            self.bootstrap(&mut inner, &seed).await?;
        }
        self.mutate(&mut inner, QueueCommand::ClearPlaylist).await
    }

    fn reject_duplicate(inner: &Inner, video_id: &str) -> Result<(), CastError> {
        if inner.queue.iter().any(|v| v == video_id) {
            Err(CastError::precondition(format!(
                "Video \"{}\" is already in the queue",
                video_id
            )))
        } else {
            Ok(())
        }
    }

    /// Replace the playlist with `video_id`. Reuses the current tokens when a
    /// session is Active and falls back to a full bootstrap otherwise.
    pub async fn play_video(&self, video_id: &str) -> Result<(), CastError> {
        let mut inner = self.inner.lock().await;

        if let Some(current) = inner.session.clone() {
            let fields = self.set_playlist(&current.lounge_token, video_id).await;
            match fields.map(|f| (f.required(), f)) {
                Ok((Ok((sid, gsession_id)), fields)) => {
                    inner.session = Some(QueueSession {
                        sid,
                        gsession_id,
                        offset: 0,
                        base_video_id: fields.first_video_id,
                        playlist_id: fields.playlist_id,
                        ..current
                    });
                    inner.seed_video_id = Some(video_id.to_string());
                    inner.queue = vec![video_id.to_string()];
                    info!(video_id, "Playlist replaced");
                    return Ok(());
                }
                Ok((Err(missing), _)) => {
                    warn!(missing, "Set playlist response incomplete, rebuilding session");
                }
                Err(e) => warn!(error = %e, "Set playlist failed, rebuilding session"),
            }
        }

        self.bootstrap(&mut inner, video_id).await?;
        if inner.queue.is_empty() {
            inner.queue.push(video_id.to_string());
        }
        Ok(())
    }

    /// Play the first video and queue the rest.
    pub async fn play_playlist(&self, video_ids: &[String]) -> Result<(), CastError> {
        let (first, rest) = video_ids
            .split_first()
            .ok_or_else(|| CastError::precondition("Playlist is empty"))?;
        self.play_video(first).await?;
        for video_id in rest {
            self.add(video_id).await?;
        }
        Ok(())
    }

    /// Best-effort clear and terminate, then forget the session.
    pub async fn terminate(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.session.take() {
            info!(screen_id = %session.screen_id, "Terminating queue session");
            if let Err(e) = self
                .post_mutation(&session, &QueueCommand::ClearPlaylist, session.next_offset())
                .await
            {
                debug!(error = %e, "Clearing playlist on teardown failed (ignored)");
            }
            self.send_terminate(&session).await;
        }
        *inner = Inner::default();
        self.set_state(QueueState::NoSession);
    }

    async fn send_terminate(&self, session: &QueueSession) {
        let mut params = self.bind_params(&session.lounge_token);
        params.push(("SID", session.sid.clone()));
        params.push(("gsessionid", session.gsession_id.clone()));
        params.push(("TYPE", "terminate".to_string()));
        let referer = session.base_video_id.as_deref().unwrap_or_default();

        let res = self
            .post(BIND_PATH, referer)
            .query(&params)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body("")
            .send()
            .await;
        match res {
            Ok(response) if response.status().is_success() => {
                debug!("Terminate request successful.");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Terminate request failed (ignored)");
            }
            Err(e) => {
                warn!("Error sending terminate request (ignored): {}", e);
            }
        }
    }
}

impl std::fmt::Debug for QueueProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProtocolClient")
            .field("base_url", &self.config.base_url)
            .field("device_id", &self.config.device_id)
            .field("state", &self.state())
            .finish()
    }
}
