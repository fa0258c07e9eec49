/// Lifecycle of the lounge queue session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    NoSession,
    Bootstrapping,
    Active,
    /// A mutation was rejected; the session is being discarded and rebuilt.
    Expired,
}

/// Everything a live lounge session needs. Only ever built complete and
/// replaced as a whole; "no session" is `None` at the holder, never a
/// half-filled value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSession {
    pub screen_id: String,
    pub session_token: String,
    pub lounge_token: String,
    pub sid: String,
    pub gsession_id: String,
    /// Committed mutating requests since the session was bootstrapped.
    pub offset: u32,
    pub base_video_id: Option<String>,
    pub playlist_id: Option<String>,
}

impl QueueSession {
    /// Offset the next mutating request must carry.
    pub(crate) fn next_offset(&self) -> u32 {
        self.offset + 1
    }

    pub(crate) fn commit(&mut self) {
        self.offset += 1;
    }
}
