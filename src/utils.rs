use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SESSION_TOKEN_RE: Regex = Regex::new(r#"XSRF_TOKEN\W*([^"'\\]+)"#).unwrap();
    static ref SID_RE: Regex = Regex::new(r#"\["c","([^"]*)""#).unwrap();
    static ref GSESSIONID_RE: Regex = Regex::new(r#"\["S","([^"]*)""#).unwrap();
    static ref PLAYLIST_ID_RE: Regex = Regex::new(r#"listId":"([^"]*)""#).unwrap();
    static ref FIRST_VIDEO_ID_RE: Regex = Regex::new(r#"firstVideoId":"([^"]*)""#).unwrap();
    static ref VIDEO_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
    static ref VIDEO_URL_RE: Regex =
        Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/)([A-Za-z0-9_-]{11})").unwrap();
}

/// Session fields scraped from a set-playlist (bind) response. Each field is
/// extracted independently; a missing one is `None`, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFields {
    pub sid: Option<String>,
    pub gsession_id: Option<String>,
    pub playlist_id: Option<String>,
    pub first_video_id: Option<String>,
}

impl SessionFields {
    /// The fields a session cannot run without, or the name of the first
    /// one that is missing.
    pub fn required(&self) -> Result<(String, String), &'static str> {
        let sid = self.sid.clone().ok_or("SID")?;
        let gsession_id = self.gsession_id.clone().ok_or("gsessionid")?;
        Ok((sid, gsession_id))
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

pub fn extract_session_fields(body: &str) -> SessionFields {
    SessionFields {
        sid: capture(&SID_RE, body),
        gsession_id: capture(&GSESSIONID_RE, body),
        playlist_id: capture(&PLAYLIST_ID_RE, body),
        first_video_id: capture(&FIRST_VIDEO_ID_RE, body),
    }
}

/// Session (XSRF) token embedded in a watch page.
pub fn extract_session_token(page: &str) -> Option<String> {
    capture(&SESSION_TOKEN_RE, page)
}

/// Video id from a bare id or a watch/short/embed URL.
pub fn extract_video_id(source: &str) -> Option<String> {
    let source = source.trim();
    if VIDEO_ID_RE.is_match(source) {
        return Some(source.to_string());
    }
    capture(&VIDEO_URL_RE, source)
}
