// Commands sent to the receiver over its native control channel
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverCommand {
    Launch { app_id: String, force: bool },
    Stop,
    GetMediaStatus,
    GetMdxSessionStatus,
    Play,
    Pause,
    Seek { position: f64 },
    SetVolume { level: f64 },
    Load(MediaLoad),
}

impl ReceiverCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ReceiverCommand::Launch { .. } => "LAUNCH",
            ReceiverCommand::Stop => "STOP",
            ReceiverCommand::GetMediaStatus => "GET_STATUS",
            ReceiverCommand::GetMdxSessionStatus => "getMdxSessionStatus",
            ReceiverCommand::Play => "PLAY",
            ReceiverCommand::Pause => "PAUSE",
            ReceiverCommand::Seek { .. } => "SEEK",
            ReceiverCommand::SetVolume { .. } => "SET_VOLUME",
            ReceiverCommand::Load(_) => "LOAD",
        }
    }
}

/// A media item for the default receiver to load.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaLoad {
    pub content_id: String,
    pub content_type: String,
    pub current_time: Option<f64>,
    pub title: Option<String>,
    pub thumb: Option<String>,
}

impl MediaLoad {
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            content_type: "video/mp4".to_string(),
            current_time: None,
            title: None,
            thumb: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn starting_at(mut self, seconds: f64) -> Self {
        self.current_time = Some(seconds);
        self
    }
}

// Mutations of the lounge queue. Each is posted as one delta request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCommand {
    AddVideo { video_id: String },
    InsertVideo { video_id: String },
    RemoveVideo { video_id: String },
    ClearPlaylist,
}

impl QueueCommand {
    pub fn name(&self) -> &'static str {
        match self {
            QueueCommand::AddVideo { .. } => "addVideo",
            QueueCommand::InsertVideo { .. } => "insertVideo",
            QueueCommand::RemoveVideo { .. } => "removeVideo",
            QueueCommand::ClearPlaylist => "clearPlaylist",
        }
    }

    pub fn video_id(&self) -> Option<&str> {
        match self {
            QueueCommand::AddVideo { video_id }
            | QueueCommand::InsertVideo { video_id }
            | QueueCommand::RemoveVideo { video_id } => Some(video_id),
            QueueCommand::ClearPlaylist => None,
        }
    }

    /// Form fields of the delta payload:
    /// `count=1&ofs=<offset>&req0__sc=<op>[&req0_videoId=<id>]`.
    pub fn form_fields(&self, offset: u32) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("count", "1".to_string()),
            ("ofs", offset.to_string()),
            ("req0__sc", self.name().to_string()),
        ];
        if let Some(video_id) = self.video_id() {
            fields.push(("req0_videoId", video_id.to_string()));
        }
        fields
    }
}
