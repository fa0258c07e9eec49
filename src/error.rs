use thiserror::Error;

#[derive(Error, Debug)]
pub enum CastError {
    /// The receiver (or its notification transport) is gone. Fatal to the
    /// current command and never retried.
    #[error("Receiver unreachable: {0}")]
    Transport(String),

    #[error("Receiver app operation was interrupted")]
    Interrupted,

    #[error("Queue session could not be established ({step}): {reason}")]
    SessionBootstrapFailed { step: &'static str, reason: String },

    /// A mutating lounge request was rejected. Consumed by the queue client's
    /// single recovery cycle; public operations never return it.
    #[error("Queue session is stale (HTTP {0})")]
    StaleSession(u16),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Stream is not seekable")]
    NotSeekable,

    #[error("Invalid wait: {0}")]
    InvalidWait(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("URL encoding failed: {0}")]
    UrlEncodingFailed(#[from] serde_urlencoded::ser::Error),
}

impl CastError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        CastError::PreconditionFailed(msg.into())
    }

    pub(crate) fn bootstrap(step: &'static str, reason: impl Into<String>) -> Self {
        CastError::SessionBootstrapFailed {
            step,
            reason: reason.into(),
        }
    }

    /// Re-labels a failure inside a bootstrap step. Receiver transport errors
    /// and already-labelled failures pass through untouched.
    pub(crate) fn during(self, step: &'static str) -> Self {
        match self {
            e @ CastError::Transport(_) | e @ CastError::SessionBootstrapFailed { .. } => e,
            other => CastError::bootstrap(step, other.to_string()),
        }
    }

    /// Whether the error means the receiver itself can no longer be reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, CastError::Transport(_))
    }
}
