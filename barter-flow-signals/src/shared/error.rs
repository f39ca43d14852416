use thiserror::Error;

/// Errors raised by the pipeline plumbing.
///
/// The analytics themselves never fail; these cover channels and I/O around them.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FlowError {
    #[error("analytics worker channel closed")]
    WorkerClosed,

    #[error("feed channel closed")]
    FeedClosed,

    #[error("failed to decode feed message: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl FlowError {
    /// Whether the pipeline cannot continue after this error
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            FlowError::WorkerClosed | FlowError::FeedClosed | FlowError::Io(_) => true,
            FlowError::Decode(_) => false,
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<std::io::Error> for FlowError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
