use modelwire_types::TypeError;

/// Errors that can occur while building, splitting or assembling frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header is not valid JSON, misses required fields or breaks a
    /// field bound.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Even without its type description the header exceeds the limit.
    #[error("header too large ({size} bytes, max {max})")]
    HeaderTooLarge { size: usize, max: usize },

    /// The message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Frames arrived that cannot belong to one consistent message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The carried type description is invalid or conflicts with the
    /// receiver's type.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
