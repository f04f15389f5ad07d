use modelwire_frame::FrameError;
use modelwire_transport::TransportError;
use modelwire_types::TypeError;

use crate::channel::{ChannelState, Direction};

/// Errors that can occur in channel operations.
///
/// Only [`Transport`](Self::Transport) failures leave the channel in doubt;
/// after any other error the channel is ready for the next message.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Header or framing error.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// Encode, decode or type reconciliation error.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// The message exceeds the channel's maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Frames that cannot form one consistent message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation is not allowed in the channel's current state.
    #[error("cannot {operation} while channel is {state}")]
    State {
        operation: &'static str,
        state: ChannelState,
    },

    /// The operation belongs to the other direction.
    #[error("cannot {operation} on a {direction} channel")]
    WrongDirection {
        operation: &'static str,
        direction: Direction,
    },

    /// The address cannot be used in a header.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// End of stream was already sent.
    #[error("end of stream already sent")]
    EofSent,

    /// Schema validation error.
    #[cfg(feature = "schema")]
    #[error("schema validation error: {0}")]
    Schema(#[from] modelwire_schema::SchemaError),
}

impl From<FrameError> for ChannelError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Protocol(message) => Self::Protocol(message),
            FrameError::MessageTooLarge { size, max } => Self::MessageTooLarge { size, max },
            FrameError::Type(err) => Self::Type(err),
            other => Self::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
