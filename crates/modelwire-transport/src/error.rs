use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// A packet header did not start with the expected magic bytes.
    #[error("invalid packet magic (expected \"MW\")")]
    InvalidMagic,

    /// A packet exceeds the configured maximum size.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// The peer closed the stream in the middle of a packet.
    #[error("connection closed (incomplete packet)")]
    Truncated,

    /// The peer is gone; nothing more can be written.
    #[error("transport closed")]
    Closed,

    /// No packet arrived within the configured read timeout.
    #[error("timed out waiting for data")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, TransportError>;
