//! Typed, directional message endpoints.
//!
//! A [`Channel`] binds a name, an address and a [`TypeSpec`] to a
//! [`Transport`]. Sending serializes a [`Value`], frames it (splitting it
//! into fragments when large) and writes the frames; receiving reads frames
//! until a message is complete, learns type details from the header and
//! decodes. End of stream is an ordinary [`Recv::Eof`] outcome.
//!
//! [`TypeSpec`]: modelwire_types::TypeSpec
//! [`Transport`]: modelwire_transport::Transport
//! [`Value`]: modelwire_types::Value

pub mod channel;
pub mod config;
pub mod error;

pub use channel::{Channel, ChannelState, Direction, Recv, EOF_MSG};
pub use config::ChannelConfig;
pub use error::{ChannelError, Result};
