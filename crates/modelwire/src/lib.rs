//! Typed message marshaling for coupling models across processes.
//!
//! modelwire lets independently built programs exchange strongly typed
//! messages over plain byte channels. A type description travels with each
//! message, so receivers can learn lengths, shapes and generic types at
//! runtime.
//!
//! # Crate Structure
//!
//! - [`types`]: Runtime type model and type-directed serialization
//! - [`transport`]: Byte-channel transports (streams, in-memory, Unix sockets)
//! - [`frame`]: Header/body framing with multipart delivery
//! - [`channel`]: Typed, directional endpoints
//! - [`schema`]: JSON Schema validation of bodies (behind `schema` feature)
//! - [`logging`]: `tracing` subscriber bootstrap (behind `logging` feature)

/// Re-export type model and serialization.
pub mod types {
    pub use modelwire_types::*;
}

/// Re-export transport types.
pub mod transport {
    pub use modelwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use modelwire_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use modelwire_channel::*;
}

/// Re-export schema types (requires `schema` feature).
#[cfg(feature = "schema")]
pub mod schema {
    pub use modelwire_schema::*;
}

#[cfg(feature = "logging")]
pub mod logging;

pub use modelwire_channel::{Channel, ChannelConfig, ChannelError, Direction, Recv};
pub use modelwire_types::{ArgList, ScalarSubtype, TypeSpec, Value};
