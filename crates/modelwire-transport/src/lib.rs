//! Byte-channel transports for modelwire.
//!
//! A [`Transport`] moves whole byte messages between two endpoints:
//! - [`StreamTransport`] over any `Read + Write` stream (pipes, sockets),
//!   with length-prefixed packets
//! - [`MemoryTransport`] between threads of one process
//! - [`UnixDomainSocket`] listener helpers (Unix only)
//!
//! This is the lowest I/O layer of modelwire. Addresses are opaque here;
//! resolving them is the caller's job.

pub mod error;
pub mod memory;
pub mod packet;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use packet::{decode_packet, encode_packet, PacketConfig, DEFAULT_MAX_PACKET, MAGIC, PACKET_HEADER_SIZE};
pub use stream::StreamTransport;
pub use traits::Transport;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
