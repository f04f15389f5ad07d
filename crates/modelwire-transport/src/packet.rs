use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TransportError};

/// Packet header: magic (2) + length (4) = 6 bytes.
pub const PACKET_HEADER_SIZE: usize = 6;

/// Magic bytes: "MW" (0x4D 0x57).
pub const MAGIC: [u8; 2] = *b"MW";

/// Default maximum packet payload: 16 MiB.
pub const DEFAULT_MAX_PACKET: usize = 16 * 1024 * 1024;

/// Encode one packet into `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Payload         │
/// │ "MW"         │ (4B LE)   │ (Length bytes)  │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_packet(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::PacketTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(PACKET_HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one packet from the front of `src`.
///
/// Returns `Ok(None)` if `src` doesn't hold a complete packet yet. On success
/// the packet bytes are consumed.
pub fn decode_packet(src: &mut BytesMut, max_packet: usize) -> Result<Option<Vec<u8>>> {
    if src.len() < PACKET_HEADER_SIZE {
        return Ok(None);
    }
    if src[0..2] != MAGIC {
        return Err(TransportError::InvalidMagic);
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&src[2..6]);
    let payload_len = u32::from_le_bytes(len_bytes) as usize;
    if payload_len > max_packet {
        return Err(TransportError::PacketTooLarge {
            size: payload_len,
            max: max_packet,
        });
    }

    if src.len() < PACKET_HEADER_SIZE + payload_len {
        return Ok(None);
    }
    src.advance(PACKET_HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).to_vec()))
}

/// Configuration for packet transports.
#[derive(Debug, Clone)]
pub struct PacketConfig {
    /// Maximum packet payload in bytes. Default: 16 MiB.
    pub max_packet_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
