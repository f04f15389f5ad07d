use std::io::{ErrorKind, Read, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::packet::{decode_packet, encode_packet, PacketConfig};
use crate::traits::Transport;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Length-prefixed packets over any `Read + Write` stream.
///
/// Handles partial reads and writes internally. A clean close between
/// packets reads as end of stream; a close inside a packet is
/// [`TransportError::Truncated`].
pub struct StreamTransport<T> {
    inner: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    config: PacketConfig,
}

impl<T: Read + Write> StreamTransport<T> {
    /// Create a transport with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, PacketConfig::default())
    }

    /// Create a transport with explicit configuration.
    pub fn with_config(inner: T, config: PacketConfig) -> Self {
        Self {
            inner,
            read_buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            write_buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete packet (blocking).
    pub fn read_packet(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(packet) = decode_packet(&mut self.read_buf, self.config.max_packet_size)? {
                trace!(len = packet.len(), "read packet");
                return Ok(Some(packet));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Err(TransportError::Timeout)
                }
                Err(err) => return Err(TransportError::Io(err)),
            };

            if read == 0 {
                return if self.read_buf.is_empty() {
                    Ok(None)
                } else {
                    Err(TransportError::Truncated)
                };
            }

            self.read_buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Encode and send one packet.
    pub fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_packet_size {
            return Err(TransportError::PacketTooLarge {
                size: payload.len(),
                max: self.config.max_packet_size,
            });
        }

        self.write_buf.clear();
        encode_packet(payload, &mut self.write_buf)?;

        let mut offset = 0usize;
        while offset < self.write_buf.len() {
            match self.inner.write(&self.write_buf[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    return Err(TransportError::Closed)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        trace!(len = payload.len(), "wrote packet");

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &PacketConfig {
        &self.config
    }
}

#[cfg(unix)]
impl StreamTransport<std::os::unix::net::UnixStream> {
    /// Wrap a Unix stream and apply the configured timeouts.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: PacketConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

impl<T: Read + Write> Transport for StreamTransport<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.write_packet(bytes)?;
        Ok(bytes.len())
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        self.read_packet()
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

impl<T> std::fmt::Debug for StreamTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("buffered", &self.read_buf.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::packet::MAGIC;

    /// Read + Write over fixed input; writes are captured.
    #[derive(Debug, Default)]
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        step: Option<usize>,
    }

    impl Duplex {
        fn with_input(bytes: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(bytes),
                ..Self::default()
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let limit = self.step.unwrap_or(buf.len()).min(buf.len());
            self.input.read(&mut buf[..limit])
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = self.step.unwrap_or(buf.len()).min(buf.len());
            self.output.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_packet(payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn reads_packets_then_end_of_stream() {
        let mut transport = StreamTransport::new(Duplex::with_input(wire(&[b"one", b"two"])));
        assert_eq!(transport.read().unwrap().unwrap(), b"one");
        assert_eq!(transport.read().unwrap().unwrap(), b"two");
        assert!(transport.read().unwrap().is_none());
    }

    #[test]
    fn byte_by_byte_reads_and_writes() {
        let mut duplex = Duplex::with_input(wire(&[b"slow"]));
        duplex.step = Some(1);
        let mut transport = StreamTransport::new(duplex);
        assert_eq!(transport.read().unwrap().unwrap(), b"slow");

        assert_eq!(transport.write(b"back").unwrap(), 4);
        assert_eq!(transport.get_ref().output, wire(&[b"back"]));
    }

    #[test]
    fn close_mid_packet_is_truncation() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u32_le(16);
        partial.put_slice(b"only-part");
        let mut transport = StreamTransport::new(Duplex::with_input(partial.to_vec()));
        assert!(matches!(transport.read(), Err(TransportError::Truncated)));
    }

    #[test]
    fn oversized_write_is_rejected() {
        let config = PacketConfig {
            max_packet_size: 4,
            ..PacketConfig::default()
        };
        let mut transport = StreamTransport::with_config(Duplex::default(), config);
        assert!(matches!(
            transport.write(b"too long"),
            Err(TransportError::PacketTooLarge { size: 8, max: 4 })
        ));
        assert!(transport.get_ref().output.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = StreamTransport::new(left);
        let mut reader = StreamTransport::new(right);

        writer.write(b"ping").unwrap();
        assert_eq!(reader.read().unwrap().unwrap(), b"ping");

        drop(writer);
        assert!(reader.read().unwrap().is_none());
    }
}
