use crate::error::Result;

/// A bidirectional channel of whole byte messages.
///
/// `read` returns `Ok(None)` once the peer has closed gracefully, so callers
/// can tell end of stream apart from an I/O failure.
pub trait Transport {
    /// Send one message. Returns the number of payload bytes written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Receive the next message (blocking).
    fn read(&mut self) -> Result<Option<Vec<u8>>>;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str {
        "transport"
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).read()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).read()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
