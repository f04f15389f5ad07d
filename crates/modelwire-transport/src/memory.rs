use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// In-process transport: one end of a connected pair.
///
/// Messages keep their boundaries. Dropping one end makes the other read
/// end of stream once the queued messages are drained.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Option<Sender<Vec<u8>>>,
    rx: Receiver<Vec<u8>>,
    read_timeout: Option<Duration>,
}

impl MemoryTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::channel();
        let (right_tx, left_rx) = mpsc::channel();
        (
            Self {
                tx: Some(left_tx),
                rx: left_rx,
                read_timeout: None,
            },
            Self {
                tx: Some(right_tx),
                rx: right_rx,
                read_timeout: None,
            },
        )
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Stop sending. The peer reads end of stream after what is queued.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(bytes.to_vec()).map_err(|_| TransportError::Closed)?;
        trace!(len = bytes.len(), "queued message");
        Ok(bytes.len())
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>> {
        match self.read_timeout {
            None => Ok(self.rx.recv().ok()),
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(RecvTimeoutError::Disconnected) => Ok(None),
                Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
            },
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
