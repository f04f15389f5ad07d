use bytes::BytesMut;
use tracing::{debug, warn};

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::header::Header;

struct Pending {
    header: Header,
    body: BytesMut,
    next_fragment: usize,
}

/// Collects multipart fragments into complete message bodies.
///
/// Fragments of one message must arrive in order and are never interleaved
/// with another message. A frame that breaks this drops the message in
/// progress and is reported as [`FrameError::Protocol`]; the assembler is
/// then ready for a fresh message.
pub struct MessageAssembler {
    max_msg_size: usize,
    pending: Option<Pending>,
}

impl MessageAssembler {
    pub fn new(max_msg_size: usize) -> Self {
        Self {
            max_msg_size,
            pending: None,
        }
    }

    /// Whether a multipart message is partially received.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Bytes received so far for the message in progress.
    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, |pending| pending.body.len())
    }

    /// Drop any partially received message.
    pub fn reset(&mut self) {
        if let Some(pending) = self.pending.take() {
            warn!(
                id = %pending.header.id,
                received = pending.body.len(),
                size = pending.header.size,
                "dropping partial message"
            );
        }
    }

    /// Feed one frame. Returns the header and body once a message is complete.
    pub fn push(&mut self, frame: Frame) -> Result<Option<(Header, Vec<u8>)>> {
        let Frame { header, body, .. } = frame;

        let Some(mut pending) = self.pending.take() else {
            if !header.multipart {
                return Ok(Some((header, body.to_vec())));
            }
            if header.is_continuation() {
                return Err(FrameError::Protocol(format!(
                    "continuation fragment {:?} of {:?} without a first fragment",
                    header.fragment, header.id
                )));
            }
            if header.size > self.max_msg_size {
                return Err(FrameError::MessageTooLarge {
                    size: header.size,
                    max: self.max_msg_size,
                });
            }
            let mut buf = BytesMut::with_capacity(header.size);
            buf.extend_from_slice(&body);
            debug!(id = %header.id, size = header.size, "started multipart message");
            return self.settle(Pending {
                header,
                body: buf,
                next_fragment: 1,
            });
        };

        if !header.multipart || header.id != pending.header.id {
            let err = FrameError::Protocol(format!(
                "frame {:?} interrupts multipart message {:?}",
                header.id, pending.header.id
            ));
            self.pending = Some(pending);
            self.reset();
            return Err(err);
        }
        if header.fragment != Some(pending.next_fragment) || header.size != pending.header.size {
            let err = FrameError::Protocol(format!(
                "fragment {:?} of {:?} out of sequence (expected {})",
                header.fragment, header.id, pending.next_fragment
            ));
            self.pending = Some(pending);
            self.reset();
            return Err(err);
        }

        pending.body.extend_from_slice(&body);
        pending.next_fragment += 1;
        self.settle(pending)
    }

    fn settle(&mut self, pending: Pending) -> Result<Option<(Header, Vec<u8>)>> {
        let received = pending.body.len();
        let size = pending.header.size;
        if received > size {
            return Err(FrameError::Protocol(format!(
                "multipart message {:?} overran its size ({received} > {size})",
                pending.header.id
            )));
        }
        if received < size {
            self.pending = Some(pending);
            return Ok(None);
        }

        let Pending { mut header, body, .. } = pending;
        debug!(id = %header.id, size, "assembled multipart message");
        header.multipart = false;
        header.fragment = None;
        Ok(Some((header, body.to_vec())))
    }
}

impl std::fmt::Debug for MessageAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageAssembler")
            .field("max_msg_size", &self.max_msg_size)
            .field("pending", &self.pending_len())
            .finish()
    }
}
