//! Message envelopes for modelwire.
//!
//! Every frame on the wire is:
//! - `YGG_MSG_HEAD`, a JSON [`Header`], `YGG_MSG_HEAD`
//! - the body bytes
//!
//! Oversized type descriptions move from the header into the body, and
//! large bodies are split into multipart fragments that a
//! [`MessageAssembler`] puts back together.

pub mod assembler;
pub mod codec;
pub mod error;
pub mod header;

pub use assembler::MessageAssembler;
pub use codec::{
    finalize_recv, format, format_fragments, parse, split, Frame, FrameConfig,
    DEFAULT_MAX_FRAGMENT, DEFAULT_MAX_HEADER, DEFAULT_MAX_MESSAGE, HEAD_SEP, TYPE_SEP,
};
pub use error::{FrameError, Result};
pub use header::{Header, MAX_ADDRESS_LEN, MAX_ID_LEN};
