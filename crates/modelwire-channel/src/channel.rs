use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
#[cfg(feature = "schema")]
use std::sync::Arc;
use std::time::Instant;

use modelwire_frame::{
    finalize_recv, format, format_fragments, parse, Header, MessageAssembler, MAX_ADDRESS_LEN,
};
use modelwire_transport::Transport;
use modelwire_types::{deserialize_into, ArgList, TypeSpec, Value};
use tracing::debug;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

/// Body of the end-of-stream message.
pub const EOF_MSG: &[u8] = b"EOF!!!";

/// Which way messages flow through a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Send => "send",
            Self::Recv => "recv",
        })
    }
}

/// Lifecycle of a channel: `Uninitialized -> Bound -> Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Constructed, no address yet.
    Uninitialized,
    /// Address resolved, no transport yet.
    Bound,
    /// Transport attached; messages can flow.
    Ready,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Bound => "bound",
            Self::Ready => "ready",
        })
    }
}

/// Outcome of a receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Recv<T = Value> {
    Message(T),
    /// The sender finished, or the transport closed between messages.
    Eof,
}

impl<T> Recv<T> {
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    pub fn into_message(self) -> Option<T> {
        match self {
            Self::Message(message) => Some(message),
            Self::Eof => None,
        }
    }
}

/// A named, directional endpoint carrying typed messages.
///
/// The channel owns its [`TypeSpec`]. A receiver learns unknown lengths,
/// shapes and generic slots from incoming headers; a sender whose type is
/// still generic adopts the type of the first value it sends.
///
/// Channels are `Send` but not `Sync`: use one per thread.
pub struct Channel<T> {
    name: String,
    address: Option<String>,
    direction: Direction,
    datatype: TypeSpec,
    state: ChannelState,
    transport: Option<T>,
    config: ChannelConfig,
    assembler: MessageAssembler,
    sent_eof: bool,
    recv_eof: bool,
    last_send: Option<Instant>,
    last_header: Option<Header>,
    next_id: u64,
    #[cfg(feature = "schema")]
    schema_registry: Option<Arc<modelwire_schema::SchemaRegistry>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T: Transport> Channel<T> {
    /// Create a channel with default configuration.
    pub fn new(name: impl Into<String>, direction: Direction, datatype: TypeSpec) -> Self {
        Self::with_config(name, direction, datatype, ChannelConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(
        name: impl Into<String>,
        direction: Direction,
        datatype: TypeSpec,
        config: ChannelConfig,
    ) -> Self {
        Self {
            name: name.into(),
            address: None,
            direction,
            datatype,
            state: ChannelState::Uninitialized,
            transport: None,
            assembler: MessageAssembler::new(config.frame.max_msg_size),
            config,
            sent_eof: false,
            recv_eof: false,
            last_send: None,
            last_header: None,
            next_id: 0,
            #[cfg(feature = "schema")]
            schema_registry: None,
            _not_sync: PhantomData,
        }
    }

    /// Attach a shared schema registry. Bodies are validated against the
    /// schema registered under the channel's name; a generic channel type
    /// is replaced by the registered type, if there is one.
    #[cfg(feature = "schema")]
    pub fn with_schema_registry(mut self, registry: Arc<modelwire_schema::SchemaRegistry>) -> Self {
        if matches!(self.datatype, TypeSpec::Any(None)) {
            if let Some(datatype) = registry.datatype(&self.name) {
                debug!(channel = %self.name, %datatype, "datatype from schema registry");
                self.datatype = datatype.clone();
            }
        }
        self.schema_registry = Some(registry);
        self
    }

    /// Record the resolved address. Addresses are opaque to the channel.
    pub fn bind(&mut self, address: impl Into<String>) -> Result<()> {
        if self.state != ChannelState::Uninitialized {
            return Err(ChannelError::State {
                operation: "bind",
                state: self.state,
            });
        }
        let address = address.into();
        if address.is_empty() {
            return Err(ChannelError::InvalidAddress("empty address".to_string()));
        }
        if address.len() > MAX_ADDRESS_LEN {
            return Err(ChannelError::InvalidAddress(format!(
                "{} bytes (max {MAX_ADDRESS_LEN})",
                address.len()
            )));
        }
        debug!(channel = %self.name, %address, "bound");
        self.address = Some(address);
        self.state = ChannelState::Bound;
        Ok(())
    }

    /// Attach the transport for the bound address.
    pub fn connect(&mut self, transport: T) -> Result<()> {
        if self.state != ChannelState::Bound {
            return Err(ChannelError::State {
                operation: "connect",
                state: self.state,
            });
        }
        debug!(channel = %self.name, transport = transport.name(), "ready");
        self.transport = Some(transport);
        self.state = ChannelState::Ready;
        Ok(())
    }

    /// Send one message.
    pub fn send(&mut self, value: &Value) -> Result<()> {
        let header = Header::default().with_id(self.next_message_id());
        self.send_message(value, header)
    }

    /// Send native arguments laid out by the channel's type.
    pub fn send_args(&mut self, args: ArgList) -> Result<()> {
        let value = Value::new(self.datatype.clone(), args)?;
        self.send(&value)
    }

    /// Send a request and return its request id. The receiver should answer
    /// on `response_address`, echoing the id.
    pub fn send_request(&mut self, value: &Value, response_address: &str) -> Result<String> {
        let id = self.next_message_id();
        let mut header = Header::default().with_id(id.clone());
        header.request_id = Some(id.clone());
        header.response_address = Some(response_address.to_string());
        self.send_message(value, header)?;
        Ok(id)
    }

    /// Answer the request with id `request_id`.
    pub fn send_response(&mut self, value: &Value, request_id: &str) -> Result<()> {
        let mut header = Header::default().with_id(self.next_message_id());
        header.request_id = Some(request_id.to_string());
        self.send_message(value, header)
    }

    /// Tell the receiver no more messages follow. Later calls do nothing.
    pub fn send_eof(&mut self) -> Result<()> {
        self.check_ready("send end of stream", Direction::Send)?;
        if self.sent_eof {
            return Ok(());
        }
        let header = Header::new(EOF_MSG.len())
            .with_id(self.next_message_id())
            .with_address(self.address.clone().unwrap_or_default());
        let frame = format(&header, EOF_MSG, self.config.frame.max_header_size)?;
        self.transport_mut("send end of stream")?.write(&frame)?;
        self.sent_eof = true;
        self.last_send = Some(Instant::now());
        debug!(channel = %self.name, "sent end of stream");
        Ok(())
    }

    /// Receive the next message, decoded with the channel's type.
    pub fn recv(&mut self) -> Result<Recv> {
        match self.next_payload()? {
            Some(payload) => Ok(Recv::Message(Value::from_bytes(
                self.datatype.clone(),
                &payload,
            )?)),
            None => Ok(Recv::Eof),
        }
    }

    /// Receive the next message into caller-supplied slots. On error the
    /// slots are unchanged.
    pub fn recv_into(&mut self, args: &mut ArgList) -> Result<Recv<()>> {
        match self.next_payload()? {
            Some(payload) => {
                deserialize_into(&self.datatype, &payload, args)?;
                Ok(Recv::Message(()))
            }
            None => Ok(Recv::Eof),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bound address, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// The channel's type, including anything learned so far.
    pub fn datatype(&self) -> &TypeSpec {
        &self.datatype
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Maximum message size in bytes.
    pub fn max_msg_size(&self) -> usize {
        self.config.frame.max_msg_size
    }

    pub fn sent_eof(&self) -> bool {
        self.sent_eof
    }

    pub fn recv_eof(&self) -> bool {
        self.recv_eof
    }

    /// When the last message (or end of stream) was sent.
    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    /// Header of the last message received, for its routing fields.
    pub fn last_header(&self) -> Option<&Header> {
        self.last_header.as_ref()
    }

    /// Detach the transport, if one is attached.
    pub fn into_transport(self) -> Option<T> {
        self.transport
    }

    fn send_message(&mut self, value: &Value, mut header: Header) -> Result<()> {
        self.check_ready("send", Direction::Send)?;
        if self.sent_eof {
            return Err(ChannelError::EofSent);
        }
        let max = self.config.frame.max_msg_size;
        let size = value.byte_len()?;
        if size > max {
            return Err(ChannelError::MessageTooLarge { size, max });
        }

        if self.datatype.is_initialized() {
            self.datatype.clone().reconcile(value.spec())?;
        } else {
            self.datatype.reconcile(value.spec())?;
            debug!(channel = %self.name, datatype = %self.datatype, "adopted datatype");
        }

        let body = value.to_bytes()?;
        if body.len() > max {
            return Err(ChannelError::MessageTooLarge {
                size: body.len(),
                max,
            });
        }
        #[cfg(feature = "schema")]
        self.validate_body(&body)?;

        header.size = body.len();
        header.address = self.address.clone().unwrap_or_default();
        header.datatype = Some(value.observed_spec()?);
        let frames = format_fragments(&header, &body, &self.config.frame)?;
        let transport = self.transport_mut("send")?;
        for frame in &frames {
            transport.write(frame)?;
        }
        self.last_send = Some(Instant::now());
        debug!(
            channel = %self.name,
            id = %header.id,
            size = body.len(),
            fragments = frames.len(),
            "sent message"
        );
        Ok(())
    }

    /// Read frames until a whole message body is in. `None` is end of stream.
    fn next_payload(&mut self) -> Result<Option<Vec<u8>>> {
        self.check_ready("receive", Direction::Recv)?;
        if self.recv_eof {
            return Ok(None);
        }
        loop {
            let Some(bytes) = self.transport_mut("receive")?.read()? else {
                self.recv_eof = true;
                if self.assembler.is_pending() {
                    let received = self.assembler.pending_len();
                    self.assembler.reset();
                    return Err(ChannelError::Protocol(format!(
                        "stream closed {received} bytes into a multipart message"
                    )));
                }
                debug!(channel = %self.name, "transport closed");
                return Ok(None);
            };

            let frame = parse(&bytes, &self.config.frame)?;
            let Some((mut header, body)) = self.assembler.push(frame)? else {
                continue;
            };
            if body == EOF_MSG {
                self.recv_eof = true;
                debug!(channel = %self.name, "received end of stream");
                return Ok(None);
            }

            let payload = finalize_recv(&mut header, body, &mut self.datatype)?;
            #[cfg(feature = "schema")]
            self.validate_body(&payload)?;
            debug!(channel = %self.name, id = %header.id, size = payload.len(), "received message");
            self.last_header = Some(header);
            return Ok(Some(payload));
        }
    }

    #[cfg(feature = "schema")]
    fn validate_body(&self, body: &[u8]) -> Result<()> {
        match &self.schema_registry {
            Some(registry) if !self.datatype.is_raw_body() => {
                registry.validate(&self.name, body)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn check_ready(&self, operation: &'static str, direction: Direction) -> Result<()> {
        if self.state != ChannelState::Ready {
            return Err(ChannelError::State {
                operation,
                state: self.state,
            });
        }
        if self.direction != direction {
            return Err(ChannelError::WrongDirection {
                operation,
                direction: self.direction,
            });
        }
        Ok(())
    }

    fn transport_mut(&mut self, operation: &'static str) -> Result<&mut T> {
        let state = self.state;
        self.transport
            .as_mut()
            .ok_or(ChannelError::State { operation, state })
    }

    fn next_message_id(&mut self) -> String {
        self.next_id += 1;
        format!("{}-{}", self.config.id_prefix(), self.next_id)
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("direction", &self.direction)
            .field("state", &self.state)
            .field("datatype", &self.datatype)
            .field("sent_eof", &self.sent_eof)
            .field("recv_eof", &self.recv_eof)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use modelwire_frame::FrameConfig;
    use modelwire_transport::MemoryTransport;
    use modelwire_types::{Scalar, ScalarSubtype, TypeError};

    use super::*;

    fn int_spec() -> TypeSpec {
        TypeSpec::json_scalar(ScalarSubtype::Int, 64).unwrap()
    }

    fn ready(name: &str, direction: Direction, datatype: TypeSpec, transport: MemoryTransport) -> Channel<MemoryTransport> {
        ready_with(name, direction, datatype, transport, ChannelConfig::default())
    }

    fn ready_with(
        name: &str,
        direction: Direction,
        datatype: TypeSpec,
        transport: MemoryTransport,
        config: ChannelConfig,
    ) -> Channel<MemoryTransport> {
        let mut channel = Channel::with_config(name, direction, datatype, config);
        channel.bind(format!("memory://{name}")).unwrap();
        channel.connect(transport).unwrap();
        channel
    }

    fn pair(datatype: TypeSpec) -> (Channel<MemoryTransport>, Channel<MemoryTransport>) {
        let (left, right) = MemoryTransport::pair();
        (
            ready("out", Direction::Send, datatype.clone(), left),
            ready("in", Direction::Recv, datatype, right),
        )
    }

    fn int_value(v: i64) -> Value {
        Value::new(int_spec(), ArgList::new().with(Scalar::I64(v))).unwrap()
    }

    #[test]
    fn lifecycle_is_enforced() {
        let (transport, _peer) = MemoryTransport::pair();
        let mut channel: Channel<MemoryTransport> = Channel::new("c", Direction::Send, int_spec());
        assert_eq!(channel.state(), ChannelState::Uninitialized);
        assert!(matches!(
            channel.send(&int_value(1)),
            Err(ChannelError::State { state: ChannelState::Uninitialized, .. })
        ));
        assert!(matches!(
            channel.bind(""),
            Err(ChannelError::InvalidAddress(_))
        ));
        channel.bind("memory://c").unwrap();
        assert_eq!(channel.address(), Some("memory://c"));
        assert!(matches!(channel.bind("again"), Err(ChannelError::State { .. })));
        channel.connect(transport).unwrap();
        assert_eq!(channel.state(), ChannelState::Ready);
    }

    #[test]
    fn direction_is_enforced() {
        let (mut sender, mut receiver) = pair(int_spec());
        assert!(matches!(
            sender.recv(),
            Err(ChannelError::WrongDirection { direction: Direction::Send, .. })
        ));
        assert!(matches!(
            receiver.send(&int_value(1)),
            Err(ChannelError::WrongDirection { direction: Direction::Recv, .. })
        ));
    }

    #[test]
    fn messages_arrive_in_order_then_eof() {
        let (mut sender, mut receiver) = pair(int_spec());
        assert!(sender.last_send().is_none());
        for v in [1, 2, 3] {
            sender.send(&int_value(v)).unwrap();
        }
        assert!(sender.last_send().is_some());
        sender.send_eof().unwrap();
        sender.send_eof().unwrap();
        assert!(sender.sent_eof());
        assert!(matches!(sender.send(&int_value(4)), Err(ChannelError::EofSent)));

        for v in [1, 2, 3] {
            let value = receiver.recv().unwrap().into_message().unwrap();
            assert_eq!(value.args().get(0).unwrap().as_scalar(), Some(&Scalar::I64(v)));
        }
        assert!(receiver.recv().unwrap().is_eof());
        assert!(receiver.recv_eof());
        assert!(receiver.recv().unwrap().is_eof());
    }

    #[test]
    fn closed_transport_is_eof() {
        let (mut sender, mut receiver) = pair(int_spec());
        sender.send(&int_value(9)).unwrap();
        drop(sender);
        assert!(matches!(receiver.recv().unwrap(), Recv::Message(_)));
        assert_eq!(receiver.recv().unwrap(), Recv::Eof);
    }

    #[test]
    fn generic_channels_learn_their_type() {
        let (mut sender, mut receiver) = pair(TypeSpec::any());
        sender.send(&int_value(5)).unwrap();
        assert_eq!(sender.datatype(), &TypeSpec::any_of(int_spec()));

        let value = receiver.recv().unwrap().into_message().unwrap();
        assert!(receiver.datatype().is_initialized());
        assert_eq!(value.args().get(0).unwrap().as_scalar(), Some(&Scalar::I64(5)));
    }

    #[test]
    fn sender_rejects_incompatible_values() {
        let (mut sender, _receiver) = pair(TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap());
        assert!(matches!(
            sender.send(&int_value(5)),
            Err(ChannelError::Type(TypeError::Incompatible { .. }))
        ));
    }

    #[test]
    fn send_args_uses_channel_type() {
        let (mut sender, mut receiver) = pair(int_spec());
        sender.send_args(ArgList::new().with(Scalar::I64(77))).unwrap();
        let mut args = ArgList::new().with(Scalar::I64(0));
        assert_eq!(receiver.recv_into(&mut args).unwrap(), Recv::Message(()));
        assert_eq!(args.get(0).unwrap().as_scalar(), Some(&Scalar::I64(77)));

        assert!(matches!(
            sender.send_args(ArgList::new()),
            Err(ChannelError::Type(TypeError::ArgCount { .. }))
        ));
    }

    #[test]
    fn request_and_response_routing() {
        let (mut sender, mut receiver) = pair(int_spec());
        let request_id = sender.send_request(&int_value(1), "memory://replies").unwrap();
        receiver.recv().unwrap();
        let header = receiver.last_header().unwrap();
        assert_eq!(header.request_id.as_deref(), Some(request_id.as_str()));
        assert_eq!(header.response_address.as_deref(), Some("memory://replies"));
        assert_eq!(header.address, "memory://out");

        sender.send_response(&int_value(2), "req-from-elsewhere").unwrap();
        receiver.recv().unwrap();
        let header = receiver.last_header().unwrap();
        assert_eq!(header.request_id.as_deref(), Some("req-from-elsewhere"));
        assert!(header.response_address.is_none());
    }

    #[test]
    fn id_prefix_is_configurable() {
        let (left, right) = MemoryTransport::pair();
        let config = ChannelConfig {
            id_prefix: Some("model_a".to_string()),
            ..ChannelConfig::default()
        };
        let mut sender = ready_with("out", Direction::Send, int_spec(), left, config);
        let mut receiver = ready("in", Direction::Recv, int_spec(), right);
        sender.send(&int_value(1)).unwrap();
        receiver.recv().unwrap();
        assert_eq!(receiver.last_header().unwrap().id, "model_a-1");
    }

    #[test]
    fn oversized_messages_are_rejected_before_writing() {
        let (left, mut right) = MemoryTransport::pair();
        right.set_read_timeout(Some(std::time::Duration::from_millis(10)));
        let config = ChannelConfig {
            frame: FrameConfig {
                max_msg_size: 16,
                ..FrameConfig::default()
            },
            ..ChannelConfig::default()
        };
        let spec = TypeSpec::array_1d(ScalarSubtype::Uint, 8, None).unwrap();
        let mut sender = ready_with("out", Direction::Send, spec.clone(), left, config);
        let value = Value::new(spec, ArgList::new().with_elements(&[0u8; 64]).with_size(64)).unwrap();
        assert!(matches!(
            sender.send(&value),
            Err(ChannelError::MessageTooLarge { size: 64, max: 16 })
        ));
        assert!(right.read().is_err());
    }

    #[test]
    fn size_limit_counts_used_text_not_buffer_capacity() {
        let (left, right) = MemoryTransport::pair();
        let config = ChannelConfig {
            frame: FrameConfig {
                max_msg_size: 64,
                ..FrameConfig::default()
            },
            ..ChannelConfig::default()
        };
        let spec = TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap();
        let mut reused = modelwire_types::ValueBuffer::growable();
        reused.copy_in(b"abc").unwrap();
        reused.append(&[b'z'; 4096]).unwrap();
        let args = ArgList::new()
            .with(modelwire_types::Arg::Buffer(reused))
            .with_size(3);
        let value = Value::new(spec.clone(), args).unwrap();

        let mut sender = ready_with("out", Direction::Send, spec.clone(), left, config);
        let mut receiver = ready("in", Direction::Recv, spec, right);
        sender.send(&value).unwrap();
        let got = receiver.recv().unwrap().into_message().unwrap();
        assert_eq!(got.args()[0].as_buffer().unwrap().as_slice(), b"abc");
        assert_eq!(got.args()[1].as_size(), Some(3));
    }

    #[test]
    fn multipart_messages_reassemble() {
        let (left, right) = MemoryTransport::pair();
        let config = ChannelConfig {
            frame: FrameConfig {
                max_fragment_size: 100,
                ..FrameConfig::default()
            },
            ..ChannelConfig::default()
        };
        let spec = TypeSpec::array_1d(ScalarSubtype::Float, 64, None).unwrap();
        let data: Vec<f64> = (0..200).map(f64::from).collect();
        let value = Value::new(spec.clone(), ArgList::new().with_elements(&data).with_size(200)).unwrap();

        let mut sender = ready_with("out", Direction::Send, spec.clone(), left, config.clone());
        let mut receiver = ready_with("in", Direction::Recv, spec, right, config);
        sender.send(&value).unwrap();
        let received = receiver.recv().unwrap().into_message().unwrap();
        let buffer = received.args().get(0).unwrap().as_buffer().unwrap();
        assert_eq!(buffer.to_elements::<f64>().unwrap(), data);
        assert_eq!(
            receiver.datatype(),
            &TypeSpec::array_1d(ScalarSubtype::Float, 64, Some(200)).unwrap()
        );
    }

    #[test]
    fn interleaved_fragments_are_a_protocol_error() {
        let config = FrameConfig {
            max_fragment_size: 8,
            ..FrameConfig::default()
        };
        let spec = TypeSpec::Direct;
        let first = format_fragments(&Header::default().with_id("a"), &[1u8; 20], &config).unwrap();
        let other = format_fragments(&Header::default().with_id("b"), &[2u8; 20], &config).unwrap();
        let whole = format_fragments(&Header::default().with_id("c").with_datatype(TypeSpec::Direct), b"fine", &config).unwrap();

        let (mut raw, right) = MemoryTransport::pair();
        raw.write(&first[0]).unwrap();
        raw.write(&other[1]).unwrap();
        raw.write(&whole[0]).unwrap();

        let mut receiver = ready_with(
            "in",
            Direction::Recv,
            spec,
            right,
            ChannelConfig {
                frame: config,
                ..ChannelConfig::default()
            },
        );
        assert!(matches!(receiver.recv(), Err(ChannelError::Protocol(_))));
        let value = receiver.recv().unwrap().into_message().unwrap();
        assert_eq!(value.to_bytes().unwrap(), b"fine");
    }

    #[test]
    fn stream_closing_mid_message_is_a_protocol_error() {
        let config = FrameConfig {
            max_fragment_size: 8,
            ..FrameConfig::default()
        };
        let frames = format_fragments(&Header::default().with_id("a"), &[1u8; 20], &config).unwrap();
        let (mut raw, right) = MemoryTransport::pair();
        raw.write(&frames[0]).unwrap();
        drop(raw);

        let mut receiver = ready("in", Direction::Recv, TypeSpec::Direct, right);
        assert!(matches!(receiver.recv(), Err(ChannelError::Protocol(_))));
        assert!(receiver.recv().unwrap().is_eof());
    }

    #[test]
    fn headerless_bodies_use_the_channel_type() {
        let (mut raw, right) = MemoryTransport::pair();
        raw.write(b"42").unwrap();
        raw.write(b"EOF!!!").unwrap();
        let mut receiver = ready("in", Direction::Recv, int_spec(), right);
        let value = receiver.recv().unwrap().into_message().unwrap();
        assert_eq!(value.args().get(0).unwrap().as_scalar(), Some(&Scalar::I64(42)));
        assert!(receiver.recv().unwrap().is_eof());
    }

    #[test]
    fn decode_errors_leave_the_channel_usable() {
        let (mut raw, right) = MemoryTransport::pair();
        raw.write(b"\"not a number\"").unwrap();
        raw.write(b"7").unwrap();
        let mut receiver = ready("in", Direction::Recv, int_spec(), right);
        assert!(matches!(receiver.recv(), Err(ChannelError::Type(TypeError::Decode { .. }))));
        assert!(matches!(receiver.recv().unwrap(), Recv::Message(_)));
    }
}
