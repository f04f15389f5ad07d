use modelwire::frame::{format_fragments, FrameConfig, Header};
use modelwire::transport::{MemoryTransport, Transport};
use modelwire::{ArgList, Channel, ChannelConfig, ChannelError, Direction, TypeSpec, Value};

const KB: usize = 1024;

fn config() -> ChannelConfig {
    ChannelConfig {
        frame: FrameConfig {
            max_fragment_size: 100 * KB,
            ..FrameConfig::default()
        },
        ..ChannelConfig::default()
    }
}

fn payload() -> Vec<u8> {
    (0..300 * KB).map(|i| (i % 251) as u8).collect()
}

fn receiver(transport: MemoryTransport) -> Channel<MemoryTransport> {
    let mut channel = Channel::with_config("in", Direction::Recv, TypeSpec::Direct, config());
    channel.bind("memory://in").unwrap();
    channel.connect(transport).unwrap();
    channel
}

#[test]
fn large_message_splits_and_reassembles() {
    let body = payload();
    let frames = format_fragments(&Header::default().with_id("big"), &body, &config().frame).unwrap();
    assert_eq!(frames.len(), 3);
    for frame in &frames {
        assert!(frame.len() < 100 * KB + 4096);
    }

    let (left, right) = MemoryTransport::pair();
    let mut sender = Channel::with_config("out", Direction::Send, TypeSpec::Direct, config());
    sender.bind("memory://out").unwrap();
    sender.connect(left).unwrap();
    let mut receiver = receiver(right);

    let value = Value::new(TypeSpec::Direct, ArgList::new().with_text(&body)).unwrap();
    sender.send(&value).unwrap();
    let received = receiver.recv().unwrap().into_message().unwrap();
    assert_eq!(received.to_bytes().unwrap(), body);
}

#[test]
fn mismatched_fragment_id_is_a_protocol_error() {
    let body = payload();
    let first = format_fragments(&Header::default().with_id("first"), &body, &config().frame).unwrap();
    let second = format_fragments(&Header::default().with_id("second"), &body, &config().frame).unwrap();

    let (mut raw, right) = MemoryTransport::pair();
    raw.write(&first[0]).unwrap();
    raw.write(&second[1]).unwrap();
    for frame in &first {
        raw.write(frame).unwrap();
    }

    let mut receiver = receiver(right);
    assert!(matches!(receiver.recv(), Err(ChannelError::Protocol(_))));

    // The channel is not poisoned: the complete message still arrives.
    let received = receiver.recv().unwrap().into_message().unwrap();
    assert_eq!(received.to_bytes().unwrap(), body);
}

#[cfg(unix)]
#[test]
fn fragments_over_a_unix_socket() {
    use std::os::unix::net::UnixStream;

    use modelwire::transport::StreamTransport;

    let (a, b) = UnixStream::pair().unwrap();
    let body = payload();
    let sent = body.clone();
    let writer = std::thread::spawn(move || {
        let mut sender = Channel::with_config("out", Direction::Send, TypeSpec::Direct, config());
        sender.bind("unix://pair").unwrap();
        sender.connect(StreamTransport::new(a)).unwrap();
        let value = Value::new(TypeSpec::Direct, ArgList::new().with_text(&sent)).unwrap();
        sender.send(&value).unwrap();
        sender.send_eof().unwrap();
    });

    let mut receiver = Channel::with_config("in", Direction::Recv, TypeSpec::Direct, config());
    receiver.bind("unix://pair").unwrap();
    receiver.connect(StreamTransport::new(b)).unwrap();
    let received = receiver.recv().unwrap().into_message().unwrap();
    assert_eq!(received.to_bytes().unwrap(), body);
    assert!(receiver.recv().unwrap().is_eof());
    writer.join().unwrap();
}
