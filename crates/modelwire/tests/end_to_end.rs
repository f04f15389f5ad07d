use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use modelwire::transport::MemoryTransport;
use modelwire::types::Scalar;
use modelwire::{ArgList, Channel, Direction, Recv, ScalarSubtype, TypeSpec, Value};

fn point_type() -> TypeSpec {
    TypeSpec::json_object([
        ("x", TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap()),
        ("y", TypeSpec::array_1d(ScalarSubtype::Float, 64, Some(3)).unwrap()),
    ])
    .unwrap()
}

fn point_value() -> Value {
    Value::new(
        point_type(),
        ArgList::new()
            .with(Scalar::I32(42))
            .with_elements(&[1.0f64, 2.0, 3.0]),
    )
    .unwrap()
}

#[test]
fn wire_json_has_expected_shape() {
    let value = point_value();
    let body = value.to_bytes().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["x", "y"]);
    assert_eq!(json["x"], serde_json::json!(42));

    let blob = STANDARD.decode(json["y"].as_str().unwrap()).unwrap();
    assert_eq!(blob.len(), 24);
    assert_eq!(&blob[..8], &1.0f64.to_le_bytes());

    let decoded = Value::from_bytes(point_type(), &body).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn point_crosses_a_channel() {
    let (left, right) = MemoryTransport::pair();
    let mut sender = Channel::new("model_a:output", Direction::Send, point_type());
    sender.bind("memory://a").unwrap();
    sender.connect(left).unwrap();
    let mut receiver = Channel::new("model_b:input", Direction::Recv, TypeSpec::any());
    receiver.bind("memory://b").unwrap();
    receiver.connect(right).unwrap();

    sender.send(&point_value()).unwrap();
    sender.send_eof().unwrap();

    let received = receiver.recv().unwrap().into_message().unwrap();
    assert_eq!(received.args(), point_value().args());
    assert_eq!(receiver.datatype(), &TypeSpec::any_of(point_type()));
    assert_eq!(receiver.recv().unwrap(), Recv::Eof);
}

#[test]
fn receiver_learns_text_length() {
    let text = TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap();
    let (left, right) = MemoryTransport::pair();
    let mut sender = Channel::new("out", Direction::Send, text.clone());
    sender.bind("memory://out").unwrap();
    sender.connect(left).unwrap();
    let mut receiver = Channel::new("in", Direction::Recv, text.clone());
    receiver.bind("memory://in").unwrap();
    receiver.connect(right).unwrap();

    for word in ["short", "a bit longer"] {
        let value = Value::new(text.clone(), ArgList::new().with_text(word)).unwrap();
        sender.send(&value).unwrap();
        let received = receiver.recv().unwrap().into_message().unwrap();
        let buffer = received.args().get(0).unwrap().as_buffer().unwrap();
        assert_eq!(buffer.as_slice(), word.as_bytes());
    }
}

#[cfg(unix)]
#[test]
fn point_crosses_a_unix_socket() {
    use std::os::unix::net::UnixStream;

    use modelwire::transport::StreamTransport;

    let (a, b) = UnixStream::pair().unwrap();
    let mut sender = Channel::new("out", Direction::Send, point_type());
    sender.bind("unix://pair").unwrap();
    sender.connect(StreamTransport::new(a)).unwrap();
    let mut receiver = Channel::new("in", Direction::Recv, point_type());
    receiver.bind("unix://pair").unwrap();
    receiver.connect(StreamTransport::new(b)).unwrap();

    sender.send(&point_value()).unwrap();
    drop(sender);

    let mut args = point_type().template_args().unwrap();
    assert_eq!(receiver.recv_into(&mut args).unwrap(), Recv::Message(()));
    assert_eq!(&args, point_value().args());
    assert!(receiver.recv().unwrap().is_eof());
}
