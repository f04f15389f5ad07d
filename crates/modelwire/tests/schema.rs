#![cfg(feature = "schema")]

use std::sync::Arc;

use modelwire::schema::SchemaRegistry;
use modelwire::transport::{MemoryTransport, Transport};
use modelwire::types::Scalar;
use modelwire::{ArgList, Channel, ChannelError, Direction, ScalarSubtype, TypeSpec, Value};

const READING: &str = r#"{
    "type": "object",
    "properties": {
        "count": { "type": "integer", "precision": 32 }
    }
}"#;

fn registry() -> Arc<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.register_type_document("sensor", READING).unwrap();
    Arc::new(registry)
}

#[test]
fn channel_takes_type_from_registry() {
    let (left, right) = MemoryTransport::pair();
    let mut sender = Channel::new("sensor", Direction::Send, TypeSpec::any()).with_schema_registry(registry());
    sender.bind("memory://sensor").unwrap();
    sender.connect(left).unwrap();
    let mut receiver = Channel::new("sensor", Direction::Recv, TypeSpec::any()).with_schema_registry(registry());
    receiver.bind("memory://sensor").unwrap();
    receiver.connect(right).unwrap();

    assert!(sender.datatype().is_initialized());
    sender.send_args(ArgList::new().with(Scalar::I32(12))).unwrap();
    let value = receiver.recv().unwrap().into_message().unwrap();
    assert_eq!(value.args().get(0).unwrap().as_scalar(), Some(&Scalar::I32(12)));
}

#[test]
fn invalid_bodies_are_rejected_on_both_ends() {
    let mut registry = SchemaRegistry::new();
    registry
        .register("sensor", r#"{"type":"object","properties":{"count":{"type":"integer","maximum":100}}}"#)
        .unwrap();
    let registry = Arc::new(registry);
    let spec = TypeSpec::json_object([(
        "count",
        TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap(),
    )])
    .unwrap();

    let (left, right) = MemoryTransport::pair();
    let mut sender = Channel::new("sensor", Direction::Send, spec.clone()).with_schema_registry(registry.clone());
    sender.bind("memory://sensor").unwrap();
    sender.connect(left).unwrap();
    let too_big = Value::new(spec.clone(), ArgList::new().with(Scalar::I32(500))).unwrap();
    assert!(matches!(sender.send(&too_big), Err(ChannelError::Schema(_))));

    let (mut raw, right_raw) = MemoryTransport::pair();
    drop(right);
    raw.write(br#"{"count":500}"#).unwrap();
    raw.write(br#"{"count":5}"#).unwrap();
    let mut receiver = Channel::new("sensor", Direction::Recv, spec).with_schema_registry(registry);
    receiver.bind("memory://sensor").unwrap();
    receiver.connect(right_raw).unwrap();
    assert!(matches!(receiver.recv(), Err(ChannelError::Schema(_))));
    assert!(receiver.recv().unwrap().into_message().is_some());
}
