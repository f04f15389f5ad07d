use modelwire::frame::{format, parse, split, FrameConfig, FrameError, Header, HEAD_SEP};
use modelwire::{ScalarSubtype, TypeSpec};

#[test]
fn frame_roundtrip_for_boundary_sizes() {
    for size in [0usize, 1, 64 * 1024] {
        let body: Vec<u8> = (0..size).map(|i| i as u8).collect();
        let mut header = Header::new(size)
            .with_id(format!("m{size}"))
            .with_address("model_a:output")
            .with_datatype(TypeSpec::array_1d(ScalarSubtype::Uint, 8, Some(size)).unwrap());
        header.request_id = Some("req-1".to_string());

        let bytes = format(&header, &body, 4096).unwrap();
        let (head, rest) = split(&bytes).unwrap();
        assert_eq!(Header::from_json(head).unwrap(), header);
        assert_eq!(rest, body.as_slice());

        let config = FrameConfig::default();
        let frame = parse(&bytes, &config).unwrap();
        assert!(!frame.is_headerless());
        assert_eq!(frame.header, header);
        assert_eq!(frame.body.as_ref(), body.as_slice());
    }
}

#[test]
fn headerless_buffers() {
    let (head, body) = split(b"plain bytes").unwrap();
    assert!(head.is_empty());
    assert_eq!(body, b"plain bytes");

    let frame = parse(b"plain bytes", &FrameConfig::default()).unwrap();
    assert!(frame.is_headerless());
    assert_eq!(frame.header.size, 11);
}

#[test]
fn unclosed_delimiter_is_a_protocol_error() {
    let mut bytes = HEAD_SEP.to_vec();
    bytes.extend_from_slice(br#"{"size":0}"#);
    assert!(matches!(split(&bytes), Err(FrameError::Protocol(_))));
}
