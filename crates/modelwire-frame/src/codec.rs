use std::borrow::Cow;

use bytes::Bytes;
use modelwire_types::TypeSpec;
use tracing::{debug, trace};

use crate::error::{FrameError, Result};
use crate::header::Header;

/// Delimits the header: `HEAD_SEP <header-json> HEAD_SEP <body>`.
pub const HEAD_SEP: &[u8] = b"YGG_MSG_HEAD";

/// Separates an embedded datatype from the payload in `type_in_data` bodies.
pub const TYPE_SEP: &[u8] = b"YGG_TYPE_SEP";

/// Default maximum header size, delimiters included: 4 KiB.
pub const DEFAULT_MAX_HEADER: usize = 4096;

/// Default maximum body bytes per fragment: 64 KiB.
pub const DEFAULT_MAX_FRAGMENT: usize = 64 * 1024;

/// Default maximum message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Size limits for framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum header bytes per frame, delimiters included. Default: 4 KiB.
    pub max_header_size: usize,
    /// Maximum body bytes per frame before a message goes multipart.
    /// Default: 64 KiB.
    pub max_fragment_size: usize,
    /// Maximum total body size of one message. Default: 16 MiB.
    pub max_msg_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_header_size: DEFAULT_MAX_HEADER,
            max_fragment_size: DEFAULT_MAX_FRAGMENT,
            max_msg_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// One parsed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub body: Bytes,
    headerless: bool,
}

impl Frame {
    /// True if the frame carried no header at all.
    pub fn is_headerless(&self) -> bool {
        self.headerless
    }
}

/// Build one frame.
///
/// If the header would exceed `max_header_size`, its datatype moves to the
/// front of the body (`type_in_data`); if it is still too large, this fails.
pub fn format(header: &Header, body: &[u8], max_header_size: usize) -> Result<Vec<u8>> {
    let json = header.to_json()?;
    if fits(&json, max_header_size) {
        return Ok(wrap(&json, body));
    }
    if header.datatype.is_none() || header.type_in_data {
        return Err(too_large(&json, max_header_size));
    }

    let mut header = header.clone();
    let body = embed_type(&mut header, body)?;
    let json = header.to_json()?;
    if !fits(&json, max_header_size) {
        return Err(too_large(&json, max_header_size));
    }
    Ok(wrap(&json, &body))
}

/// Build the frames for a whole message, splitting bodies larger than
/// `max_fragment_size` into multipart fragments.
///
/// `header.size` is set from `body`. Only the first fragment carries the
/// datatype; every fragment repeats the id.
pub fn format_fragments(header: &Header, body: &[u8], config: &FrameConfig) -> Result<Vec<Vec<u8>>> {
    if body.len() > config.max_msg_size {
        return Err(FrameError::MessageTooLarge {
            size: body.len(),
            max: config.max_msg_size,
        });
    }

    let mut header = Header {
        size: body.len(),
        multipart: false,
        fragment: None,
        ..header.clone()
    };
    let mut body = Cow::Borrowed(body);

    let probe = Header {
        multipart: true,
        fragment: Some(0),
        ..header.clone()
    };
    let probe_json = probe.to_json()?;
    if !fits(&probe_json, config.max_header_size) && !header.type_in_data {
        if header.datatype.is_none() {
            return Err(too_large(&probe_json, config.max_header_size));
        }
        body = Cow::Owned(embed_type(&mut header, &body)?);
        if body.len() > config.max_msg_size {
            return Err(FrameError::MessageTooLarge {
                size: body.len(),
                max: config.max_msg_size,
            });
        }
    }

    let fragment_size = config.max_fragment_size.max(1);
    if body.len() <= fragment_size {
        return Ok(vec![format(&header, &body, config.max_header_size)?]);
    }

    let mut frames = Vec::with_capacity(body.len().div_ceil(fragment_size));
    for (index, chunk) in body.chunks(fragment_size).enumerate() {
        let mut fragment = header.clone();
        fragment.multipart = true;
        fragment.fragment = Some(index);
        if index > 0 {
            fragment.datatype = None;
        }
        frames.push(format(&fragment, chunk, config.max_header_size)?);
    }
    debug!(
        id = %header.id,
        size = header.size,
        fragments = frames.len(),
        "split message into fragments"
    );
    Ok(frames)
}

/// Split a frame into header and body bytes.
///
/// Bytes that do not start with [`HEAD_SEP`] are a headerless body and come
/// back as `(b"", bytes)`. An opening delimiter without a closing one is a
/// protocol error.
pub fn split(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    let Some(rest) = bytes.strip_prefix(HEAD_SEP) else {
        return Ok((&[], bytes));
    };
    let end = find(rest, HEAD_SEP)
        .ok_or_else(|| FrameError::Protocol("header delimiter is not closed".to_string()))?;
    Ok((&rest[..end], &rest[end + HEAD_SEP.len()..]))
}

/// Split and parse a frame, checking the body against the header.
pub fn parse(bytes: &[u8], config: &FrameConfig) -> Result<Frame> {
    if !bytes.starts_with(HEAD_SEP) {
        trace!(len = bytes.len(), "headerless frame");
        return Ok(Frame {
            header: Header::new(bytes.len()),
            body: Bytes::copy_from_slice(bytes),
            headerless: true,
        });
    }

    let (head, body) = split(bytes)?;
    if head.len() + 2 * HEAD_SEP.len() > config.max_header_size {
        return Err(FrameError::HeaderTooLarge {
            size: head.len() + 2 * HEAD_SEP.len(),
            max: config.max_header_size,
        });
    }
    let header = Header::from_json(head)?;
    if header.size > config.max_msg_size {
        return Err(FrameError::MessageTooLarge {
            size: header.size,
            max: config.max_msg_size,
        });
    }
    if header.multipart {
        if body.len() > header.size {
            return Err(FrameError::Protocol(format!(
                "fragment of {} bytes exceeds message size {}",
                body.len(),
                header.size
            )));
        }
    } else if body.len() != header.size {
        return Err(FrameError::Protocol(format!(
            "body is {} bytes, header declares {}",
            body.len(),
            header.size
        )));
    }

    trace!(id = %header.id, size = header.size, fragment = ?header.fragment, "parsed frame");
    Ok(Frame {
        header,
        body: Bytes::copy_from_slice(body),
        headerless: false,
    })
}

/// Finish receiving a complete message body.
///
/// Recovers a datatype embedded in the body, then reconciles the header's
/// datatype into `spec`. Returns the payload bytes.
pub fn finalize_recv(header: &mut Header, body: Vec<u8>, spec: &mut TypeSpec) -> Result<Vec<u8>> {
    let body = if header.type_in_data {
        let at = find(&body, TYPE_SEP).ok_or_else(|| {
            FrameError::Protocol("type_in_data body has no type separator".to_string())
        })?;
        let schema: serde_json::Value = serde_json::from_slice(&body[..at])
            .map_err(|err| FrameError::MalformedHeader(format!("embedded datatype: {err}")))?;
        header.datatype = Some(TypeSpec::from_schema(&schema)?);
        header.type_in_data = false;
        let payload = body[at + TYPE_SEP.len()..].to_vec();
        header.size = payload.len();
        payload
    } else {
        body
    };

    if let Some(datatype) = &header.datatype {
        spec.reconcile(datatype)?;
    }
    Ok(body)
}

fn fits(json: &[u8], max_header_size: usize) -> bool {
    json.len() + 2 * HEAD_SEP.len() <= max_header_size
}

fn too_large(json: &[u8], max_header_size: usize) -> FrameError {
    FrameError::HeaderTooLarge {
        size: json.len() + 2 * HEAD_SEP.len(),
        max: max_header_size,
    }
}

fn wrap(json: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(json.len() + 2 * HEAD_SEP.len() + body.len());
    out.extend_from_slice(HEAD_SEP);
    out.extend_from_slice(json);
    out.extend_from_slice(HEAD_SEP);
    out.extend_from_slice(body);
    out
}

/// Move the header's datatype to the front of `body`.
fn embed_type(header: &mut Header, body: &[u8]) -> Result<Vec<u8>> {
    let Some(datatype) = header.datatype.take() else {
        return Ok(body.to_vec());
    };
    let schema = serde_json::to_vec(&datatype.to_schema())?;
    let mut out = Vec::with_capacity(schema.len() + TYPE_SEP.len() + body.len());
    out.extend_from_slice(&schema);
    out.extend_from_slice(TYPE_SEP);
    out.extend_from_slice(body);
    header.size += schema.len() + TYPE_SEP.len();
    header.type_in_data = true;
    debug!(id = %header.id, schema_len = schema.len(), "datatype moved into body");
    Ok(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use modelwire_types::ScalarSubtype;

    use super::*;

    fn long_object_type(fields: usize) -> TypeSpec {
        TypeSpec::json_object((0..fields).map(|index| {
            (
                format!("field_with_a_long_name_{index}"),
                TypeSpec::json_scalar(ScalarSubtype::Float, 64).unwrap(),
            )
        }))
        .unwrap()
    }

    #[test]
    fn roundtrip_for_body_sizes() {
        let config = FrameConfig::default();
        for size in [0usize, 1, 64 * 1024] {
            let body: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let header = Header::new(size)
                .with_id("m1")
                .with_address("a")
                .with_datatype(TypeSpec::Direct);
            let bytes = format(&header, &body, DEFAULT_MAX_HEADER).unwrap();

            let (head, rest) = split(&bytes).unwrap();
            assert_eq!(Header::from_json(head).unwrap(), header);
            assert_eq!(rest, body.as_slice());

            let frame = parse(&bytes, &config).unwrap();
            assert!(!frame.is_headerless());
            assert_eq!(frame.header, header);
            assert_eq!(frame.body.as_ref(), body.as_slice());
        }
    }

    #[test]
    fn headerless_bytes() {
        let (head, body) = split(b"plain body").unwrap();
        assert!(head.is_empty());
        assert_eq!(body, b"plain body");

        let frame = parse(b"plain body", &FrameConfig::default()).unwrap();
        assert!(frame.is_headerless());
        assert_eq!(frame.header.size, 10);
    }

    #[test]
    fn unterminated_header_is_protocol_error() {
        assert!(matches!(
            split(b"YGG_MSG_HEAD{\"size\":1}x"),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn size_mismatch_is_protocol_error() {
        let bytes = format(&Header::new(4), b"abc", DEFAULT_MAX_HEADER).unwrap();
        assert!(matches!(
            parse(&bytes, &FrameConfig::default()),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn oversized_datatype_travels_in_the_body() {
        let datatype = long_object_type(20);
        let header = Header::new(2).with_id("big").with_datatype(datatype.clone());
        let bytes = format(&header, b"{}", 256).unwrap();

        let config = FrameConfig {
            max_header_size: 256,
            ..FrameConfig::default()
        };
        let mut frame = parse(&bytes, &config).unwrap();
        assert!(frame.header.type_in_data);
        assert!(frame.header.datatype.is_none());

        let mut spec = TypeSpec::any();
        let body = finalize_recv(&mut frame.header, frame.body.to_vec(), &mut spec).unwrap();
        assert_eq!(body, b"{}");
        assert_eq!(frame.header.datatype, Some(datatype.clone()));
        assert_eq!(frame.header.size, 2);
        assert_eq!(spec.resolved().unwrap(), &datatype);
    }

    #[test]
    fn header_too_large_without_datatype() {
        let header = Header::new(0).with_address("x".repeat(300));
        assert!(matches!(
            format(&header, b"", 64),
            Err(FrameError::HeaderTooLarge { max: 64, .. })
        ));
    }

    #[test]
    fn fragments_cover_the_body_in_order() {
        let config = FrameConfig {
            max_fragment_size: 100,
            ..FrameConfig::default()
        };
        let body: Vec<u8> = (0..250u32).map(|i| i as u8).collect();
        let header = Header::new(0).with_id("m").with_datatype(TypeSpec::Direct);
        let frames = format_fragments(&header, &body, &config).unwrap();
        assert_eq!(frames.len(), 3);

        let mut joined = Vec::new();
        for (index, bytes) in frames.iter().enumerate() {
            let frame = parse(bytes, &config).unwrap();
            assert!(frame.header.multipart);
            assert_eq!(frame.header.fragment, Some(index));
            assert_eq!(frame.header.size, 250);
            assert_eq!(frame.header.id, "m");
            assert_eq!(frame.header.datatype.is_some(), index == 0);
            assert!(frame.body.len() <= 100);
            joined.extend_from_slice(&frame.body);
        }
        assert_eq!(joined, body);
    }

    #[test]
    fn small_messages_stay_single_part() {
        let frames = format_fragments(&Header::new(0), b"tiny", &FrameConfig::default()).unwrap();
        assert_eq!(frames.len(), 1);
        let frame = parse(&frames[0], &FrameConfig::default()).unwrap();
        assert!(!frame.header.multipart);
        assert_eq!(frame.header.size, 4);
    }

    #[test]
    fn message_limit_applies_to_the_whole_body() {
        let config = FrameConfig {
            max_msg_size: 10,
            ..FrameConfig::default()
        };
        assert!(matches!(
            format_fragments(&Header::new(0), &[0u8; 11], &config),
            Err(FrameError::MessageTooLarge { size: 11, max: 10 })
        ));
    }

    #[test]
    fn finalize_rejects_conflicting_datatype() {
        let mut header = Header::new(0).with_datatype(TypeSpec::Direct);
        let mut spec = TypeSpec::Schema;
        assert!(matches!(
            finalize_recv(&mut header, Vec::new(), &mut spec),
            Err(FrameError::Type(_))
        ));
        assert_eq!(spec, TypeSpec::Schema);
    }
}
