//! Conversion between [`Value`]s and a host language's own objects.
//!
//! The engine never sees host objects directly; a binding implements
//! [`LanguageBridge`] for its runtime. [`JsonBridge`] is the reference
//! implementation over `serde_json::Value`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value as JsonValue};

use crate::document::WireDocument;
use crate::error::{PathSegment, Result, TypeError};
use crate::scalar::{Scalar, ScalarSubtype};
use crate::spec::{ScalarEncoding, TypeSpec};
use crate::value::Value;

/// Converts values to and from a host representation.
pub trait LanguageBridge {
    type Native;

    fn to_native(&self, value: &Value) -> Result<Self::Native>;

    fn from_native(&self, spec: &TypeSpec, native: &Self::Native) -> Result<Value>;
}

/// Maps values onto plain JSON: numbers stay numbers, arrays become lists
/// of numbers, complex values are `[re, im]` pairs and N-D arrays are
/// `{"shape": [...], "data": [...]}` with row-major data. Raw bodies
/// (direct and table types) must be UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBridge;

impl LanguageBridge for JsonBridge {
    type Native = JsonValue;

    fn to_native(&self, value: &Value) -> Result<JsonValue> {
        let doc = value.to_document()?;
        natural(&value.observed_spec()?, &doc)
    }

    fn from_native(&self, spec: &TypeSpec, native: &JsonValue) -> Result<Value> {
        let doc = wire(spec, native)?;
        Value::from_document(spec.clone(), &doc)
    }
}

fn natural(spec: &TypeSpec, doc: &WireDocument) -> Result<JsonValue> {
    let name = spec.type_name();
    match spec {
        TypeSpec::Any(Some(inner)) => natural(inner, doc),
        TypeSpec::Any(None) => Err(TypeError::Uninitialized),
        TypeSpec::Scalar(scalar)
            if scalar.encoding() == ScalarEncoding::Json || scalar.subtype().is_text() =>
        {
            Ok(doc.to_json())
        }
        TypeSpec::Scalar(scalar) => {
            let values = elements(name, scalar.subtype(), scalar.precision(), doc)?;
            values
                .into_iter()
                .next()
                .ok_or_else(|| TypeError::encode(name, "empty packed scalar"))
        }
        TypeSpec::FixedArray1D(array) => {
            elements(name, array.subtype(), array.precision(), doc).map(JsonValue::Array)
        }
        TypeSpec::NDArray(array) => {
            let shape = doc
                .get("shape")
                .ok_or_else(|| TypeError::encode(name, "missing shape"))?;
            let data = doc
                .get("data")
                .ok_or_else(|| TypeError::encode(name, "missing data"))?;
            let data = elements(name, array.subtype(), array.precision(), data)?;
            let mut out = Map::new();
            out.insert("shape".to_string(), shape.to_json());
            out.insert("data".to_string(), JsonValue::Array(data));
            Ok(JsonValue::Object(out))
        }
        TypeSpec::JsonArray(items) => {
            let docs = doc
                .as_array()
                .ok_or_else(|| TypeError::encode(name, "expected array document"))?;
            items
                .iter()
                .zip(docs)
                .enumerate()
                .map(|(index, (item, doc))| {
                    natural(item, doc).map_err(|err| err.within(PathSegment::Index(index)))
                })
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array)
        }
        TypeSpec::JsonObject(members) => {
            let mut out = Map::new();
            for (key, member) in members {
                let child = doc
                    .get(key)
                    .ok_or_else(|| TypeError::encode(name, format!("missing property {key:?}")))?;
                let converted =
                    natural(member, child).map_err(|err| err.within(PathSegment::Key(key.clone())))?;
                out.insert(key.clone(), converted);
            }
            Ok(JsonValue::Object(out))
        }
        TypeSpec::Table(_) | TypeSpec::Direct => {
            let bytes = doc.as_bytes().unwrap_or_default();
            std::str::from_utf8(bytes)
                .map(|text| JsonValue::String(text.to_string()))
                .map_err(|_| TypeError::encode(name, "raw body is not valid UTF-8"))
        }
        TypeSpec::Schema => Ok(doc.to_json()),
    }
}

/// Unpack little-endian elements from a base64 node into JSON numbers.
fn elements(
    name: &'static str,
    subtype: ScalarSubtype,
    precision: usize,
    doc: &WireDocument,
) -> Result<Vec<JsonValue>> {
    let text = doc
        .as_str()
        .ok_or_else(|| TypeError::encode(name, format!("expected base64 string, found {}", doc.kind())))?;
    let bytes = STANDARD
        .decode(text)
        .map_err(|err| TypeError::encode(name, format!("invalid base64: {err}")))?;
    let size = precision / 8;
    if size == 0 {
        return Err(TypeError::encode(name, "zero-width elements"));
    }
    bytes
        .chunks(size)
        .map(|chunk| {
            Scalar::read_le(subtype, precision, chunk)
                .map(|value| value.to_document().to_json())
                .ok_or_else(|| TypeError::encode(name, "truncated element"))
        })
        .collect()
}

fn wire(spec: &TypeSpec, native: &JsonValue) -> Result<WireDocument> {
    let name = spec.type_name();
    match spec {
        TypeSpec::Any(Some(inner)) => wire(inner, native),
        TypeSpec::Any(None) => Err(TypeError::Uninitialized),
        TypeSpec::Scalar(scalar)
            if scalar.encoding() == ScalarEncoding::Json || scalar.subtype().is_text() =>
        {
            Ok(WireDocument::from_json(native.clone()))
        }
        TypeSpec::Scalar(scalar) => {
            pack(name, scalar.subtype(), scalar.precision(), std::slice::from_ref(native))
        }
        TypeSpec::FixedArray1D(array) => {
            let values = native
                .as_array()
                .ok_or_else(|| TypeError::decode(name, "expected a list of numbers"))?;
            pack(name, array.subtype(), array.precision(), values)
        }
        TypeSpec::NDArray(array) => {
            let shape = native
                .get("shape")
                .ok_or_else(|| TypeError::decode(name, "missing shape"))?;
            let data = native
                .get("data")
                .and_then(JsonValue::as_array)
                .ok_or_else(|| TypeError::decode(name, "missing data list"))?;
            Ok(WireDocument::object()
                .with("shape", WireDocument::from_json(shape.clone()))
                .with("data", pack(name, array.subtype(), array.precision(), data)?))
        }
        TypeSpec::JsonArray(items) => {
            let values = native
                .as_array()
                .ok_or_else(|| TypeError::decode(name, "expected a list"))?;
            if values.len() != items.len() {
                return Err(TypeError::decode(
                    name,
                    format!("expected {} items, found {}", items.len(), values.len()),
                ));
            }
            items
                .iter()
                .zip(values)
                .enumerate()
                .map(|(index, (item, value))| {
                    wire(item, value).map_err(|err| err.within(PathSegment::Index(index)))
                })
                .collect::<Result<Vec<_>>>()
                .map(WireDocument::Array)
        }
        TypeSpec::JsonObject(members) => {
            let mut out = Vec::with_capacity(members.len());
            for (key, member) in members {
                let value = native
                    .get(key)
                    .ok_or_else(|| TypeError::decode(name, format!("missing property {key:?}")))?;
                let doc = wire(member, value).map_err(|err| err.within(PathSegment::Key(key.clone())))?;
                out.push((key.clone(), doc));
            }
            Ok(WireDocument::Object(out))
        }
        TypeSpec::Table(_) | TypeSpec::Direct => native
            .as_str()
            .map(|text| WireDocument::Bytes(text.as_bytes().to_vec()))
            .ok_or_else(|| TypeError::decode(name, "expected a string")),
        TypeSpec::Schema => Ok(WireDocument::from_json(native.clone())),
    }
}

fn pack(
    name: &'static str,
    subtype: ScalarSubtype,
    precision: usize,
    values: &[JsonValue],
) -> Result<WireDocument> {
    let mut raw = Vec::with_capacity(values.len() * precision / 8);
    for (index, value) in values.iter().enumerate() {
        let doc = WireDocument::from_json(value.clone());
        let scalar = Scalar::from_document(subtype, precision, &doc).ok_or_else(|| {
            TypeError::decode(name, format!("{value} is not a {subtype}{precision}"))
                .within(PathSegment::Index(index))
        })?;
        scalar.write_le(&mut raw);
    }
    Ok(WireDocument::String(STANDARD.encode(raw)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::args::{Arg, ArgList};

    fn spec() -> TypeSpec {
        TypeSpec::json_object([
            ("count", TypeSpec::scalar(ScalarSubtype::Uint, 16).unwrap()),
            ("label", TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap()),
            ("z", TypeSpec::scalar(ScalarSubtype::Complex, 128).unwrap()),
            ("xs", TypeSpec::array_1d(ScalarSubtype::Int, 32, Some(3)).unwrap()),
            (
                "grid",
                TypeSpec::ndarray(ScalarSubtype::Float, 64, Some(vec![2, 1])).unwrap(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn native_json_roundtrip() {
        let native = json!({
            "count": 7,
            "label": "probe",
            "z": [1.5, -2.0],
            "xs": [1, -2, 3],
            "grid": {"shape": [2, 1], "data": [0.25, 4.0]}
        });
        let value = JsonBridge.from_native(&spec(), &native).unwrap();
        assert_eq!(value.args()[0], Arg::from(7u16));
        assert_eq!(
            value.args()[4].as_buffer().unwrap().to_elements::<i32>(),
            Some(vec![1, -2, 3])
        );
        assert_eq!(JsonBridge.to_native(&value).unwrap(), native);
    }

    #[test]
    fn out_of_range_native_reports_path() {
        let native = json!({
            "count": 70000,
            "label": "x",
            "z": [0.0, 0.0],
            "xs": [1, 2, 3],
            "grid": {"shape": [2, 1], "data": [0.0, 0.0]}
        });
        let err = JsonBridge.from_native(&spec(), &native).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "$.count[0]");
    }

    #[test]
    fn nested_value_converts_with_its_own_type() {
        let envelope = TypeSpec::json_array(vec![
            TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap(),
            TypeSpec::any(),
        ]);
        let inner = Value::new(
            TypeSpec::array_1d(ScalarSubtype::Int, 16, Some(2)).unwrap(),
            ArgList::new().with_elements(&[4i16, -4]),
        )
        .unwrap();
        let value = Value::new(envelope, ArgList::new().with(1i32).with(inner)).unwrap();
        assert_eq!(JsonBridge.to_native(&value).unwrap(), json!([1, [4, -4]]));
    }

    #[test]
    fn direct_bodies_are_text() {
        let value = Value::new(TypeSpec::Direct, ArgList::new().with_text("raw line\n")).unwrap();
        assert_eq!(JsonBridge.to_native(&value).unwrap(), json!("raw line\n"));
        let back = JsonBridge.from_native(&TypeSpec::Direct, &json!("raw line\n")).unwrap();
        assert_eq!(back, value);
    }
}
