//! JSON Schema for the wire form of a type.

use modelwire_types::{ScalarEncoding, ScalarSubtype, TypeError, TypeSpec};
use serde_json::{json, Map, Value};

use crate::error::Result;

const DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

/// JSON Schema 2020-12 that accepts exactly the wire documents `spec`
/// produces. With `strict`, objects reject unlisted properties.
///
/// Raw-body types (`direct`, `ascii_table` at the top level) have no JSON
/// form; their schema accepts any document and registries skip them.
pub fn wire_schema(spec: &TypeSpec, strict: bool) -> Result<Value> {
    let mut schema = node(spec, strict)?;
    if let Value::Object(map) = &mut schema {
        map.insert("$schema".to_string(), Value::String(DRAFT.to_string()));
    }
    Ok(schema)
}

fn node(spec: &TypeSpec, strict: bool) -> Result<Value> {
    let schema = match spec {
        TypeSpec::Scalar(scalar) if scalar.subtype().is_text() => json!({"type": "string"}),
        TypeSpec::Scalar(scalar) if scalar.encoding() == ScalarEncoding::Packed => base64(),
        TypeSpec::Scalar(scalar) => match scalar.subtype() {
            ScalarSubtype::Bool => json!({"type": "boolean"}),
            ScalarSubtype::Int => json!({"type": "integer"}),
            ScalarSubtype::Uint => json!({"type": "integer", "minimum": 0}),
            _ => json!({"type": "number"}),
        },
        TypeSpec::FixedArray1D(_) => base64(),
        TypeSpec::NDArray(array) => {
            let mut shape = json!({
                "type": "array",
                "items": {"type": "integer", "minimum": 0},
            });
            if let Some(dims) = array.shape().filter(|_| array.is_fixed()) {
                shape["minItems"] = json!(dims.len());
                shape["maxItems"] = json!(dims.len());
            }
            let mut schema = json!({
                "type": "object",
                "properties": {"shape": shape, "data": base64()},
                "required": ["shape", "data"],
            });
            if strict {
                schema["additionalProperties"] = Value::Bool(false);
            }
            schema
        }
        TypeSpec::JsonArray(items) => {
            let prefix = items
                .iter()
                .map(|item| node(item, strict))
                .collect::<Result<Vec<_>>>()?;
            json!({
                "type": "array",
                "prefixItems": prefix,
                "items": false,
                "minItems": items.len(),
            })
        }
        TypeSpec::JsonObject(members) => {
            let mut properties = Map::new();
            for (key, member) in members {
                properties.insert(key.clone(), node(member, strict)?);
            }
            let required: Vec<&str> = members.iter().map(|(key, _)| key.as_str()).collect();
            let mut schema = json!({
                "type": "object",
                "properties": properties,
                "required": required,
            });
            if strict {
                schema["additionalProperties"] = Value::Bool(false);
            }
            schema
        }
        // Nested tables travel as a row string or a base64 column blob.
        TypeSpec::Table(_) => json!({"type": "string"}),
        TypeSpec::Any(Some(inner)) => node(inner, strict)?,
        TypeSpec::Any(None) => return Err(TypeError::Uninitialized.into()),
        TypeSpec::Direct => json!({}),
        TypeSpec::Schema => json!({
            "type": "object",
            "properties": {"type": {"type": "string"}},
            "required": ["type"],
        }),
    };
    Ok(schema)
}

fn base64() -> Value {
    json!({"type": "string", "contentEncoding": "base64"})
}
