//! Type description documents: the `datatype` objects carried in headers.

use serde_json::Value as JsonValue;

use crate::document::WireDocument;
use crate::error::{Result, TypeError};
use crate::scalar::ScalarSubtype;
use crate::spec::{ArraySpec, NdArraySpec, ScalarEncoding, ScalarSpec, TableSpec, TypeSpec};

impl TypeSpec {
    /// Describe this type as a document.
    ///
    /// Generic slots serialize as their inner type once initialized.
    pub fn to_document(&self) -> WireDocument {
        match self {
            Self::Scalar(spec) => scalar_document(spec),
            Self::FixedArray1D(spec) => {
                let mut doc = element_document("1darray", spec.subtype(), spec.precision());
                if let Some(length) = spec.length() {
                    doc.insert("length", WireDocument::UInt(length as u64));
                }
                if spec.is_variable() {
                    doc.insert("variable_length", WireDocument::Bool(true));
                }
                with_units(doc, spec.units())
            }
            Self::NDArray(spec) => {
                let mut doc = element_document("ndarray", spec.subtype(), spec.precision());
                if let Some(shape) = spec.shape() {
                    doc.insert(
                        "shape",
                        WireDocument::Array(
                            shape.iter().map(|dim| WireDocument::UInt(*dim as u64)).collect(),
                        ),
                    );
                }
                if spec.is_variable() {
                    doc.insert("variable_shape", WireDocument::Bool(true));
                }
                with_units(doc, spec.units())
            }
            Self::JsonArray(items) => typed("array").with(
                "items",
                WireDocument::Array(items.iter().map(Self::to_document).collect()),
            ),
            Self::JsonObject(members) => typed("object").with(
                "properties",
                WireDocument::Object(
                    members
                        .iter()
                        .map(|(key, spec)| (key.clone(), spec.to_document()))
                        .collect(),
                ),
            ),
            Self::Table(spec) => typed("ascii_table")
                .with(
                    "format_str",
                    WireDocument::String(spec.format().source().to_string()),
                )
                .with("as_array", WireDocument::Bool(spec.is_array())),
            Self::Any(Some(inner)) => inner.to_document(),
            Self::Any(None) => typed("any"),
            Self::Direct => typed("direct"),
            Self::Schema => typed("schema"),
        }
    }

    /// Parse a type document. Malformed documents are construction errors.
    pub fn from_document(doc: &WireDocument) -> Result<Self> {
        let kind = doc
            .get("type")
            .and_then(WireDocument::as_str)
            .ok_or_else(|| TypeError::construction(format!("type document without \"type\": {doc}")))?;

        match kind {
            "scalar" => {
                let subtype = subtype_field(doc)?;
                let precision = precision_field(doc, subtype)?;
                let spec = ScalarSpec::new(subtype, precision)?;
                Ok(Self::Scalar(scalar_flags(spec, doc)))
            }
            "integer" | "number" | "boolean" | "string" => {
                let subtype = match (kind, optional_str(doc, "subtype")?) {
                    ("integer", Some("uint")) => ScalarSubtype::Uint,
                    ("integer", _) => ScalarSubtype::Int,
                    ("number", _) => ScalarSubtype::Float,
                    ("boolean", _) => ScalarSubtype::Bool,
                    (_, Some("bytes")) => ScalarSubtype::Bytes,
                    _ => ScalarSubtype::Unicode,
                };
                let precision = precision_field(doc, subtype)?;
                let spec = ScalarSpec::json(subtype, precision)?;
                Ok(Self::Scalar(scalar_flags(spec, doc)))
            }
            "1darray" => {
                let subtype = subtype_field(doc)?;
                let precision = precision_field(doc, subtype)?;
                let spec = if flag(doc, "variable_length") {
                    ArraySpec::variable(subtype, precision)?
                } else {
                    ArraySpec::new(subtype, precision, usize_field(doc, "length")?)?
                };
                Ok(Self::FixedArray1D(spec.with_units(units(doc))))
            }
            "ndarray" => {
                let subtype = subtype_field(doc)?;
                let precision = precision_field(doc, subtype)?;
                let spec = if flag(doc, "variable_shape") {
                    NdArraySpec::variable(subtype, precision)?
                } else {
                    NdArraySpec::new(subtype, precision, shape_field(doc)?)?
                };
                Ok(Self::NDArray(spec.with_units(units(doc))))
            }
            "array" => {
                let items = doc
                    .get("items")
                    .and_then(WireDocument::as_array)
                    .ok_or_else(|| TypeError::construction("array type without \"items\" list"))?;
                items
                    .iter()
                    .map(Self::from_document)
                    .collect::<Result<Vec<_>>>()
                    .map(Self::JsonArray)
            }
            "object" => {
                let properties = doc
                    .get("properties")
                    .and_then(WireDocument::as_object)
                    .ok_or_else(|| {
                        TypeError::construction("object type without \"properties\" map")
                    })?;
                let mut members = Vec::with_capacity(properties.len());
                for (key, child) in properties {
                    let spec = Self::from_document(child).map_err(|err| {
                        TypeError::construction(format!("property {key:?}: {err}"))
                    })?;
                    members.push((key.clone(), spec));
                }
                Self::json_object(members)
            }
            "ascii_table" => {
                let format = doc
                    .get("format_str")
                    .and_then(WireDocument::as_str)
                    .ok_or_else(|| TypeError::construction("ascii_table without \"format_str\""))?;
                TableSpec::new(format, flag(doc, "as_array")).map(Self::Table)
            }
            "any" => Ok(Self::any()),
            "direct" => Ok(Self::Direct),
            "schema" => Ok(Self::Schema),
            shorthand => match ScalarSubtype::from_name(shorthand) {
                Some(subtype) if subtype != ScalarSubtype::Bool => {
                    let precision = precision_field(doc, subtype)?;
                    let spec = ScalarSpec::new(subtype, precision)?;
                    Ok(Self::Scalar(scalar_flags(spec, doc)))
                }
                _ => Err(TypeError::construction(format!("unknown type {shorthand:?}"))),
            },
        }
    }

    /// [`to_document`](Self::to_document) as a `serde_json` value.
    pub fn to_schema(&self) -> JsonValue {
        self.to_document().to_json()
    }

    /// [`from_document`](Self::from_document) from a `serde_json` value.
    pub fn from_schema(schema: &JsonValue) -> Result<Self> {
        Self::from_document(&WireDocument::from_json(schema.clone()))
    }
}

fn typed(name: &str) -> WireDocument {
    WireDocument::object().with("type", WireDocument::String(name.to_string()))
}

fn element_document(name: &str, subtype: ScalarSubtype, precision: usize) -> WireDocument {
    typed(name)
        .with("subtype", WireDocument::String(subtype.name().to_string()))
        .with("precision", WireDocument::UInt(precision as u64))
}

fn with_units(mut doc: WireDocument, units: &str) -> WireDocument {
    if !units.is_empty() {
        doc.insert("units", WireDocument::String(units.to_string()));
    }
    doc
}

fn scalar_document(spec: &ScalarSpec) -> WireDocument {
    let mut doc = match spec.encoding() {
        ScalarEncoding::Packed => element_document("scalar", spec.subtype(), spec.precision()),
        ScalarEncoding::Json => {
            let name = match spec.subtype() {
                ScalarSubtype::Bool => "boolean",
                ScalarSubtype::Int | ScalarSubtype::Uint => "integer",
                ScalarSubtype::Bytes | ScalarSubtype::Unicode => "string",
                _ => "number",
            };
            let mut doc = typed(name);
            if matches!(spec.subtype(), ScalarSubtype::Uint | ScalarSubtype::Bytes) {
                doc.insert(
                    "subtype",
                    WireDocument::String(spec.subtype().name().to_string()),
                );
            }
            if spec.subtype() != ScalarSubtype::Bool {
                doc.insert("precision", WireDocument::UInt(spec.precision() as u64));
            }
            doc
        }
    };
    if spec.is_variable() && spec.precision() > 0 {
        doc.insert("variable_precision", WireDocument::Bool(true));
    }
    with_units(doc, spec.units())
}

fn scalar_flags(spec: ScalarSpec, doc: &WireDocument) -> ScalarSpec {
    let spec = spec.with_units(units(doc));
    if flag(doc, "variable_precision") {
        spec.with_variable_precision()
    } else {
        spec
    }
}

fn optional_str<'a>(doc: &'a WireDocument, key: &str) -> Result<Option<&'a str>> {
    match doc.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| TypeError::construction(format!("\"{key}\" must be a string"))),
    }
}

fn subtype_field(doc: &WireDocument) -> Result<ScalarSubtype> {
    let name = optional_str(doc, "subtype")?
        .ok_or_else(|| TypeError::construction(format!("missing \"subtype\" in {doc}")))?;
    ScalarSubtype::from_name(name)
        .ok_or_else(|| TypeError::construction(format!("unknown subtype {name:?}")))
}

fn usize_field(doc: &WireDocument, key: &str) -> Result<Option<usize>> {
    match doc.get(key) {
        None | Some(WireDocument::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|value| usize::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| {
                TypeError::construction(format!("\"{key}\" must be a non-negative integer"))
            }),
    }
}

fn precision_field(doc: &WireDocument, subtype: ScalarSubtype) -> Result<usize> {
    Ok(usize_field(doc, "precision")?.unwrap_or_else(|| subtype.default_precision()))
}

fn shape_field(doc: &WireDocument) -> Result<Option<Vec<usize>>> {
    let Some(shape) = doc.get("shape") else {
        return Ok(None);
    };
    let dims = shape
        .as_array()
        .ok_or_else(|| TypeError::construction("\"shape\" must be a list"))?;
    dims.iter()
        .map(|dim| {
            dim.as_u64()
                .and_then(|dim| usize::try_from(dim).ok())
                .ok_or_else(|| TypeError::construction(format!("invalid dimension {dim}")))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn flag(doc: &WireDocument, key: &str) -> bool {
    doc.get(key).and_then(WireDocument::as_bool).unwrap_or(false)
}

fn units(doc: &WireDocument) -> String {
    doc.get("units")
        .and_then(WireDocument::as_str)
        .unwrap_or_default()
        .to_string()
}
