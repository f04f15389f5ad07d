//! Type-directed serialization.
//!
//! Every encode and decode is a co-walk of the type tree, the argument list
//! and the wire document. The argument list is checked against a
//! [`ConsumptionPlan`](crate::plan::ConsumptionPlan) up front, so each leaf
//! receives exactly the slots it owns. Decoding is all-or-nothing: the
//! caller's arguments are only updated once the whole document decoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::args::{Arg, ArgList, SlotKind};
use crate::buffer::ValueBuffer;
use crate::document::WireDocument;
use crate::error::{PathSegment, Result, TypeError};
use crate::format::Cell;
use crate::plan::{plan, LeafCursor};
use crate::scalar::{Scalar, ScalarSubtype};
use crate::spec::{ArraySpec, NdArraySpec, ScalarEncoding, ScalarSpec, TableSpec, TypeSpec};
use crate::value::Value;

/// Encode `args` into a wire document following `spec`.
pub fn encode(spec: &TypeSpec, args: &ArgList) -> Result<WireDocument> {
    let plan = plan(spec, args)?;
    let mut leaves = LeafCursor::new(&plan);
    encode_node(spec, args.as_slice(), &mut leaves)
}

/// Decode `doc` into `args`. On error `args` is left untouched.
pub fn decode(spec: &TypeSpec, doc: &WireDocument, args: &mut ArgList) -> Result<()> {
    let plan = plan(spec, args)?;
    let mut staged = args.clone();
    let mut leaves = LeafCursor::new(&plan);
    decode_node(spec, doc, staged.as_mut_slice(), &mut leaves)?;
    *args = staged;
    Ok(())
}

/// Encode to message body bytes: raw for direct and table types, JSON text
/// otherwise.
pub fn serialize(spec: &TypeSpec, args: &ArgList) -> Result<Vec<u8>> {
    let doc = encode(spec, args)?;
    if spec.is_raw_body() {
        return match doc {
            WireDocument::Bytes(bytes) => Ok(bytes),
            WireDocument::String(text) => Ok(text.into_bytes()),
            other => other.to_vec(),
        };
    }
    doc.to_vec()
}

/// Decode message body bytes into fresh argument slots.
pub fn deserialize(spec: &TypeSpec, bytes: &[u8]) -> Result<ArgList> {
    let mut args = spec.template_args()?;
    deserialize_into(spec, bytes, &mut args)?;
    Ok(args)
}

/// Decode message body bytes into caller-supplied slots.
pub fn deserialize_into(spec: &TypeSpec, bytes: &[u8], args: &mut ArgList) -> Result<()> {
    let doc = if spec.is_raw_body() {
        WireDocument::Bytes(bytes.to_vec())
    } else {
        WireDocument::from_slice(bytes)?
    };
    decode(spec, &doc, args)
}

/// `spec` with variable text lengths and unknown array sizes taken from `args`.
pub(crate) fn observe(spec: &TypeSpec, args: &ArgList) -> Result<TypeSpec> {
    let plan = plan(spec, args)?;
    let mut observed = spec.clone();
    let mut leaves = LeafCursor::new(&plan);
    observe_node(&mut observed, args.as_slice(), &mut leaves)?;
    Ok(observed)
}

/// Native payload bytes in use by `args`: text and variable arrays count
/// their sized prefix, not the buffer capacity. Saturates instead of
/// overflowing.
pub(crate) fn payload_len(spec: &TypeSpec, args: &ArgList) -> Result<usize> {
    let plan = plan(spec, args)?;
    let mut leaves = LeafCursor::new(&plan);
    measure_node(spec, args.as_slice(), &mut leaves)
}

fn is_walked_composite(spec: &TypeSpec) -> bool {
    matches!(spec, TypeSpec::JsonArray(_) | TypeSpec::JsonObject(_)) && spec.table_columns().is_none()
}

fn encode_node(spec: &TypeSpec, args: &[Arg], leaves: &mut LeafCursor<'_>) -> Result<WireDocument> {
    match spec {
        TypeSpec::Any(expected) if leaves.at_value() => {
            let leaf = leaves.next_leaf()?;
            let nested = value_at(&args[leaf.range()], 0)?;
            if let Some(expected) = expected {
                let observed = nested.observed_spec()?;
                if !expected.is_compatible(&observed) {
                    return Err(TypeError::encode(
                        "any",
                        format!("nested {observed} does not fit {expected}"),
                    ));
                }
            }
            nested.to_document()
        }
        TypeSpec::Any(Some(inner)) => encode_node(inner, args, leaves),
        TypeSpec::Any(None) => Err(TypeError::Uninitialized),
        TypeSpec::JsonArray(items) if is_walked_composite(spec) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let doc = encode_node(item, args, leaves)
                    .map_err(|err| err.within(PathSegment::Index(index)))?;
                out.push(doc);
            }
            Ok(WireDocument::Array(out))
        }
        TypeSpec::JsonObject(members) if is_walked_composite(spec) => {
            let mut out = Vec::with_capacity(members.len());
            for (key, member) in members {
                let doc = encode_node(member, args, leaves)
                    .map_err(|err| err.within(PathSegment::Key(key.clone())))?;
                out.push((key.clone(), doc));
            }
            Ok(WireDocument::Object(out))
        }
        _ => {
            let leaf = leaves.next_leaf()?;
            encode_leaf(spec, &args[leaf.range()])
        }
    }
}

fn encode_leaf(spec: &TypeSpec, slots: &[Arg]) -> Result<WireDocument> {
    let name = spec.type_name();
    match spec {
        TypeSpec::Scalar(scalar) => encode_scalar(name, scalar, slots),
        TypeSpec::FixedArray1D(array) => {
            let bytes = array_payload(name, array, slots)?;
            Ok(WireDocument::String(STANDARD.encode(bytes)))
        }
        TypeSpec::NDArray(array) => encode_ndarray(name, array, slots),
        TypeSpec::JsonArray(_) | TypeSpec::JsonObject(_) => encode_columns(spec, slots),
        TypeSpec::Table(table) => encode_table(name, table, slots),
        TypeSpec::Direct => {
            let bytes = sized_bytes(name, buffer_at(slots, 0)?, size_at(slots, 1)?)?;
            Ok(WireDocument::Bytes(bytes.to_vec()))
        }
        TypeSpec::Schema => Ok(type_at(slots, 0)?.to_document()),
        TypeSpec::Any(_) => Err(TypeError::Uninitialized),
    }
}

fn encode_scalar(name: &'static str, spec: &ScalarSpec, slots: &[Arg]) -> Result<WireDocument> {
    if spec.subtype().is_text() {
        let bytes = sized_bytes(name, buffer_at(slots, 0)?, size_at(slots, 1)?)?;
        check_text_length(spec, bytes.len()).map_err(|reason| TypeError::encode(name, reason))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| TypeError::encode(name, "text is not valid UTF-8"))?;
        return Ok(WireDocument::String(text.to_string()));
    }

    let given = scalar_at(slots, 0)?;
    let value = coerce_scalar(spec, given).ok_or_else(|| {
        TypeError::encode(
            name,
            format!("expected {}, found {}", spec.label(), given.label()),
        )
    })?;
    match spec.encoding() {
        ScalarEncoding::Packed => {
            let mut raw = Vec::with_capacity(spec.element_size());
            value.write_le(&mut raw);
            Ok(WireDocument::String(STANDARD.encode(raw)))
        }
        ScalarEncoding::Json => Ok(value.to_document()),
    }
}

/// Convert `value` to the exact width of `spec`, range-checked.
fn coerce_scalar(spec: &ScalarSpec, value: &Scalar) -> Option<Scalar> {
    if value.subtype() != spec.subtype() {
        return None;
    }
    if value.precision() == spec.precision() {
        return Some(*value);
    }
    match spec.subtype() {
        ScalarSubtype::Int => Scalar::from_i64(spec.precision(), value.as_i64()?),
        ScalarSubtype::Uint => Scalar::from_u64(spec.precision(), value.as_u64()?),
        _ => value.cast(spec.precision()),
    }
}

fn check_text_length(spec: &ScalarSpec, len: usize) -> std::result::Result<(), String> {
    if !spec.is_variable() && len > spec.element_size() {
        return Err(format!(
            "{len} bytes exceed fixed length {}",
            spec.element_size()
        ));
    }
    Ok(())
}

fn array_payload<'a>(name: &'static str, spec: &ArraySpec, slots: &'a [Arg]) -> Result<&'a [u8]> {
    let buffer = buffer_at(slots, 0)?;
    match spec.length() {
        Some(length) if spec.is_fixed() => {
            let need = byte_len(length, spec.element_size())
                .ok_or_else(|| TypeError::encode(name, overflow(length)))?;
            if buffer.len() != need {
                return Err(TypeError::encode(
                    name,
                    format!(
                        "expected {need} bytes for {length} elements, found {}",
                        buffer.len()
                    ),
                ));
            }
            Ok(buffer.as_slice())
        }
        _ => {
            let count = size_at(slots, 1)?;
            let need = byte_len(count, spec.element_size())
                .ok_or_else(|| TypeError::encode(name, overflow(count)))?;
            sized_bytes(name, buffer, need)
        }
    }
}

fn encode_ndarray(name: &'static str, spec: &NdArraySpec, slots: &[Arg]) -> Result<WireDocument> {
    let buffer = buffer_at(slots, 0)?;
    let (shape, bytes) = match spec.shape() {
        Some(shape) if spec.is_fixed() => {
            let need = shape_byte_len(shape, spec.element_size())
                .ok_or_else(|| TypeError::encode(name, shape_overflow(shape)))?;
            if buffer.len() != need {
                return Err(TypeError::encode(
                    name,
                    format!("expected {need} bytes for shape {shape:?}, found {}", buffer.len()),
                ));
            }
            (shape.to_vec(), buffer.as_slice())
        }
        _ => {
            let ndim = size_at(slots, 1)?;
            let shape = shape_at(slots, 2)?;
            if shape.len() != ndim {
                return Err(TypeError::encode(
                    name,
                    format!("{ndim} dimensions declared, shape has {}", shape.len()),
                ));
            }
            let need = shape_byte_len(shape, spec.element_size())
                .ok_or_else(|| TypeError::encode(name, shape_overflow(shape)))?;
            (shape.to_vec(), sized_bytes(name, buffer, need)?)
        }
    };
    Ok(WireDocument::object()
        .with(
            "shape",
            WireDocument::Array(shape.iter().map(|dim| WireDocument::UInt(*dim as u64)).collect()),
        )
        .with("data", WireDocument::String(STANDARD.encode(bytes))))
}

fn encode_columns(spec: &TypeSpec, slots: &[Arg]) -> Result<WireDocument> {
    let columns = spec.table_columns().ok_or(TypeError::Uninitialized)?;
    let nrows = size_at(slots, 0)?;
    let mut docs = Vec::with_capacity(columns.len());
    for (index, ((segment, _), column)) in spec.children().into_iter().zip(&columns).enumerate() {
        let doc = encode_column(column, nrows, slots, index + 1).map_err(|err| err.within(segment))?;
        docs.push(doc);
    }
    Ok(assemble(spec, docs))
}

fn encode_column(column: &ArraySpec, nrows: usize, slots: &[Arg], slot: usize) -> Result<WireDocument> {
    if let Some(length) = column.length().filter(|_| column.is_fixed()) {
        if length != nrows {
            return Err(TypeError::encode(
                "1darray",
                format!("{nrows} rows given for a column of length {length}"),
            ));
        }
    }
    let need = byte_len(nrows, column.element_size())
        .ok_or_else(|| TypeError::encode("1darray", overflow(nrows)))?;
    let bytes = sized_bytes("1darray", buffer_at(slots, slot)?, need)?;
    Ok(WireDocument::String(STANDARD.encode(bytes)))
}

/// Put per-child documents back into the shape of a composite.
fn assemble(spec: &TypeSpec, docs: Vec<WireDocument>) -> WireDocument {
    match spec {
        TypeSpec::JsonObject(members) => WireDocument::Object(
            members
                .iter()
                .map(|(key, _)| key.clone())
                .zip(docs)
                .collect(),
        ),
        _ => WireDocument::Array(docs),
    }
}

fn encode_table(name: &'static str, spec: &TableSpec, slots: &[Arg]) -> Result<WireDocument> {
    let format = spec.format();
    if spec.is_array() {
        let nrows = size_at(slots, 0)?;
        let mut blob = Vec::new();
        for (index, column) in format.columns().iter().enumerate() {
            let bytes = byte_len(nrows, column.size)
                .ok_or_else(|| TypeError::encode(name, overflow(nrows)))
                .and_then(|need| sized_bytes(name, buffer_at(slots, index + 1)?, need))
                .map_err(|err| err.within(PathSegment::Column(index)))?;
            blob.extend_from_slice(bytes);
        }
        return Ok(WireDocument::Bytes(blob));
    }

    let mut cells = Vec::with_capacity(format.columns().len());
    let mut slot = 0;
    for column in format.columns() {
        if column.is_text() {
            let bytes = sized_bytes(name, buffer_at(slots, slot)?, size_at(slots, slot + 1)?)?;
            cells.push(Cell::Text(bytes.to_vec()));
            slot += 2;
        } else {
            cells.push(Cell::Scalar(*scalar_at(slots, slot)?));
            slot += 1;
        }
    }
    format.format_row(&cells).map(WireDocument::String)
}

fn decode_node(
    spec: &TypeSpec,
    doc: &WireDocument,
    args: &mut [Arg],
    leaves: &mut LeafCursor<'_>,
) -> Result<()> {
    match spec {
        TypeSpec::Any(expected) if leaves.at_value() => {
            let leaf = leaves.next_leaf()?;
            let slots = &mut args[leaf.range()];
            let target = match expected {
                Some(inner) => inner.as_ref().clone(),
                None => value_at(slots, 0)?.spec().clone(),
            };
            slots[0] = Arg::from(Value::from_document(target, doc)?);
            Ok(())
        }
        TypeSpec::Any(Some(inner)) => decode_node(inner, doc, args, leaves),
        TypeSpec::Any(None) => Err(TypeError::Uninitialized),
        TypeSpec::JsonArray(items) if is_walked_composite(spec) => {
            let docs = doc
                .as_array()
                .ok_or_else(|| wrong_shape("array", "array", doc))?;
            if docs.len() != items.len() {
                return Err(TypeError::decode(
                    "array",
                    format!("expected {} items, found {}", items.len(), docs.len()),
                ));
            }
            for (index, (item, item_doc)) in items.iter().zip(docs).enumerate() {
                decode_node(item, item_doc, args, leaves)
                    .map_err(|err| err.within(PathSegment::Index(index)))?;
            }
            Ok(())
        }
        TypeSpec::JsonObject(members) if is_walked_composite(spec) => {
            if doc.as_object().is_none() {
                return Err(wrong_shape("object", "object", doc));
            }
            for (key, member) in members {
                let member_doc = doc.get(key).ok_or_else(|| {
                    TypeError::decode("object", format!("missing property {key:?}"))
                })?;
                decode_node(member, member_doc, args, leaves)
                    .map_err(|err| err.within(PathSegment::Key(key.clone())))?;
            }
            Ok(())
        }
        _ => {
            let leaf = leaves.next_leaf()?;
            decode_leaf(spec, doc, &mut args[leaf.range()])
        }
    }
}

fn decode_leaf(spec: &TypeSpec, doc: &WireDocument, slots: &mut [Arg]) -> Result<()> {
    let name = spec.type_name();
    match spec {
        TypeSpec::Scalar(scalar) => decode_scalar(name, scalar, doc, slots),
        TypeSpec::FixedArray1D(array) => {
            let bytes = unpack(name, doc)?;
            let count = element_count(name, bytes.len(), array.element_size())?;
            if let Some(length) = array.length().filter(|_| array.is_fixed()) {
                if count != length {
                    return Err(TypeError::decode(
                        name,
                        format!("expected {length} elements, found {count}"),
                    ));
                }
                return fill_buffer(slots, 0, &bytes);
            }
            fill_buffer(slots, 0, &bytes)?;
            slots[1] = Arg::Size(count);
            Ok(())
        }
        TypeSpec::NDArray(array) => decode_ndarray(name, array, doc, slots),
        TypeSpec::JsonArray(_) | TypeSpec::JsonObject(_) => decode_columns(spec, doc, slots),
        TypeSpec::Table(table) => decode_table(name, table, doc, slots),
        TypeSpec::Direct => {
            let bytes = doc
                .as_bytes()
                .ok_or_else(|| wrong_shape(name, "bytes", doc))?;
            fill_buffer(slots, 0, bytes)?;
            slots[1] = Arg::Size(bytes.len());
            Ok(())
        }
        TypeSpec::Schema => {
            let described = TypeSpec::from_document(doc)
                .map_err(|err| TypeError::decode(name, err.to_string()))?;
            slots[0] = Arg::Type(described);
            Ok(())
        }
        TypeSpec::Any(_) => Err(TypeError::Uninitialized),
    }
}

fn decode_scalar(
    name: &'static str,
    spec: &ScalarSpec,
    doc: &WireDocument,
    slots: &mut [Arg],
) -> Result<()> {
    if spec.subtype().is_text() {
        let bytes = doc
            .as_bytes()
            .ok_or_else(|| wrong_shape(name, "string", doc))?;
        check_text_length(spec, bytes.len()).map_err(|reason| TypeError::decode(name, reason))?;
        fill_buffer(slots, 0, bytes)?;
        slots[1] = Arg::Size(bytes.len());
        return Ok(());
    }

    let value = match spec.encoding() {
        ScalarEncoding::Json => {
            Scalar::from_document(spec.subtype(), spec.precision(), doc).ok_or_else(|| {
                TypeError::decode(
                    name,
                    format!("expected {}, found {} {doc}", spec.label(), doc.kind()),
                )
            })?
        }
        ScalarEncoding::Packed => {
            let bytes = unpack(name, doc)?;
            let width = bytes.len() * 8;
            let read = if width == spec.precision() {
                Scalar::read_le(spec.subtype(), width, &bytes)
            } else if spec.pending_cast() == Some(width) {
                Scalar::read_le(spec.subtype(), width, &bytes)
                    .and_then(|value| value.cast(spec.precision()))
            } else {
                None
            };
            read.ok_or_else(|| {
                TypeError::decode(
                    name,
                    format!(
                        "expected {} bytes for {}, found {}",
                        spec.element_size(),
                        spec.label(),
                        bytes.len()
                    ),
                )
            })?
        }
    };
    slots[0] = Arg::Scalar(value);
    Ok(())
}

fn decode_ndarray(
    name: &'static str,
    spec: &NdArraySpec,
    doc: &WireDocument,
    slots: &mut [Arg],
) -> Result<()> {
    let shape_doc = doc
        .get("shape")
        .and_then(WireDocument::as_array)
        .ok_or_else(|| wrong_shape(name, "object with shape", doc))?;
    let mut shape = Vec::with_capacity(shape_doc.len());
    for dim in shape_doc {
        let dim = dim
            .as_u64()
            .and_then(|dim| usize::try_from(dim).ok())
            .ok_or_else(|| TypeError::decode(name, format!("invalid dimension {dim}")))?;
        shape.push(dim);
    }
    let data = doc
        .get("data")
        .ok_or_else(|| TypeError::decode(name, "missing data"))?;
    let bytes = unpack(name, data)?;
    let count = element_count(name, bytes.len(), spec.element_size())?;
    let elements = shape_elements(&shape)
        .ok_or_else(|| TypeError::decode(name, shape_overflow(&shape)))?;
    if count != elements {
        return Err(TypeError::decode(
            name,
            format!("{count} elements do not fill shape {shape:?}"),
        ));
    }

    if let Some(expected) = spec.shape().filter(|_| spec.is_fixed()) {
        if expected != shape.as_slice() {
            return Err(TypeError::decode(
                name,
                format!("expected shape {expected:?}, found {shape:?}"),
            ));
        }
        return fill_buffer(slots, 0, &bytes);
    }
    fill_buffer(slots, 0, &bytes)?;
    slots[1] = Arg::Size(shape.len());
    slots[2] = Arg::Shape(shape);
    Ok(())
}

fn decode_columns(spec: &TypeSpec, doc: &WireDocument, slots: &mut [Arg]) -> Result<()> {
    let columns = spec.table_columns().ok_or(TypeError::Uninitialized)?;
    let children = spec.children();
    let mut decoded = Vec::with_capacity(columns.len());
    for ((segment, _), column) in children.into_iter().zip(&columns) {
        let child_doc = match (&segment, doc) {
            (PathSegment::Key(key), WireDocument::Object(_)) => doc.get(key).ok_or_else(|| {
                TypeError::decode("object", format!("missing property {key:?}"))
            })?,
            (PathSegment::Index(index), WireDocument::Array(items)) => {
                if items.len() != columns.len() {
                    return Err(TypeError::decode(
                        "array",
                        format!("expected {} items, found {}", columns.len(), items.len()),
                    ));
                }
                &items[*index]
            }
            _ => return Err(wrong_shape(spec.type_name(), spec.type_name(), doc)),
        };
        let bytes = unpack("1darray", child_doc).map_err(|err| err.within(segment.clone()))?;
        let count = element_count("1darray", bytes.len(), column.element_size())
            .map_err(|err| err.within(segment.clone()))?;
        if let Some(length) = column.length().filter(|_| column.is_fixed()) {
            if count != length {
                return Err(TypeError::decode(
                    "1darray",
                    format!("expected {length} elements, found {count}"),
                )
                .within(segment));
            }
        }
        decoded.push((segment, count, bytes));
    }

    let nrows = decoded.first().map(|(_, count, _)| *count).unwrap_or(0);
    if let Some((segment, count, _)) = decoded.iter().find(|(_, count, _)| *count != nrows) {
        return Err(TypeError::decode(
            "1darray",
            format!("column has {count} rows, expected {nrows}"),
        )
        .within(segment.clone()));
    }
    slots[0] = Arg::Size(nrows);
    for (index, (_, _, bytes)) in decoded.iter().enumerate() {
        fill_buffer(slots, index + 1, bytes)?;
    }
    Ok(())
}

fn decode_table(
    name: &'static str,
    spec: &TableSpec,
    doc: &WireDocument,
    slots: &mut [Arg],
) -> Result<()> {
    let body = doc
        .as_bytes()
        .ok_or_else(|| wrong_shape(name, "bytes", doc))?;
    let format = spec.format();

    if spec.is_array() {
        let row_size = format.row_size().unwrap_or(0);
        if row_size == 0 || body.len() % row_size != 0 {
            return Err(TypeError::decode(
                name,
                format!("{} bytes is not a whole number of {row_size}-byte rows", body.len()),
            ));
        }
        let nrows = body.len() / row_size;
        slots[0] = Arg::Size(nrows);
        let mut offset = 0;
        for (index, column) in format.columns().iter().enumerate() {
            let len = nrows * column.size;
            fill_buffer(slots, index + 1, &body[offset..offset + len])?;
            offset += len;
        }
        return Ok(());
    }

    let line = std::str::from_utf8(body)
        .map_err(|_| TypeError::decode(name, "table row is not valid UTF-8"))?;
    let cells = format.scan_row(line)?;
    let mut slot = 0;
    for cell in cells {
        match cell {
            Cell::Text(bytes) => {
                fill_buffer(slots, slot, &bytes)?;
                slots[slot + 1] = Arg::Size(bytes.len());
                slot += 2;
            }
            Cell::Scalar(value) => {
                slots[slot] = Arg::Scalar(value);
                slot += 1;
            }
        }
    }
    Ok(())
}

fn observe_node(spec: &mut TypeSpec, args: &[Arg], leaves: &mut LeafCursor<'_>) -> Result<()> {
    if let TypeSpec::Any(slot) = spec {
        if leaves.at_value() {
            let leaf = leaves.next_leaf()?;
            let nested = value_at(&args[leaf.range()], 0)?;
            *slot = Some(Box::new(nested.observed_spec()?));
            return Ok(());
        }
    }
    if let TypeSpec::Any(Some(inner)) = spec {
        return observe_node(inner, args, leaves);
    }
    if is_walked_composite(spec) {
        match spec {
            TypeSpec::JsonArray(items) => {
                for item in items {
                    observe_node(item, args, leaves)?;
                }
            }
            TypeSpec::JsonObject(members) => {
                for (_, member) in members {
                    observe_node(member, args, leaves)?;
                }
            }
            _ => {}
        }
        return Ok(());
    }

    let leaf = leaves.next_leaf()?;
    let slots = &args[leaf.range()];
    match spec {
        TypeSpec::Scalar(scalar) if scalar.is_variable() => {
            let len = size_at(slots, 1)?;
            let bits = len
                .checked_mul(8)
                .ok_or_else(|| TypeError::encode("scalar", overflow(len)))?;
            scalar.set_observed_precision(bits);
        }
        TypeSpec::FixedArray1D(array) if !array.is_fixed() => {
            array.learn_length(size_at(slots, 1)?);
        }
        TypeSpec::NDArray(array) if !array.is_fixed() => {
            array.learn_shape(shape_at(slots, 2)?);
        }
        TypeSpec::JsonArray(items) => {
            let nrows = size_at(slots, 0)?;
            for item in items {
                if let TypeSpec::FixedArray1D(array) = item {
                    array.learn_length(nrows);
                }
            }
        }
        TypeSpec::JsonObject(members) => {
            let nrows = size_at(slots, 0)?;
            for (_, member) in members {
                if let TypeSpec::FixedArray1D(array) = member {
                    array.learn_length(nrows);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn measure_node(spec: &TypeSpec, args: &[Arg], leaves: &mut LeafCursor<'_>) -> Result<usize> {
    match spec {
        TypeSpec::Any(_) if leaves.at_value() => {
            let leaf = leaves.next_leaf()?;
            value_at(&args[leaf.range()], 0)?.byte_len()
        }
        TypeSpec::Any(Some(inner)) => measure_node(inner, args, leaves),
        TypeSpec::Any(None) => Err(TypeError::Uninitialized),
        TypeSpec::JsonArray(items) if is_walked_composite(spec) => {
            let mut total = 0usize;
            for item in items {
                total = total.saturating_add(measure_node(item, args, leaves)?);
            }
            Ok(total)
        }
        TypeSpec::JsonObject(members) if is_walked_composite(spec) => {
            let mut total = 0usize;
            for (_, member) in members {
                total = total.saturating_add(measure_node(member, args, leaves)?);
            }
            Ok(total)
        }
        _ => {
            let leaf = leaves.next_leaf()?;
            measure_leaf(spec, &args[leaf.range()])
        }
    }
}

fn measure_leaf(spec: &TypeSpec, slots: &[Arg]) -> Result<usize> {
    let len = match spec {
        TypeSpec::Scalar(scalar) if scalar.subtype().is_text() => size_at(slots, 1)?,
        TypeSpec::Scalar(scalar) => scalar.element_size(),
        TypeSpec::FixedArray1D(array) if array.is_fixed() => buffer_at(slots, 0)?.len(),
        TypeSpec::FixedArray1D(array) => size_at(slots, 1)?.saturating_mul(array.element_size()),
        TypeSpec::NDArray(array) if array.is_fixed() => buffer_at(slots, 0)?.len(),
        TypeSpec::NDArray(array) => shape_at(slots, 2)?
            .iter()
            .fold(array.element_size(), |total, dim| total.saturating_mul(*dim)),
        TypeSpec::JsonArray(_) | TypeSpec::JsonObject(_) => {
            let columns = spec.table_columns().ok_or(TypeError::Uninitialized)?;
            let nrows = size_at(slots, 0)?;
            columns.iter().fold(0usize, |total, column| {
                total.saturating_add(nrows.saturating_mul(column.element_size()))
            })
        }
        TypeSpec::Table(table) => {
            let format = table.format();
            if table.is_array() {
                let nrows = size_at(slots, 0)?;
                format.columns().iter().fold(0usize, |total, column| {
                    total.saturating_add(nrows.saturating_mul(column.size))
                })
            } else {
                let mut total = 0usize;
                let mut slot = 0;
                for column in format.columns() {
                    if column.is_text() {
                        total = total.saturating_add(size_at(slots, slot + 1)?);
                        slot += 2;
                    } else {
                        total = total.saturating_add(column.size);
                        slot += 1;
                    }
                }
                total
            }
        }
        TypeSpec::Direct => size_at(slots, 1)?,
        TypeSpec::Schema => 0,
        TypeSpec::Any(_) => return Err(TypeError::Uninitialized),
    };
    Ok(len)
}

fn wrong_shape(name: &'static str, expected: &str, doc: &WireDocument) -> TypeError {
    TypeError::decode(name, format!("expected {expected}, found {}", doc.kind()))
}

/// Raw bytes of a packed (base64) document node.
fn unpack(name: &'static str, doc: &WireDocument) -> Result<Vec<u8>> {
    match doc {
        WireDocument::String(text) => STANDARD
            .decode(text)
            .map_err(|err| TypeError::decode(name, format!("invalid base64: {err}"))),
        WireDocument::Bytes(bytes) => Ok(bytes.clone()),
        other => Err(wrong_shape(name, "base64 string", other)),
    }
}

fn element_count(name: &'static str, len: usize, element_size: usize) -> Result<usize> {
    if element_size == 0 || len % element_size != 0 {
        return Err(TypeError::decode(
            name,
            format!("{len} bytes is not a multiple of the {element_size}-byte element size"),
        ));
    }
    Ok(len / element_size)
}

fn byte_len(count: usize, element_size: usize) -> Option<usize> {
    count.checked_mul(element_size)
}

/// Number of elements in `shape`, or `None` if it overflows.
pub(crate) fn shape_elements(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
}

fn shape_byte_len(shape: &[usize], element_size: usize) -> Option<usize> {
    shape_elements(shape).and_then(|count| byte_len(count, element_size))
}

fn overflow(count: usize) -> String {
    format!("{count} elements overflow the addressable size")
}

fn shape_overflow(shape: &[usize]) -> String {
    format!("shape {shape:?} overflows the addressable size")
}

fn sized_bytes<'a>(name: &'static str, buffer: &'a ValueBuffer, len: usize) -> Result<&'a [u8]> {
    buffer.as_slice().get(..len).ok_or_else(|| {
        TypeError::encode(
            name,
            format!("{len} bytes requested from a {}-byte buffer", buffer.len()),
        )
    })
}

fn kind_error(slots: &[Arg], index: usize, expected: SlotKind) -> TypeError {
    match slots.get(index) {
        Some(arg) => TypeError::SlotKind {
            index,
            expected,
            found: arg.kind(),
        },
        None => TypeError::ArgCount {
            expected: index + 1,
            found: slots.len(),
        },
    }
}

fn scalar_at(slots: &[Arg], index: usize) -> Result<&Scalar> {
    slots
        .get(index)
        .and_then(Arg::as_scalar)
        .ok_or_else(|| kind_error(slots, index, SlotKind::Scalar))
}

fn buffer_at(slots: &[Arg], index: usize) -> Result<&ValueBuffer> {
    slots
        .get(index)
        .and_then(Arg::as_buffer)
        .ok_or_else(|| kind_error(slots, index, SlotKind::Buffer))
}

fn size_at(slots: &[Arg], index: usize) -> Result<usize> {
    slots
        .get(index)
        .and_then(Arg::as_size)
        .ok_or_else(|| kind_error(slots, index, SlotKind::Size))
}

fn shape_at(slots: &[Arg], index: usize) -> Result<&[usize]> {
    slots
        .get(index)
        .and_then(Arg::as_shape)
        .ok_or_else(|| kind_error(slots, index, SlotKind::Shape))
}

fn value_at(slots: &[Arg], index: usize) -> Result<&Value> {
    slots
        .get(index)
        .and_then(Arg::as_value)
        .ok_or_else(|| kind_error(slots, index, SlotKind::Value))
}

fn type_at(slots: &[Arg], index: usize) -> Result<&TypeSpec> {
    slots
        .get(index)
        .and_then(Arg::as_type)
        .ok_or_else(|| kind_error(slots, index, SlotKind::Type))
}

/// Copy `bytes` into the buffer slot at `index`, growing it if allowed.
fn fill_buffer(slots: &mut [Arg], index: usize, bytes: &[u8]) -> Result<()> {
    match slots.get_mut(index) {
        Some(Arg::Buffer(buffer)) => buffer.copy_in(bytes).map(|_| ()),
        _ => Err(kind_error(slots, index, SlotKind::Buffer)),
    }
}
