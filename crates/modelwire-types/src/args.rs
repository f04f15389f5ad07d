//! Typed argument slots consumed and produced by the serialization engine.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::buffer::{Element, ValueBuffer};
use crate::scalar::Scalar;
use crate::spec::TypeSpec;
use crate::value::Value;

/// One native argument slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// An owned numeric or boolean value.
    Scalar(Scalar),
    /// Raw bytes: text, array data, or a table column.
    Buffer(ValueBuffer),
    /// Element, byte, row or dimension count accompanying a buffer.
    Size(usize),
    /// N-D array dimensions.
    Shape(Vec<usize>),
    /// A type description carried as a value.
    Type(TypeSpec),
    /// A complete nested value filling one generic (`any`) position.
    Value(Box<Value>),
}

/// Kind of an [`Arg`], used to check argument lists against a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Scalar,
    Buffer,
    Size,
    Shape,
    Type,
    Value,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scalar => "scalar",
            Self::Buffer => "buffer",
            Self::Size => "size",
            Self::Shape => "shape",
            Self::Type => "type",
            Self::Value => "value",
        };
        f.write_str(name)
    }
}

impl Arg {
    pub fn kind(&self) -> SlotKind {
        match self {
            Self::Scalar(_) => SlotKind::Scalar,
            Self::Buffer(_) => SlotKind::Buffer,
            Self::Size(_) => SlotKind::Size,
            Self::Shape(_) => SlotKind::Shape,
            Self::Type(_) => SlotKind::Type,
            Self::Value(_) => SlotKind::Value,
        }
    }

    /// Fresh slot of the given kind, suitable as a decode destination.
    pub fn empty(kind: SlotKind) -> Self {
        match kind {
            SlotKind::Scalar => Self::Scalar(Scalar::I64(0)),
            SlotKind::Buffer => Self::Buffer(ValueBuffer::growable()),
            SlotKind::Size => Self::Size(0),
            SlotKind::Shape => Self::Shape(Vec::new()),
            SlotKind::Type => Self::Type(TypeSpec::any()),
            SlotKind::Value => Self::Value(Box::new(Value::placeholder())),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&ValueBuffer> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_size(&self) -> Option<usize> {
        match self {
            Self::Size(size) => Some(*size),
            _ => None,
        }
    }

    pub fn as_shape(&self) -> Option<&[usize]> {
        match self {
            Self::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeSpec> {
        match self {
            Self::Type(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Scalar> for Arg {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! impl_scalar_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

impl_scalar_arg!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl From<ValueBuffer> for Arg {
    fn from(buffer: ValueBuffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<TypeSpec> for Arg {
    fn from(spec: TypeSpec) -> Self {
        Self::Type(spec)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(Box::new(value))
    }
}

/// Ordered argument slots for one message.
///
/// An `ArgList` must be consumed to exhaustion by the type it is encoded or
/// decoded with; the engine rejects leftover or missing slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgList {
    slots: Vec<Arg>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, arg: impl Into<Arg>) -> Self {
        self.push(arg);
        self
    }

    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.slots.push(arg.into());
    }

    /// Push a `bytes`/`unicode` value as its (buffer, length) pair.
    pub fn push_text(&mut self, text: impl AsRef<[u8]>) {
        let bytes = text.as_ref();
        self.slots.push(Arg::Buffer(ValueBuffer::from(bytes)));
        self.slots.push(Arg::Size(bytes.len()));
    }

    /// Builder-style [`push_text`](Self::push_text).
    pub fn with_text(mut self, text: impl AsRef<[u8]>) -> Self {
        self.push_text(text);
        self
    }

    /// Push array data as a buffer of little-endian elements.
    pub fn push_elements<T: Element>(&mut self, values: &[T]) {
        self.slots.push(Arg::Buffer(ValueBuffer::from_elements(values)));
    }

    /// Builder-style [`push_elements`](Self::push_elements).
    pub fn with_elements<T: Element>(mut self, values: &[T]) -> Self {
        self.push_elements(values);
        self
    }

    pub fn push_size(&mut self, size: usize) {
        self.slots.push(Arg::Size(size));
    }

    /// Builder-style [`push_size`](Self::push_size).
    pub fn with_size(mut self, size: usize) -> Self {
        self.push_size(size);
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.slots.iter()
    }

    pub fn as_slice(&self) -> &[Arg] {
        &self.slots
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Arg] {
        &mut self.slots
    }

    pub fn into_vec(self) -> Vec<Arg> {
        self.slots
    }

    /// Kinds of every slot, in order.
    pub fn kinds(&self) -> Vec<SlotKind> {
        self.slots.iter().map(Arg::kind).collect()
    }
}

impl From<Vec<Arg>> for ArgList {
    fn from(slots: Vec<Arg>) -> Self {
        Self { slots }
    }
}

impl FromIterator<Arg> for ArgList {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ArgList {
    type Item = Arg;
    type IntoIter = std::vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArgList {
    type Item = &'a Arg;
    type IntoIter = std::slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

impl Index<usize> for ArgList {
    type Output = Arg;

    fn index(&self, index: usize) -> &Arg {
        &self.slots[index]
    }
}

impl IndexMut<usize> for ArgList {
    fn index_mut(&mut self, index: usize) -> &mut Arg {
        &mut self.slots[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_push_expected_kinds() {
        let args = ArgList::new()
            .with(42i32)
            .with_text("hello")
            .with_elements(&[1.0f64, 2.0])
            .with_size(2);
        assert_eq!(
            args.kinds(),
            vec![
                SlotKind::Scalar,
                SlotKind::Buffer,
                SlotKind::Size,
                SlotKind::Buffer,
                SlotKind::Size
            ]
        );
        assert_eq!(args[2].as_size(), Some(5));
        assert_eq!(args[1].as_buffer().unwrap().as_slice(), b"hello");
    }

    #[test]
    fn nested_value_is_one_slot() {
        let inner = Value::new(TypeSpec::Direct, ArgList::new().with_text("raw")).unwrap();
        let args = ArgList::new().with(1u16).with(inner.clone());
        assert_eq!(args.kinds(), vec![SlotKind::Scalar, SlotKind::Value]);
        assert_eq!(args[1].as_value(), Some(&inner));
    }

    #[test]
    fn empty_slots_match_their_kind() {
        for kind in [
            SlotKind::Scalar,
            SlotKind::Buffer,
            SlotKind::Size,
            SlotKind::Shape,
            SlotKind::Type,
            SlotKind::Value,
        ] {
            assert_eq!(Arg::empty(kind).kind(), kind);
        }
    }
}
