use crate::args::{Arg, ArgList};
use crate::buffer::ValueBuffer;
use crate::document::WireDocument;
use crate::engine;
use crate::error::Result;
use crate::plan;
use crate::spec::TypeSpec;

/// An owned message: a type and the argument slots that fill it.
///
/// The slots always match the type's consumption plan. Cloning is deep.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    spec: TypeSpec,
    args: ArgList,
}

impl Value {
    /// Pair `spec` with `args`, checking slot count and kinds.
    pub fn new(spec: TypeSpec, args: ArgList) -> Result<Self> {
        plan::plan(&spec, &args)?;
        Ok(Self { spec, args })
    }

    /// Decode a body produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(spec: TypeSpec, bytes: &[u8]) -> Result<Self> {
        let args = engine::deserialize(&spec, bytes)?;
        Ok(Self { spec, args })
    }

    /// An empty `direct` value, used as a fresh nested-value slot.
    pub(crate) fn placeholder() -> Self {
        Self {
            spec: TypeSpec::Direct,
            args: ArgList::from(vec![Arg::Buffer(ValueBuffer::growable()), Arg::Size(0)]),
        }
    }

    pub fn from_document(spec: TypeSpec, doc: &WireDocument) -> Result<Self> {
        let mut args = spec.template_args()?;
        engine::decode(&spec, doc, &mut args)?;
        Ok(Self { spec, args })
    }

    pub fn spec(&self) -> &TypeSpec {
        &self.spec
    }

    pub fn args(&self) -> &ArgList {
        &self.args
    }

    pub fn into_parts(self) -> (TypeSpec, ArgList) {
        (self.spec, self.args)
    }

    /// Native payload bytes in use. Text and variable-length slots count
    /// what their size slot says, not the buffer behind it.
    pub fn byte_len(&self) -> Result<usize> {
        engine::payload_len(&self.spec, &self.args)
    }

    /// The type as seen in this value's arguments.
    pub fn observed_spec(&self) -> Result<TypeSpec> {
        self.spec.observed(&self.args)
    }

    pub fn to_document(&self) -> Result<WireDocument> {
        engine::encode(&self.spec, &self.args)
    }

    /// Message body bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        engine::serialize(&self.spec, &self.args)
    }
}
