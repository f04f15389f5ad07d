//! Runtime type descriptions.
//!
//! A [`TypeSpec`] describes the shape of one message: which native argument
//! slots it consumes, and how those slots map onto a wire document. Specs are
//! immutable after construction except through [`TypeSpec::reconcile`], which
//! only ever fills in information that was unknown.

use std::fmt;

use crate::args::{ArgList, SlotKind};
use crate::error::{PathSegment, Result, TypeError};
use crate::format::TableFormat;
use crate::plan::ConsumptionPlan;
use crate::scalar::ScalarSubtype;

/// How a numeric scalar is written into the wire document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarEncoding {
    /// Little-endian bytes, base64 in a JSON string.
    Packed,
    /// JSON numbers and booleans.
    Json,
}

/// A single value: number, boolean, or string.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSpec {
    subtype: ScalarSubtype,
    precision: usize,
    units: String,
    variable_precision: bool,
    encoding: ScalarEncoding,
    pending_cast: Option<usize>,
}

impl ScalarSpec {
    /// Packed scalar of `precision` bits. Text subtypes with precision 0 are
    /// variable length.
    pub fn new(subtype: ScalarSubtype, precision: usize) -> Result<Self> {
        check_precision(subtype, precision, true)?;
        Ok(Self {
            subtype,
            precision,
            units: String::new(),
            variable_precision: subtype.is_text() && precision == 0,
            encoding: ScalarEncoding::Packed,
            pending_cast: None,
        })
    }

    /// JSON-native scalar (`integer`, `number`, `boolean`, `string`).
    pub fn json(subtype: ScalarSubtype, precision: usize) -> Result<Self> {
        if subtype == ScalarSubtype::Complex {
            return Err(TypeError::construction(
                "complex scalars have no JSON-native encoding",
            ));
        }
        let mut spec = Self::new(subtype, precision)?;
        spec.encoding = ScalarEncoding::Json;
        Ok(spec)
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Text scalar whose precision is only a record of the last observed
    /// length.
    pub fn with_variable_precision(mut self) -> Self {
        if self.subtype.is_text() {
            self.variable_precision = true;
        }
        self
    }

    pub fn subtype(&self) -> ScalarSubtype {
        self.subtype
    }

    /// Width in bits; for text, the declared or last observed length.
    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn is_variable(&self) -> bool {
        self.variable_precision
    }

    pub fn encoding(&self) -> ScalarEncoding {
        self.encoding
    }

    /// Width of incoming float data still to be cast to [`precision`](Self::precision).
    pub fn pending_cast(&self) -> Option<usize> {
        self.pending_cast
    }

    /// Bytes per value.
    pub fn element_size(&self) -> usize {
        self.precision / 8
    }

    pub fn label(&self) -> String {
        match (self.subtype, self.variable_precision) {
            (ScalarSubtype::Bool, _) => "bool".to_string(),
            (subtype, true) => format!("{subtype}(var)"),
            (subtype, false) => format!("{subtype}{}", self.precision),
        }
    }

    pub(crate) fn set_observed_precision(&mut self, precision: usize) {
        self.precision = precision;
    }

    fn merge(&mut self, observed: &ScalarSpec) -> Result<()> {
        if self.subtype != observed.subtype || self.encoding != observed.encoding {
            return Err(TypeError::incompatible(format!(
                "expected {} {}, found {} {}",
                encoding_name(self.encoding),
                self.label(),
                encoding_name(observed.encoding),
                observed.label()
            )));
        }
        merge_units(&mut self.units, &observed.units)?;

        if self.subtype.is_text() {
            if self.variable_precision {
                if observed.precision > 0 {
                    self.precision = observed.precision;
                }
            } else if observed.precision > self.precision {
                return Err(TypeError::incompatible(format!(
                    "{} bytes exceed fixed length {}",
                    observed.precision / 8,
                    self.precision / 8
                )));
            }
            return Ok(());
        }

        if observed.precision == self.precision {
            return match self.pending_cast {
                None => Ok(()),
                Some(cast) => Err(TypeError::incompatible(format!(
                    "already casting {cast}-bit data to {}; found {}-bit data",
                    self.precision, observed.precision
                ))),
            };
        }
        if !matches!(self.subtype, ScalarSubtype::Float | ScalarSubtype::Complex) {
            return Err(TypeError::incompatible(format!(
                "expected {}, found {}",
                self.label(),
                observed.label()
            )));
        }
        match self.pending_cast {
            None => {
                tracing::debug!(
                    from = observed.precision,
                    to = self.precision,
                    "accepting one-time float width cast"
                );
                self.pending_cast = Some(observed.precision);
                Ok(())
            }
            Some(cast) if cast == observed.precision => Ok(()),
            Some(cast) => Err(TypeError::incompatible(format!(
                "already casting {cast}-bit data to {}; found {}-bit data",
                self.precision, observed.precision
            ))),
        }
    }
}

/// One-dimensional array of fixed-width elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpec {
    subtype: ScalarSubtype,
    precision: usize,
    units: String,
    length: Option<usize>,
    variable_length: bool,
}

impl ArraySpec {
    /// Array of `length` elements; `None` means the length is learned from
    /// the first value.
    pub fn new(subtype: ScalarSubtype, precision: usize, length: Option<usize>) -> Result<Self> {
        check_precision(subtype, precision, false)?;
        Ok(Self {
            subtype,
            precision,
            units: String::new(),
            length,
            variable_length: false,
        })
    }

    /// Array whose length may differ on every message.
    pub fn variable(subtype: ScalarSubtype, precision: usize) -> Result<Self> {
        let mut spec = Self::new(subtype, precision, None)?;
        spec.variable_length = true;
        Ok(spec)
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn subtype(&self) -> ScalarSubtype {
        self.subtype
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn is_variable(&self) -> bool {
        self.variable_length
    }

    pub fn element_size(&self) -> usize {
        self.precision / 8
    }

    /// True when the element count is fixed by the type.
    pub fn is_fixed(&self) -> bool {
        self.length.is_some() && !self.variable_length
    }

    pub(crate) fn learn_length(&mut self, length: usize) {
        if !self.variable_length && self.length.is_none() {
            self.length = Some(length);
        }
    }

    fn merge(&mut self, observed: &ArraySpec) -> Result<()> {
        merge_element(
            (self.subtype, self.precision),
            (observed.subtype, observed.precision),
        )?;
        merge_units(&mut self.units, &observed.units)?;
        if self.variable_length {
            return Ok(());
        }
        match (self.length, observed.length) {
            (None, Some(length)) if !observed.variable_length => {
                self.length = Some(length);
                Ok(())
            }
            (Some(expected), Some(found)) if expected != found => Err(TypeError::incompatible(
                format!("expected length {expected}, found {found}"),
            )),
            _ => Ok(()),
        }
    }
}

/// N-dimensional array of fixed-width elements, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArraySpec {
    subtype: ScalarSubtype,
    precision: usize,
    units: String,
    shape: Option<Vec<usize>>,
    variable_shape: bool,
}

impl NdArraySpec {
    pub fn new(
        subtype: ScalarSubtype,
        precision: usize,
        shape: Option<Vec<usize>>,
    ) -> Result<Self> {
        check_precision(subtype, precision, false)?;
        Ok(Self {
            subtype,
            precision,
            units: String::new(),
            shape,
            variable_shape: false,
        })
    }

    pub fn variable(subtype: ScalarSubtype, precision: usize) -> Result<Self> {
        let mut spec = Self::new(subtype, precision, None)?;
        spec.variable_shape = true;
        Ok(spec)
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn subtype(&self) -> ScalarSubtype {
        self.subtype
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    pub fn is_variable(&self) -> bool {
        self.variable_shape
    }

    pub fn element_size(&self) -> usize {
        self.precision / 8
    }

    pub fn is_fixed(&self) -> bool {
        self.shape.is_some() && !self.variable_shape
    }

    pub(crate) fn learn_shape(&mut self, shape: &[usize]) {
        if !self.variable_shape && self.shape.is_none() {
            self.shape = Some(shape.to_vec());
        }
    }

    fn merge(&mut self, observed: &NdArraySpec) -> Result<()> {
        merge_element(
            (self.subtype, self.precision),
            (observed.subtype, observed.precision),
        )?;
        merge_units(&mut self.units, &observed.units)?;
        if self.variable_shape {
            return Ok(());
        }
        match (&self.shape, &observed.shape) {
            (None, Some(shape)) if !observed.variable_shape => {
                self.shape = Some(shape.clone());
                Ok(())
            }
            (Some(expected), Some(found)) if expected != found => Err(TypeError::incompatible(
                format!("expected shape {expected:?}, found {found:?}"),
            )),
            _ => Ok(()),
        }
    }
}

/// A table described by a printf-style row format.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    format: TableFormat,
    as_array: bool,
}

impl TableSpec {
    /// In row mode each message is one formatted line; in array mode each
    /// message is a column-major blob of fixed-width rows.
    pub fn new(format: &str, as_array: bool) -> Result<Self> {
        let format = TableFormat::parse(format)?;
        if format.columns().is_empty() {
            return Err(TypeError::construction(format!(
                "format {:?} has no columns",
                format.source()
            )));
        }
        if as_array && format.row_size().is_none() {
            return Err(TypeError::construction(format!(
                "format {:?}: array mode needs fixed-width string columns",
                format.source()
            )));
        }
        Ok(Self { format, as_array })
    }

    pub fn format(&self) -> &TableFormat {
        &self.format
    }

    pub fn is_array(&self) -> bool {
        self.as_array
    }

    fn slots(&self) -> Vec<SlotKind> {
        if self.as_array {
            let mut kinds = vec![SlotKind::Size];
            kinds.extend(self.format.columns().iter().map(|_| SlotKind::Buffer));
            return kinds;
        }
        let mut kinds = Vec::new();
        for column in self.format.columns() {
            if column.is_text() {
                kinds.extend([SlotKind::Buffer, SlotKind::Size]);
            } else {
                kinds.push(SlotKind::Scalar);
            }
        }
        kinds
    }
}

/// Runtime description of a message's shape and encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Scalar(ScalarSpec),
    FixedArray1D(ArraySpec),
    NDArray(NdArraySpec),
    /// Heterogeneous positional items.
    JsonArray(Vec<TypeSpec>),
    /// Named properties, in declaration order.
    JsonObject(Vec<(String, TypeSpec)>),
    Table(TableSpec),
    /// Generic slot filled by the first observed type.
    Any(Option<Box<TypeSpec>>),
    /// Raw bytes passed through unchanged.
    Direct,
    /// A type description carried as a value.
    Schema,
}

impl TypeSpec {
    pub fn scalar(subtype: ScalarSubtype, precision: usize) -> Result<Self> {
        ScalarSpec::new(subtype, precision).map(Self::Scalar)
    }

    pub fn json_scalar(subtype: ScalarSubtype, precision: usize) -> Result<Self> {
        ScalarSpec::json(subtype, precision).map(Self::Scalar)
    }

    pub fn array_1d(
        subtype: ScalarSubtype,
        precision: usize,
        length: Option<usize>,
    ) -> Result<Self> {
        ArraySpec::new(subtype, precision, length).map(Self::FixedArray1D)
    }

    pub fn ndarray(
        subtype: ScalarSubtype,
        precision: usize,
        shape: Option<Vec<usize>>,
    ) -> Result<Self> {
        NdArraySpec::new(subtype, precision, shape).map(Self::NDArray)
    }

    pub fn json_array(items: Vec<TypeSpec>) -> Self {
        Self::JsonArray(items)
    }

    /// Object type; property names must be unique.
    pub fn json_object<K: Into<String>>(
        properties: impl IntoIterator<Item = (K, TypeSpec)>,
    ) -> Result<Self> {
        let mut members: Vec<(String, TypeSpec)> = Vec::new();
        for (key, spec) in properties {
            let key = key.into();
            if members.iter().any(|(existing, _)| *existing == key) {
                return Err(TypeError::construction(format!(
                    "duplicate property {key:?}"
                )));
            }
            members.push((key, spec));
        }
        Ok(Self::JsonObject(members))
    }

    pub fn table(format: &str, as_array: bool) -> Result<Self> {
        TableSpec::new(format, as_array).map(Self::Table)
    }

    /// JSON array type built from a printf-style format: one scalar per
    /// column, or one 1-D array per column (table mode) when `as_array`.
    pub fn from_format(format: &str, as_array: bool) -> Result<Self> {
        let parsed = TableFormat::parse(format)?;
        let mut items = Vec::with_capacity(parsed.columns().len());
        for column in parsed.columns() {
            let scalar = column.scalar_spec()?;
            if as_array {
                if scalar.is_variable() {
                    return Err(TypeError::construction(format!(
                        "format {format:?}: array mode needs fixed-width string columns"
                    )));
                }
                items.push(Self::array_1d(scalar.subtype(), scalar.precision(), None)?);
            } else {
                items.push(Self::Scalar(scalar));
            }
        }
        Ok(Self::JsonArray(items))
    }

    /// Uninitialized generic type.
    pub fn any() -> Self {
        Self::Any(None)
    }

    pub fn any_of(inner: TypeSpec) -> Self {
        Self::Any(Some(Box::new(inner)))
    }

    /// Name used in type documents and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(spec) => match (spec.encoding, spec.subtype) {
                (ScalarEncoding::Packed, _) => "scalar",
                (ScalarEncoding::Json, ScalarSubtype::Bool) => "boolean",
                (ScalarEncoding::Json, ScalarSubtype::Int | ScalarSubtype::Uint) => "integer",
                (ScalarEncoding::Json, ScalarSubtype::Bytes | ScalarSubtype::Unicode) => "string",
                (ScalarEncoding::Json, _) => "number",
            },
            Self::FixedArray1D(_) => "1darray",
            Self::NDArray(_) => "ndarray",
            Self::JsonArray(_) => "array",
            Self::JsonObject(_) => "object",
            Self::Table(_) => "ascii_table",
            Self::Any(_) => "any",
            Self::Direct => "direct",
            Self::Schema => "schema",
        }
    }

    /// False while any generic slot in the tree is still empty.
    pub fn is_initialized(&self) -> bool {
        match self {
            Self::Any(None) => false,
            Self::Any(Some(inner)) => inner.is_initialized(),
            Self::JsonArray(items) => items.iter().all(Self::is_initialized),
            Self::JsonObject(members) => members.iter().all(|(_, spec)| spec.is_initialized()),
            _ => true,
        }
    }

    /// The concrete type behind any generic wrappers.
    pub fn resolved(&self) -> Result<&TypeSpec> {
        match self {
            Self::Any(None) => Err(TypeError::Uninitialized),
            Self::Any(Some(inner)) => inner.resolved(),
            other => Ok(other),
        }
    }

    /// True if message bodies of this type are raw bytes rather than JSON.
    pub fn is_raw_body(&self) -> bool {
        matches!(self.resolved(), Ok(Self::Direct | Self::Table(_)))
    }

    /// Direct children of a composite, with the path segment leading to each.
    pub fn children(&self) -> Vec<(PathSegment, &TypeSpec)> {
        match self {
            Self::JsonArray(items) => items
                .iter()
                .enumerate()
                .map(|(index, spec)| (PathSegment::Index(index), spec))
                .collect(),
            Self::JsonObject(members) => members
                .iter()
                .map(|(key, spec)| (PathSegment::Key(key.clone()), spec))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Columns of a composite in table mode: every child is a 1-D array and
    /// all declare the same length (or all leave it unknown).
    pub fn table_columns(&self) -> Option<Vec<&ArraySpec>> {
        let children = self.children();
        if children.is_empty() {
            return None;
        }
        let mut columns = Vec::with_capacity(children.len());
        for (_, child) in children {
            match child {
                Self::FixedArray1D(spec) => columns.push(spec),
                _ => return None,
            }
        }
        let length = columns[0].length;
        columns
            .iter()
            .all(|column| column.length == length)
            .then_some(columns)
    }

    /// Slot kinds of a leaf type, or `None` for composites that recurse.
    pub(crate) fn leaf_slots(&self) -> Result<Option<Vec<SlotKind>>> {
        let kinds = match self {
            Self::Scalar(spec) if spec.subtype.is_text() => vec![SlotKind::Buffer, SlotKind::Size],
            Self::Scalar(_) => vec![SlotKind::Scalar],
            Self::FixedArray1D(spec) if spec.is_fixed() => vec![SlotKind::Buffer],
            Self::FixedArray1D(_) => vec![SlotKind::Buffer, SlotKind::Size],
            Self::NDArray(spec) if spec.is_fixed() => vec![SlotKind::Buffer],
            Self::NDArray(_) => vec![SlotKind::Buffer, SlotKind::Size, SlotKind::Shape],
            Self::JsonArray(_) | Self::JsonObject(_) => match self.table_columns() {
                Some(columns) => {
                    let mut kinds = vec![SlotKind::Size];
                    kinds.extend(columns.iter().map(|_| SlotKind::Buffer));
                    kinds
                }
                None => return Ok(None),
            },
            Self::Table(spec) => spec.slots(),
            Self::Any(None) => return Err(TypeError::Uninitialized),
            Self::Any(Some(_)) => return Ok(None),
            Self::Direct => vec![SlotKind::Buffer, SlotKind::Size],
            Self::Schema => vec![SlotKind::Type],
        };
        Ok(Some(kinds))
    }

    /// Number of native argument slots this type consumes.
    pub fn nargs_exp(&self) -> Result<usize> {
        ConsumptionPlan::build(self).map(|plan| plan.total())
    }

    /// Raw payload bytes for types whose size is fixed by the type itself.
    /// `None` for variable types and for sizes that overflow `usize`.
    pub fn nbytes(&self) -> Option<usize> {
        match self {
            Self::Scalar(spec) if spec.variable_precision => None,
            Self::Scalar(spec) => Some(spec.element_size()),
            Self::FixedArray1D(spec) if spec.is_fixed() => spec
                .length
                .and_then(|length| length.checked_mul(spec.element_size())),
            Self::NDArray(spec) if spec.is_fixed() => spec
                .shape
                .as_deref()
                .and_then(crate::engine::shape_elements)
                .and_then(|count| count.checked_mul(spec.element_size())),
            Self::JsonArray(items) => items
                .iter()
                .try_fold(0usize, |total, item| total.checked_add(item.nbytes()?)),
            Self::JsonObject(members) => members
                .iter()
                .try_fold(0usize, |total, (_, member)| total.checked_add(member.nbytes()?)),
            Self::Any(Some(inner)) => inner.nbytes(),
            _ => None,
        }
    }

    /// Merge runtime-observed type information into this one.
    ///
    /// Unknown lengths, shapes and generic slots adopt the observed values;
    /// known values must agree. Float and complex widths may differ once,
    /// recorded as a pending cast. On error `self` is left unchanged.
    pub fn reconcile(&mut self, observed: &TypeSpec) -> Result<()> {
        let mut next = self.clone();
        next.merge(observed)?;
        if next != *self {
            tracing::trace!(from = %self, to = %next, "reconciled type");
        }
        *self = next;
        Ok(())
    }

    /// Whether [`reconcile`](Self::reconcile) would succeed.
    pub fn is_compatible(&self, observed: &TypeSpec) -> bool {
        self.clone().merge(observed).is_ok()
    }

    /// This type as seen in one concrete value: variable text lengths and
    /// unknown array lengths or shapes are filled from `args`.
    pub fn observed(&self, args: &ArgList) -> Result<TypeSpec> {
        crate::engine::observe(self, args)
    }

    /// Fresh decode destinations: one growable or zeroed slot per argument.
    pub fn template_args(&self) -> Result<ArgList> {
        let plan = ConsumptionPlan::build(self)?;
        let mut args = ArgList::new();
        for leaf in plan.leaves() {
            for kind in &leaf.kinds {
                args.push(crate::args::Arg::empty(*kind));
            }
        }
        Ok(args)
    }

    fn merge(&mut self, observed: &TypeSpec) -> Result<()> {
        match (self, observed) {
            (_, Self::Any(None)) => Ok(()),
            (this, Self::Any(Some(inner))) => this.merge(inner),
            (Self::Any(slot), other) => match slot {
                Some(inner) => inner.merge(other),
                None => {
                    *slot = Some(Box::new(other.clone()));
                    Ok(())
                }
            },
            (Self::Scalar(this), Self::Scalar(other)) => this.merge(other),
            (Self::FixedArray1D(this), Self::FixedArray1D(other)) => this.merge(other),
            (Self::NDArray(this), Self::NDArray(other)) => this.merge(other),
            (Self::JsonArray(items), Self::JsonArray(others)) => {
                if items.len() != others.len() {
                    return Err(TypeError::incompatible(format!(
                        "expected {} items, found {}",
                        items.len(),
                        others.len()
                    )));
                }
                for (index, (item, other)) in items.iter_mut().zip(others).enumerate() {
                    item.merge(other)
                        .map_err(|err| err.within(PathSegment::Index(index)))?;
                }
                Ok(())
            }
            (Self::JsonObject(members), Self::JsonObject(others)) => {
                if members.len() != others.len() {
                    return Err(TypeError::incompatible(format!(
                        "expected {} properties, found {}",
                        members.len(),
                        others.len()
                    )));
                }
                for (key, member) in members.iter_mut() {
                    let other = others
                        .iter()
                        .find(|(other_key, _)| other_key == key)
                        .map(|(_, spec)| spec)
                        .ok_or_else(|| {
                            TypeError::incompatible(format!("missing property {key:?}"))
                        })?;
                    member
                        .merge(other)
                        .map_err(|err| err.within(PathSegment::Key(key.clone())))?;
                }
                Ok(())
            }
            (Self::Table(this), Self::Table(other)) => {
                if this == other {
                    Ok(())
                } else {
                    Err(TypeError::incompatible(format!(
                        "expected table {:?}, found {:?}",
                        this.format.source(),
                        other.format.source()
                    )))
                }
            }
            (Self::Direct, Self::Direct) | (Self::Schema, Self::Schema) => Ok(()),
            (this, other) => Err(TypeError::incompatible(format!(
                "expected {}, found {}",
                this.type_name(),
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(spec) => write!(f, "{}", spec.label()),
            Self::FixedArray1D(spec) => {
                write!(f, "{}{}[", spec.subtype, spec.precision)?;
                match (spec.length, spec.variable_length) {
                    (_, true) => write!(f, "*]"),
                    (Some(length), _) => write!(f, "{length}]"),
                    (None, _) => write!(f, "?]"),
                }
            }
            Self::NDArray(spec) => {
                write!(f, "{}{}", spec.subtype, spec.precision)?;
                match (&spec.shape, spec.variable_shape) {
                    (_, true) => write!(f, "[*]"),
                    (Some(shape), _) => write!(f, "{shape:?}"),
                    (None, _) => write!(f, "[?]"),
                }
            }
            Self::JsonArray(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::JsonObject(members) => {
                write!(f, "{{")?;
                for (index, (key, spec)) in members.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {spec}")?;
                }
                write!(f, "}}")
            }
            Self::Table(spec) => write!(f, "table({:?})", spec.format.source()),
            Self::Any(None) => write!(f, "any"),
            Self::Any(Some(inner)) => write!(f, "any({inner})"),
            Self::Direct => write!(f, "direct"),
            Self::Schema => write!(f, "schema"),
        }
    }
}

fn encoding_name(encoding: ScalarEncoding) -> &'static str {
    match encoding {
        ScalarEncoding::Packed => "packed",
        ScalarEncoding::Json => "json",
    }
}

fn check_precision(subtype: ScalarSubtype, precision: usize, allow_variable: bool) -> Result<()> {
    if subtype.is_text() && precision == 0 && !allow_variable {
        return Err(TypeError::construction(format!(
            "{subtype} array elements need a fixed precision"
        )));
    }
    if !subtype.accepts_precision(precision) {
        return Err(TypeError::construction(format!(
            "unsupported precision {precision} for {subtype}"
        )));
    }
    Ok(())
}

fn merge_element(expected: (ScalarSubtype, usize), found: (ScalarSubtype, usize)) -> Result<()> {
    if expected == found {
        return Ok(());
    }
    Err(TypeError::incompatible(format!(
        "expected {}{} elements, found {}{}",
        expected.0, expected.1, found.0, found.1
    )))
}

fn merge_units(units: &mut String, observed: &str) -> Result<()> {
    if observed.is_empty() || units == observed {
        return Ok(());
    }
    if units.is_empty() {
        *units = observed.to_string();
        return Ok(());
    }
    Err(TypeError::incompatible(format!(
        "units {units:?} do not match {observed:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float64_array(length: Option<usize>) -> TypeSpec {
        TypeSpec::array_1d(ScalarSubtype::Float, 64, length).unwrap()
    }

    #[test]
    fn scalar_construction_validates_precision() {
        assert!(TypeSpec::scalar(ScalarSubtype::Int, 32).is_ok());
        assert!(TypeSpec::scalar(ScalarSubtype::Int, 24)
            .unwrap_err()
            .is_construction());
        assert!(TypeSpec::scalar(ScalarSubtype::Float, 16).is_err());
        assert!(TypeSpec::json_scalar(ScalarSubtype::Complex, 128).is_err());
        assert!(TypeSpec::array_1d(ScalarSubtype::Bytes, 0, Some(2)).is_err());

        let text = ScalarSpec::new(ScalarSubtype::Unicode, 0).unwrap();
        assert!(text.is_variable());
        let fixed = ScalarSpec::new(ScalarSubtype::Bytes, 80).unwrap();
        assert!(!fixed.is_variable());
    }

    #[test]
    fn duplicate_object_keys_are_rejected() {
        let err = TypeSpec::json_object([
            ("a", TypeSpec::Direct),
            ("a", TypeSpec::Schema),
        ])
        .unwrap_err();
        assert!(err.is_construction());
    }

    #[test]
    fn nargs_for_leaf_types() {
        let int = TypeSpec::scalar(ScalarSubtype::Int, 32).unwrap();
        let text = TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap();
        assert_eq!(int.nargs_exp().unwrap(), 1);
        assert_eq!(text.nargs_exp().unwrap(), 2);
        assert_eq!(float64_array(Some(3)).nargs_exp().unwrap(), 1);
        assert_eq!(float64_array(None).nargs_exp().unwrap(), 2);
        let nd = TypeSpec::ndarray(ScalarSubtype::Int, 16, Some(vec![2, 3])).unwrap();
        assert_eq!(nd.nargs_exp().unwrap(), 1);
        let nd = TypeSpec::ndarray(ScalarSubtype::Int, 16, None).unwrap();
        assert_eq!(nd.nargs_exp().unwrap(), 3);
        assert_eq!(TypeSpec::Direct.nargs_exp().unwrap(), 2);
        assert_eq!(TypeSpec::Schema.nargs_exp().unwrap(), 1);
    }

    #[test]
    fn nargs_for_composites_and_table_mode() {
        let mixed = TypeSpec::json_object([
            ("x", TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap()),
            ("y", float64_array(Some(3))),
            ("s", TypeSpec::scalar(ScalarSubtype::Bytes, 0).unwrap()),
        ])
        .unwrap();
        assert_eq!(mixed.nargs_exp().unwrap(), 4);
        assert!(mixed.table_columns().is_none());

        let columns = TypeSpec::json_array(vec![float64_array(None), float64_array(None)]);
        assert!(columns.table_columns().is_some());
        assert_eq!(columns.nargs_exp().unwrap(), 3);

        let ragged = TypeSpec::json_array(vec![float64_array(Some(2)), float64_array(None)]);
        assert!(ragged.table_columns().is_none());
        assert_eq!(ragged.nargs_exp().unwrap(), 3);

        let nested = TypeSpec::json_array(vec![
            TypeSpec::scalar(ScalarSubtype::Bool, 8).unwrap(),
            TypeSpec::any_of(mixed),
        ]);
        assert_eq!(nested.nargs_exp().unwrap(), 5);
    }

    #[test]
    fn table_nargs_by_mode() {
        let row = TypeSpec::table("%d\t%s\t%f%fj\n", false).unwrap();
        assert_eq!(row.nargs_exp().unwrap(), 4);
        let array = TypeSpec::table("%d\t%5s\t%f\n", true).unwrap();
        assert_eq!(array.nargs_exp().unwrap(), 4);
        assert!(TypeSpec::table("%d\t%s\n", true).unwrap_err().is_construction());
        assert!(TypeSpec::table("no columns", false).is_err());
    }

    #[test]
    fn from_format_builds_scalars_or_columns() {
        let rows = TypeSpec::from_format("%d %f %s", false).unwrap();
        assert_eq!(rows.nargs_exp().unwrap(), 4);
        let columns = TypeSpec::from_format("%d %5.2f%5.2fj", true).unwrap();
        assert_eq!(columns.children().len(), 2);
        assert!(columns.table_columns().is_some());
        assert_eq!(columns.nargs_exp().unwrap(), 3);
        assert!(TypeSpec::from_format("%d %s", true).is_err());
        assert!(TypeSpec::from_format("%q", false).is_err());
    }

    #[test]
    fn uninitialized_any_fails_until_reconciled() {
        let mut spec = TypeSpec::any();
        assert!(matches!(spec.nargs_exp(), Err(TypeError::Uninitialized)));
        assert!(!spec.is_initialized());

        let observed = float64_array(Some(3));
        spec.reconcile(&observed).unwrap();
        assert_eq!(spec, TypeSpec::any_of(observed.clone()));
        assert_eq!(spec.nargs_exp().unwrap(), 1);

        let before = spec.clone();
        spec.reconcile(&observed).unwrap();
        assert_eq!(spec, before);

        let err = spec.reconcile(&TypeSpec::Direct).unwrap_err();
        assert!(matches!(err, TypeError::Incompatible { .. }));
        assert_eq!(spec, before);
    }

    #[test]
    fn reconcile_learns_unknown_length_once() {
        let mut spec = float64_array(None);
        spec.reconcile(&float64_array(Some(4))).unwrap();
        assert_eq!(spec, float64_array(Some(4)));
        assert!(spec.reconcile(&float64_array(Some(5))).is_err());

        let mut variable =
            TypeSpec::FixedArray1D(ArraySpec::variable(ScalarSubtype::Float, 64).unwrap());
        variable.reconcile(&float64_array(Some(4))).unwrap();
        variable.reconcile(&float64_array(Some(7))).unwrap();
        assert_eq!(variable.nargs_exp().unwrap(), 2);
    }

    #[test]
    fn reconcile_text_precision() {
        let mut variable = TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap();
        let seen = ScalarSpec::new(ScalarSubtype::Unicode, 0)
            .unwrap()
            .with_variable_precision();
        let mut seen_five = seen.clone();
        seen_five.set_observed_precision(40);
        variable.reconcile(&TypeSpec::Scalar(seen_five.clone())).unwrap();
        match &variable {
            TypeSpec::Scalar(spec) => {
                assert_eq!(spec.precision(), 40);
                assert!(spec.is_variable());
            }
            other => panic!("unexpected {other}"),
        }

        let mut fixed = TypeSpec::scalar(ScalarSubtype::Unicode, 32).unwrap();
        assert!(fixed.reconcile(&TypeSpec::Scalar(seen_five)).is_err());
        let mut seen_three = seen;
        seen_three.set_observed_precision(24);
        fixed.reconcile(&TypeSpec::Scalar(seen_three)).unwrap();
    }

    #[test]
    fn float_width_cast_is_allowed_once() {
        let mut spec = TypeSpec::scalar(ScalarSubtype::Float, 64).unwrap();
        let narrow = TypeSpec::scalar(ScalarSubtype::Float, 32).unwrap();
        spec.reconcile(&narrow).unwrap();
        match &spec {
            TypeSpec::Scalar(scalar) => assert_eq!(scalar.pending_cast(), Some(32)),
            other => panic!("unexpected {other}"),
        }
        spec.reconcile(&narrow).unwrap();
        let wide = TypeSpec::scalar(ScalarSubtype::Float, 64).unwrap();
        assert!(spec.reconcile(&wide).is_err());

        let mut int = TypeSpec::scalar(ScalarSubtype::Int, 64).unwrap();
        assert!(int
            .reconcile(&TypeSpec::scalar(ScalarSubtype::Int, 32).unwrap())
            .is_err());
    }

    #[test]
    fn reconcile_reports_nested_path() {
        let mut spec = TypeSpec::json_object([(
            "y",
            TypeSpec::json_array(vec![float64_array(Some(3))]),
        )])
        .unwrap();
        let observed = TypeSpec::json_object([(
            "y",
            TypeSpec::json_array(vec![float64_array(Some(2))]),
        )])
        .unwrap();
        let err = spec.reconcile(&observed).unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "$.y[0]");
        assert!(!spec.is_compatible(&observed));
    }

    #[test]
    fn units_are_adopted_when_missing() {
        let mut spec = TypeSpec::Scalar(ScalarSpec::new(ScalarSubtype::Float, 64).unwrap());
        let metres = TypeSpec::Scalar(
            ScalarSpec::new(ScalarSubtype::Float, 64)
                .unwrap()
                .with_units("m"),
        );
        spec.reconcile(&metres).unwrap();
        assert_eq!(spec, metres);
        let seconds = TypeSpec::Scalar(
            ScalarSpec::new(ScalarSubtype::Float, 64)
                .unwrap()
                .with_units("s"),
        );
        assert!(spec.reconcile(&seconds).is_err());
    }

    #[test]
    fn nbytes_for_fixed_types() {
        let spec = TypeSpec::json_object([
            ("x", TypeSpec::json_scalar(ScalarSubtype::Int, 32).unwrap()),
            ("y", float64_array(Some(3))),
        ])
        .unwrap();
        assert_eq!(spec.nbytes(), Some(28));
        assert_eq!(float64_array(None).nbytes(), None);
        assert_eq!(
            TypeSpec::ndarray(ScalarSubtype::Uint, 8, Some(vec![2, 3]))
                .unwrap()
                .nbytes(),
            Some(6)
        );
        assert_eq!(
            TypeSpec::ndarray(ScalarSubtype::Float, 64, Some(vec![usize::MAX / 2, 4]))
                .unwrap()
                .nbytes(),
            None
        );
        assert_eq!(float64_array(Some(usize::MAX / 4)).nbytes(), None);
    }

    #[test]
    fn template_args_match_plan() {
        let spec = TypeSpec::json_array(vec![
            TypeSpec::scalar(ScalarSubtype::Int, 32).unwrap(),
            TypeSpec::scalar(ScalarSubtype::Unicode, 0).unwrap(),
            TypeSpec::ndarray(ScalarSubtype::Float, 32, None).unwrap(),
        ]);
        let args = spec.template_args().unwrap();
        assert_eq!(
            args.kinds(),
            vec![
                SlotKind::Scalar,
                SlotKind::Buffer,
                SlotKind::Size,
                SlotKind::Buffer,
                SlotKind::Size,
                SlotKind::Shape
            ]
        );
    }
}
