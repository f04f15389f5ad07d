//! printf-style format strings as table column descriptions.
//!
//! A format such as `"%d %5.2f %s\n"` describes one table row. Parsing turns
//! it into literal segments and typed [`Column`]s; [`TableFormat::format_row`]
//! and [`TableFormat::scan_row`] render and read rows the way `printf` and
//! `scanf` would.

mod printf;
mod scanf;

use std::os::raw::c_long;

use crate::error::{PathSegment, Result, TypeError};
use crate::scalar::{Scalar, ScalarSubtype};
use crate::spec::ScalarSpec;

/// Largest field width or precision accepted in a conversion.
pub const MAX_FIELD_WIDTH: usize = 4096;

/// Primitive column codes recognized in a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnCode {
    Int8,
    Int16,
    Int32,
    Int64,
    /// `%ld`/`%zd`: signed integer of the platform's native width.
    IntNative,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// `%lu`/`%zu`: unsigned integer of the platform's native width.
    UIntNative,
    /// `%hf`
    Float,
    /// `%f`, `%lf`, `%e`, `%g`
    Double,
    /// Two adjacent floats followed by `j`.
    Complex,
    /// `%s` or `%c`.
    Bytes,
}

impl ColumnCode {
    pub fn subtype(self) -> ScalarSubtype {
        match self {
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::IntNative => {
                ScalarSubtype::Int
            }
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 | Self::UIntNative => {
                ScalarSubtype::Uint
            }
            Self::Float | Self::Double => ScalarSubtype::Float,
            Self::Complex => ScalarSubtype::Complex,
            Self::Bytes => ScalarSubtype::Bytes,
        }
    }

    fn signed(size: usize, native: bool) -> Self {
        match (size, native) {
            (_, true) => Self::IntNative,
            (1, _) => Self::Int8,
            (2, _) => Self::Int16,
            (4, _) => Self::Int32,
            _ => Self::Int64,
        }
    }

    fn unsigned(size: usize, native: bool) -> Self {
        match (size, native) {
            (_, true) => Self::UIntNative,
            (1, _) => Self::UInt8,
            (2, _) => Self::UInt16,
            (4, _) => Self::UInt32,
            _ => Self::UInt64,
        }
    }
}

/// printf flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub left: bool,
    pub plus: bool,
    pub space: bool,
    pub zero: bool,
    pub alt: bool,
}

/// One parsed `%...` conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub flags: Flags,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    /// Conversion character (`d`, `x`, `f`, `s`, ...).
    pub conv: char,
}

/// A typed column: its code, its width in bytes, and the conversion(s) that
/// render it. Complex columns carry two conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub code: ColumnCode,
    /// Bytes per value. Zero for a variable-width string.
    pub size: usize,
    pub(crate) parts: Vec<Conversion>,
}

impl Column {
    /// Scalar type of one value in this column.
    pub fn scalar_spec(&self) -> Result<ScalarSpec> {
        ScalarSpec::new(self.code.subtype(), self.size * 8)
    }

    pub fn is_text(&self) -> bool {
        self.code == ColumnCode::Bytes
    }

    pub fn is_variable(&self) -> bool {
        self.size == 0
    }
}

/// A value in one row cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Scalar(Scalar),
    Text(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Column(usize),
}

/// A parsed printf-style row format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    source: String,
    segments: Vec<Segment>,
    columns: Vec<Column>,
}

impl TableFormat {
    /// Parse a format string.
    ///
    /// Unsupported conversions (`%q`, `%Lf`, `%hhf`, ...) are construction
    /// errors. `%%` is a literal percent sign.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut columns: Vec<Column> = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '%'))) {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut flags = Flags::default();
            while let Some(&(_, flag)) = chars.peek() {
                match flag {
                    '-' => flags.left = true,
                    '+' => flags.plus = true,
                    ' ' => flags.space = true,
                    '0' => flags.zero = true,
                    '#' => flags.alt = true,
                    _ => break,
                }
                chars.next();
            }

            let width = take_number(&mut chars).map_err(|digits| {
                TypeError::construction(format!(
                    "format {source:?}: width {digits} at offset {offset} exceeds {MAX_FIELD_WIDTH}"
                ))
            })?;
            let precision = if matches!(chars.peek(), Some((_, '.'))) {
                chars.next();
                let precision = take_number(&mut chars).map_err(|digits| {
                    TypeError::construction(format!(
                        "format {source:?}: precision {digits} at offset {offset} exceeds {MAX_FIELD_WIDTH}"
                    ))
                })?;
                Some(precision.unwrap_or(0))
            } else {
                None
            };

            let mut modifier = String::new();
            while let Some(&(_, m)) = chars.peek() {
                let extends = match m {
                    'h' | 'l' | 'j' | 'z' | 't' | 'L' => true,
                    '6' | '4' => modifier.starts_with('l'),
                    _ => false,
                };
                if !extends {
                    break;
                }
                modifier.push(m);
                chars.next();
            }

            let conv = match chars.next() {
                Some((_, conv)) => conv,
                None => {
                    return Err(TypeError::construction(format!(
                        "format {source:?}: incomplete conversion at offset {offset}"
                    )))
                }
            };

            let (code, size) = classify(conv, &modifier, width).ok_or_else(|| {
                TypeError::construction(format!(
                    "format {source:?}: unsupported conversion '%{modifier}{conv}' at offset {offset}"
                ))
            })?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Column(columns.len()));
            columns.push(Column {
                code,
                size,
                parts: vec![Conversion {
                    flags,
                    width,
                    precision,
                    conv,
                }],
            });
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let (segments, columns) = merge_complex(segments, columns);
        Ok(Self {
            source: source.to_string(),
            segments,
            columns,
        })
    }

    /// The original format string.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Bytes per row, or `None` if a column has variable width.
    pub fn row_size(&self) -> Option<usize> {
        self.columns
            .iter()
            .map(|column| (!column.is_variable()).then_some(column.size))
            .sum()
    }

    /// Render one row, `printf` style.
    pub fn format_row(&self, cells: &[Cell]) -> Result<String> {
        if cells.len() != self.columns.len() {
            return Err(TypeError::ArgCount {
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Column(index) => {
                    printf::render_column(&self.columns[*index], &cells[*index], &mut out)
                        .map_err(|err| err.within(PathSegment::Column(*index)))?
                }
            }
        }
        Ok(out)
    }

    /// Read one row, `scanf` style.
    pub fn scan_row(&self, line: &str) -> Result<Vec<Cell>> {
        let mut cursor = scanf::Scanner::new(line.as_bytes());
        let mut cells = Vec::with_capacity(self.columns.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => cursor.literal(text)?,
                Segment::Column(index) => {
                    let cell = cursor
                        .column(&self.columns[*index])
                        .map_err(|err| err.within(PathSegment::Column(*index)))?;
                    cells.push(cell);
                }
            }
        }
        Ok(cells)
    }
}

/// Read a run of digits. Values over [`MAX_FIELD_WIDTH`] come back as the
/// offending digit string.
fn take_number(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> std::result::Result<Option<usize>, String> {
    let mut digits = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    if digits.is_empty() {
        return Ok(None);
    }
    match digits.parse::<usize>() {
        Ok(value) if value <= MAX_FIELD_WIDTH => Ok(Some(value)),
        _ => Err(digits),
    }
}

fn native_long() -> usize {
    std::mem::size_of::<c_long>()
}

fn native_size() -> usize {
    std::mem::size_of::<usize>()
}

/// Map a conversion and its length modifier to a column code and byte width.
fn classify(conv: char, modifier: &str, width: Option<usize>) -> Option<(ColumnCode, usize)> {
    let int_size = || -> Option<(usize, bool)> {
        match modifier {
            "hh" => Some((1, false)),
            "h" => Some((2, false)),
            "" => Some((4, false)),
            "l" => Some((native_long(), true)),
            "ll" | "l64" | "j" => Some((8, false)),
            "z" | "t" => Some((native_size(), true)),
            _ => None,
        }
    };
    match conv {
        'd' | 'i' => int_size().map(|(size, native)| (ColumnCode::signed(size, native), size)),
        'u' | 'o' | 'x' | 'X' => {
            int_size().map(|(size, native)| (ColumnCode::unsigned(size, native), size))
        }
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => match modifier {
            "" | "l" => Some((ColumnCode::Double, 8)),
            "h" => Some((ColumnCode::Float, 4)),
            _ => None,
        },
        's' if modifier.is_empty() => Some((ColumnCode::Bytes, width.unwrap_or(0))),
        'c' if modifier.is_empty() => Some((ColumnCode::Bytes, width.unwrap_or(1))),
        _ => None,
    }
}

/// Collapse `%f%fj` pairs into single complex columns.
fn merge_complex(segments: Vec<Segment>, columns: Vec<Column>) -> (Vec<Segment>, Vec<Column>) {
    let mut merged_segments = Vec::with_capacity(segments.len());
    let mut merged_columns: Vec<Column> = Vec::with_capacity(columns.len());
    let mut i = 0;
    while i < segments.len() {
        if let (Segment::Column(a), Some(Segment::Column(b)), Some(Segment::Literal(rest))) =
            (&segments[i], segments.get(i + 1), segments.get(i + 2))
        {
            let (first, second) = (&columns[*a], &columns[*b]);
            let floats = matches!(first.code, ColumnCode::Float | ColumnCode::Double)
                && first.code == second.code;
            if floats && rest.starts_with('j') {
                merged_segments.push(Segment::Column(merged_columns.len()));
                merged_columns.push(Column {
                    code: ColumnCode::Complex,
                    size: first.size * 2,
                    parts: vec![first.parts[0].clone(), second.parts[0].clone()],
                });
                let tail = &rest[1..];
                if !tail.is_empty() {
                    merged_segments.push(Segment::Literal(tail.to_string()));
                }
                i += 3;
                continue;
            }
        }
        match &segments[i] {
            Segment::Literal(text) => merged_segments.push(Segment::Literal(text.clone())),
            Segment::Column(index) => {
                merged_segments.push(Segment::Column(merged_columns.len()));
                merged_columns.push(columns[*index].clone());
            }
        }
        i += 1;
    }
    (merged_segments, merged_columns)
}
