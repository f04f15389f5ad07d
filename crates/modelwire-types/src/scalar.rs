//! Scalar subtypes and owned native scalar values.

use std::fmt;

use crate::document::WireDocument;

/// Element kind shared by scalars and arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarSubtype {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    Bytes,
    Unicode,
}

impl ScalarSubtype {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Complex => "complex",
            Self::Bytes => "bytes",
            Self::Unicode => "unicode",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "uint" => Some(Self::Uint),
            "float" => Some(Self::Float),
            "complex" => Some(Self::Complex),
            "bytes" => Some(Self::Bytes),
            "unicode" => Some(Self::Unicode),
            _ => None,
        }
    }

    /// `bytes` and `unicode` carry (buffer, length) instead of a single value.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Bytes | Self::Unicode)
    }

    /// Precision used when a description omits one.
    pub fn default_precision(self) -> usize {
        match self {
            Self::Bool => 8,
            Self::Int | Self::Uint | Self::Float => 64,
            Self::Complex => 128,
            Self::Bytes | Self::Unicode => 0,
        }
    }

    /// Whether `bits` is a supported precision for this subtype.
    pub fn accepts_precision(self, bits: usize) -> bool {
        match self {
            Self::Bool => bits == 8,
            Self::Int | Self::Uint => matches!(bits, 8 | 16 | 32 | 64),
            Self::Float => matches!(bits, 32 | 64),
            Self::Complex => matches!(bits, 64 | 128),
            Self::Bytes | Self::Unicode => bits % 8 == 0,
        }
    }
}

impl fmt::Display for ScalarSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An owned numeric or boolean value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Complex number of two `f32` parts.
    C64(f32, f32),
    /// Complex number of two `f64` parts.
    C128(f64, f64),
}

impl Scalar {
    pub fn subtype(&self) -> ScalarSubtype {
        match self {
            Self::Bool(_) => ScalarSubtype::Bool,
            Self::I8(_) | Self::I16(_) | Self::I32(_) | Self::I64(_) => ScalarSubtype::Int,
            Self::U8(_) | Self::U16(_) | Self::U32(_) | Self::U64(_) => ScalarSubtype::Uint,
            Self::F32(_) | Self::F64(_) => ScalarSubtype::Float,
            Self::C64(..) | Self::C128(..) => ScalarSubtype::Complex,
        }
    }

    /// Width in bits.
    pub fn precision(&self) -> usize {
        match self {
            Self::Bool(_) | Self::I8(_) | Self::U8(_) => 8,
            Self::I16(_) | Self::U16(_) => 16,
            Self::I32(_) | Self::U32(_) | Self::F32(_) => 32,
            Self::I64(_) | Self::U64(_) | Self::F64(_) | Self::C64(..) => 64,
            Self::C128(..) => 128,
        }
    }

    /// Short label such as `int32` or `complex128`.
    pub fn label(&self) -> String {
        match self {
            Self::Bool(_) => "bool".to_string(),
            _ => format!("{}{}", self.subtype(), self.precision()),
        }
    }

    /// Append the little-endian representation.
    pub fn write_le(&self, out: &mut Vec<u8>) {
        match *self {
            Self::Bool(v) => out.push(u8::from(v)),
            Self::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U8(v) => out.push(v),
            Self::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::C64(re, im) => {
                out.extend_from_slice(&re.to_le_bytes());
                out.extend_from_slice(&im.to_le_bytes());
            }
            Self::C128(re, im) => {
                out.extend_from_slice(&re.to_le_bytes());
                out.extend_from_slice(&im.to_le_bytes());
            }
        }
    }

    /// Read a value of the given kind from exactly `precision / 8` bytes.
    pub fn read_le(subtype: ScalarSubtype, precision: usize, bytes: &[u8]) -> Option<Self> {
        if bytes.len() * 8 != precision {
            return None;
        }
        let value = match (subtype, precision) {
            (ScalarSubtype::Bool, 8) => Self::Bool(bytes[0] != 0),
            (ScalarSubtype::Int, 8) => Self::I8(i8::from_le_bytes([bytes[0]])),
            (ScalarSubtype::Int, 16) => Self::I16(i16::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Int, 32) => Self::I32(i32::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Int, 64) => Self::I64(i64::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Uint, 8) => Self::U8(bytes[0]),
            (ScalarSubtype::Uint, 16) => Self::U16(u16::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Uint, 32) => Self::U32(u32::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Uint, 64) => Self::U64(u64::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Float, 32) => Self::F32(f32::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Float, 64) => Self::F64(f64::from_le_bytes(bytes.try_into().ok()?)),
            (ScalarSubtype::Complex, 64) => Self::C64(
                f32::from_le_bytes(bytes[..4].try_into().ok()?),
                f32::from_le_bytes(bytes[4..].try_into().ok()?),
            ),
            (ScalarSubtype::Complex, 128) => Self::C128(
                f64::from_le_bytes(bytes[..8].try_into().ok()?),
                f64::from_le_bytes(bytes[8..].try_into().ok()?),
            ),
            _ => return None,
        };
        Some(value)
    }

    /// Zero value of the given kind.
    pub fn zero(subtype: ScalarSubtype, precision: usize) -> Option<Self> {
        Self::read_le(subtype, precision, &vec![0u8; precision / 8])
    }

    /// Change float or complex width. Other kinds only "cast" to their own width.
    pub fn cast(self, precision: usize) -> Option<Self> {
        if self.precision() == precision {
            return Some(self);
        }
        match (self, precision) {
            (Self::F32(v), 64) => Some(Self::F64(f64::from(v))),
            (Self::F64(v), 32) => Some(Self::F32(v as f32)),
            (Self::C64(re, im), 128) => Some(Self::C128(f64::from(re), f64::from(im))),
            (Self::C128(re, im), 64) => Some(Self::C64(re as f32, im as f32)),
            _ => None,
        }
    }

    /// Build an integer of the given width, rejecting out-of-range values.
    pub fn from_i64(precision: usize, value: i64) -> Option<Self> {
        match precision {
            8 => i8::try_from(value).ok().map(Self::I8),
            16 => i16::try_from(value).ok().map(Self::I16),
            32 => i32::try_from(value).ok().map(Self::I32),
            64 => Some(Self::I64(value)),
            _ => None,
        }
    }

    /// Build an unsigned integer of the given width, rejecting out-of-range values.
    pub fn from_u64(precision: usize, value: u64) -> Option<Self> {
        match precision {
            8 => u8::try_from(value).ok().map(Self::U8),
            16 => u16::try_from(value).ok().map(Self::U16),
            32 => u32::try_from(value).ok().map(Self::U32),
            64 => Some(Self::U64(value)),
            _ => None,
        }
    }

    pub fn from_f64(precision: usize, value: f64) -> Option<Self> {
        match precision {
            32 => Some(Self::F32(value as f32)),
            64 => Some(Self::F64(value)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I8(v) => Some(i64::from(v)),
            Self::I16(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(u64::from(v)),
            Self::U16(v) => Some(u64::from(v)),
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(f64::from(v)),
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Real and imaginary parts of a complex value.
    pub fn as_complex(&self) -> Option<(f64, f64)> {
        match *self {
            Self::C64(re, im) => Some((f64::from(re), f64::from(im))),
            Self::C128(re, im) => Some((re, im)),
            _ => None,
        }
    }

    /// JSON-native representation.
    pub fn to_document(&self) -> WireDocument {
        match *self {
            Self::Bool(v) => WireDocument::Bool(v),
            Self::F32(v) => WireDocument::Double(f64::from(v)),
            Self::F64(v) => WireDocument::Double(v),
            Self::C64(..) | Self::C128(..) => {
                let (re, im) = self.as_complex().unwrap_or_default();
                WireDocument::Array(vec![WireDocument::Double(re), WireDocument::Double(im)])
            }
            _ => match (self.as_i64(), self.as_u64()) {
                (Some(v), _) => WireDocument::Int(v),
                (_, Some(v)) => WireDocument::UInt(v),
                _ => WireDocument::Null,
            },
        }
    }

    /// Read a JSON-native value of the given kind, rejecting out-of-range numbers.
    pub fn from_document(subtype: ScalarSubtype, precision: usize, doc: &WireDocument) -> Option<Self> {
        match subtype {
            ScalarSubtype::Bool => doc.as_bool().map(Self::Bool),
            ScalarSubtype::Int => Self::from_i64(precision, doc.as_i64()?),
            ScalarSubtype::Uint => Self::from_u64(precision, doc.as_u64()?),
            ScalarSubtype::Float => Self::from_f64(precision, doc.as_f64()?),
            ScalarSubtype::Complex => {
                let parts = doc.as_array()?;
                if parts.len() != 2 {
                    return None;
                }
                let (re, im) = (parts[0].as_f64()?, parts[1].as_f64()?);
                match precision {
                    64 => Some(Self::C64(re as f32, im as f32)),
                    128 => Some(Self::C128(re, im)),
                    _ => None,
                }
            }
            ScalarSubtype::Bytes | ScalarSubtype::Unicode => None,
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_primitive!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_roundtrip_for_every_kind() {
        let values = [
            Scalar::Bool(true),
            Scalar::I8(-5),
            Scalar::I16(-300),
            Scalar::I32(42),
            Scalar::I64(i64::MIN),
            Scalar::U8(200),
            Scalar::U16(65535),
            Scalar::U32(7),
            Scalar::U64(u64::MAX),
            Scalar::F32(1.5),
            Scalar::F64(-2.25),
            Scalar::C64(1.0, -1.0),
            Scalar::C128(0.5, 4.0),
        ];
        for value in values {
            let mut bytes = Vec::new();
            value.write_le(&mut bytes);
            assert_eq!(bytes.len() * 8, value.precision());
            let back = Scalar::read_le(value.subtype(), value.precision(), &bytes).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn read_rejects_wrong_width() {
        assert!(Scalar::read_le(ScalarSubtype::Int, 32, &[0, 0]).is_none());
        assert!(Scalar::read_le(ScalarSubtype::Float, 16, &[0, 0]).is_none());
    }

    #[test]
    fn float_cast_widens_and_narrows() {
        assert_eq!(Scalar::F32(1.5).cast(64), Some(Scalar::F64(1.5)));
        assert_eq!(Scalar::F64(2.0).cast(32), Some(Scalar::F32(2.0)));
        assert_eq!(Scalar::C64(1.0, 2.0).cast(128), Some(Scalar::C128(1.0, 2.0)));
        assert_eq!(Scalar::I32(1).cast(64), None);
        assert_eq!(Scalar::I32(1).cast(32), Some(Scalar::I32(1)));
    }

    #[test]
    fn json_native_range_checks() {
        let doc = WireDocument::Int(300);
        assert_eq!(
            Scalar::from_document(ScalarSubtype::Int, 16, &doc),
            Some(Scalar::I16(300))
        );
        assert_eq!(Scalar::from_document(ScalarSubtype::Int, 8, &doc), None);
        assert_eq!(
            Scalar::from_document(ScalarSubtype::Uint, 32, &WireDocument::Int(-1)),
            None
        );
        assert_eq!(
            Scalar::from_document(ScalarSubtype::Float, 64, &WireDocument::Int(3)),
            Some(Scalar::F64(3.0))
        );
    }

    #[test]
    fn subtype_names_and_precisions() {
        assert_eq!(ScalarSubtype::from_name("complex"), Some(ScalarSubtype::Complex));
        assert_eq!(ScalarSubtype::from_name("quaternion"), None);
        assert!(ScalarSubtype::Int.accepts_precision(16));
        assert!(!ScalarSubtype::Float.accepts_precision(16));
        assert!(ScalarSubtype::Bytes.accepts_precision(0));
        assert_eq!(Scalar::I32(0).label(), "int32");
        assert_eq!(Scalar::Bool(false).label(), "bool");
    }
}
