//! Runtime type model and type-directed serialization for modelwire.
//!
//! This is the lowest layer of modelwire. A [`TypeSpec`] describes one
//! message; an [`ArgList`] holds the native values for it; the engine
//! co-walks both to produce a self-describing [`WireDocument`]:
//! - Scalars (packed little-endian + base64, or JSON-native)
//! - 1-D and N-D arrays, with lengths and shapes learned at runtime
//! - Nested JSON arrays and objects, including column-oriented table mode
//! - printf-style format-string tables
//!
//! Decoding is all-or-nothing and reports the failing path.

pub mod args;
pub mod bridge;
pub mod buffer;
pub mod document;
pub mod engine;
pub mod error;
pub mod format;
pub mod plan;
pub mod scalar;
mod schema_doc;
pub mod spec;
pub mod value;

pub use args::{Arg, ArgList, SlotKind};
pub use bridge::{JsonBridge, LanguageBridge};
pub use buffer::{ByteCursor, Element, ValueBuffer};
pub use document::WireDocument;
pub use engine::{decode, deserialize, deserialize_into, encode, serialize};
pub use error::{PathSegment, Result, TypeError, TypePath};
pub use format::{Cell, Column, ColumnCode, TableFormat};
pub use plan::{plan, ConsumptionPlan, PlannedLeaf};
pub use scalar::{Scalar, ScalarSubtype};
pub use spec::{ArraySpec, NdArraySpec, ScalarEncoding, ScalarSpec, TableSpec, TypeSpec};
pub use value::Value;
