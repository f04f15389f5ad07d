use std::fmt;

use crate::args::SlotKind;

/// One step of a [`TypePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Position inside a JSON array type.
    Index(usize),
    /// Property inside a JSON object type.
    Key(String),
    /// Column of a table or format-string type.
    Column(usize),
}

/// Location of a failing node inside a type tree, rendered as `$.x[2]#1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypePath {
    segments: Vec<PathSegment>,
}

impl TypePath {
    /// The root of a type tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Segments from the root down to the failing node.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True if the path points at the root type.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub(crate) fn prepend(&mut self, segment: PathSegment) {
        self.segments.insert(0, segment);
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Column(column) => write!(f, "#{column}")?,
            }
        }
        Ok(())
    }
}

/// Errors raised by the type model and the serialization engine.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// The type description itself is invalid (bad format string, unknown subtype, ...).
    #[error("invalid type description: {0}")]
    Construction(String),

    /// A generic type was used before any concrete type was reconciled into it.
    #[error("type is not initialized (no concrete type observed yet)")]
    Uninitialized,

    /// The argument list does not have exactly the number of slots the type consumes.
    #[error("argument count mismatch: expected {expected}, found {found}")]
    ArgCount { expected: usize, found: usize },

    /// An argument slot holds the wrong kind of value.
    #[error("argument {index} is a {found} slot, expected {expected}")]
    SlotKind {
        index: usize,
        expected: SlotKind,
        found: SlotKind,
    },

    /// Native arguments could not be encoded.
    #[error("encode failed at {path} ({type_name}): {reason}")]
    Encode {
        path: TypePath,
        type_name: &'static str,
        reason: String,
    },

    /// A wire document could not be decoded into native arguments.
    #[error("decode failed at {path} ({type_name}): {reason}")]
    Decode {
        path: TypePath,
        type_name: &'static str,
        reason: String,
    },

    /// Two type descriptions cannot be reconciled.
    #[error("incompatible type at {path}: {reason}")]
    Incompatible { path: TypePath, reason: String },

    /// A fixed-capacity buffer cannot hold the requested bytes.
    #[error("buffer too small ({need} bytes, capacity {capacity})")]
    BufferTooSmall { need: usize, capacity: usize },

    /// The wire bytes are not a valid JSON document.
    #[error("invalid wire document: {0}")]
    Json(#[from] serde_json::Error),
}

impl TypeError {
    pub(crate) fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    pub(crate) fn encode(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Encode {
            path: TypePath::root(),
            type_name,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: TypePath::root(),
            type_name,
            reason: reason.into(),
        }
    }

    pub(crate) fn incompatible(reason: impl Into<String>) -> Self {
        Self::Incompatible {
            path: TypePath::root(),
            reason: reason.into(),
        }
    }

    /// Record that this error happened below `segment`.
    pub(crate) fn within(mut self, segment: PathSegment) -> Self {
        match &mut self {
            Self::Encode { path, .. } | Self::Decode { path, .. } | Self::Incompatible { path, .. } => {
                path.prepend(segment)
            }
            _ => {}
        }
        self
    }

    /// Path of the failing node, for errors that carry one.
    pub fn path(&self) -> Option<&TypePath> {
        match self {
            Self::Encode { path, .. } | Self::Decode { path, .. } | Self::Incompatible { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }

    /// True for errors in the type description rather than in a message.
    pub fn is_construction(&self) -> bool {
        matches!(self, Self::Construction(_))
    }
}

pub type Result<T> = std::result::Result<T, TypeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_renders_nested_segments() {
        let err = TypeError::decode("1darray", "short read")
            .within(PathSegment::Index(2))
            .within(PathSegment::Key("y".to_string()));

        let path = err.path().unwrap();
        assert_eq!(path.to_string(), "$.y[2]");
        assert_eq!(
            err.to_string(),
            "decode failed at $.y[2] (1darray): short read"
        );
    }

    #[test]
    fn within_leaves_pathless_errors_alone() {
        let err = TypeError::Uninitialized.within(PathSegment::Column(1));
        assert!(matches!(err, TypeError::Uninitialized));
        assert!(err.path().is_none());
    }

    #[test]
    fn root_path_renders_dollar() {
        assert_eq!(TypePath::root().to_string(), "$");
        assert!(TypePath::root().is_root());
    }
}
