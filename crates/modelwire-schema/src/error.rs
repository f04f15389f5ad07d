use modelwire_types::TypeError;

/// Errors that can occur while loading schemas or validating bodies.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// A schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// A body failed validation.
    #[error("validation failed on channel {channel}: {message}")]
    ValidationFailed { channel: String, message: String },

    /// The body or schema text is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No schema registered for the channel.
    #[error("no schema registered for channel {0}")]
    NoSchema(String),

    /// A type description could not be turned into a schema.
    #[error("type error: {0}")]
    Type(#[from] TypeError),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
