/// Controls schema loading and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Object schemas reject properties they do not list.
    pub strict_mode: bool,
    /// Channels without a schema fail validation with `SchemaError::NoSchema`.
    pub fail_on_missing_schema: bool,
    /// Maximum number of schema files loaded from one directory.
    pub max_schemas_from_directory: usize,
    /// Maximum bytes per schema file loaded from a directory.
    pub max_schema_file_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            fail_on_missing_schema: false,
            max_schemas_from_directory: 256,
            max_schema_file_size: 256 * 1024,
        }
    }
}
