use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use jsonschema::Validator;
use modelwire_types::TypeSpec;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::validator::{validate_payload, validate_value};
use crate::wire::wire_schema;

const SCHEMA_SUFFIX: &str = ".schema.json";
const TYPE_SUFFIX: &str = ".type.json";

struct Entry {
    validator: Validator,
    datatype: Option<TypeSpec>,
}

/// Channel-name-keyed registry of compiled JSON Schema validators.
///
/// Entries come either from a JSON Schema document, which only validates,
/// or from a type description, which also records the channel's
/// [`TypeSpec`].
pub struct SchemaRegistry {
    entries: HashMap<String, Entry>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Register a JSON Schema for a channel from a JSON string.
    pub fn register(&mut self, channel: &str, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(channel, &schema)
    }

    /// Register a JSON Schema for a channel from a JSON value.
    pub fn register_value(&mut self, channel: &str, schema: &Value) -> Result<()> {
        let validator = self.compile(schema)?;
        self.insert(channel, Entry {
            validator,
            datatype: None,
        });
        Ok(())
    }

    /// Register the wire schema of `datatype` and remember the type.
    pub fn register_type(&mut self, channel: &str, datatype: &TypeSpec) -> Result<()> {
        let schema = wire_schema(datatype, self.config.strict_mode)?;
        let validator = self.compile(&schema)?;
        self.insert(channel, Entry {
            validator,
            datatype: Some(datatype.clone()),
        });
        Ok(())
    }

    /// Register a type description document (`{"type":"object",...}`).
    pub fn register_type_document(&mut self, channel: &str, document_json: &str) -> Result<()> {
        let document: Value = serde_json::from_str(document_json)?;
        let datatype = TypeSpec::from_schema(&document)?;
        self.register_type(channel, &datatype)
    }

    /// Load schemas from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load `<channel>.schema.json` (JSON Schema) and `<channel>.type.json`
    /// (type description) files from a directory.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_config(config);
        let mut loaded_schema_count = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some((channel, kind)) = classify(&file_name) else {
                continue;
            };
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                return Err(SchemaError::LoadFailed(format!(
                    "refusing to load schema symlink: {file_name}"
                )));
            }
            if !file_type.is_file() {
                continue;
            }
            if channel.is_empty() {
                return Err(SchemaError::LoadFailed(format!(
                    "schema filename has no channel name: {file_name}"
                )));
            }

            loaded_schema_count = loaded_schema_count.saturating_add(1);
            if loaded_schema_count > registry.config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({}): {}",
                    registry.config.max_schemas_from_directory, loaded_schema_count
                )));
            }

            let file = std::fs::File::open(&entry_path).map_err(|err| {
                SchemaError::LoadFailed(format!(
                    "failed opening schema {}: {err}",
                    entry_path.display()
                ))
            })?;
            let opened_metadata = file
                .metadata()
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

            #[cfg(unix)]
            {
                if !same_file_identity(&path_metadata, &opened_metadata) {
                    return Err(SchemaError::LoadFailed(format!(
                        "schema file changed during load: {file_name}"
                    )));
                }
            }

            if opened_metadata.len() > registry.config.max_schema_file_size as u64 {
                return Err(SchemaError::LoadFailed(format!(
                    "schema file too large ({} bytes): {file_name}",
                    opened_metadata.len()
                )));
            }

            let max_bytes = registry.config.max_schema_file_size;
            let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
            let mut content = String::new();
            file.take(read_limit)
                .read_to_string(&mut content)
                .map_err(|err| {
                    SchemaError::LoadFailed(format!(
                        "failed reading schema {}: {err}",
                        entry_path.display()
                    ))
                })?;
            if content.len() > max_bytes {
                return Err(SchemaError::LoadFailed(format!(
                    "schema file too large while reading: {file_name}"
                )));
            }

            match kind {
                FileKind::Schema => registry.register(channel, &content)?,
                FileKind::Type => registry.register_type_document(channel, &content)?,
            }
        }

        debug!(count = loaded_schema_count, path = %path.display(), "loaded schemas");
        Ok(registry)
    }

    /// Load from embedded `(channel, JSON Schema)` strings.
    pub fn from_embedded(schemas: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (channel, schema) in schemas {
            registry.register(channel, schema)?;
        }
        Ok(registry)
    }

    /// Validate a message body against its channel schema.
    ///
    /// Bodies of raw types (`direct`, top-level `ascii_table`) are not JSON
    /// and pass unchecked.
    pub fn validate(&self, channel: &str, payload: &[u8]) -> Result<()> {
        match self.entries.get(channel) {
            Some(entry) if entry.datatype.as_ref().is_some_and(TypeSpec::is_raw_body) => Ok(()),
            Some(entry) => validate_payload(channel, payload, &entry.validator),
            None if self.config.fail_on_missing_schema => {
                Err(SchemaError::NoSchema(channel.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Validate an already parsed wire document.
    pub fn validate_document(&self, channel: &str, document: &Value) -> Result<()> {
        match self.entries.get(channel) {
            Some(entry) => validate_value(channel, document, &entry.validator),
            None if self.config.fail_on_missing_schema => {
                Err(SchemaError::NoSchema(channel.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Check if a channel has a registered schema.
    pub fn has_schema(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    /// The type registered for a channel, if it was registered from one.
    pub fn datatype(&self, channel: &str) -> Option<&TypeSpec> {
        self.entries.get(channel).and_then(|entry| entry.datatype.as_ref())
    }

    /// Channels that have registered schemas, sorted.
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        channels.sort_unstable();
        channels
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn compile(&self, schema: &Value) -> Result<Validator> {
        let mut schema_to_compile = schema.clone();
        if self.config.strict_mode {
            apply_strict_mode(&mut schema_to_compile);
        }
        jsonschema::validator_for(&schema_to_compile)
            .map_err(|err| SchemaError::CompileFailed(err.to_string()))
    }

    fn insert(&mut self, channel: &str, entry: Entry) {
        if self.entries.insert(channel.to_string(), entry).is_some() {
            debug!(channel, "replaced schema");
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("channels", &self.channels())
            .field("config", &self.config)
            .finish()
    }
}

enum FileKind {
    Schema,
    Type,
}

fn classify(file_name: &str) -> Option<(&str, FileKind)> {
    if let Some(channel) = file_name.strip_suffix(SCHEMA_SUFFIX) {
        return Some((channel, FileKind::Schema));
    }
    file_name
        .strip_suffix(TYPE_SUFFIX)
        .map(|channel| (channel, FileKind::Type))
}

fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            recurse_object_schema_children(map);
        }
        Value::Array(items) => {
            for item in items {
                apply_strict_mode(item);
            }
        }
        _ => {}
    }
}

fn recurse_object_schema_children(map: &mut Map<String, Value>) {
    for key in ["properties", "patternProperties", "dependentSchemas", "$defs"] {
        if let Some(Value::Object(obj)) = map.get_mut(key) {
            obj.values_mut().for_each(apply_strict_mode);
        }
    }
    for key in [
        "propertyNames",
        "additionalProperties",
        "unevaluatedProperties",
        "items",
        "contains",
        "unevaluatedItems",
        "not",
        "if",
        "then",
        "else",
    ] {
        if let Some(value) = map.get_mut(key) {
            apply_strict_mode(value);
        }
    }
    for key in ["prefixItems", "allOf", "anyOf", "oneOf"] {
        if let Some(Value::Array(items)) = map.get_mut(key) {
            items.iter_mut().for_each(apply_strict_mode);
        }
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    const OBJECT_KEYWORDS: [&str; 6] = [
        "properties",
        "patternProperties",
        "required",
        "dependentRequired",
        "dependentSchemas",
        "propertyNames",
    ];
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Value::String(kind) if kind == "object")),
        _ => OBJECT_KEYWORDS.iter().any(|keyword| map.contains_key(*keyword)),
    }
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}
