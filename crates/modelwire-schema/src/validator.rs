use jsonschema::Validator;
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Parse `payload` as JSON and validate it.
pub(crate) fn validate_payload(channel: &str, payload: &[u8], validator: &Validator) -> Result<()> {
    let value: Value = serde_json::from_slice(payload)?;
    validate_value(channel, &value, validator)
}

/// Validate an already parsed body, reporting up to four violations.
pub(crate) fn validate_value(channel: &str, value: &Value, validator: &Validator) -> Result<()> {
    let mut errors = validator.iter_errors(value);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(SchemaError::ValidationFailed {
            channel: channel.to_string(),
            message,
        });
    }
    Ok(())
}
