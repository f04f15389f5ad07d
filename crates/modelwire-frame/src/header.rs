use modelwire_types::TypeSpec;
use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result};

/// Maximum length of `address` and `response_address`.
pub const MAX_ADDRESS_LEN: usize = 512;
/// Maximum length of `id` and `request_id`.
pub const MAX_ID_LEN: usize = 128;

/// Per-message envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// Total body size of the message in bytes, across all fragments.
    pub size: usize,
    /// Address of the sending channel. Empty if not known.
    pub address: String,
    /// Message id. Continuation fragments repeat it.
    pub id: String,
    /// Where the receiver should send its response.
    pub response_address: Option<String>,
    /// Id of the request this message answers or opens.
    pub request_id: Option<String>,
    /// Type of the body. Omitted on continuation fragments.
    pub datatype: Option<TypeSpec>,
    /// The body is split over several frames.
    pub multipart: bool,
    /// Index of this fragment within a multipart message.
    pub fragment: Option<usize>,
    /// The datatype travels at the front of the body.
    pub type_in_data: bool,
}

#[derive(Serialize, Deserialize)]
struct HeaderRepr {
    size: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datatype: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    multipart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fragment: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    type_in_data: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Header {
    /// Header for a body of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_datatype(mut self, datatype: TypeSpec) -> Self {
        self.datatype = Some(datatype);
        self
    }

    /// Whether this frame continues a multipart message.
    pub fn is_continuation(&self) -> bool {
        self.multipart && self.fragment.is_some_and(|index| index > 0)
    }

    /// Check field bounds.
    pub fn validate(&self) -> Result<()> {
        check_len("address", &self.address, MAX_ADDRESS_LEN)?;
        check_len("id", &self.id, MAX_ID_LEN)?;
        if let Some(address) = &self.response_address {
            check_len("response_address", address, MAX_ADDRESS_LEN)?;
        }
        if let Some(request_id) = &self.request_id {
            check_len("request_id", request_id, MAX_ID_LEN)?;
        }
        if self.fragment.is_some() && !self.multipart {
            return Err(FrameError::MalformedHeader(
                "fragment index on a single-part message".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize as header JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let repr = HeaderRepr {
            size: self.size,
            address: self.address.clone(),
            id: self.id.clone(),
            response_address: self.response_address.clone(),
            request_id: self.request_id.clone(),
            datatype: self.datatype.as_ref().map(TypeSpec::to_schema),
            multipart: self.multipart,
            fragment: self.fragment,
            type_in_data: self.type_in_data,
        };
        Ok(serde_json::to_vec(&repr)?)
    }

    /// Parse header JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let repr: HeaderRepr = serde_json::from_slice(bytes)
            .map_err(|err| FrameError::MalformedHeader(err.to_string()))?;
        let datatype = repr
            .datatype
            .as_ref()
            .map(TypeSpec::from_schema)
            .transpose()
            .map_err(|err| FrameError::MalformedHeader(format!("datatype: {err}")))?;
        let header = Self {
            size: repr.size,
            address: repr.address,
            id: repr.id,
            response_address: repr.response_address,
            request_id: repr.request_id,
            datatype,
            multipart: repr.multipart,
            fragment: repr.fragment,
            type_in_data: repr.type_in_data,
        };
        header.validate()?;
        Ok(header)
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(FrameError::MalformedHeader(format!(
            "{field} too long: {} bytes (max {max})",
            value.len()
        )));
    }
    Ok(())
}
