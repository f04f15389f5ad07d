//! Schema loading and body validation for modelwire channels.
//!
//! A [`SchemaRegistry`] maps channel names to compiled JSON Schema 2020-12
//! validators. Schemas come from JSON Schema documents or are derived from
//! a [`TypeSpec`](modelwire_types::TypeSpec) with [`wire_schema`], so a
//! receiver can reject a body before decoding it.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;
pub mod wire;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use registry::SchemaRegistry;
pub use wire::wire_schema;
