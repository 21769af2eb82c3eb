//! Per-collection JSON-schema-subset validation (§4.B).

pub mod validator;

pub use validator::{validate_document, Violation};
