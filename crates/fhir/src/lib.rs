//! FHIR support for the transcoder.
//!
//! This crate provides the target side of a transcoding run:
//! - a registry of the supported STU3 resource types ([`schema`])
//! - resources held as schema-checked JSON slot graphs, addressable by element path
//!   ([`Resource`])
//! - builders for `CodeableConcept` and `Extension` elements ([`datatypes`])
//! - bundle rendering to JSON or YAML, and bundle reading ([`bundle`])
//!
//! It has no knowledge of openEHR; callers decide what goes where.

pub mod bundle;
pub mod datatypes;
pub mod element_path;
pub mod resource;
pub mod schema;

pub use bundle::BundleFormat;
pub use datatypes::{codeable_concept, ExtensionValue, ExtensionValueType};
pub use resource::Resource;

/// Errors returned by the `fhir` crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown resource type: {0}")]
    UnknownType(String),

    #[error("{type_name} has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("invalid element path: {0}")]
    InvalidPath(String),

    #[error("{0} is not a list")]
    NotAList(String),

    #[error("index {index} out of range for {path} (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("{path} expects {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
