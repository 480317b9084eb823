/// Errors raised while interpreting mapping rules.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("invalid pattern for '{key}': {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("index '{index}' at the end of '{path}' is not a number")]
    IndexParse { path: String, index: String },

    #[error("'{0}' is not a registered resource type")]
    UnknownResourceType(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),

    #[error("openEHR error: {0}")]
    Openehr(#[from] openehr::OpenEhrError),

    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
