//! Constants used throughout the Ferry core crate.

/// Base URL under which extension structure definitions are published.
pub const DEFAULT_EXTENSION_BASE_URL: &str =
    "https://nwis.structure-definitions.nhs.uk/StructureDefinition";

/// Deadline for one transcoding request, in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 5_000;

/// Address the REST server binds to when none is configured.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Environment variable overriding [`DEFAULT_EXTENSION_BASE_URL`].
pub const EXTENSION_BASE_URL_ENV: &str = "FERRY_EXTENSION_BASE_URL";

/// Environment variable overriding [`DEFAULT_SESSION_TIMEOUT_MS`].
pub const SESSION_TIMEOUT_MS_ENV: &str = "FERRY_SESSION_TIMEOUT_MS";

/// Environment variable overriding [`DEFAULT_REST_ADDR`].
pub const REST_ADDR_ENV: &str = "FERRY_REST_ADDR";
