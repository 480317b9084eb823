//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into adapters and
//! services. Library code never reads environment variables itself; binaries read them and
//! hand the raw values to the `*_from_env_value` helpers below.

use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::{DEFAULT_EXTENSION_BASE_URL, DEFAULT_REST_ADDR, DEFAULT_SESSION_TIMEOUT_MS};
use crate::{CoreError, CoreResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    extension_base_url: String,
    session_timeout: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(extension_base_url: String, session_timeout: Duration) -> CoreResult<Self> {
        validate_base_url(&extension_base_url)?;
        if session_timeout.is_zero() {
            return Err(CoreError::InvalidInput(
                "session timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            extension_base_url,
            session_timeout,
        })
    }

    /// Base URL for extension structure definitions, without a trailing slash.
    pub fn extension_base_url(&self) -> &str {
        &self.extension_base_url
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            extension_base_url: DEFAULT_EXTENSION_BASE_URL.to_string(),
            session_timeout: Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MS),
        }
    }
}

fn validate_base_url(url: &str) -> CoreResult<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            CoreError::InvalidInput(format!("extension base URL must be http(s): {url}"))
        })?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(CoreError::InvalidInput(format!(
            "extension base URL has no host: {url}"
        )));
    }
    if url.ends_with('/') {
        return Err(CoreError::InvalidInput(format!(
            "extension base URL must not end with '/': {url}"
        )));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidInput(format!(
            "extension base URL must not contain whitespace: {url}"
        )));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the extension base URL from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns the default.
pub fn extension_base_url_from_env_value(value: Option<String>) -> CoreResult<String> {
    let url = non_empty(value).unwrap_or_else(|| DEFAULT_EXTENSION_BASE_URL.to_string());
    validate_base_url(&url)?;
    Ok(url)
}

/// Resolve the session deadline from an optional millisecond count.
pub fn session_timeout_from_env_value(value: Option<String>) -> CoreResult<Duration> {
    let Some(value) = non_empty(value) else {
        return Ok(Duration::from_millis(DEFAULT_SESSION_TIMEOUT_MS));
    };
    let millis: u64 = value
        .parse()
        .map_err(|_| CoreError::InvalidInput(format!("invalid session timeout: {value}")))?;
    if millis == 0 {
        return Err(CoreError::InvalidInput(
            "session timeout must be greater than zero".into(),
        ));
    }
    Ok(Duration::from_millis(millis))
}

/// Resolve a complete [`CoreConfig`] from the raw extension base URL and timeout values.
pub fn core_config_from_env_values(
    extension_base_url: Option<String>,
    session_timeout_ms: Option<String>,
) -> CoreResult<CoreConfig> {
    CoreConfig::new(
        extension_base_url_from_env_value(extension_base_url)?,
        session_timeout_from_env_value(session_timeout_ms)?,
    )
}

/// Resolve the REST bind address from an optional environment value.
pub fn rest_addr_from_env_value(value: Option<String>) -> CoreResult<SocketAddr> {
    let value = non_empty(value).unwrap_or_else(|| DEFAULT_REST_ADDR.to_string());
    value
        .parse()
        .map_err(|_| CoreError::InvalidInput(format!("invalid bind address: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_or_blank_values() {
        assert_eq!(
            extension_base_url_from_env_value(None).expect("default url"),
            DEFAULT_EXTENSION_BASE_URL
        );
        assert_eq!(
            session_timeout_from_env_value(Some("  ".into())).expect("default timeout"),
            Duration::from_millis(5_000)
        );
        assert_eq!(
            rest_addr_from_env_value(None).expect("default addr").port(),
            3000
        );
    }

    #[test]
    fn rejects_bad_base_urls() {
        for url in [
            "ftp://example.org",
            "https://",
            "https://example.org/defs/",
            "https://exa mple.org",
        ] {
            assert!(
                matches!(
                    extension_base_url_from_env_value(Some(url.into())),
                    Err(CoreError::InvalidInput(_))
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_or_garbage_timeout() {
        assert!(session_timeout_from_env_value(Some("0".into())).is_err());
        assert!(session_timeout_from_env_value(Some("soon".into())).is_err());
        assert!(CoreConfig::new(DEFAULT_EXTENSION_BASE_URL.into(), Duration::ZERO).is_err());
    }

    #[test]
    fn full_config_from_raw_values() {
        let config = core_config_from_env_values(None, Some("1200".into())).expect("config");
        assert_eq!(config.extension_base_url(), DEFAULT_EXTENSION_BASE_URL);
        assert_eq!(config.session_timeout(), Duration::from_millis(1200));
        assert!(core_config_from_env_values(Some("nope".into()), None).is_err());
    }

    #[test]
    fn new_accepts_valid_values() {
        let config = CoreConfig::new(
            "http://localhost:8080/defs".into(),
            Duration::from_millis(250),
        )
        .expect("valid config");
        assert_eq!(config.extension_base_url(), "http://localhost:8080/defs");
        assert_eq!(config.session_timeout(), Duration::from_millis(250));
    }
}
