//! Environment-based configuration types for the keymint server runtime.

use anyhow::Result;
use std::time::Duration;
use url::Url;

use crate::errors::ConfigError;
use crate::registry::types::TokenValidity;

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// Certificate bundles for HTTPS connections
#[derive(Clone)]
pub struct CertificateBundles(Vec<String>);

/// HTTP client timeout configuration
#[derive(Clone)]
pub struct HttpClientTimeout(Duration);

/// Base URL of the remote key manager, unset to run against the built-in
/// in-memory key manager
#[derive(Clone)]
pub struct KeyManagerBase(Option<Url>);

/// Validity applied to tokens when a request leaves it unspecified
#[derive(Clone)]
pub struct DefaultTokenValidity(TokenValidity);

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub certificate_bundles: CertificateBundles,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub key_manager_base: KeyManagerBase,
    pub default_token_validity: DefaultTokenValidity,
    pub storage_backend: String,
    pub database_url: Option<String>,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let certificate_bundles: CertificateBundles =
            optional_env("CERTIFICATE_BUNDLES").try_into()?;
        let default_user_agent = format!("keymint/{}", version()?);
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let key_manager_base: KeyManagerBase = optional_env("KEY_MANAGER_BASE").try_into()?;
        let default_token_validity: DefaultTokenValidity =
            default_env("DEFAULT_TOKEN_VALIDITY", "default").try_into()?;
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = optional_env("DATABASE_URL");
        let user_agent = default_env("USER_AGENT", &default_user_agent);

        Ok(Self {
            version: version()?,
            http_port,
            certificate_bundles,
            user_agent,
            http_client_timeout,
            key_manager_base,
            default_token_validity,
            storage_backend,
            database_url,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<Option<String>> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        Ok(Self(
            value
                .split(';')
                .filter_map(|s| {
                    if s.is_empty() {
                        None
                    } else {
                        Some(s.to_string())
                    }
                })
                .collect::<Vec<String>>(),
        ))
    }
}

impl TryFrom<String> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(Some(value))
    }
}

impl AsRef<Vec<String>> for CertificateBundles {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<Option<String>> for KeyManagerBase {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = match value {
            None => return Ok(Self(None)),
            Some(v) if v.is_empty() => return Ok(Self(None)),
            Some(v) => v,
        };

        let url = Url::parse(&value)
            .map_err(|e| ConfigError::UrlParsingFailed(value, e.to_string()))?;
        Ok(Self(Some(url)))
    }
}

impl TryFrom<String> for KeyManagerBase {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(Some(value))
    }
}

impl AsRef<Option<Url>> for KeyManagerBase {
    fn as_ref(&self) -> &Option<Url> {
        &self.0
    }
}

impl TryFrom<String> for DefaultTokenValidity {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() || value == "default" {
            return Ok(Self(TokenValidity::KeyManagerDefault));
        }
        let duration = duration_str::parse(&value)
            .map_err(|_| ConfigError::ValidityParsingFailed(value))?;
        Ok(Self(TokenValidity::Seconds(duration.as_secs())))
    }
}

impl AsRef<TokenValidity> for DefaultTokenValidity {
    fn as_ref(&self) -> &TokenValidity {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_port_parsing() {
        let port: HttpPort = "9090".to_string().try_into().unwrap();
        assert_eq!(*port.as_ref(), 9090);

        let port: HttpPort = "".to_string().try_into().unwrap();
        assert_eq!(*port.as_ref(), 8080);

        assert!(HttpPort::try_from("not-a-port".to_string()).is_err());
    }

    #[test]
    fn test_key_manager_base_parsing() {
        let base: KeyManagerBase = "https://km.example.com/api/".to_string().try_into().unwrap();
        assert!(base.as_ref().is_some());

        let base: KeyManagerBase = "".to_string().try_into().unwrap();
        assert!(base.as_ref().is_none());

        assert!(KeyManagerBase::try_from("not a url".to_string()).is_err());
    }

    #[test]
    fn test_default_token_validity_parsing() {
        let validity: DefaultTokenValidity = "default".to_string().try_into().unwrap();
        assert_eq!(*validity.as_ref(), TokenValidity::KeyManagerDefault);

        let validity: DefaultTokenValidity = "1h".to_string().try_into().unwrap();
        assert_eq!(*validity.as_ref(), TokenValidity::Seconds(3600));

        assert!(DefaultTokenValidity::try_from("soon".to_string()).is_err());
    }
}
