//! HSM client configuration.
//!
//! Encryption is configured once, at process start, from environment
//! variables. Three outcomes are possible:
//!
//! - nothing encryption-related is set: `Ok(None)`, the portal stores
//!   plaintext;
//! - a complete configuration: `Ok(Some(config))`;
//! - a partial or contradictory one: `Err(ConfigError)`, which the binaries
//!   treat as fatal.

use std::path::PathBuf;

use url::Url;

use crate::auth::{ApiKeyAuth, AuthMethod, TrustedCaAuth};

/// Selects `api_key` or `trusted_ca` authentication.
pub const ENV_AUTH_METHOD: &str = "FORTANIX_AUTH_METHOD";
/// Base URL used with API-key authentication.
pub const ENV_DSM_ENDPOINT: &str = "FORTANIX_DSM_ENDPOINT";
/// Apps-tier base URL used with trusted-CA authentication.
pub const ENV_APP_DSM_ENDPOINT: &str = "APP_FORTANIX_DSM_ENDPOINT";
pub const ENV_API_KEY: &str = "FORTANIX_API_KEY";
pub const ENV_APP_ID: &str = "FORTANIX_APP_ID";
pub const ENV_KEY_ID: &str = "FORTANIX_KEY_ID";
pub const ENV_TIMEOUT_SECS: &str = "FORTANIX_TIMEOUT_SECS";

pub const DEFAULT_DSM_ENDPOINT: &str = "https://apac.smartkey.io";
pub const DEFAULT_APP_DSM_ENDPOINT: &str = "https://apps.apac.smartkey.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client certificate presented in trusted-CA mode.
pub const CLIENT_CERT_PATH: &str = "certs/client.crt";
/// Private key matching [`CLIENT_CERT_PATH`].
pub const CLIENT_KEY_PATH: &str = "certs/client.key";

/// Configuration for the HSM client.
///
/// The `Debug` implementation of [`AuthMethod`] redacts the API key, so this
/// struct is safe to log.
#[derive(Debug, Clone)]
pub struct HsmConfig {
    /// Base URL of the key-management service. Which host this is depends on
    /// the auth method: the trusted-CA flow talks to the apps tier.
    pub endpoint: Url,
    /// Authentication scheme, fixed for the process lifetime.
    pub auth: AuthMethod,
    /// Identifier of the key used for every encrypt/decrypt call.
    pub key_id: String,
    /// Per-call timeout against the HSM.
    pub timeout_secs: u64,
}

impl HsmConfig {
    /// API-key configuration with the default timeout.
    pub fn api_key(endpoint: Url, api_key: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            endpoint,
            auth: AuthMethod::ApiKey(ApiKeyAuth::new(api_key)),
            key_id: key_id.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Trusted-CA configuration reading certificates from the fixed paths.
    pub fn trusted_ca(endpoint: Url, app_id: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            endpoint,
            auth: AuthMethod::TrustedCa(TrustedCaAuth::new(app_id)),
            key_id: key_id.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// Variables:
    /// - `FORTANIX_AUTH_METHOD` (`api_key` | `trusted_ca`, default `api_key`)
    /// - `FORTANIX_DSM_ENDPOINT` (default: `https://apac.smartkey.io`)
    /// - `APP_FORTANIX_DSM_ENDPOINT` (default: `https://apps.apac.smartkey.io`)
    /// - `FORTANIX_API_KEY` (api_key; empty or placeholder values select demo mode)
    /// - `FORTANIX_APP_ID` (required for trusted_ca)
    /// - `FORTANIX_KEY_ID` (required whenever encryption is requested)
    /// - `FORTANIX_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`HsmConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let method = var(ENV_AUTH_METHOD);
        let api_key = var(ENV_API_KEY);
        let app_id = var(ENV_APP_ID);
        let key_id = var(ENV_KEY_ID);

        if method.is_none() && api_key.is_none() && app_id.is_none() && key_id.is_none() {
            return Ok(None);
        }

        let key_id = key_id.ok_or(ConfigError::MissingVar(ENV_KEY_ID))?;
        let timeout_secs = match var(ENV_TIMEOUT_SECS) {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
        };

        let config = match method.as_deref().unwrap_or("api_key") {
            "api_key" => Self {
                endpoint: env_url(&var, ENV_DSM_ENDPOINT, DEFAULT_DSM_ENDPOINT)?,
                // An absent key is kept as empty so the client falls into demo mode.
                auth: AuthMethod::ApiKey(ApiKeyAuth::new(api_key.unwrap_or_default())),
                key_id,
                timeout_secs,
            },
            "trusted_ca" => {
                let app_id = app_id.ok_or(ConfigError::MissingVar(ENV_APP_ID))?;
                if api_key.is_some() {
                    return Err(ConfigError::Conflicting(ENV_API_KEY, "trusted_ca"));
                }
                Self {
                    endpoint: env_url(&var, ENV_APP_DSM_ENDPOINT, DEFAULT_APP_DSM_ENDPOINT)?,
                    auth: AuthMethod::TrustedCa(TrustedCaAuth::new(app_id)),
                    key_id,
                    timeout_secs,
                }
            }
            other => return Err(ConfigError::InvalidAuthMethod(other.to_string())),
        };

        Ok(Some(config))
    }
}

fn env_url(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = var(name).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(name, e.to_string()))
}

/// Configuration errors. All of them are fatal: they are not retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported FORTANIX_AUTH_METHOD value {0:?} (expected api_key or trusted_ca)")]
    InvalidAuthMethod(String),
    #[error("{0} environment variable is required when encryption is configured")]
    MissingVar(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(&'static str, String),
    #[error("invalid FORTANIX_TIMEOUT_SECS value {0:?}")]
    InvalidTimeout(String),
    #[error("client certificate files not found: {}", display_paths(.paths))]
    MissingCertificates { paths: Vec<PathBuf> },
    #[error("unusable client certificate: {0}")]
    InvalidCertificate(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error("{0} must not be set with {1} authentication")]
    Conflicting(&'static str, &'static str),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
