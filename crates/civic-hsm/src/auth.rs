//! Authentication methods for the HSM session exchange.
//!
//! Two mutually exclusive schemes exist, chosen once at construction:
//!
//! | Scheme        | Auth exchange credential              | Crypto call channel          |
//! |---------------|---------------------------------------|------------------------------|
//! | `api_key`     | `Authorization: Basic <api key>`      | plain HTTPS + bearer token   |
//! | `trusted_ca`  | Basic `<app id>:` over mutual TLS     | mutual TLS + bearer token    |
//!
//! Both schemes hit `POST {endpoint}/sys/v1/session/auth` and receive
//! `{access_token, expires_in}`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::{ConfigError, CLIENT_CERT_PATH, CLIENT_KEY_PATH};
use crate::error::HsmError;

/// Keys shorter than this are treated as placeholders.
pub const MIN_API_KEY_LEN: usize = 10;

/// Case-insensitive fragments that mark an API key as a placeholder copied
/// from sample configuration rather than a real credential.
pub const PLACEHOLDER_KEY_PATTERNS: &[&str] = &[
    "your-api-key",
    "your_api_key",
    "placeholder",
    "changeme",
    "replace-me",
];

/// Wire name of the authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    ApiKey,
    TrustedCa,
}

impl std::fmt::Display for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey => write!(f, "api_key"),
            Self::TrustedCa => write!(f, "trusted_ca"),
        }
    }
}

/// Bearer token issued by a successful session exchange.
#[derive(Clone, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    /// Token lifetime in seconds, counted from receipt.
    pub expires_in: u64,
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrant")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Authentication scheme, selected once from configuration.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    ApiKey(ApiKeyAuth),
    TrustedCa(TrustedCaAuth),
}

impl AuthMethod {
    pub fn kind(&self) -> AuthKind {
        match self {
            Self::ApiKey(_) => AuthKind::ApiKey,
            Self::TrustedCa(_) => AuthKind::TrustedCa,
        }
    }

    /// Whether the credentials select demo mode. Only the API-key scheme can.
    pub fn is_demo(&self) -> bool {
        match self {
            Self::ApiKey(auth) => auth.is_demo(),
            Self::TrustedCa(_) => false,
        }
    }

    /// Build the HTTP client used for the auth exchange and every crypto call
    /// that follows it.
    ///
    /// For `api_key` this is the shared plain client. For `trusted_ca` the
    /// certificate pair is re-read from disk and a fresh mutual-TLS client is
    /// built, so rotated certificates are picked up on the next refresh.
    pub(crate) async fn open_channel(
        &self,
        plain: &reqwest::Client,
        timeout: Duration,
    ) -> Result<reqwest::Client, HsmError> {
        match self {
            Self::ApiKey(_) => Ok(plain.clone()),
            Self::TrustedCa(auth) => auth.mtls_client(timeout).await,
        }
    }

    /// Attach the session-exchange credential to the auth request.
    pub(crate) fn apply_credentials(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::ApiKey(auth) => request.header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", auth.api_key.as_str()),
            ),
            Self::TrustedCa(auth) => request.basic_auth(&auth.app_id, Some("")),
        }
    }
}

// ── API key ─────────────────────────────────────────────────────────

/// Shared-secret authentication. The key is sent as the Basic credential.
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: Zeroizing<String>,
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ApiKeyAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Zeroizing::new(api_key.into()),
        }
    }

    /// Demo-mode heuristic: empty, too short, or a known placeholder.
    ///
    /// A legitimate key that is short or happens to contain one of the
    /// placeholder fragments is misclassified. Kept for compatibility with
    /// existing deployments that rely on it.
    pub fn is_demo(&self) -> bool {
        let key = self.api_key.trim();
        if key.len() < MIN_API_KEY_LEN {
            return true;
        }
        let lowered = key.to_ascii_lowercase();
        PLACEHOLDER_KEY_PATTERNS
            .iter()
            .any(|pattern| lowered.contains(pattern))
    }
}

// ── Trusted CA ──────────────────────────────────────────────────────

/// Mutual-TLS authentication with an app identity.
///
/// The client certificate is the trust anchor: the server chain is not
/// verified against a CA bundle.
#[derive(Debug, Clone)]
pub struct TrustedCaAuth {
    app_id: String,
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl TrustedCaAuth {
    /// Trusted-CA auth reading `certs/client.crt` and `certs/client.key`.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self::with_paths(app_id, CLIENT_CERT_PATH, CLIENT_KEY_PATH)
    }

    pub fn with_paths(
        app_id: impl Into<String>,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Fail fast, naming every missing file.
    pub fn check_certificates(&self) -> Result<(), ConfigError> {
        let paths: Vec<PathBuf> = [&self.cert_path, &self.key_path]
            .into_iter()
            .filter(|p| !p.is_file())
            .cloned()
            .collect();
        if paths.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCertificates { paths })
        }
    }

    async fn load_identity(&self) -> Result<reqwest::Identity, ConfigError> {
        self.check_certificates()?;

        let read = |path: &Path| {
            let path = path.to_path_buf();
            async move {
                tokio::fs::read(&path).await.map_err(|e| {
                    ConfigError::InvalidCertificate(format!("{}: {e}", path.display()))
                })
            }
        };
        let mut pem = read(&self.cert_path).await?;
        pem.push(b'\n');
        pem.extend_from_slice(&read(&self.key_path).await?);

        reqwest::Identity::from_pem(&pem).map_err(|e| ConfigError::InvalidCertificate(e.to_string()))
    }

    async fn mtls_client(&self, timeout: Duration) -> Result<reqwest::Client, HsmError> {
        let identity = self.load_identity().await?;
        let client = reqwest::Client::builder()
            .identity(identity)
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidCertificate(e.to_string()))?;
        Ok(client)
    }
}
