//! Wire protocol to the HSM.
//!
//! ## Endpoints
//!
//! | Method | Path                    | Credential                         |
//! |--------|-------------------------|------------------------------------|
//! | POST   | `/sys/v1/session/auth`  | Basic (see [`crate::auth`])        |
//! | POST   | `/crypto/v1/encrypt`    | Bearer token (+ mTLS for trusted_ca) |
//! | POST   | `/crypto/v1/decrypt`    | Bearer token (+ mTLS for trusted_ca) |
//!
//! [`HsmTransport`] is the seam between the client's session logic and the
//! network, so tests can count or fail exchanges without a server.

use std::future::Future;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::auth::{AccessGrant, AuthMethod};
use crate::config::{ConfigError, HsmConfig};
use crate::envelope::Envelope;
use crate::error::HsmError;

pub const ALG_AES: &str = "AES";
pub const MODE_CBC: &str = "CBC";

// -- Request/response bodies --------------------------------------------------

/// Key selector sent with every crypto call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRef {
    pub kid: String,
}

/// Body of `POST /crypto/v1/encrypt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub key: KeyRef,
    pub alg: String,
    pub mode: String,
    /// Base64 of the UTF-8 plaintext.
    pub plain: String,
}

impl EncryptRequest {
    pub fn aes_cbc(key_id: &str, plain_b64: String) -> Self {
        Self {
            key: KeyRef {
                kid: key_id.to_string(),
            },
            alg: ALG_AES.to_string(),
            mode: MODE_CBC.to_string(),
            plain: plain_b64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub cipher: String,
    pub iv: String,
    #[serde(default)]
    pub kid: Option<String>,
}

/// Body of `POST /crypto/v1/decrypt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub key: KeyRef,
    pub alg: String,
    pub mode: String,
    pub cipher: String,
    pub iv: String,
}

impl DecryptRequest {
    pub fn aes_cbc(key_id: &str, envelope: &Envelope) -> Self {
        Self {
            key: KeyRef {
                kid: key_id.to_string(),
            },
            alg: ALG_AES.to_string(),
            mode: MODE_CBC.to_string(),
            cipher: envelope.cipher.clone(),
            iv: envelope.iv.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Base64 of the UTF-8 plaintext.
    pub plain: String,
}

// -- Transport trait ----------------------------------------------------------

/// Network operations the HSM client needs.
///
/// Implementations map every failure to the matching [`HsmError`] variant:
/// `authenticate` to `AuthenticationFailed` (or `Config` for certificate
/// problems), `encrypt` to `EncryptionFailed`, `decrypt` to `DecryptionFailed`.
pub trait HsmTransport: Send + Sync {
    /// Perform one session exchange.
    fn authenticate(&self) -> impl Future<Output = Result<AccessGrant, HsmError>> + Send;

    fn encrypt(
        &self,
        token: &str,
        request: &EncryptRequest,
    ) -> impl Future<Output = Result<EncryptResponse, HsmError>> + Send;

    fn decrypt(
        &self,
        token: &str,
        request: &DecryptRequest,
    ) -> impl Future<Output = Result<DecryptResponse, HsmError>> + Send;
}

// -- HTTP transport -----------------------------------------------------------

/// `reqwest`-backed transport.
///
/// Holds the channel opened by the last successful authentication. For
/// trusted-CA auth that channel carries the client certificate, so crypto
/// calls present both the mTLS identity and the bearer token.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    auth: AuthMethod,
    timeout: Duration,
    plain: reqwest::Client,
    channel: RwLock<reqwest::Client>,
}

impl HttpTransport {
    pub fn new(config: &HsmConfig) -> Result<Self, HsmError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let plain = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.endpoint.as_str().trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
            timeout,
            channel: RwLock::new(plain.clone()),
            plain,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn channel(&self) -> reqwest::Client {
        self.channel.read().clone()
    }
}

impl HsmTransport for HttpTransport {
    async fn authenticate(&self) -> Result<AccessGrant, HsmError> {
        let url = self.url("/sys/v1/session/auth");
        let fail = |reason: String| HsmError::AuthenticationFailed {
            endpoint: url.clone(),
            reason,
        };

        let channel = self.auth.open_channel(&self.plain, self.timeout).await?;
        let resp = self
            .auth
            .apply_credentials(channel.post(&url))
            .send()
            .await
            .map_err(|e| fail(describe_send_error(&e)))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {status}: {body}")));
        }

        let grant: AccessGrant = resp
            .json()
            .await
            .map_err(|e| fail(format!("malformed auth response: {e}")))?;

        *self.channel.write() = channel;
        Ok(grant)
    }

    async fn encrypt(
        &self,
        token: &str,
        request: &EncryptRequest,
    ) -> Result<EncryptResponse, HsmError> {
        let endpoint = "POST /crypto/v1/encrypt";
        let resp = self
            .channel()
            .post(self.url("/crypto/v1/encrypt"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| HsmError::encryption(format!("{endpoint}: {}", describe_send_error(&e))))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(HsmError::encryption(format!("{endpoint} returned {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| HsmError::encryption(format!("{endpoint}: malformed response: {e}")))
    }

    async fn decrypt(
        &self,
        token: &str,
        request: &DecryptRequest,
    ) -> Result<DecryptResponse, HsmError> {
        let endpoint = "POST /crypto/v1/decrypt";
        let resp = self
            .channel()
            .post(self.url("/crypto/v1/decrypt"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| HsmError::decryption(format!("{endpoint}: {}", describe_send_error(&e))))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(HsmError::decryption(format!("{endpoint} returned {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| HsmError::decryption(format!("{endpoint}: malformed response: {e}")))
    }
}

fn describe_send_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
