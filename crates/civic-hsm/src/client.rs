//! HSM client: one session, encrypt and decrypt.
//!
//! ## Session lifecycle
//!
//! The session is created lazily by the first crypto call (or eagerly by
//! [`HsmClient::authenticate`]) and refreshed transparently once it is within
//! [`SAFETY_MARGIN_SECS`](crate::session::SAFETY_MARGIN_SECS) of expiry. The
//! check-then-refresh sequence runs under an async mutex, so concurrent
//! callers that find the token stale wait for a single exchange instead of
//! each starting their own.
//!
//! ## Demo mode
//!
//! Decided from the credentials at construction and fixed for the client's
//! lifetime. In demo mode the transport is never used.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use url::Url;
use zeroize::Zeroizing;

use crate::auth::AuthKind;
use crate::config::HsmConfig;
use crate::demo;
use crate::envelope::{parse_envelope, Envelope};
use crate::error::HsmError;
use crate::health::{EncryptionMode, HealthState, HealthStatus};
use crate::session::Session;
use crate::transport::{DecryptRequest, EncryptRequest, HsmTransport, HttpTransport};

/// Upper bound applied to server-reported token lifetimes.
const MAX_TOKEN_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// Client for the remote HSM. Construct once per process and share via `Arc`.
#[derive(Debug)]
pub struct HsmClient<T = HttpTransport> {
    transport: T,
    endpoint: Url,
    auth: AuthKind,
    key_id: String,
    demo: bool,
    session: Mutex<Option<Session>>,
}

impl HsmClient<HttpTransport> {
    /// Client talking HTTPS to the configured endpoint.
    pub fn new(config: HsmConfig) -> Result<Self, HsmError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: HsmTransport> HsmClient<T> {
    pub fn with_transport(config: HsmConfig, transport: T) -> Self {
        let demo = config.auth.is_demo();
        if demo {
            tracing::warn!(
                "HSM API key is missing or a placeholder; running in demo mode (no real encryption)"
            );
        }
        Self {
            transport,
            endpoint: config.endpoint,
            auth: config.auth.kind(),
            key_id: config.key_id,
            demo,
            session: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_demo(&self) -> bool {
        self.demo
    }

    pub fn auth_kind(&self) -> AuthKind {
        self.auth
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn mode(&self) -> EncryptionMode {
        if self.demo {
            EncryptionMode::Demo
        } else {
            EncryptionMode::Hsm
        }
    }

    /// Establish a new session unconditionally, replacing any current one.
    pub async fn authenticate(&self) -> Result<(), HsmError> {
        let mut guard = self.session.lock().await;
        *guard = Some(self.establish().await?);
        Ok(())
    }

    /// Return a usable bearer token, authenticating only when there is no
    /// session or the current one is inside the safety margin.
    pub async fn ensure_authenticated(&self) -> Result<Zeroizing<String>, HsmError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if session.is_fresh_at(Utc::now()) {
                return Ok(Zeroizing::new(session.token().to_string()));
            }
            tracing::debug!(expires_at = %session.expires_at(), "HSM session near expiry, refreshing");
        }
        let session = self.establish().await?;
        let token = Zeroizing::new(session.token().to_string());
        *guard = Some(session);
        Ok(token)
    }

    /// Expiry of the current session, if one exists.
    pub async fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.lock().await.as_ref().map(Session::expires_at)
    }

    async fn establish(&self) -> Result<Session, HsmError> {
        let now = Utc::now();
        if self.demo {
            tracing::info!("demo HSM session established");
            return Ok(demo::session(now));
        }

        let grant = self.transport.authenticate().await.map_err(|e| {
            tracing::error!(auth_method = %self.auth, endpoint = %self.endpoint, "HSM authentication failed: {e}");
            e
        })?;
        let lifetime = grant.expires_in.min(MAX_TOKEN_LIFETIME_SECS) as i64;
        let session = Session::issued_at(grant.access_token, now, lifetime, self.auth);
        tracing::info!(
            auth_method = %self.auth,
            expires_at = %session.expires_at(),
            "HSM session established"
        );
        Ok(session)
    }

    /// Encrypt one field value into envelope text. Empty input yields `None`
    /// without contacting the HSM.
    pub async fn encrypt(&self, plaintext: &str) -> Result<Option<String>, HsmError> {
        if plaintext.is_empty() {
            return Ok(None);
        }
        let token = self.ensure_authenticated().await?;

        let envelope = if self.demo {
            demo::seal(plaintext, Utc::now())
        } else {
            let request = EncryptRequest::aes_cbc(&self.key_id, BASE64.encode(plaintext.as_bytes()));
            let response = self.transport.encrypt(&token, &request).await?;
            if response.cipher.is_empty() || response.iv.is_empty() {
                return Err(HsmError::encryption("HSM returned an empty cipher or iv"));
            }
            Envelope::new(response.cipher, response.iv)
        };

        tracing::debug!(key_id = %self.key_id, "value encrypted");
        Ok(Some(envelope.to_text()))
    }

    /// Decrypt envelope text. Empty input yields `None`; text that is not an
    /// envelope is legacy plaintext and comes back unchanged.
    pub async fn decrypt(&self, text: &str) -> Result<Option<String>, HsmError> {
        if text.is_empty() {
            return Ok(None);
        }
        let token = self.ensure_authenticated().await?;

        let Some(envelope) = parse_envelope(text) else {
            tracing::debug!("stored value is not an envelope, returning legacy plaintext");
            return Ok(Some(text.to_string()));
        };

        if self.demo {
            return demo::open(&envelope).map(Some);
        }

        let request = DecryptRequest::aes_cbc(&self.key_id, &envelope);
        let response = self.transport.decrypt(&token, &request).await?;
        let bytes = BASE64
            .decode(response.plain.as_bytes())
            .map_err(|e| HsmError::decryption(format!("plain is not base64: {e}")))?;
        let plaintext = String::from_utf8(bytes)
            .map_err(|e| HsmError::decryption(format!("plaintext is not UTF-8: {e}")))?;
        Ok(Some(plaintext))
    }

    /// Probe the session. Never fails; problems are reported in the status.
    pub async fn health_check(&self) -> HealthStatus {
        let result = self.ensure_authenticated().await;
        let (status, error) = match result {
            Ok(_) => (HealthState::Healthy, None),
            Err(e) => (HealthState::Unhealthy, Some(e.to_string())),
        };
        HealthStatus {
            status,
            mode: Some(self.mode()),
            auth_method: Some(self.auth),
            endpoint: Some(self.endpoint.to_string()),
            key_id: Some(self.key_id.clone()),
            token_expires_at: self.session_expires_at().await,
            error,
            checked_at: Utc::now(),
        }
    }
}
