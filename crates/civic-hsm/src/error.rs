//! HSM client error types.

use crate::config::ConfigError;

/// Errors from the HSM client.
///
/// Each variant maps to one failure class the callers handle differently:
/// configuration problems are fatal at startup, authentication failures abort
/// encrypted startup, encryption failures abort the write, and decryption
/// failures are turned into fallback labels by the field codec.
#[derive(Debug, thiserror::Error)]
pub enum HsmError {
    /// Missing or contradictory configuration, including absent certificates.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The session-establishment exchange failed.
    #[error("authentication against {endpoint} failed: {reason}")]
    AuthenticationFailed { endpoint: String, reason: String },
    /// The HSM could not encrypt a value (transport, status, or payload error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },
    /// The HSM could not decrypt a value (transport, status, or payload error).
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },
}

impl HsmError {
    pub(crate) fn encryption(reason: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            reason: reason.into(),
        }
    }
}
