use civic_hsm::{ConfigError, HsmError};

use crate::classification::EntityKind;

/// Failures of the write path. The read path has no error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A sensitive field could not be encrypted; nothing was produced.
    #[error("failed to encrypt {field}: {source}")]
    EncryptionFailed {
        field: String,
        #[source]
        source: HsmError,
    },

    #[error("field {field:?} is not part of the {kind} record")]
    UnknownField { kind: EntityKind, field: String },

    #[error("entity must be a JSON object")]
    NotAnObject,
}

impl CodecError {
    /// Name of the field the error concerns, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::EncryptionFailed { field, .. } | Self::UnknownField { field, .. } => Some(field),
            Self::NotAnObject => None,
        }
    }
}

/// Failures while bringing the encryption service up.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hsm(#[from] HsmError),

    #[error("encryption self-test failed: expected {expected:?}, got {actual:?}")]
    SelfTest {
        expected: String,
        actual: Option<String>,
    },
}

impl ServiceError {
    /// Configuration problems, missing certificates included, cannot recover
    /// by retrying and must stop the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Hsm(HsmError::Config(_)))
    }
}
