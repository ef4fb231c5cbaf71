//! Process-wide encryption service: codec plus startup self-test, or
//! plaintext storage when the HSM is not configured.

use std::sync::Arc;

use civic_hsm::{parse_envelope, HealthStatus, HsmClient, HsmConfig, HsmTransport, HttpTransport};
use serde_json::Value;

use crate::classification::{fallback_label, EntityKind};
use crate::codec::{envelope_field, plain_fields, validate_fields, written_view, FieldCodec, Record};
use crate::error::{CodecError, ServiceError};

/// Value round-tripped by [`EncryptionService::initialize`].
pub const SELF_TEST_VALUE: &str = "encryption-self-test";

/// Field encryption for the whole process. Cheap to clone.
#[derive(Debug)]
pub struct EncryptionService<T = HttpTransport> {
    codec: Option<FieldCodec<T>>,
}

impl<T> Clone for EncryptionService<T> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
        }
    }
}

impl EncryptionService<HttpTransport> {
    /// Build from `FORTANIX_*` variables; disabled when none are set.
    pub fn from_env() -> Result<Self, ServiceError> {
        match HsmConfig::from_env()? {
            Some(config) => {
                tracing::info!(
                    auth_method = %config.auth.kind(),
                    endpoint = %config.endpoint,
                    key_id = %config.key_id,
                    "field encryption enabled"
                );
                Ok(Self::enabled(Arc::new(HsmClient::new(config)?)))
            }
            None => {
                tracing::warn!("no HSM configured; sensitive fields will be stored in plaintext");
                Ok(Self::disabled())
            }
        }
    }
}

impl<T: HsmTransport> EncryptionService<T> {
    pub fn enabled(hsm: Arc<HsmClient<T>>) -> Self {
        Self {
            codec: Some(FieldCodec::new(hsm)),
        }
    }

    pub fn disabled() -> Self {
        Self { codec: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.codec.is_some()
    }

    pub fn codec(&self) -> Option<&FieldCodec<T>> {
        self.codec.as_ref()
    }

    /// Authenticate and round-trip [`SELF_TEST_VALUE`]. No-op when disabled.
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        let Some(codec) = &self.codec else {
            return Ok(());
        };
        let hsm = codec.hsm();
        hsm.authenticate().await?;

        let restored = match hsm.encrypt(SELF_TEST_VALUE).await? {
            Some(envelope) => hsm.decrypt(&envelope).await?,
            None => None,
        };
        if restored.as_deref() != Some(SELF_TEST_VALUE) {
            return Err(ServiceError::SelfTest {
                expected: SELF_TEST_VALUE.to_string(),
                actual: restored,
            });
        }
        tracing::info!(mode = ?hsm.mode(), key_id = %hsm.key_id(), "encryption self-test passed");
        Ok(())
    }

    /// Storage form of `entity`. When disabled the entity is only validated
    /// and stored as given.
    pub async fn to_storage(&self, kind: EntityKind, entity: &Record) -> Result<Record, CodecError> {
        match &self.codec {
            Some(codec) => codec.to_storage(kind, entity).await,
            None => {
                validate_fields(kind, entity)?;
                Ok(entity.clone())
            }
        }
    }

    /// Entity view of `record`. Never fails. When disabled, envelopes left
    /// over from an encrypted deployment show as placeholders.
    pub async fn from_storage(&self, kind: EntityKind, record: &Record) -> Record {
        match &self.codec {
            Some(codec) => codec.from_storage(kind, record).await,
            None => without_hsm(record),
        }
    }

    /// Response view of an entity that was just written, without a round
    /// trip to the HSM. When disabled the entity was stored as given.
    pub fn written_view(&self, kind: EntityKind, entity: &Record) -> Record {
        match &self.codec {
            Some(_) => written_view(kind, entity),
            None => entity.clone(),
        }
    }

    pub async fn health_check(&self) -> HealthStatus {
        match &self.codec {
            Some(codec) => codec.hsm().health_check().await,
            None => HealthStatus::disabled(),
        }
    }
}

fn without_hsm(record: &Record) -> Record {
    let mut view = plain_fields(record);
    for (key, value) in record {
        let Some(field) = envelope_field(key) else {
            continue;
        };
        let restored = match value {
            Value::Null => Value::Null,
            Value::String(text) if text.is_empty() => Value::Null,
            Value::String(text) if parse_envelope(text).is_none() => Value::String(text.clone()),
            _ => Value::String(fallback_label(field).to_string()),
        };
        if restored.is_null() && view.contains_key(field) {
            continue;
        }
        view.insert(field.to_string(), restored);
    }
    view
}
