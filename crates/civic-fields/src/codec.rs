//! Storage codec: entity view to storage record and back.
//!
//! - **Write** ([`FieldCodec::to_storage`]): every non-empty sensitive field
//!   is replaced by `{field}_encrypted` holding envelope text. Any failure
//!   aborts the whole record, so a partially encrypted record never exists.
//! - **Read** ([`FieldCodec::from_storage`]): total. Each `{field}_encrypted`
//!   becomes `field` again; values that cannot be decrypted are replaced by a
//!   fallback label and the failure is logged.

use std::sync::Arc;

use civic_hsm::{HsmClient, HsmTransport, HttpTransport};
use serde_json::Value;

use crate::classification::{encrypted_key, fallback_label, EntityKind, FieldClass, ENCRYPTED_SUFFIX};
use crate::error::CodecError;

/// A flat JSON object, either an entity view or its storage form.
pub type Record = serde_json::Map<String, Value>;

/// Borrow `value` as a record.
pub fn as_record(value: &Value) -> Result<&Record, CodecError> {
    value.as_object().ok_or(CodecError::NotAnObject)
}

/// Reject any key outside the entity's classification.
pub fn validate_fields(kind: EntityKind, entity: &Record) -> Result<(), CodecError> {
    match entity.keys().find(|name| kind.classify(name).is_none()) {
        Some(name) => Err(CodecError::UnknownField {
            kind,
            field: name.clone(),
        }),
        None => Ok(()),
    }
}

/// Text to encrypt for a sensitive value. `None` for null and empty strings.
/// Non-string values are encrypted as their JSON text.
fn sensitive_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// What a successful read of `entity`'s storage form returns: sensitive
/// fields with no text are dropped and non-string ones become their JSON text.
pub fn written_view(kind: EntityKind, entity: &Record) -> Record {
    let mut view = Record::new();
    for (name, value) in entity {
        if kind.classify(name) != Some(FieldClass::Sensitive) {
            view.insert(name.clone(), value.clone());
        } else if let Some(text) = sensitive_text(value) {
            view.insert(name.clone(), Value::String(text));
        }
    }
    view
}

/// Field name for a storage key of the form `{field}_encrypted`.
pub fn envelope_field(key: &str) -> Option<&str> {
    key.strip_suffix(ENCRYPTED_SUFFIX).filter(|f| !f.is_empty())
}

/// Plaintext part of a storage record: every key not ending in
/// `_encrypted`, a bare `_encrypted` key included.
pub(crate) fn plain_fields(record: &Record) -> Record {
    record
        .iter()
        .filter(|(key, _)| !key.ends_with(ENCRYPTED_SUFFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Codec bound to one shared HSM client.
#[derive(Debug)]
pub struct FieldCodec<T = HttpTransport> {
    hsm: Arc<HsmClient<T>>,
}

impl<T> Clone for FieldCodec<T> {
    fn clone(&self) -> Self {
        Self {
            hsm: Arc::clone(&self.hsm),
        }
    }
}

impl<T: HsmTransport> FieldCodec<T> {
    pub fn new(hsm: Arc<HsmClient<T>>) -> Self {
        Self { hsm }
    }

    pub fn hsm(&self) -> &HsmClient<T> {
        &self.hsm
    }

    /// Storage form of `entity`. Unknown keys are rejected before any HSM
    /// call; the first encryption failure aborts the record.
    pub async fn to_storage(&self, kind: EntityKind, entity: &Record) -> Result<Record, CodecError> {
        validate_fields(kind, entity)?;

        let mut stored = Record::new();
        for (name, value) in entity {
            if kind.classify(name) != Some(FieldClass::Sensitive) {
                stored.insert(name.clone(), value.clone());
                continue;
            }
            let Some(plain) = sensitive_text(value) else {
                continue;
            };
            let envelope = self.hsm.encrypt(&plain).await.map_err(|source| {
                tracing::error!(entity = %kind, field = %name, "field encryption failed: {source}");
                CodecError::EncryptionFailed {
                    field: name.clone(),
                    source,
                }
            })?;
            if let Some(envelope) = envelope {
                tracing::debug!(entity = %kind, field = %name, "field encrypted");
                stored.insert(encrypted_key(name), Value::String(envelope));
            }
        }
        Ok(stored)
    }

    /// Entity view of a storage record. Never fails.
    pub async fn from_storage(&self, kind: EntityKind, record: &Record) -> Record {
        let mut view = plain_fields(record);

        for (key, value) in record {
            let Some(field) = envelope_field(key) else {
                continue;
            };
            let restored = match value {
                Value::Null => Value::Null,
                Value::String(text) => match self.hsm.decrypt(text).await {
                    Ok(Some(plain)) => Value::String(plain),
                    Ok(None) => Value::Null,
                    Err(e) => {
                        tracing::warn!(entity = %kind, field, "decryption failed, showing placeholder: {e}");
                        Value::String(fallback_label(field).to_string())
                    }
                },
                _ => {
                    tracing::warn!(entity = %kind, field, "stored envelope is not a string, showing placeholder");
                    Value::String(fallback_label(field).to_string())
                }
            };
            if restored.is_null() && view.contains_key(field) {
                continue;
            }
            view.insert(field.to_string(), restored);
        }
        view
    }
}
