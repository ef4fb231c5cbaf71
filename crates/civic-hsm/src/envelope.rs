//! Persisted form of an encrypted field.
//!
//! An envelope is stored as a JSON object with two string keys:
//!
//! ```json
//! {"cipher":"<base64>","iv":"<base64>"}
//! ```
//!
//! Both values are opaque; their length and alphabet are whatever the HSM
//! returns for AES-CBC. Values written before encryption was enabled are
//! plain strings and are recognised by failing [`parse_envelope`].
//!
//! ## Known limitation
//!
//! A legacy plaintext value that is itself a JSON object carrying both
//! `cipher` and `iv` string keys is indistinguishable from an envelope and
//! will be sent to the HSM for decryption, which then fails. Migrating such
//! rows requires re-encrypting them explicitly.

use serde::{Deserialize, Serialize};

/// One ciphertext and its initialization vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub cipher: String,
    pub iv: String,
}

impl Envelope {
    pub fn new(cipher: impl Into<String>, iv: impl Into<String>) -> Self {
        Self {
            cipher: cipher.into(),
            iv: iv.into(),
        }
    }

    /// Canonical text form stored in `{field}_encrypted` columns.
    pub fn to_text(&self) -> String {
        serde_json::json!({ "cipher": self.cipher, "iv": self.iv }).to_string()
    }
}

/// Classify a stored value: `Some` for an envelope, `None` for legacy plaintext.
///
/// Only a JSON object qualifies. Extra keys are tolerated. A value whose
/// `cipher` or `iv` is missing or not a string is legacy plaintext.
pub fn parse_envelope(text: &str) -> Option<Envelope> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    let cipher = object.get("cipher")?.as_str()?;
    let iv = object.get("iv")?.as_str()?;
    Some(Envelope::new(cipher, iv))
}
