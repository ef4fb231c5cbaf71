//! Demo mode: a reversible stand-in for the HSM.
//!
//! Selected when the configured API key is missing or a placeholder. Every
//! operation that would reach the network instead runs locally. The encoding
//! is base64 with a tag and offers no confidentiality. It exists so that a
//! portal without credentials still exercises the same envelope contract.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::auth::AuthKind;
use crate::envelope::Envelope;
use crate::error::HsmError;
use crate::session::Session;

pub const DEMO_SESSION_TOKEN: &str = "demo-session-token";
pub const DEMO_SESSION_LIFETIME_SECS: i64 = 24 * 60 * 60;

const CIPHER_TAG: &str = "DEMO:";

/// Sentinel session for demo mode.
pub fn session(now: DateTime<Utc>) -> Session {
    Session::issued_at(DEMO_SESSION_TOKEN, now, DEMO_SESSION_LIFETIME_SECS, AuthKind::ApiKey)
}

/// Encode `plaintext`; the IV carries the encoding time.
pub fn seal(plaintext: &str, at: DateTime<Utc>) -> Envelope {
    Envelope::new(
        format!("{CIPHER_TAG}{}", BASE64.encode(plaintext.as_bytes())),
        BASE64.encode(at.timestamp_millis().to_string()),
    )
}

/// Invert [`seal`]. Envelopes produced by a real HSM cannot be opened here.
pub fn open(envelope: &Envelope) -> Result<String, HsmError> {
    let encoded = envelope
        .cipher
        .strip_prefix(CIPHER_TAG)
        .ok_or_else(|| HsmError::decryption("envelope was not produced in demo mode"))?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| HsmError::decryption(format!("malformed demo envelope: {e}")))?;
    String::from_utf8(bytes).map_err(|e| HsmError::decryption(format!("demo envelope is not UTF-8: {e}")))
}
