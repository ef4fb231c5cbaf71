//! In-process HSM emulator for tests.
//!
//! The "cipher" is the plaintext bytes XOR-ed with a fixed byte, base64
//! encoded. Every exchange is counted, and each operation can be switched to
//! fail, so tests can assert on session reuse, demo isolation and fallback
//! behavior without a server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::auth::AccessGrant;
use crate::error::HsmError;
use crate::transport::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, HsmTransport,
};

const MASK: u8 = 0x5a;

/// Counting, failure-injecting transport.
#[derive(Debug)]
pub struct StubTransport {
    expires_in: u64,
    auth_delay: Duration,
    auth_calls: AtomicUsize,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
    fail_auth: AtomicBool,
    fail_encrypt: AtomicBool,
    fail_decrypt: AtomicBool,
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StubTransport {
    /// Stub issuing tokens valid for ten minutes.
    pub fn new() -> Self {
        Self {
            expires_in: 600,
            auth_delay: Duration::ZERO,
            auth_calls: AtomicUsize::new(0),
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            fail_auth: AtomicBool::new(false),
            fail_encrypt: AtomicBool::new(false),
            fail_decrypt: AtomicBool::new(false),
        }
    }

    /// Token lifetime returned by `authenticate`.
    pub fn with_expires_in(mut self, secs: u64) -> Self {
        self.expires_in = secs;
        self
    }

    /// Delay inside `authenticate`, to widen race windows.
    pub fn with_auth_delay(mut self, delay: Duration) -> Self {
        self.auth_delay = delay;
        self
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    /// Total exchanges of any kind.
    pub fn total_calls(&self) -> usize {
        self.auth_calls() + self.encrypt_calls() + self.decrypt_calls()
    }

    pub fn fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn fail_encrypt(&self, fail: bool) {
        self.fail_encrypt.store(fail, Ordering::SeqCst);
    }

    pub fn fail_decrypt(&self, fail: bool) {
        self.fail_decrypt.store(fail, Ordering::SeqCst);
    }
}

fn mask(encoded: &str) -> Option<String> {
    let bytes = BASE64.decode(encoded).ok()?;
    let masked: Vec<u8> = bytes.into_iter().map(|b| b ^ MASK).collect();
    Some(BASE64.encode(masked))
}

impl HsmTransport for StubTransport {
    async fn authenticate(&self) -> Result<AccessGrant, HsmError> {
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.auth_delay.is_zero() {
            tokio::time::sleep(self.auth_delay).await;
        }
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(HsmError::AuthenticationFailed {
                endpoint: "stub".into(),
                reason: "rejected by stub".into(),
            });
        }
        Ok(AccessGrant {
            access_token: format!("stub-token-{n}"),
            expires_in: self.expires_in,
        })
    }

    async fn encrypt(
        &self,
        _token: &str,
        request: &EncryptRequest,
    ) -> Result<EncryptResponse, HsmError> {
        let n = self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_encrypt.load(Ordering::SeqCst) {
            return Err(HsmError::encryption("rejected by stub"));
        }
        let cipher = mask(&request.plain)
            .ok_or_else(|| HsmError::encryption("plain is not base64"))?;
        Ok(EncryptResponse {
            cipher,
            iv: BASE64.encode(format!("iv-{n:012}")),
            kid: Some(request.key.kid.clone()),
        })
    }

    async fn decrypt(
        &self,
        _token: &str,
        request: &DecryptRequest,
    ) -> Result<DecryptResponse, HsmError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err(HsmError::decryption("rejected by stub"));
        }
        let plain = mask(&request.cipher)
            .ok_or_else(|| HsmError::decryption("cipher is not base64"))?;
        Ok(DecryptResponse { plain })
    }
}
