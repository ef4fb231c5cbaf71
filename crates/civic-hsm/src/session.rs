//! Authenticated HSM session.

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

use crate::auth::AuthKind;

/// A token is refreshed once it is this close to expiry, so that a call
/// started just before expiry does not race the token going stale.
pub const SAFETY_MARGIN_SECS: i64 = 60;

/// Bearer token and its absolute expiry. Held only in memory.
#[derive(Clone)]
pub struct Session {
    token: Zeroizing<String>,
    expires_at: DateTime<Utc>,
    auth: AuthKind,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("auth", &self.auth)
            .finish()
    }
}

impl Session {
    /// Session issued at `now` that lives for `expires_in_secs`.
    pub fn issued_at(
        token: impl Into<String>,
        now: DateTime<Utc>,
        expires_in_secs: i64,
        auth: AuthKind,
    ) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            expires_at: now + Duration::seconds(expires_in_secs),
            auth,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn auth(&self) -> AuthKind {
        self.auth
    }

    /// Usable without refresh: `now < expires_at - margin`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(SAFETY_MARGIN_SECS)
    }
}
