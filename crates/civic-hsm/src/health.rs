//! Structured encryption health report for liveness probes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    /// Encryption is not configured; records are stored in plaintext.
    Disabled,
}

/// Whether a real HSM or the demo stand-in serves crypto calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    Hsm,
    Demo,
}

/// Result of a health check. Produced instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<EncryptionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// Report for a process running without encryption.
    pub fn disabled() -> Self {
        Self {
            status: HealthState::Disabled,
            mode: None,
            auth_method: None,
            endpoint: None,
            key_id: None,
            token_expires_at: None,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }

    /// Healthy, or deliberately running without encryption.
    pub fn is_serving(&self) -> bool {
        matches!(self.status, HealthState::Healthy | HealthState::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_report_is_serving_but_not_healthy() {
        let status = HealthStatus::disabled();
        assert!(status.is_serving());
        assert!(!status.is_healthy());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "disabled");
        assert!(json.get("error").is_none());
    }
}
