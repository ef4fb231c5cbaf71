//! # civic-hsm: HSM client for citizen PII encryption
//!
//! Encrypts and decrypts individual field values through a remote
//! key-management service (Fortanix DSM API), so that no raw key material
//! ever reaches the portal.
//!
//! ## Modules
//!
//! - [`config`]: environment-driven configuration, including the
//!   "encryption disabled" outcome.
//! - [`auth`]: the two authentication schemes (API key, trusted CA with
//!   mutual TLS) and demo-mode detection.
//! - [`session`]: bearer token with expiry and refresh margin.
//! - [`transport`]: wire types and the [`HsmTransport`] seam, with the
//!   `reqwest` implementation.
//! - [`client`]: [`HsmClient`]: session management, `encrypt`, `decrypt`,
//!   `health_check`.
//! - [`envelope`]: the persisted `{cipher, iv}` form and legacy detection.
//! - [`demo`]: reversible local stand-in used without real credentials.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use civic_hsm::{HsmClient, HsmConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! if let Some(config) = HsmConfig::from_env()? {
//!     let client = HsmClient::new(config)?;
//!     let stored = client.encrypt("John").await?;
//!     let restored = client.decrypt(stored.as_deref().unwrap_or_default()).await?;
//!     assert_eq!(restored.as_deref(), Some("John"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod demo;
pub mod envelope;
pub mod error;
pub mod health;
pub mod session;
#[cfg(any(test, feature = "stub"))]
pub mod stub;
pub mod transport;

pub use auth::{AuthKind, AuthMethod};
pub use client::HsmClient;
pub use config::{ConfigError, HsmConfig};
pub use envelope::{parse_envelope, Envelope};
pub use error::HsmError;
pub use health::{EncryptionMode, HealthState, HealthStatus};
pub use transport::{HsmTransport, HttpTransport};
