//! # civic-fields: field-level encryption for portal records
//!
//! Sits between the portal's business logic and its storage. Sensitive
//! fields of citizens and service requests are encrypted through
//! [`civic_hsm::HsmClient`] on the way in and decrypted on the way out,
//! while public fields stay in cleartext so they can be filtered and
//! aggregated without the HSM.
//!
//! - [`classification`]: which fields are sensitive, and their placeholders.
//! - [`codec`]: `to_storage` / `from_storage`.
//! - [`analytics`]: counts over public fields.
//! - [`service`]: the process-wide [`EncryptionService`] with its startup
//!   self-test and plaintext fallback when encryption is not configured.

pub mod analytics;
pub mod classification;
pub mod codec;
pub mod error;
pub mod service;

pub use analytics::{analytics, AnalyticsReport};
pub use classification::{fallback_label, EntityKind, FieldClass};
pub use codec::{FieldCodec, Record};
pub use error::{CodecError, ServiceError};
pub use service::EncryptionService;
