//! Static field classification for the two portal entities.
//!
//! Every persisted field of an entity is either **sensitive** (stored only as
//! an envelope under `{field}_encrypted`) or **public** (stored and queried in
//! cleartext). The two lists are disjoint and together cover every field the
//! entity persists.
//!
//! | Entity            | Sensitive                                                    |
//! |-------------------|--------------------------------------------------------------|
//! | `citizen`         | firstName, lastName, email, phone, address, dateOfBirth, nationalId |
//! | `service-request` | requesterName, contactEmail, contactPhone, description, notes |

use serde::{Deserialize, Serialize};

/// Suffix of the storage key that holds a sensitive field's envelope.
pub const ENCRYPTED_SUFFIX: &str = "_encrypted";

const CITIZEN_SENSITIVE: &[&str] = &[
    "firstName",
    "lastName",
    "email",
    "phone",
    "address",
    "dateOfBirth",
    "nationalId",
];

const CITIZEN_PUBLIC: &[&str] = &[
    "id",
    "city",
    "state",
    "zipCode",
    "gender",
    "status",
    "registrationDate",
    "createdAt",
    "updatedAt",
];

const SERVICE_REQUEST_SENSITIVE: &[&str] = &[
    "requesterName",
    "contactEmail",
    "contactPhone",
    "description",
    "notes",
];

const SERVICE_REQUEST_PUBLIC: &[&str] = &[
    "id",
    "citizenId",
    "agencyId",
    "serviceType",
    "status",
    "priority",
    "submittedDate",
    "completedDate",
    "createdAt",
    "updatedAt",
];

/// Default placeholder shown when a field cannot be decrypted.
pub const DEFAULT_FALLBACK_LABEL: &str = "[Encrypted]";

/// Sensitivity class of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    Sensitive,
    Public,
}

/// The entity shapes the codec supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Citizen,
    ServiceRequest,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Citizen, EntityKind::ServiceRequest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::ServiceRequest => "service-request",
        }
    }

    /// Storage table holding this entity.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Citizen => "citizens",
            Self::ServiceRequest => "service_requests",
        }
    }

    pub fn sensitive_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Citizen => CITIZEN_SENSITIVE,
            Self::ServiceRequest => SERVICE_REQUEST_SENSITIVE,
        }
    }

    pub fn public_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Citizen => CITIZEN_PUBLIC,
            Self::ServiceRequest => SERVICE_REQUEST_PUBLIC,
        }
    }

    /// Class of `field`, or `None` if the entity does not persist it.
    pub fn classify(&self, field: &str) -> Option<FieldClass> {
        if self.sensitive_fields().contains(&field) {
            Some(FieldClass::Sensitive)
        } else if self.public_fields().contains(&field) {
            Some(FieldClass::Public)
        } else {
            None
        }
    }

    /// Public fields that analytics groups by.
    pub fn dimension_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Citizen => &["city", "state", "gender", "status"],
            Self::ServiceRequest => &["serviceType", "status", "priority", "agencyId"],
        }
    }

    /// Public date field bucketed into the monthly histogram.
    pub fn period_field(&self) -> &'static str {
        match self {
            Self::Citizen => "registrationDate",
            Self::ServiceRequest => "submittedDate",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for entity kinds outside the two supported shapes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind {0:?} (expected citizen or service-request)")]
pub struct UnknownEntityKind(pub String);

impl std::str::FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" | "citizens" => Ok(Self::Citizen),
            "service-request" | "service-requests" | "service_request" => Ok(Self::ServiceRequest),
            other => Err(UnknownEntityKind(other.to_string())),
        }
    }
}

/// Storage key for the envelope of `field`.
pub fn encrypted_key(field: &str) -> String {
    format!("{field}{ENCRYPTED_SUFFIX}")
}

/// Placeholder substituted for `field` when its envelope cannot be decrypted.
/// Never persisted.
pub fn fallback_label(field: &str) -> &'static str {
    match field {
        "email" | "contactEmail" => "[Encrypted Email]",
        "phone" | "contactPhone" => "[Encrypted Phone]",
        "address" => "[Encrypted Address]",
        "nationalId" => "[Encrypted ID]",
        "description" | "notes" => "[Encrypted Content]",
        _ => DEFAULT_FALLBACK_LABEL,
    }
}
