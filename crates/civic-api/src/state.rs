//! # Application State
//!
//! Shared state for the Axum application: the process-wide
//! [`EncryptionService`] and the [`RecordStore`] holding storage records.
//! [`AppConfig`] is read once at startup by the binary.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use civic_fields::{EncryptionService, EntityKind, Record};
use civic_hsm::HttpTransport;
use parking_lot::RwLock;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Values matching `keep`, in no particular order.
    pub fn filtered(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| keep(v)).cloned().collect()
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Record Storage -----------------------------------------------------------

/// A storage record as kept by the in-memory backend.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub kind: EntityKind,
    pub body: Record,
    pub created_at: DateTime<Utc>,
}

/// Where storage records live. Only storage forms pass through here; the
/// entity view never reaches a backend.
#[derive(Debug, Clone)]
pub enum RecordStore {
    Memory(Store<StoredRecord>),
    Sqlite(SqlitePool),
}

impl RecordStore {
    pub fn memory() -> Self {
        Self::Memory(Store::new())
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::Sqlite(pool)
    }

    pub async fn insert(
        &self,
        kind: EntityKind,
        id: Uuid,
        body: Record,
        created_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        match self {
            Self::Memory(store) => {
                store.insert(
                    id,
                    StoredRecord {
                        kind,
                        body,
                        created_at,
                    },
                );
                Ok(())
            }
            Self::Sqlite(pool) => db::insert(pool, kind.table(), id, &body, created_at).await,
        }
    }

    pub async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Option<Record>, sqlx::Error> {
        match self {
            Self::Memory(store) => Ok(store.get(&id).filter(|r| r.kind == kind).map(|r| r.body)),
            Self::Sqlite(pool) => db::get_by_id(pool, kind.table(), id).await,
        }
    }

    /// All records of `kind`, oldest first.
    pub async fn list(&self, kind: EntityKind) -> Result<Vec<Record>, sqlx::Error> {
        match self {
            Self::Memory(store) => {
                let mut rows = store.filtered(|r| r.kind == kind);
                rows.sort_by_key(|r| r.created_at);
                Ok(rows.into_iter().map(|r| r.body).collect())
            }
            Self::Sqlite(pool) => db::list(pool, kind.table()).await,
        }
    }
}

// -- Configuration & State ----------------------------------------------------

/// Runtime configuration, read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// SQLite URL. `None` keeps records in memory.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AppConfig {
    /// `PORT` (default 8080) and `DATABASE_URL`.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        Self { port, database_url }
    }
}

/// Shared application state, cloned into every handler.
#[derive(Debug)]
pub struct AppState<T = HttpTransport> {
    pub encryption: EncryptionService<T>,
    pub records: RecordStore,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            encryption: self.encryption.clone(),
            records: self.records.clone(),
        }
    }
}

impl<T> AppState<T> {
    pub fn new(encryption: EncryptionService<T>, records: RecordStore) -> Self {
        Self {
            encryption,
            records,
        }
    }
}

impl AppState<HttpTransport> {
    /// In-memory state with encryption disabled.
    pub fn plaintext() -> Self {
        Self::new(EncryptionService::disabled(), RecordStore::memory())
    }
}
