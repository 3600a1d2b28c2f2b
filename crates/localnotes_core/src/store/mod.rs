//! Durable key-value backing store contract and implementations.
//!
//! # Responsibility
//! - Define the synchronous `get`/`set`/`subscribe` contract every
//!   persistent field is written against.
//! - Provide an in-memory implementation (tests, degraded sessions) and a
//!   SQLite-backed durable implementation.
//!
//! # Invariants
//! - Every store handle belongs to exactly one execution context.
//! - Change notifications are delivered only to contexts other than the
//!   writer; a context never observes its own writes on the channel.
//! - Dropping a `Subscription` unregisters its listener.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod hub;
pub mod memory;
pub mod sqlite;

pub use hub::{ChangeHub, Subscription};
pub use memory::{MemoryBackend, MemoryStore};
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Identity of one execution context sharing a backing store.
pub type ContextId = Uuid;

/// Backing-store failure.
///
/// Persistent fields swallow these; they are only surfaced by the raw
/// store APIs.
#[derive(Debug)]
pub enum StoreError {
    /// Store is disabled or cannot be reached.
    Unavailable(String),
    /// Write rejected because the store would exceed its capacity.
    QuotaExceeded {
        key: String,
        required_bytes: usize,
        quota_bytes: usize,
    },
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "backing store unavailable: {reason}"),
            Self::QuotaExceeded {
                key,
                required_bytes,
                quota_bytes,
            } => write!(
                f,
                "write to `{key}` needs {required_bytes} bytes, quota is {quota_bytes}"
            ),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One key modification made by another execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub new_value: String,
}

/// Synchronous string-keyed, string-valued backing store.
pub trait KeyValueStore {
    /// Execution context this handle writes as.
    fn context_id(&self) -> ContextId;
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    /// Registers a listener for changes made by other contexts.
    fn subscribe(&self) -> StoreResult<Subscription>;
    /// Pulls pending changes from other contexts into the subscription
    /// channel. Push-based stores deliver eagerly and report zero.
    fn poll_external_changes(&self) -> StoreResult<usize> {
        Ok(0)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn context_id(&self) -> ContextId {
        (**self).context_id()
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn subscribe(&self) -> StoreResult<Subscription> {
        (**self).subscribe()
    }

    fn poll_external_changes(&self) -> StoreResult<usize> {
        (**self).poll_external_changes()
    }
}
