//! In-memory backing store shared by several execution contexts.
//!
//! # Responsibility
//! - Serve as the injectable fake for tests and as the degraded store
//!   when durable storage cannot be opened.
//! - Simulate browser-style storage semantics: a write is announced to
//!   every other open context, never to the writer.
//!
//! # Invariants
//! - Writes that leave the stored value unchanged are not announced.
//! - While unavailable, every call fails with `StoreError::Unavailable`.
//! - Quota accounting counts key and value bytes of all entries.

use crate::store::{
    ChangeHub, ContextId, KeyValueStore, StoreChange, StoreError, StoreResult, Subscription,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

struct MemoryState {
    entries: BTreeMap<String, String>,
    available: bool,
    quota_bytes: Option<usize>,
}

/// Shared storage medium; cheap to clone.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    hub: ChangeHub,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                entries: BTreeMap::new(),
                available: true,
                quota_bytes: None,
            })),
            hub: ChangeHub::new(),
        }
    }

    /// Creates a backend that rejects writes beyond `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        let backend = Self::new();
        backend.lock().quota_bytes = Some(quota_bytes);
        backend
    }

    /// Opens a new execution context on this backend.
    pub fn open_context(&self) -> MemoryStore {
        MemoryStore {
            backend: self.clone(),
            context_id: Uuid::new_v4(),
        }
    }

    /// Toggles availability, simulating disabled storage.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Reads a raw entry, bypassing availability checks.
    pub fn raw_get(&self, key: &str) -> Option<String> {
        self.lock().entries.get(key).cloned()
    }

    /// Writes a raw entry without announcing it to any context.
    ///
    /// Used to seed pre-existing or corrupted payloads.
    pub fn raw_set(&self, key: &str, value: &str) {
        self.lock()
            .entries
            .insert(key.to_string(), value.to_string());
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One execution context's handle on a `MemoryBackend`.
pub struct MemoryStore {
    backend: MemoryBackend,
    context_id: ContextId,
}

impl MemoryStore {
    /// Opens a single-context store on a fresh private backend.
    pub fn isolated() -> Self {
        MemoryBackend::new().open_context()
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }
}

impl KeyValueStore for MemoryStore {
    fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let state = self.backend.lock();
        ensure_available(&state)?;
        Ok(state.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        {
            let mut state = self.backend.lock();
            ensure_available(&state)?;

            if state.entries.get(key).map(String::as_str) == Some(value) {
                return Ok(());
            }

            if let Some(quota_bytes) = state.quota_bytes {
                let required_bytes = used_bytes_after_write(&state.entries, key, value);
                if required_bytes > quota_bytes {
                    return Err(StoreError::QuotaExceeded {
                        key: key.to_string(),
                        required_bytes,
                        quota_bytes,
                    });
                }
            }

            state.entries.insert(key.to_string(), value.to_string());
        }

        // Published outside the state lock; listeners never call back into it.
        self.backend.hub.publish(
            self.context_id,
            &StoreChange {
                key: key.to_string(),
                new_value: value.to_string(),
            },
        );
        Ok(())
    }

    fn subscribe(&self) -> StoreResult<Subscription> {
        ensure_available(&self.backend.lock())?;
        Ok(self.backend.hub.subscribe(self.context_id))
    }
}

fn ensure_available(state: &MemoryState) -> StoreResult<()> {
    if state.available {
        Ok(())
    } else {
        Err(StoreError::Unavailable(
            "memory backend disabled".to_string(),
        ))
    }
}

fn used_bytes_after_write(entries: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    let others: usize = entries
        .iter()
        .filter(|(existing, _)| existing.as_str() != key)
        .map(|(existing, stored)| existing.len() + stored.len())
        .sum();
    others + key.len() + value.len()
}

#[cfg(test)]
mod tests {
    use super::{MemoryBackend, MemoryStore};
    use crate::store::{KeyValueStore, StoreError};

    #[test]
    fn set_then_get_returns_value() {
        let store = MemoryStore::isolated();
        store.set("app.key", "\"v\"").unwrap();
        assert_eq!(store.get("app.key").unwrap().as_deref(), Some("\"v\""));
        assert_eq!(store.get("app.missing").unwrap(), None);
    }

    #[test]
    fn writes_are_announced_to_other_contexts_only() {
        let backend = MemoryBackend::new();
        let first = backend.open_context();
        let second = backend.open_context();
        let first_events = first.subscribe().unwrap();
        let second_events = second.subscribe().unwrap();

        first.set("app.theme", "\"dark\"").unwrap();

        assert!(first_events.try_next().is_none());
        let change = second_events.try_next().expect("second context notified");
        assert_eq!(change.key, "app.theme");
        assert_eq!(change.new_value, "\"dark\"");
    }

    #[test]
    fn unchanged_value_is_not_announced() {
        let backend = MemoryBackend::new();
        let writer = backend.open_context();
        let reader = backend.open_context();
        let events = reader.subscribe().unwrap();

        writer.set("app.query", "\"a\"").unwrap();
        writer.set("app.query", "\"a\"").unwrap();

        assert_eq!(events.drain().len(), 1);
    }

    #[test]
    fn unavailable_backend_rejects_every_call() {
        let backend = MemoryBackend::new();
        let store = backend.open_context();
        backend.set_available(false);

        assert!(matches!(store.get("k"), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.set("k", "v"), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.subscribe(), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn quota_counts_existing_entries_and_replacement_value() {
        let backend = MemoryBackend::with_quota(10);
        let store = backend.open_context();
        store.set("ab", "1234").unwrap();
        store.set("ab", "12345678").unwrap();

        let err = store.set("cd", "1").unwrap_err();
        match err {
            StoreError::QuotaExceeded {
                required_bytes,
                quota_bytes,
                ..
            } => {
                assert_eq!(required_bytes, 13);
                assert_eq!(quota_bytes, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.raw_get("cd"), None);
    }
}
