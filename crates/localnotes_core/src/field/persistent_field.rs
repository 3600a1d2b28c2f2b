//! One typed value mirrored between memory and one store key.

use crate::field::value::{decode_or_default, encode, FieldValue};
use crate::store::{KeyValueStore, StoreChange};
use log::warn;

/// Outcome of a local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Encoded value reached the backing store.
    Persisted,
    /// Store rejected the write; the value lives in memory for this session.
    MemoryOnly,
}

/// Typed mirror of one backing-store key.
#[derive(Debug, Clone)]
pub struct PersistentField<T: FieldValue> {
    key: String,
    default: T,
    value: T,
}

impl<T: FieldValue> PersistentField<T> {
    /// Loads the field from `store`, using `default` when the key is
    /// absent, malformed or the store cannot be read.
    pub fn load<S>(store: &S, key: impl Into<String>, default: T) -> Self
    where
        S: KeyValueStore + ?Sized,
    {
        let key = key.into();
        let raw = match store.get(&key) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "event=field_load module=field status=degraded key={} error={}",
                    key, err
                );
                None
            }
        };

        let value = decode_logged("field_decode", &key, raw.as_deref(), &default);

        Self {
            key,
            default,
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Replaces the in-memory value and writes it through to `store`.
    ///
    /// The in-memory value is updated even when the write is rejected.
    pub fn set<S>(&mut self, store: &S, value: T) -> WriteStatus
    where
        S: KeyValueStore + ?Sized,
    {
        self.value = value;
        self.persist(store)
    }

    /// Mutates the value in place, then writes it through to `store`.
    pub fn update<S, F>(&mut self, store: &S, mutate: F) -> WriteStatus
    where
        S: KeyValueStore + ?Sized,
        F: FnOnce(&mut T),
    {
        mutate(&mut self.value);
        self.persist(store)
    }

    /// Absorbs a change made by another execution context.
    ///
    /// Returns `true` when the change targets this key and altered the
    /// in-memory value.
    pub fn absorb(&mut self, change: &StoreChange) -> bool {
        if change.key != self.key {
            return false;
        }

        let value = decode_logged(
            "field_absorb",
            &self.key,
            Some(change.new_value.as_str()),
            &self.default,
        );

        if value == self.value {
            return false;
        }
        self.value = value;
        true
    }

    fn persist<S>(&self, store: &S) -> WriteStatus
    where
        S: KeyValueStore + ?Sized,
    {
        let encoded = match encode(&self.value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(
                    "event=field_write module=field status=memory_only key={} error_code=encode_failed error={}",
                    self.key, err
                );
                return WriteStatus::MemoryOnly;
            }
        };

        match store.set(&self.key, &encoded) {
            Ok(()) => WriteStatus::Persisted,
            Err(err) => {
                warn!(
                    "event=field_write module=field status=memory_only key={} bytes={} error={}",
                    self.key,
                    encoded.len(),
                    err
                );
                WriteStatus::MemoryOnly
            }
        }
    }
}

fn decode_logged<T: FieldValue>(event: &str, key: &str, raw: Option<&str>, default: &T) -> T {
    let decoded = decode_or_default(raw, default);
    if let Some(reason) = decoded.fallback_reason {
        warn!(
            "event={} module=field status=fallback_default key={} error={}",
            event, key, reason
        );
    }
    for repair in &decoded.repairs {
        warn!(
            "event={} module=field status=repaired key={} detail={}",
            event, key, repair
        );
    }
    decoded.value
}

#[cfg(test)]
mod tests {
    use super::{PersistentField, WriteStatus};
    use crate::model::theme::Theme;
    use crate::store::{KeyValueStore, MemoryBackend, MemoryStore, StoreChange};

    #[test]
    fn load_uses_default_for_absent_key() {
        let store = MemoryStore::isolated();
        let field = PersistentField::load(&store, "app.theme", Theme::Light);
        assert_eq!(*field.get(), Theme::Light);
    }

    #[test]
    fn set_writes_json_payload() {
        let store = MemoryStore::isolated();
        let mut field = PersistentField::load(&store, "app.query", String::new());

        assert_eq!(field.set(&store, "milk".to_string()), WriteStatus::Persisted);
        assert_eq!(store.get("app.query").unwrap().as_deref(), Some("\"milk\""));
    }

    #[test]
    fn rejected_write_keeps_memory_value() {
        let backend = MemoryBackend::with_quota(8);
        let store = backend.open_context();
        let mut field = PersistentField::load(&store, "app.query", String::new());

        let status = field.set(&store, "far too long for the quota".to_string());

        assert_eq!(status, WriteStatus::MemoryOnly);
        assert_eq!(field.get(), "far too long for the quota");
        assert_eq!(backend.raw_get("app.query"), None);
    }

    #[test]
    fn unavailable_store_loads_default() {
        let backend = MemoryBackend::new();
        backend.raw_set("app.theme", "\"dark\"");
        backend.set_available(false);
        let store = backend.open_context();

        let field = PersistentField::load(&store, "app.theme", Theme::Light);

        assert_eq!(*field.get(), Theme::Light);
    }

    #[test]
    fn absorb_ignores_other_keys_and_decodes_matching_key() {
        let store = MemoryStore::isolated();
        let mut field = PersistentField::load(&store, "app.theme", Theme::Light);

        let other = StoreChange {
            key: "app.query".to_string(),
            new_value: "\"dark\"".to_string(),
        };
        assert!(!field.absorb(&other));

        let matching = StoreChange {
            key: "app.theme".to_string(),
            new_value: "\"dark\"".to_string(),
        };
        assert!(field.absorb(&matching));
        assert_eq!(*field.get(), Theme::Dark);
    }

    #[test]
    fn absorbing_corrupted_payload_resets_to_default() {
        let store = MemoryStore::isolated();
        let mut field = PersistentField::load(&store, "app.theme", Theme::Light);
        field.set(&store, Theme::Dark);

        let corrupted = StoreChange {
            key: "app.theme".to_string(),
            new_value: "{not json".to_string(),
        };

        assert!(field.absorb(&corrupted));
        assert_eq!(field.get(), field.default_value());
    }
}
