//! Notes collection CRUD with selection bookkeeping.
//!
//! # Responsibility
//! - Create, update, delete and select notes through persistent fields.
//! - Absorb changes that other execution contexts wrote to the store.
//!
//! # Invariants
//! - New notes are prepended and become the selection.
//! - Deleting the selected note clears the selection.
//! - The repository never asks for confirmation; callers gate `delete`.

use crate::field::{PersistentField, WriteStatus};
use crate::model::note::{Note, NoteId, NotePatch};
use crate::model::theme::Theme;
use crate::repo::clock::{Clock, SystemClock};
use crate::repo::ids::{IdGenerator, IdStrategy};
use crate::store::{KeyValueStore, StoreChange, Subscription};
use log::{debug, info, warn};

/// Key namespace used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "notes_app";

/// Backing-store keys for the four persistent fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKeys {
    pub notes: String,
    pub selected_note_id: String,
    pub search_query: String,
    pub theme: String,
}

impl FieldKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            notes: format!("{prefix}.notes"),
            selected_note_id: format!("{prefix}.selectedNoteId"),
            search_query: format!("{prefix}.searchQuery"),
            theme: format!("{prefix}.theme"),
        }
    }
}

impl Default for FieldKeys {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }
}

/// Construction options for `NoteRepository`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoOptions {
    pub keys: FieldKeys,
    pub id_strategy: IdStrategy,
}

/// Notes, selection, query and theme bound to one backing store.
pub struct NoteRepository<S: KeyValueStore> {
    store: S,
    notes: PersistentField<Vec<Note>>,
    selected: PersistentField<Option<NoteId>>,
    query: PersistentField<String>,
    theme: PersistentField<Theme>,
    ids: IdGenerator,
    clock: Box<dyn Clock>,
    subscription: Option<Subscription>,
}

impl<S: KeyValueStore> NoteRepository<S> {
    /// Opens the repository with default keys, random ids and wall time.
    pub fn open(store: S) -> Self {
        Self::open_with(store, RepoOptions::default(), Box::new(SystemClock))
    }

    /// Loads every field from `store` and subscribes to foreign changes.
    ///
    /// Never fails: unreadable fields start from their defaults and a
    /// failed subscription leaves the context running without
    /// cross-context updates.
    pub fn open_with(store: S, options: RepoOptions, clock: Box<dyn Clock>) -> Self {
        let keys = options.keys;
        let notes: PersistentField<Vec<Note>> =
            PersistentField::load(&store, keys.notes, Vec::new());
        let selected: PersistentField<Option<NoteId>> =
            PersistentField::load(&store, keys.selected_note_id, None);
        let query = PersistentField::load(&store, keys.search_query, String::new());
        let theme = PersistentField::load(&store, keys.theme, Theme::default());

        let subscription = match store.subscribe() {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                warn!(
                    "event=repo_subscribe module=repo status=degraded context={} error={}",
                    store.context_id(),
                    err
                );
                None
            }
        };

        info!(
            "event=repo_open module=repo status=ok context={} notes={} subscribed={}",
            store.context_id(),
            notes.get().len(),
            subscription.is_some()
        );

        Self {
            store,
            notes,
            selected,
            query,
            theme,
            ids: IdGenerator::new(options.id_strategy),
            clock,
            subscription,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Notes in collection order (most recently created first).
    pub fn notes(&self) -> &[Note] {
        self.notes.get()
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get().iter().find(|note| &note.id == id)
    }

    pub fn selected_note_id(&self) -> Option<&NoteId> {
        self.selected.get().as_ref()
    }

    pub fn search_query(&self) -> &str {
        self.query.get()
    }

    pub fn theme(&self) -> Theme {
        *self.theme.get()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Creates an empty note, prepends it and selects it.
    pub fn create(&mut self) -> Note {
        let now = self.clock.now();
        let note = Note::empty(self.ids.next_id(now), now);

        let mut replaced = false;
        let status = self.notes.update(&self.store, |notes| {
            let before = notes.len();
            notes.retain(|existing| existing.id != note.id);
            replaced = notes.len() != before;
            notes.insert(0, note.clone());
        });
        if replaced {
            warn!(
                "event=note_id_collision module=repo status=last_create_wins note_id={}",
                note.id
            );
        }
        log_write("note_create", &note.id, status);

        self.selected.set(&self.store, Some(note.id.clone()));
        note
    }

    /// Merges `patch` into the note with `id` and stamps `updated_at`.
    ///
    /// Returns `false` without touching storage when no such note exists.
    pub fn update(&mut self, id: &NoteId, patch: NotePatch) -> bool {
        let Some(index) = self.position(id) else {
            debug!("event=note_update module=repo status=skipped reason=not_found note_id={id}");
            return false;
        };

        let now = self.clock.now();
        let status = self.notes.update(&self.store, |notes| {
            notes[index].apply(patch, now);
        });
        log_write("note_update", id, status);
        true
    }

    /// Removes the note with `id`; returns whether a note was removed.
    pub fn delete(&mut self, id: &NoteId) -> bool {
        let Some(index) = self.position(id) else {
            debug!("event=note_delete module=repo status=skipped reason=not_found note_id={id}");
            return false;
        };

        let status = self.notes.update(&self.store, |notes| {
            notes.remove(index);
        });
        log_write("note_delete", id, status);

        if self.selected.get().as_ref() == Some(id) {
            self.selected.set(&self.store, None);
        }
        true
    }

    /// Selects `id`. Unknown ids are stored as-is; the derived view
    /// reports them as "no note selected".
    pub fn select(&mut self, id: NoteId) {
        if self.selected.get().as_ref() != Some(&id) {
            self.selected.set(&self.store, Some(id));
        }
    }

    pub fn clear_selection(&mut self) {
        if self.selected.get().is_some() {
            self.selected.set(&self.store, None);
        }
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if *self.query.get() != query {
            self.query.set(&self.store, query);
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if *self.theme.get() != theme {
            self.theme.set(&self.store, theme);
        }
    }

    /// Applies one change announced by another execution context.
    ///
    /// Returns `true` when an in-memory field changed.
    pub fn apply_external_change(&mut self, change: &StoreChange) -> bool {
        let changed = self.notes.absorb(change)
            || self.selected.absorb(change)
            || self.query.absorb(change)
            || self.theme.absorb(change);
        if changed {
            debug!(
                "event=field_absorbed module=repo status=ok key={}",
                change.key
            );
        }
        changed
    }

    /// Pulls and applies all pending foreign changes.
    ///
    /// Returns the number of changes that altered an in-memory field.
    pub fn absorb_external_changes(&mut self) -> usize {
        if let Err(err) = self.store.poll_external_changes() {
            warn!(
                "event=store_poll module=repo status=error context={} error={}",
                self.store.context_id(),
                err
            );
        }

        let pending = match self.subscription.as_ref() {
            Some(subscription) => subscription.drain(),
            None => return 0,
        };
        pending
            .iter()
            .filter(|change| self.apply_external_change(change))
            .count()
    }

    /// Tears down the change subscription. Idempotent.
    pub fn close(&mut self) {
        if self.subscription.take().is_some() {
            info!(
                "event=repo_close module=repo status=ok context={}",
                self.store.context_id()
            );
        }
    }

    fn position(&self, id: &NoteId) -> Option<usize> {
        self.notes.get().iter().position(|note| &note.id == id)
    }
}

fn log_write(event: &str, id: &NoteId, status: WriteStatus) {
    match status {
        WriteStatus::Persisted => {
            debug!("event={event} module=repo status=ok note_id={id}");
        }
        WriteStatus::MemoryOnly => {
            warn!("event={event} module=repo status=memory_only note_id={id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldKeys, NoteRepository, RepoOptions};
    use crate::model::note::{NoteId, NotePatch};
    use crate::repo::clock::ManualClock;
    use crate::repo::ids::IdStrategy;
    use crate::store::{MemoryBackend, MemoryStore};
    use chrono::{Duration, TimeZone, Utc};

    fn timestamp_repo(backend: &MemoryBackend, clock: &ManualClock) -> NoteRepository<MemoryStore> {
        NoteRepository::open_with(
            backend.open_context(),
            RepoOptions {
                keys: FieldKeys::default(),
                id_strategy: IdStrategy::Timestamp,
            },
            Box::new(clock.clone()),
        )
    }

    #[test]
    fn field_keys_use_application_prefix() {
        let keys = FieldKeys::default();
        assert_eq!(keys.notes, "notes_app.notes");
        assert_eq!(keys.selected_note_id, "notes_app.selectedNoteId");
        assert_eq!(keys.search_query, "notes_app.searchQuery");
        assert_eq!(keys.theme, "notes_app.theme");
    }

    #[test]
    fn timestamp_collision_keeps_only_latest_create() {
        let backend = MemoryBackend::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut repo = timestamp_repo(&backend, &clock);

        let first = repo.create();
        repo.update(&first.id, NotePatch::title("first"));
        let second = repo.create();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.notes().len(), 1);
        assert_eq!(repo.notes()[0].title, "");
        assert_eq!(repo.selected_note_id(), Some(&second.id));
    }

    #[test]
    fn timestamp_ids_distinct_across_milliseconds() {
        let backend = MemoryBackend::new();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut repo = timestamp_repo(&backend, &clock);

        repo.create();
        clock.advance(Duration::milliseconds(1));
        repo.create();

        assert_eq!(repo.notes().len(), 2);
    }

    #[test]
    fn select_unknown_id_is_stored() {
        let mut repo = NoteRepository::open(MemoryStore::isolated());
        repo.select(NoteId::new("ghost"));
        assert_eq!(repo.selected_note_id(), Some(&NoteId::new("ghost")));
    }

    #[test]
    fn close_is_idempotent() {
        let backend = MemoryBackend::new();
        let mut repo = NoteRepository::open(backend.open_context());
        assert_eq!(backend.listener_count(), 1);

        repo.close();
        repo.close();

        assert!(!repo.is_subscribed());
        assert_eq!(backend.listener_count(), 0);
    }
}
