//! Reactive notes session.
//!
//! # Responsibility
//! - Wrap one `NoteRepository` and memoize its `NotesView`.
//! - Recompute the view after each mutation and after absorbing changes
//!   from other execution contexts.
//! - Open the configured backing store, degrading to session-only memory
//!   storage when it cannot be opened.
//!
//! # Invariants
//! - `revision` increases by one on every recompute.
//! - No operation returns an error to the caller.

use crate::config::{CoreConfig, StorageConfig};
use crate::model::note::{Note, NoteId, NotePatch};
use crate::model::theme::Theme;
use crate::repo::clock::{Clock, SystemClock};
use crate::repo::note_repo::NoteRepository;
use crate::store::{KeyValueStore, MemoryStore, SqliteStore};
use crate::view::derived::NotesView;
use log::{info, warn};

/// Opens the store described by `storage`.
///
/// Falls back to an isolated memory store when the durable store cannot
/// be opened; the session then keeps working without persistence.
pub fn open_store(storage: &StorageConfig) -> Box<dyn KeyValueStore> {
    match storage {
        StorageConfig::Memory => Box::new(MemoryStore::isolated()),
        StorageConfig::Sqlite { path } => match SqliteStore::open(path) {
            Ok(store) => Box::new(store),
            Err(err) => {
                warn!(
                    "event=store_open module=service status=degraded mode=sqlite fallback=memory error={}",
                    err
                );
                Box::new(MemoryStore::isolated())
            }
        },
    }
}

/// Notes session for one execution context.
pub struct NoteService<S: KeyValueStore> {
    repo: NoteRepository<S>,
    view: NotesView,
    revision: u64,
}

impl NoteService<Box<dyn KeyValueStore>> {
    /// Opens the configured store and builds a session on it.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::from_config_with_clock(config, Box::new(SystemClock))
    }

    pub fn from_config_with_clock(config: &CoreConfig, clock: Box<dyn Clock>) -> Self {
        let store = open_store(&config.storage);
        Self::new(NoteRepository::open_with(store, config.repo_options(), clock))
    }
}

impl<S: KeyValueStore> NoteService<S> {
    pub fn new(repo: NoteRepository<S>) -> Self {
        let mut service = Self {
            repo,
            view: NotesView::default(),
            revision: 0,
        };
        service.refresh();
        service
    }

    pub fn repository(&self) -> &NoteRepository<S> {
        &self.repo
    }

    pub fn view(&self) -> &NotesView {
        &self.view
    }

    pub fn visible_notes(&self) -> &[Note] {
        &self.view.visible
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.view.selected.as_ref()
    }

    pub fn search_query(&self) -> &str {
        &self.view.query
    }

    pub fn theme(&self) -> Theme {
        self.view.theme
    }

    /// Number of view recomputations so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn create_note(&mut self) -> Note {
        let note = self.repo.create();
        self.refresh();
        note
    }

    pub fn update_note(&mut self, id: &NoteId, patch: NotePatch) -> bool {
        let updated = self.repo.update(id, patch);
        if updated {
            self.refresh();
        }
        updated
    }

    /// Deletes without confirmation; the UI must confirm first
    /// (see `Note::delete_prompt`).
    pub fn delete_note(&mut self, id: &NoteId) -> bool {
        let deleted = self.repo.delete(id);
        if deleted {
            self.refresh();
        }
        deleted
    }

    pub fn select_note(&mut self, id: NoteId) {
        self.repo.select(id);
        self.refresh();
    }

    pub fn clear_selection(&mut self) {
        self.repo.clear_selection();
        self.refresh();
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.repo.set_search_query(query);
        self.refresh();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.repo.set_theme(theme);
        self.refresh();
    }

    pub fn toggle_theme(&mut self) -> Theme {
        let next = self.repo.theme().toggled();
        self.set_theme(next);
        next
    }

    /// Saves the editor buffer into the selected note.
    ///
    /// Returns `false` when nothing (or a vanished note) is selected.
    pub fn save_selected(&mut self, patch: NotePatch) -> bool {
        let Some(id) = self.view.selected.as_ref().map(|note| note.id.clone()) else {
            return false;
        };
        self.update_note(&id, patch)
    }

    /// Abandons editing by clearing the selection.
    pub fn cancel_edit(&mut self) {
        self.clear_selection();
    }

    /// Absorbs changes made by other execution contexts.
    ///
    /// Returns `true` when the view was recomputed.
    pub fn sync_external(&mut self) -> bool {
        let absorbed = self.repo.absorb_external_changes();
        if absorbed == 0 {
            return false;
        }
        info!(
            "event=session_sync module=service status=ok absorbed={} context={}",
            absorbed,
            self.repo.store().context_id()
        );
        self.refresh();
        true
    }

    /// Stops listening for foreign changes. Also happens on drop.
    pub fn close(&mut self) {
        self.repo.close();
    }

    fn refresh(&mut self) {
        self.view = NotesView::compute(
            self.repo.notes(),
            self.repo.selected_note_id(),
            self.repo.search_query(),
            self.repo.theme(),
        );
        self.revision += 1;
    }
}
