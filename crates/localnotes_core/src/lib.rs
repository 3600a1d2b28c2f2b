//! Persistent reactive store for a local notes client.
//! This crate is the single source of truth for note invariants.

pub mod config;
pub mod db;
pub mod field;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod view;

pub use config::{ConfigError, CoreConfig, StorageConfig};
pub use field::{PersistentField, WriteStatus};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::note::{Note, NoteId, NotePatch, NoteValidationError};
pub use model::theme::Theme;
pub use repo::clock::{Clock, ManualClock, SystemClock};
pub use repo::ids::{IdGenerator, IdStrategy};
pub use repo::note_repo::{FieldKeys, NoteRepository, RepoOptions, DEFAULT_KEY_PREFIX};
pub use service::note_service::{open_store, NoteService};
pub use store::{
    ChangeHub, ContextId, KeyValueStore, MemoryBackend, MemoryStore, SqliteStore, StoreChange,
    StoreError, StoreResult, Subscription,
};
pub use view::derived::{selected_note, visible_notes, NotesView};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
