//! Domain model for locally stored notes.
//!
//! # Responsibility
//! - Define the note record, its typed patch, and the UI theme flag.
//! - Own the JSON wire shape persisted in the backing store.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId` that is never reused.
//! - `updated_at >= created_at` for every note that decodes successfully.

pub mod note;
pub mod theme;
