//! Note repository over persistent fields.
//!
//! # Responsibility
//! - Own the four persistent fields (notes, selection, query, theme).
//! - Enforce id and timestamp invariants centrally for every mutation.
//!
//! # Invariants
//! - Note ids are unique within the collection at all times.
//! - `updated_at >= created_at` for every stored note.
//! - Operations on unknown note ids are benign no-ops.

pub mod clock;
pub mod ids;
pub mod note_repo;
