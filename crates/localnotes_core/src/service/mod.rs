//! UI-facing session over the note repository.
//!
//! # Responsibility
//! - Expose the operations the presentation layer invokes.
//! - Keep the derived view current after every local or foreign change.
//!
//! # Invariants
//! - The cached view always equals a fresh projection of the repository.

pub mod note_service;
