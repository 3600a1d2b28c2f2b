//! Persistent fields: typed values mirrored to one backing-store key.
//!
//! # Responsibility
//! - Decode the stored payload on load, falling back to the field default.
//! - Encode and write every local change, keeping memory authoritative
//!   when the store rejects the write.
//! - Absorb changes announced by other execution contexts.
//!
//! # Invariants
//! - Loading, writing and absorbing never fail; storage problems are
//!   logged and degrade to in-memory operation.
//! - Decoding is total: payloads that do not parse become the default;
//!   parsed note collections are repaired note by note, never discarded.

pub mod persistent_field;
pub mod value;

pub use persistent_field::{PersistentField, WriteStatus};
pub use value::{decode_or_default, encode, Decoded, FieldValue};
