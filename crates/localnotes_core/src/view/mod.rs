//! Derived, stateless projections over the notes collection.
//!
//! # Invariants
//! - Projections never mutate their inputs.
//! - Identical inputs always produce identical outputs.

pub mod derived;
