//! Domain model for the responsibility matrix.
//!
//! # Responsibility
//! - Define the read-only catalog tree (families, controls, objectives).
//! - Define user-owned annotation values and the revision selector.
//!
//! # Invariants
//! - Catalog values are replaced wholesale, never mutated in place.
//! - An objective without a stored entry is `Entry::default()`.

pub mod catalog;
pub mod entry;
pub mod tips;
