//! Portable annotation files.
//!
//! # Responsibility
//! - Materialize annotations for a catalog into an export document.
//! - Parse import documents (current and legacy shapes) and replace the
//!   store with their content after revision reconciliation.
//!
//! # Invariants
//! - Exports are full materializations with defaults expanded.
//! - Imports are all-or-nothing full replacements.

pub mod transcoder;
