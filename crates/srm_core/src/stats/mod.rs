//! Derived views over (catalog, annotations).
//!
//! # Responsibility
//! - Aggregate per-family responsibility percentages for the graph view.
//! - Flatten the catalog into report rows for export sinks.
//!
//! # Invariants
//! - Derivations are pure and deterministic given their inputs.
//! - Output order follows catalog order; nothing is re-sorted.
//! - Annotation keys absent from the catalog are ignored.

pub mod aggregate;
pub mod report;
