//! Catalog acquisition.
//!
//! # Responsibility
//! - Fetch static catalog and tips documents from a configured location.
//! - Expose the working catalog for the active revision.
//!
//! # Invariants
//! - Catalogs are replaced wholesale; a partial catalog is never installed.

pub mod loader;
pub mod source;
