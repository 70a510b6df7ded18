//! Repository layer over the durable local slot.
//!
//! # Responsibility
//! - Define the persisted snapshot contract used by the annotation store.
//! - Keep SQL details out of the store and session layers.
//!
//! # Invariants
//! - Snapshot writes replace the whole `{revision, entries}` state atomically.
//! - Read paths reject invalid persisted values instead of masking them.

pub mod snapshot_repo;
