//! In-memory annotation state with durable write-through.
//!
//! # Responsibility
//! - Own the active revision and the objective-id -> entry map.
//! - Persist the full snapshot on every mutation before notifying observers.
//!
//! # Invariants
//! - Reads after a write in the same context observe the write.
//! - A failed persist leaves in-memory state unchanged.

pub mod annotation_store;
