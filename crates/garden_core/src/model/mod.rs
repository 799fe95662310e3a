//! Domain model for timeline items.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep kind dispatch (note/task/contact) in one closed sum type.
//!
//! # Invariants
//! - Every item is identified by a stable `ItemId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod item;
pub mod timestamp;
