//! Timeline feed: timestamp index derivation and the paginated query engine.
//!
//! # Responsibility
//! - Turn items into timestamp entries.
//! - Serve ordered, cursor-paginated pages of those entries.
//!
//! # Invariants
//! - Stateless: every query is computed from the item snapshot it is given.

pub mod index;
pub mod query;
