//! WIP tree domain model.
//!
//! # Responsibility
//! - Define nodes, archive records and the in-memory tree store.
//! - Keep every tree invariant enforceable without I/O.
//!
//! # Invariants
//! - The tree is strict: no node has more than one parent.
//! - Removed nodes only survive as archive records.

pub mod node;
pub mod tree;
