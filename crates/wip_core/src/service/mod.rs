//! Use-case services built on top of the tree store and repositories.
//!
//! # Responsibility
//! - Orchestrate tree transitions, prompting and persistence flushes.
//! - Keep interactive collaborators behind small traits.

pub mod nav_service;
pub mod prompt;
