//! Outline domain model.
//!
//! # Responsibility
//! - Define the project/item/note records shared by tree, history, store
//!   and export layers.
//! - Own identifier generation for every record kind.
//!
//! # Invariants
//! - Every record is identified by a stable string id, unique per project.
//! - Items form a tree: each item is owned by exactly one children list.

pub mod id;
pub mod item;
pub mod project;
