//! Outline tree engine.
//!
//! # Responsibility
//! - Structural operations over a project forest (find, insert, remove,
//!   reorder, reparent).
//! - Read-only navigation queries used for keyboard traversal.
//!
//! # Invariants
//! - Operations never consult history or persistence.
//! - Nodes are addressed by id; the first depth-first pre-order match wins.
//! - Traversals use an explicit stack, never recursion, so nesting depth is
//!   bounded only by memory.

pub mod navigation;
pub mod tree;
