//! Persistence collaborator for outline state.
//!
//! # Responsibility
//! - Define the key-value contract the store syncs against.
//! - Encode/decode the persisted state shape and upgrade legacy records.
//!
//! # Invariants
//! - The store only touches persistence at load and after each change.
//! - Malformed stored values are replaced with defaults, never propagated.

pub mod kv_repo;
pub mod state;
