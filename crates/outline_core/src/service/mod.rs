//! Use-case orchestration.
//!
//! # Responsibility
//! - Combine tree operations, history and persistence into store-level APIs.
//! - Keep front ends decoupled from storage details.

pub mod outline_store;
