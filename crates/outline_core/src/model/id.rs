//! Identifier generation for projects, items and notes.
//!
//! Ids are plain strings so archives produced by other tools (which may use
//! arbitrary identifiers) can be imported without rewriting.

use uuid::Uuid;

/// Stable identifier shared by every outline record kind.
pub type OutlineId = String;
/// Identifier of a project.
pub type ProjectId = OutlineId;
/// Identifier of an outline item.
pub type ItemId = OutlineId;
/// Identifier of a short or long note.
pub type NoteId = OutlineId;

/// Generates a new collision-resistant identifier.
///
/// Uses random v4 UUIDs rendered without hyphens.
pub fn new_id() -> OutlineId {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::new_id;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_unique_and_compact() {
        let ids: HashSet<_> = (0..1_000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1_000);
        assert!(ids.iter().all(|id| id.len() == 32 && !id.contains('-')));
    }
}
