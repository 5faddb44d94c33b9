//! Outline item and note records.
//!
//! # Responsibility
//! - Define the recursive tree node (`Item`) and its attached notes.
//! - Keep the persisted field naming (`camelCase`) in one place.
//!
//! # Invariants
//! - `parent_id` is `None` for root items and equals the owning item's `id`
//!   otherwise.
//! - `children` order is display and export order.
//! - `children_type` governs how `children` are numbered, not the item itself.

use crate::model::id::{new_id, ItemId, NoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a list of siblings is numbered or bulleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    /// Sequentially numbered.
    #[default]
    Ordered,
    /// Bulleted.
    Unordered,
}

impl ListType {
    /// Returns the opposite list type.
    pub fn toggled(self) -> Self {
        match self {
            Self::Ordered => Self::Unordered,
            Self::Unordered => Self::Ordered,
        }
    }

    /// Flips the list type in place.
    pub fn toggle(&mut self) {
        *self = self.toggled();
    }

    /// Stable lowercase name used in persisted and archived payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ordered => "ordered",
            Self::Unordered => "unordered",
        }
    }

    /// Parses the persisted lowercase name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "ordered" => Some(Self::Ordered),
            "unordered" => Some(Self::Unordered),
            _ => None,
        }
    }
}

/// Which note collection of an item an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// Inline annotation rendered after the item text.
    Short,
    /// Block annotation that may carry bounded markup.
    Long,
}

/// Short or long annotation attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub text: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Presentation flag, meaningful for long notes only.
    #[serde(default)]
    pub collapsed: bool,
}

impl Note {
    /// Creates a note with a generated id.
    ///
    /// Long notes start collapsed; short notes never collapse.
    pub fn new(kind: NoteKind, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            created_at: Utc::now(),
            collapsed: kind == NoteKind::Long,
        }
    }
}

/// One outline node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub short_notes: Vec<Note>,
    #[serde(default)]
    pub long_notes: Vec<Note>,
    #[serde(default)]
    pub children: Vec<Item>,
    /// Legacy records without this field are upgraded to `Ordered`.
    #[serde(default)]
    pub children_type: ListType,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
}

impl Item {
    /// Creates an expanded, childless item with a generated id.
    pub fn new(text: impl Into<String>, parent_id: Option<ItemId>, children_type: ListType) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            collapsed: false,
            short_notes: Vec::new(),
            long_notes: Vec::new(),
            children: Vec::new(),
            children_type,
            parent_id,
        }
    }

    /// Returns the note collection selected by `kind`.
    pub fn notes(&self, kind: NoteKind) -> &[Note] {
        match kind {
            NoteKind::Short => &self.short_notes,
            NoteKind::Long => &self.long_notes,
        }
    }

    /// Mutable variant of [`Item::notes`].
    pub fn notes_mut(&mut self, kind: NoteKind) -> &mut Vec<Note> {
        match kind {
            NoteKind::Short => &mut self.short_notes,
            NoteKind::Long => &mut self.long_notes,
        }
    }

    /// Flips how this item's children are numbered. Descendants are untouched.
    pub fn toggle_children_type(&mut self) {
        self.children_type.toggle();
    }
}
