//! Project record and display settings.
//!
//! # Responsibility
//! - Define the project envelope around one outline forest.
//! - Define global and per-project display settings with their bounds.
//!
//! # Invariants
//! - A project copies the global settings at creation time only.
//! - `lists` is the ordered forest of root items.

use crate::model::id::{new_id, ProjectId};
use crate::model::item::{Item, ListType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Default font size applied when no setting is stored.
pub const DEFAULT_FONT_SIZE: u32 = 14;
/// Default indent width applied when no setting is stored.
pub const DEFAULT_INDENT_SIZE: u32 = 32;
/// Accepted font sizes.
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 10..=50;
/// Accepted indent widths.
pub const INDENT_SIZE_RANGE: RangeInclusive<u32> = 5..=100;

/// Display settings, used both globally and per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    pub font_size: u32,
    pub indent_size: u32,
    pub default_list_type: ListType,
    pub show_indent_guides: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            indent_size: DEFAULT_INDENT_SIZE,
            default_list_type: ListType::Ordered,
            show_indent_guides: true,
        }
    }
}

/// One outline document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub root_list_type: ListType,
    pub settings: ProjectSettings,
    pub lists: Vec<Item>,
}

impl Project {
    /// Creates an empty project inheriting `defaults`.
    pub fn new(name: impl Into<String>, defaults: ProjectSettings) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            root_list_type: defaults.default_list_type,
            settings: defaults,
            lists: Vec::new(),
        }
    }

    /// Stamps `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Flips how root items are numbered. Descendants are untouched.
    pub fn toggle_root_list_type(&mut self) {
        self.root_list_type.toggle();
    }
}

#[cfg(test)]
mod tests {
    use super::{Project, ProjectSettings};
    use crate::model::item::ListType;

    #[test]
    fn new_project_inherits_defaults_and_starts_empty() {
        let defaults = ProjectSettings {
            font_size: 18,
            indent_size: 40,
            default_list_type: ListType::Unordered,
            show_indent_guides: false,
        };
        let project = Project::new("Plan", defaults);
        assert_eq!(project.settings, defaults);
        assert_eq!(project.root_list_type, ListType::Unordered);
        assert!(project.lists.is_empty());
        assert_eq!(project.created_at, project.updated_at);
    }
}
