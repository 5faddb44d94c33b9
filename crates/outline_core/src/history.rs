//! Snapshot-based undo/redo history.
//!
//! # Responsibility
//! - Keep bounded undo/redo stacks of whole-forest deep copies.
//! - Restore a project's forest and root list type from those copies.
//!
//! # Invariants
//! - The undo top is always the state immediately *before* the last recorded
//!   mutation, never the state it produced.
//! - Neither stack grows past [`MAX_HISTORY`]; the oldest entry is evicted.
//! - A new record clears the redo stack (linear history, no branching).
//! - Snapshots recorded under another project are never applied.

use crate::model::id::ProjectId;
use crate::model::item::{Item, ListType};
use crate::model::project::Project;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::VecDeque;

/// Maximum number of retained snapshots per stack.
pub const MAX_HISTORY: usize = 50;

/// Deep copy of a project's forest and root list type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub project_id: ProjectId,
    pub lists: Vec<Item>,
    pub root_list_type: ListType,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Copies the current state of `project`.
    pub fn capture(project: &Project, description: Option<&str>) -> Self {
        Self {
            project_id: project.id.clone(),
            lists: project.lists.clone(),
            root_list_type: project.root_list_type,
            description: description.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    fn restore_into(self, project: &mut Project) {
        project.lists = self.lists;
        project.root_list_type = self.root_list_type;
        project.touch();
    }
}

/// Undo/redo stacks for the active project.
#[derive(Debug, Default)]
pub struct HistoryManager {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: VecDeque<Snapshot>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the state of `project` before a mutation is applied.
    pub fn record_before_mutation(&mut self, project: &Project, description: &str) {
        self.push(Snapshot::capture(project, Some(description)));
    }

    /// Pushes an already captured pre-mutation snapshot.
    ///
    /// Used when the caller captures first and only records once the
    /// mutation is known to have changed the tree.
    pub fn push(&mut self, snapshot: Snapshot) {
        debug!(
            "event=history_record module=history status=ok project_id={} description={}",
            snapshot.project_id,
            snapshot.description.as_deref().unwrap_or("")
        );
        push_bounded(&mut self.undo_stack, snapshot);
        self.redo_stack.clear();
    }

    /// Restores the most recent undo snapshot into `project`.
    ///
    /// Returns `false` when nothing was applied.
    pub fn undo(&mut self, project: &mut Project) -> bool {
        step(&mut self.undo_stack, &mut self.redo_stack, project, "undo")
    }

    /// Re-applies the most recently undone snapshot into `project`.
    ///
    /// Returns `false` when nothing was applied.
    pub fn redo(&mut self, project: &mut Project) -> bool {
        step(&mut self.redo_stack, &mut self.undo_stack, project, "redo")
    }

    /// Drops both stacks.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Description of the snapshot the next undo would restore.
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().and_then(|s| s.description.as_deref())
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot) {
    stack.push_back(snapshot);
    while stack.len() > MAX_HISTORY {
        stack.pop_front();
    }
}

fn step(
    from: &mut VecDeque<Snapshot>,
    to: &mut VecDeque<Snapshot>,
    project: &mut Project,
    action: &str,
) -> bool {
    let Some(snapshot) = from.pop_back() else {
        return false;
    };
    if snapshot.project_id != project.id {
        warn!(
            "event=history_{action} module=history status=skipped reason=project_mismatch snapshot_project={} active_project={}",
            snapshot.project_id, project.id
        );
        from.push_back(snapshot);
        return false;
    }

    push_bounded(to, Snapshot::capture(project, snapshot.description.as_deref()));
    snapshot.restore_into(project);
    debug!(
        "event=history_{action} module=history status=ok project_id={}",
        project.id
    );
    true
}

#[cfg(test)]
mod tests {
    use super::{HistoryManager, Snapshot, MAX_HISTORY};
    use crate::model::item::{Item, ListType};
    use crate::model::project::{Project, ProjectSettings};

    fn project() -> Project {
        Project::new("History", ProjectSettings::default())
    }

    fn add_root(project: &mut Project, text: &str) {
        project.lists.push(Item::new(text, None, ListType::Ordered));
    }

    #[test]
    fn undo_then_redo_reproduces_post_mutation_state() {
        let mut project = project();
        let mut history = HistoryManager::new();

        history.record_before_mutation(&project, "Add root item");
        add_root(&mut project, "one");
        let after = project.lists.clone();

        assert!(history.undo(&mut project));
        assert!(project.lists.is_empty());
        assert!(history.redo(&mut project));
        assert_eq!(project.lists, after);
    }

    #[test]
    fn undo_on_empty_stack_is_noop() {
        let mut project = project();
        let mut history = HistoryManager::new();
        let before = project.clone();
        assert!(!history.undo(&mut project));
        assert!(!history.redo(&mut project));
        assert_eq!(project, before);
    }

    #[test]
    fn stacks_are_capped() {
        let mut project = project();
        let mut history = HistoryManager::new();
        for index in 0..(MAX_HISTORY + 20) {
            history.record_before_mutation(&project, "Add root item");
            add_root(&mut project, &format!("item {index}"));
        }
        assert_eq!(history.undo_len(), MAX_HISTORY);

        while history.undo(&mut project) {}
        assert_eq!(project.lists.len(), 20);
        assert_eq!(history.redo_len(), MAX_HISTORY);
    }

    #[test]
    fn new_record_clears_redo() {
        let mut project = project();
        let mut history = HistoryManager::new();
        history.record_before_mutation(&project, "Add root item");
        add_root(&mut project, "one");
        assert!(history.undo(&mut project));
        assert!(history.can_redo());

        history.record_before_mutation(&project, "Toggle root list type");
        project.toggle_root_list_type();
        assert!(!history.can_redo());
    }

    #[test]
    fn snapshot_from_other_project_is_pushed_back_unconsumed() {
        let mut stale = project();
        add_root(&mut stale, "stale");
        let mut history = HistoryManager::new();
        history.push(Snapshot::capture(&stale, Some("Delete item")));

        let mut current = project();
        add_root(&mut current, "current");
        let before = current.clone();

        assert!(!history.undo(&mut current));
        assert_eq!(current, before);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.undo_description(), Some("Delete item"));
    }

    #[test]
    fn restored_forest_does_not_alias_snapshot() {
        let mut project = project();
        let mut history = HistoryManager::new();
        add_root(&mut project, "one");
        history.record_before_mutation(&project, "Update item");
        project.lists[0].text = "changed".to_string();

        assert!(history.undo(&mut project));
        project.lists[0].text = "edited after undo".to_string();
        assert!(history.redo(&mut project));
        assert_eq!(project.lists[0].text, "changed");
        assert!(history.undo(&mut project));
        assert_eq!(project.lists[0].text, "edited after undo");
    }
}
