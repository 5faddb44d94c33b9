//! Outline store: the orchestration layer over tree, history and storage.
//!
//! # Responsibility
//! - Own the project list, the current-project selection and the globals.
//! - Run every item/note mutation through one template: snapshot, apply,
//!   stamp `updated_at`, record history, persist.
//! - Expose read-only navigation, export and import entry points.
//!
//! # Invariants
//! - Mutations without a current project are no-ops.
//! - A failed or no-op mutation leaves history untouched.
//! - Persistence failures are logged and never abort a mutation.
//! - Switching or deleting the current project clears history.

use crate::export::{self, json, ExportArtifact, ExportError, ExportFormat};
use crate::history::{HistoryManager, Snapshot};
use crate::model::id::{new_id, ItemId, NoteId, ProjectId};
use crate::model::item::{Item, ListType, Note, NoteKind};
use crate::model::project::{Project, ProjectSettings, FONT_SIZE_RANGE, INDENT_SIZE_RANGE};
use crate::outline::navigation;
use crate::outline::tree::{self, Direction};
use crate::repo::kv_repo::{KeyValueRepository, RepoResult};
use crate::repo::state::{load_state, save_state, PersistedState};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashSet;

/// Name of the project seeded into an empty store.
pub const DEFAULT_PROJECT_NAME: &str = "My First Project";
/// Text of newly added items.
pub const NEW_ITEM_TEXT: &str = "New Item";
const NEW_PROJECT_NAME: &str = "New Project";

/// History-recorded mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    AddRootItem,
    AddChildItem,
    UpdateItemText,
    ToggleItemCollapsed,
    DeleteItem,
    MoveItem(Direction),
    IndentItem,
    OutdentItem,
    ToggleRootListType,
    ToggleChildrenType,
    AddNote(NoteKind),
    UpdateNote(NoteKind),
    DeleteNote(NoteKind),
}

impl Mutation {
    fn description(self) -> &'static str {
        match self {
            Self::AddRootItem => "Add item",
            Self::AddChildItem => "Add child item",
            Self::UpdateItemText => "Edit item",
            Self::ToggleItemCollapsed => "Toggle collapse",
            Self::DeleteItem => "Delete item",
            Self::MoveItem(Direction::Up) => "Move item up",
            Self::MoveItem(Direction::Down) => "Move item down",
            Self::IndentItem => "Indent item",
            Self::OutdentItem => "Outdent item",
            Self::ToggleRootListType => "Toggle list type",
            Self::ToggleChildrenType => "Toggle children list type",
            Self::AddNote(NoteKind::Short) => "Add short note",
            Self::AddNote(NoteKind::Long) => "Add long note",
            Self::UpdateNote(NoteKind::Short) => "Edit short note",
            Self::UpdateNote(NoteKind::Long) => "Edit long note",
            Self::DeleteNote(NoteKind::Short) => "Delete short note",
            Self::DeleteNote(NoteKind::Long) => "Delete long note",
        }
    }

    fn event(self) -> &'static str {
        match self {
            Self::AddRootItem | Self::AddChildItem => "item_add",
            Self::UpdateItemText | Self::ToggleItemCollapsed => "item_update",
            Self::DeleteItem => "item_delete",
            Self::MoveItem(_) => "item_move",
            Self::IndentItem => "item_indent",
            Self::OutdentItem => "item_outdent",
            Self::ToggleRootListType | Self::ToggleChildrenType => "list_type_toggle",
            Self::AddNote(_) => "note_add",
            Self::UpdateNote(_) => "note_update",
            Self::DeleteNote(_) => "note_delete",
        }
    }
}

/// Result of merging an archive into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Ids of the appended projects, in archive order.
    pub imported: Vec<ProjectId>,
    /// Projects whose archived id collided and was replaced.
    pub reassigned_ids: usize,
    /// Non-fatal validation findings.
    pub warnings: Vec<String>,
}

/// Stateful outline store over a key-value repository.
pub struct OutlineStore<R: KeyValueRepository> {
    repo: R,
    state: PersistedState,
    history: HistoryManager,
}

impl<R: KeyValueRepository> OutlineStore<R> {
    /// Loads persisted state, seeding a default project into an empty store.
    ///
    /// A dangling current-project id falls back to the first project.
    pub fn load(repo: R) -> RepoResult<Self> {
        let mut state = load_state(&repo)?;
        let seeded = state.projects.is_empty();
        if seeded {
            state
                .projects
                .push(Project::new(DEFAULT_PROJECT_NAME, state.settings));
        }

        let current_is_valid = state
            .current_project_id
            .as_deref()
            .is_some_and(|id| state.projects.iter().any(|project| project.id == id));
        if !current_is_valid {
            if let Some(dangling) = state.current_project_id.as_deref() {
                warn!(
                    "event=store_load module=store status=fallback reason=dangling_current project_id={dangling}"
                );
            }
            state.current_project_id = state.projects.first().map(|project| project.id.clone());
        }

        info!(
            "event=store_load module=store status=ok projects={} seeded={}",
            state.projects.len(),
            seeded
        );
        let store = Self {
            repo,
            state,
            history: HistoryManager::new(),
        };
        if seeded || !current_is_valid {
            store.persist();
        }
        Ok(store)
    }

    pub fn projects(&self) -> &[Project] {
        &self.state.projects
    }

    pub fn current_project_id(&self) -> Option<&str> {
        self.state.current_project_id.as_deref()
    }

    pub fn current_project(&self) -> Option<&Project> {
        let id = self.state.current_project_id.as_deref()?;
        self.state.projects.iter().find(|project| project.id == id)
    }

    /// Global settings applied to new projects and items.
    pub fn settings(&self) -> ProjectSettings {
        self.state.settings
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Finds an item of the current project.
    pub fn find_item(&self, item_id: &str) -> Option<&Item> {
        tree::find(&self.current_project()?.lists, item_id)
    }

    /// Next sibling of `item_id`, wrapping at the end of its list.
    pub fn next_sibling(&self, item_id: &str) -> Option<&Item> {
        navigation::next_sibling(&self.current_project()?.lists, item_id)
    }

    /// Next item in document order; never wraps.
    pub fn next_item(&self, item_id: &str, enter_children: bool) -> Option<&Item> {
        navigation::next_item(&self.current_project()?.lists, item_id, enter_children)
    }

    // Projects

    /// Creates a project from the current globals and selects it.
    pub fn create_project(&mut self, name: &str) -> ProjectId {
        let name = match name.trim() {
            "" => NEW_PROJECT_NAME,
            trimmed => trimmed,
        };
        let project = Project::new(name, self.state.settings);
        let project_id = project.id.clone();
        self.state.projects.push(project);
        self.state.current_project_id = Some(project_id.clone());
        self.history.clear();
        info!("event=project_create module=store status=ok project_id={project_id}");
        self.persist();
        project_id
    }

    /// Renames a project. Blank names are rejected.
    pub fn rename_project(&mut self, project_id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let Some(project) = self.project_mut(project_id) else {
            return false;
        };
        project.name = name.to_string();
        project.touch();
        info!("event=project_rename module=store status=ok project_id={project_id}");
        self.persist();
        true
    }

    /// Deletes a project; deleting the current one selects the first
    /// remaining project and drops history.
    pub fn delete_project(&mut self, project_id: &str) -> bool {
        let Some(index) = self.state.projects.iter().position(|p| p.id == project_id) else {
            return false;
        };
        self.state.projects.remove(index);
        if self.state.current_project_id.as_deref() == Some(project_id) {
            self.history.clear();
            self.state.current_project_id =
                self.state.projects.first().map(|project| project.id.clone());
            if let Some(settings) = self.current_project().map(|project| project.settings) {
                self.state.settings = settings;
            }
        }
        info!(
            "event=project_delete module=store status=ok project_id={project_id} remaining={}",
            self.state.projects.len()
        );
        self.persist();
        true
    }

    /// Makes `project_id` current, restoring its settings into the globals.
    pub fn select_project(&mut self, project_id: &str) -> bool {
        let Some(settings) = self
            .state
            .projects
            .iter()
            .find(|project| project.id == project_id)
            .map(|project| project.settings)
        else {
            return false;
        };
        if self.state.current_project_id.as_deref() != Some(project_id) {
            self.history.clear();
        }
        self.state.current_project_id = Some(project_id.to_string());
        self.state.settings = settings;
        info!("event=project_select module=store status=ok project_id={project_id}");
        self.persist();
        true
    }

    // Settings

    pub fn set_font_size(&mut self, font_size: u32) -> bool {
        if !FONT_SIZE_RANGE.contains(&font_size) {
            debug!("event=settings_update module=store status=rejected field=font_size value={font_size}");
            return false;
        }
        self.update_settings("font_size", |settings| settings.font_size = font_size);
        true
    }

    pub fn set_indent_size(&mut self, indent_size: u32) -> bool {
        if !INDENT_SIZE_RANGE.contains(&indent_size) {
            debug!("event=settings_update module=store status=rejected field=indent_size value={indent_size}");
            return false;
        }
        self.update_settings("indent_size", |settings| settings.indent_size = indent_size);
        true
    }

    pub fn set_default_list_type(&mut self, list_type: ListType) {
        self.update_settings("default_list_type", |settings| {
            settings.default_list_type = list_type;
        });
    }

    pub fn set_show_indent_guides(&mut self, show: bool) {
        self.update_settings("show_indent_guides", |settings| {
            settings.show_indent_guides = show;
        });
    }

    fn update_settings(&mut self, field: &str, apply: impl Fn(&mut ProjectSettings)) {
        apply(&mut self.state.settings);
        if let Some(project) = current_mut(&mut self.state) {
            apply(&mut project.settings);
            project.touch();
        }
        info!("event=settings_update module=store status=ok field={field}");
        self.persist();
    }

    // Items

    /// Appends a root item to the current project.
    pub fn add_root_item(&mut self) -> Option<ItemId> {
        let children_type = self.state.settings.default_list_type;
        self.mutate(Mutation::AddRootItem, |project| {
            let item = Item::new(NEW_ITEM_TEXT, None, children_type);
            let item_id = item.id.clone();
            tree::insert_root(&mut project.lists, item);
            Some(item_id)
        })
    }

    /// Appends a child to `parent_id`, expanding the parent.
    pub fn add_child_item(&mut self, parent_id: &str) -> Option<ItemId> {
        let children_type = self.state.settings.default_list_type;
        self.mutate(Mutation::AddChildItem, |project| {
            let parent = tree::find_mut(&mut project.lists, parent_id)?;
            let item = Item::new(NEW_ITEM_TEXT, None, children_type);
            let item_id = item.id.clone();
            tree::insert_child(parent, item);
            Some(item_id)
        })
    }

    /// Replaces an item's text. Unchanged text is not a mutation.
    pub fn update_item_text(&mut self, item_id: &str, text: &str) -> bool {
        self.mutate(Mutation::UpdateItemText, |project| {
            let item = tree::find_mut(&mut project.lists, item_id)?;
            if item.text == text {
                return None;
            }
            item.text = text.to_string();
            Some(())
        })
        .is_some()
    }

    pub fn toggle_item_collapsed(&mut self, item_id: &str) -> bool {
        self.mutate(Mutation::ToggleItemCollapsed, |project| {
            let item = tree::find_mut(&mut project.lists, item_id)?;
            item.collapsed = !item.collapsed;
            Some(())
        })
        .is_some()
    }

    /// Deletes an item together with its subtree.
    pub fn delete_item(&mut self, item_id: &str) -> bool {
        self.mutate(Mutation::DeleteItem, |project| {
            tree::remove(&mut project.lists, item_id).map(|_| ())
        })
        .is_some()
    }

    pub fn move_item(&mut self, item_id: &str, direction: Direction) -> bool {
        self.mutate(Mutation::MoveItem(direction), |project| {
            tree::reorder(&mut project.lists, item_id, direction).then_some(())
        })
        .is_some()
    }

    pub fn indent_item(&mut self, item_id: &str) -> bool {
        self.mutate(Mutation::IndentItem, |project| {
            tree::indent(&mut project.lists, item_id).then_some(())
        })
        .is_some()
    }

    pub fn outdent_item(&mut self, item_id: &str) -> bool {
        self.mutate(Mutation::OutdentItem, |project| {
            tree::outdent(&mut project.lists, item_id).then_some(())
        })
        .is_some()
    }

    pub fn toggle_root_list_type(&mut self) -> bool {
        self.mutate(Mutation::ToggleRootListType, |project| {
            project.toggle_root_list_type();
            Some(())
        })
        .is_some()
    }

    pub fn toggle_children_type(&mut self, item_id: &str) -> bool {
        self.mutate(Mutation::ToggleChildrenType, |project| {
            tree::find_mut(&mut project.lists, item_id)?.toggle_children_type();
            Some(())
        })
        .is_some()
    }

    // Notes

    pub fn add_note(&mut self, item_id: &str, kind: NoteKind, text: &str) -> Option<NoteId> {
        self.mutate(Mutation::AddNote(kind), |project| {
            let item = tree::find_mut(&mut project.lists, item_id)?;
            let note = Note::new(kind, text);
            let note_id = note.id.clone();
            item.notes_mut(kind).push(note);
            Some(note_id)
        })
    }

    pub fn update_note(&mut self, item_id: &str, kind: NoteKind, note_id: &str, text: &str) -> bool {
        self.mutate(Mutation::UpdateNote(kind), |project| {
            let item = tree::find_mut(&mut project.lists, item_id)?;
            let note = item.notes_mut(kind).iter_mut().find(|note| note.id == note_id)?;
            if note.text == text {
                return None;
            }
            note.text = text.to_string();
            Some(())
        })
        .is_some()
    }

    pub fn delete_note(&mut self, item_id: &str, kind: NoteKind, note_id: &str) -> bool {
        self.mutate(Mutation::DeleteNote(kind), |project| {
            let notes = tree::find_mut(&mut project.lists, item_id)?.notes_mut(kind);
            let index = notes.iter().position(|note| note.id == note_id)?;
            notes.remove(index);
            Some(())
        })
        .is_some()
    }

    /// Flips a long note's presentation flag. Not recorded in history.
    pub fn toggle_note_collapse(&mut self, item_id: &str, note_id: &str) -> bool {
        let Some(project) = current_mut(&mut self.state) else {
            return false;
        };
        let Some(note) = tree::find_mut(&mut project.lists, item_id).and_then(|item| {
            item.long_notes.iter_mut().find(|note| note.id == note_id)
        }) else {
            return false;
        };
        note.collapsed = !note.collapsed;
        project.touch();
        debug!("event=note_collapse module=store status=ok note_id={note_id}");
        self.persist();
        true
    }

    // History

    pub fn undo(&mut self) -> bool {
        let Some(project) = current_mut(&mut self.state) else {
            return false;
        };
        let applied = self.history.undo(project);
        if applied {
            self.persist();
        }
        applied
    }

    pub fn redo(&mut self) -> bool {
        let Some(project) = current_mut(&mut self.state) else {
            return false;
        };
        let applied = self.history.redo(project);
        if applied {
            self.persist();
        }
        applied
    }

    // Export / import

    /// Exports a copy of the current project; `None` without a current one.
    pub fn export_current(&self, format: ExportFormat) -> Option<Result<ExportArtifact, ExportError>> {
        let snapshot = self.current_project()?.clone();
        let result = export::export_project(&snapshot, format);
        if let Err(err) = &result {
            error!(
                "event=export module=store status=error format={} project_id={} error={err}",
                format.extension(),
                snapshot.id
            );
        }
        Some(result)
    }

    /// Exports every project as one JSON backup archive.
    pub fn export_all_json(&self) -> Result<ExportArtifact, ExportError> {
        let snapshot = self.state.projects.clone();
        json::export_all_json(&snapshot, Utc::now()).inspect_err(|err| {
            error!("event=export module=store status=error format=json scope=all error={err}");
        })
    }

    /// Validates `payload` and appends its projects.
    ///
    /// Projects whose id already exists get a fresh id. The store selects the
    /// first imported project only when nothing is current.
    pub fn import_archive(&mut self, payload: &str) -> Result<ImportReport, json::ImportError> {
        let imported = json::import_archive(payload)?;
        let mut known: HashSet<ProjectId> =
            self.state.projects.iter().map(|project| project.id.clone()).collect();
        let mut report = ImportReport {
            imported: Vec::with_capacity(imported.projects.len()),
            reassigned_ids: 0,
            warnings: imported.warnings,
        };
        for mut project in imported.projects {
            if known.contains(&project.id) {
                project.id = new_id();
                report.reassigned_ids += 1;
            }
            known.insert(project.id.clone());
            report.imported.push(project.id.clone());
            self.state.projects.push(project);
        }
        if self.current_project().is_none() {
            self.state.current_project_id = report.imported.first().cloned();
        }
        info!(
            "event=import module=store status=ok projects={} reassigned={} warnings={}",
            report.imported.len(),
            report.reassigned_ids,
            report.warnings.len()
        );
        self.persist();
        Ok(report)
    }

    fn project_mut(&mut self, project_id: &str) -> Option<&mut Project> {
        self.state
            .projects
            .iter_mut()
            .find(|project| project.id == project_id)
    }

    /// Runs `apply` on the current project under the history template.
    ///
    /// `apply` returns `None` when it changed nothing; the captured snapshot
    /// is then discarded.
    fn mutate<T>(&mut self, mutation: Mutation, apply: impl FnOnce(&mut Project) -> Option<T>) -> Option<T> {
        let Some(project) = current_mut(&mut self.state) else {
            debug!(
                "event={} module=store status=skipped reason=no_current_project",
                mutation.event()
            );
            return None;
        };
        let snapshot = Snapshot::capture(project, Some(mutation.description()));
        let Some(output) = apply(project) else {
            debug!("event={} module=store status=noop", mutation.event());
            return None;
        };
        project.touch();
        let project_id = project.id.clone();
        self.history.push(snapshot);
        info!(
            "event={} module=store status=ok project_id={} undo_depth={}",
            mutation.event(),
            project_id,
            self.history.undo_len()
        );
        self.persist();
        Some(output)
    }

    fn persist(&self) {
        if let Err(err) = save_state(&self.repo, &self.state) {
            warn!("event=state_save module=store status=error error={err}");
        }
    }
}

fn current_mut(state: &mut PersistedState) -> Option<&mut Project> {
    let id = state.current_project_id.as_deref()?;
    state.projects.iter_mut().find(|project| project.id == id)
}
