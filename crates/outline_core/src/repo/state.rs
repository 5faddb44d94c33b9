//! Persisted outline state: encoding, tolerant decoding and legacy upgrade.
//!
//! # Responsibility
//! - Map the in-memory store state onto string keys.
//! - Upgrade legacy records missing `rootListType`, `settings` or
//!   `childrenType`, and repair `parentId` links.
//!
//! # Invariants
//! - Decoding never fails on malformed values: each bad value is logged and
//!   replaced by its default.
//! - A malformed project record is dropped alone; the rest still load.

use crate::model::id::ProjectId;
use crate::model::item::{Item, ListType};
use crate::model::project::{Project, ProjectSettings, FONT_SIZE_RANGE, INDENT_SIZE_RANGE};
use crate::outline::tree::{dedupe_ids, relink_parents};
use crate::repo::kv_repo::{KeyValueRepository, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::ops::RangeInclusive;

pub const KEY_PROJECTS: &str = "outline.projects";
pub const KEY_CURRENT_PROJECT: &str = "outline.current_project";
pub const KEY_FONT_SIZE: &str = "outline.font_size";
pub const KEY_INDENT_SIZE: &str = "outline.indent_size";
pub const KEY_DEFAULT_LIST_TYPE: &str = "outline.default_list_type";
pub const KEY_SHOW_INDENT_GUIDES: &str = "outline.show_indent_guides";

const UNTITLED_PROJECT: &str = "Untitled project";

/// Everything the store persists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PersistedState {
    pub projects: Vec<Project>,
    pub current_project_id: Option<ProjectId>,
    pub settings: ProjectSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProject {
    id: ProjectId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    root_list_type: Option<ListType>,
    #[serde(default)]
    settings: Option<StoredSettings>,
    #[serde(default)]
    lists: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredSettings {
    font_size: Option<u32>,
    indent_size: Option<u32>,
    default_list_type: Option<ListType>,
    show_indent_guides: Option<bool>,
}

impl StoredSettings {
    fn or_defaults(self, defaults: ProjectSettings) -> ProjectSettings {
        ProjectSettings {
            font_size: bounded(self.font_size, FONT_SIZE_RANGE, "font_size")
                .unwrap_or(defaults.font_size),
            indent_size: bounded(self.indent_size, INDENT_SIZE_RANGE, "indent_size")
                .unwrap_or(defaults.indent_size),
            default_list_type: self.default_list_type.unwrap_or(defaults.default_list_type),
            show_indent_guides: self.show_indent_guides.unwrap_or(defaults.show_indent_guides),
        }
    }
}

impl StoredProject {
    fn upgrade(self, defaults: ProjectSettings) -> Project {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let mut lists = self.lists;
        let renamed = dedupe_ids(&mut lists);
        if renamed > 0 {
            warn!(
                "event=state_load module=repo status=repaired reason=duplicate_ids project_id={} renamed={}",
                self.id, renamed
            );
        }
        relink_parents(&mut lists);
        Project {
            id: self.id,
            name: self.name.unwrap_or_else(|| UNTITLED_PROJECT.to_string()),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            root_list_type: self.root_list_type.unwrap_or(ListType::Ordered),
            settings: self.settings.unwrap_or_default().or_defaults(defaults),
            lists,
        }
    }
}

/// Loads persisted state, substituting defaults for anything malformed.
///
/// Only repository transport failures are returned as errors.
pub fn load_state<R: KeyValueRepository>(repo: &R) -> RepoResult<PersistedState> {
    let defaults = ProjectSettings::default();
    let settings = ProjectSettings {
        font_size: read_parsed(repo, KEY_FONT_SIZE, |v| parse_in_range(v, FONT_SIZE_RANGE))?
            .unwrap_or(defaults.font_size),
        indent_size: read_parsed(repo, KEY_INDENT_SIZE, |v| parse_in_range(v, INDENT_SIZE_RANGE))?
            .unwrap_or(defaults.indent_size),
        default_list_type: read_parsed(repo, KEY_DEFAULT_LIST_TYPE, ListType::parse)?
            .unwrap_or(defaults.default_list_type),
        show_indent_guides: read_parsed(repo, KEY_SHOW_INDENT_GUIDES, |v| {
            v.trim().parse::<bool>().ok()
        })?
        .unwrap_or(defaults.show_indent_guides),
    };

    let projects = match repo.get(KEY_PROJECTS)? {
        Some(raw) => decode_projects(&raw, settings),
        None => Vec::new(),
    };
    let current_project_id = repo
        .get(KEY_CURRENT_PROJECT)?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(PersistedState {
        projects,
        current_project_id,
        settings,
    })
}

/// Writes the full state in one atomic batch.
pub fn save_state<R: KeyValueRepository>(repo: &R, state: &PersistedState) -> RepoResult<()> {
    let projects = serde_json::to_string(&state.projects)
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;
    let entries = [
        (KEY_PROJECTS, projects),
        (
            KEY_CURRENT_PROJECT,
            state.current_project_id.clone().unwrap_or_default(),
        ),
        (KEY_FONT_SIZE, state.settings.font_size.to_string()),
        (KEY_INDENT_SIZE, state.settings.indent_size.to_string()),
        (
            KEY_DEFAULT_LIST_TYPE,
            state.settings.default_list_type.as_str().to_string(),
        ),
        (
            KEY_SHOW_INDENT_GUIDES,
            state.settings.show_indent_guides.to_string(),
        ),
    ];
    repo.put_all(&entries)
}

fn read_parsed<R, T>(repo: &R, key: &str, parse: impl Fn(&str) -> Option<T>) -> RepoResult<Option<T>>
where
    R: KeyValueRepository,
{
    let Some(raw) = repo.get(key)? else {
        return Ok(None);
    };
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!("event=state_load module=repo status=fallback reason=malformed_value key={key}");
    }
    Ok(parsed)
}

fn parse_in_range(raw: &str, range: RangeInclusive<u32>) -> Option<u32> {
    raw.trim().parse().ok().filter(|value| range.contains(value))
}

/// Drops a stored per-project size outside `range`.
fn bounded(value: Option<u32>, range: RangeInclusive<u32>, field: &str) -> Option<u32> {
    let value = value?;
    if range.contains(&value) {
        return Some(value);
    }
    warn!("event=state_load module=repo status=fallback reason=out_of_range field={field} value={value}");
    None
}

fn decode_projects(raw: &str, defaults: ProjectSettings) -> Vec<Project> {
    let records = match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(records) => records,
        Err(err) => {
            warn!(
                "event=state_load module=repo status=fallback reason=malformed_projects error={}",
                err
            );
            return Vec::new();
        }
    };

    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<StoredProject>(record) {
            Ok(stored) => Some(stored.upgrade(defaults)),
            Err(err) => {
                warn!(
                    "event=state_load module=repo status=skipped reason=malformed_project index={} error={}",
                    index, err
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;
    use crate::repo::kv_repo::SqliteKeyValueRepository;

    #[test]
    fn empty_store_loads_defaults() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");
        let state = load_state(&repo).expect("load");
        assert_eq!(state, PersistedState::default());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");
        let settings = ProjectSettings {
            font_size: 20,
            indent_size: 48,
            default_list_type: ListType::Unordered,
            show_indent_guides: false,
        };
        let mut project = Project::new("Roundtrip", settings);
        project.lists.push(Item::new("root", None, ListType::Unordered));
        let state = PersistedState {
            current_project_id: Some(project.id.clone()),
            projects: vec![project],
            settings,
        };

        save_state(&repo, &state).expect("save");
        assert_eq!(load_state(&repo).expect("load"), state);
    }

    #[test]
    fn legacy_project_is_upgraded_with_global_settings() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");
        repo.put_all(&[
            (KEY_FONT_SIZE, "22".to_string()),
            (
                KEY_PROJECTS,
                r#"[{"id":"p1","name":"Old","lists":[{"id":"i1","text":"x","type":"ordered",
                    "children":[{"id":"i2","text":"y","parentId":"wrong"}]}]}]"#
                    .to_string(),
            ),
        ])
        .expect("seed");

        let state = load_state(&repo).expect("load");
        let project = &state.projects[0];
        assert_eq!(project.root_list_type, ListType::Ordered);
        assert_eq!(project.settings.font_size, 22);
        assert_eq!(project.settings.indent_size, 32);
        assert_eq!(project.lists[0].children_type, ListType::Ordered);
        assert_eq!(project.lists[0].children[0].parent_id.as_deref(), Some("i1"));
    }

    #[test]
    fn malformed_values_fall_back_without_error() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");
        repo.put_all(&[
            (KEY_PROJECTS, "{not json".to_string()),
            (KEY_INDENT_SIZE, "wide".to_string()),
            (KEY_DEFAULT_LIST_TYPE, "zigzag".to_string()),
        ])
        .expect("seed");

        let state = load_state(&repo).expect("load");
        assert!(state.projects.is_empty());
        assert_eq!(state.settings, ProjectSettings::default());
    }

    #[test]
    fn one_malformed_project_does_not_drop_the_others() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");
        repo.put_all(&[(
            KEY_PROJECTS,
            r#"[{"name":"no id"},{"id":"ok","name":"Fine"}]"#.to_string(),
        )])
        .expect("seed");

        let state = load_state(&repo).expect("load");
        assert_eq!(state.projects.len(), 1);
        assert_eq!(state.projects[0].id, "ok");
    }

    #[test]
    fn out_of_range_sizes_fall_back_to_defaults() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");
        repo.put_all(&[
            (KEY_FONT_SIZE, "4000000000".to_string()),
            (KEY_INDENT_SIZE, "2".to_string()),
            (
                KEY_PROJECTS,
                r#"[{"id":"p1","name":"Huge","settings":{"fontSize":4000000000,"indentSize":101}}]"#
                    .to_string(),
            ),
        ])
        .expect("seed");

        let state = load_state(&repo).expect("load");
        assert_eq!(state.settings, ProjectSettings::default());
        assert_eq!(state.projects[0].settings, ProjectSettings::default());
    }

    #[test]
    fn duplicate_item_ids_are_renamed_on_load() {
        let conn = open_db_in_memory().expect("open db");
        let repo = SqliteKeyValueRepository::try_new(&conn).expect("repo");
        repo.put_all(&[(
            KEY_PROJECTS,
            r#"[{"id":"p1","name":"Dup","lists":[
                {"id":"x","text":"first","children":[{"id":"x","text":"nested"}]},
                {"id":"x","text":"last"}]}]"#
                .to_string(),
        )])
        .expect("seed");

        let state = load_state(&repo).expect("load");
        let lists = &state.projects[0].lists;
        assert_eq!(lists[0].id, "x");
        assert_ne!(lists[0].children[0].id, "x");
        assert_ne!(lists[1].id, "x");
        assert_eq!(lists[0].children[0].parent_id.as_deref(), Some("x"));
    }
}
